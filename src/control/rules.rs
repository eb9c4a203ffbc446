//! Fuzzy rule base.
//!
//! Larger distance means the object sits lower in the tube and needs more
//! air, so each distance category maps onto the power category of the same
//! rank.  If a geometry ever reverses that sign convention the table has to
//! be re-derived, not re-tuned.

use super::membership::{
    Category, InputCategory, MembershipSet, OutputCategory, Universe,
};

/// `IF distance IS when THEN power IS then`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub when: InputCategory,
    pub then: OutputCategory,
}

pub const RULE_BASE: [Rule; 5] = [
    Rule {
        when: InputCategory::VeryLow,
        then: OutputCategory::VeryLow,
    },
    Rule {
        when: InputCategory::Low,
        then: OutputCategory::Low,
    },
    Rule {
        when: InputCategory::Ideal,
        then: OutputCategory::Medium,
    },
    Rule {
        when: InputCategory::High,
        then: OutputCategory::High,
    },
    Rule {
        when: InputCategory::VeryHigh,
        then: OutputCategory::VeryHigh,
    },
];

/// Rules bound to concrete sets.  Rebuilt whenever either universe changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    compiled: [(MembershipSet, MembershipSet); 5],
}

impl RuleSet {
    pub fn compile(
        rules: &[Rule; 5],
        inputs: &Universe<InputCategory>,
        outputs: &Universe<OutputCategory>,
    ) -> Self {
        Self {
            compiled: rules.map(|r| (*inputs.set(r.when), *outputs.set(r.then))),
        }
    }

    /// Antecedent strength of every rule for `distance`.
    pub fn firing(&self, distance: f32) -> [f32; 5] {
        self.compiled.map(|(when, _)| when.degree(distance))
    }

    /// Aggregated (max of min-implied) output membership at power `x`.
    pub fn aggregate(&self, firing: &[f32; 5], x: f32) -> f32 {
        self.compiled
            .iter()
            .zip(firing)
            .map(|((_, then), &w)| w.min(then.degree(x)))
            .fold(0.0, f32::max)
    }
}
