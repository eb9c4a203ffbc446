//! Fuzzy sets over the distance and power universes.
//!
//! Each universe holds exactly five categories, addressed through tagged
//! enums so an unknown category cannot be named.  Every set is a triangle
//! `(left, peak, right)`; the outermost distance sets are shoulders that
//! saturate at 1 beyond their peak.
//!
//! ```text
//!  1 ┤█╲    ╱╲     ╱╲     ╱╲    ╱█
//!    │█ ╲  ╱  ╲   ╱  ╲   ╱  ╲  ╱ █
//!  0 ┼█──╳────╳─╳────╳─╳────╳────█──▶ distance
//!     VL   L      I      H     VH
//! ```
//!
//! Construction always ends in [`repair`], which keeps peaks strictly
//! increasing and interior flanks no narrower than a few peak gaps, and
//! (for the distance universe) overlaps neighbours so no point is left
//! without membership.  Together these keep the defuzzified output
//! continuous and free of steep ramps.

use core::marker::PhantomData;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// A category enum with exactly five members in semantic order.
pub trait Category: Copy + Eq + core::fmt::Debug {
    const ALL: [Self; 5];

    /// Position of this category in [`Category::ALL`].
    fn index(self) -> usize;

    fn name(self) -> &'static str;
}

/// Distance categories, smallest distance (object high) first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputCategory {
    VeryLow,
    Low,
    Ideal,
    High,
    VeryHigh,
}

impl Category for InputCategory {
    const ALL: [Self; 5] = [Self::VeryLow, Self::Low, Self::Ideal, Self::High, Self::VeryHigh];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Ideal => "ideal",
            Self::High => "high",
            Self::VeryHigh => "very-high",
        }
    }
}

/// Fan power categories, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputCategory {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Category for OutputCategory {
    const ALL: [Self; 5] = [Self::VeryLow, Self::Low, Self::Medium, Self::High, Self::VeryHigh];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very-high",
        }
    }
}

// ---------------------------------------------------------------------------
// Membership set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Triangle,
    /// Degree 1 for every value at or below the peak.
    LeftShoulder,
    /// Degree 1 for every value at or above the peak.
    RightShoulder,
}

/// One fuzzy set: a triangle with optional shoulder saturation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembershipSet {
    pub left: f32,
    pub peak: f32,
    pub right: f32,
    pub shape: Shape,
}

impl MembershipSet {
    pub const fn triangle(left: f32, peak: f32, right: f32) -> Self {
        Self {
            left,
            peak,
            right,
            shape: Shape::Triangle,
        }
    }

    /// Degree of membership of `x`, in `[0, 1]`.
    pub fn degree(&self, x: f32) -> f32 {
        match self.shape {
            Shape::LeftShoulder if x <= self.peak => return 1.0,
            Shape::RightShoulder if x >= self.peak => return 1.0,
            _ => {}
        }
        if x == self.peak {
            1.0
        } else if x < self.peak {
            if x <= self.left {
                0.0
            } else {
                (x - self.left) / (self.peak - self.left)
            }
        } else if x >= self.right {
            0.0
        } else {
            (self.right - x) / (self.right - self.peak)
        }
    }

    /// `[left, peak, right]`.
    pub fn breakpoints(&self) -> [f32; 3] {
        [self.left, self.peak, self.right]
    }
}

// ---------------------------------------------------------------------------
// Universe
// ---------------------------------------------------------------------------

/// Whether a universe describes the measured input or the actuator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniverseKind {
    /// Shoulders at both ends; every point covered by some set.
    Input,
    /// Plain triangles; sets may leave gaps.
    Output,
}

/// Five fuzzy sets over `[lo, hi]`, indexed by category `C`.
#[derive(Debug, Clone, PartialEq)]
pub struct Universe<C: Category> {
    lo: f32,
    hi: f32,
    sets: [MembershipSet; 5],
    _category: PhantomData<C>,
}

impl<C: Category> Universe<C> {
    /// Build a universe from raw `[left, peak, right]` triples, repairing
    /// them into a well-formed partition.
    pub fn from_breakpoints(
        raw: [[f32; 3]; 5],
        lo: f32,
        hi: f32,
        gap: f32,
        kind: UniverseKind,
    ) -> Self {
        let mut sets = raw.map(|[l, p, r]| MembershipSet::triangle(l, p, r));
        repair(&mut sets, lo, hi, gap, kind);
        Self {
            lo,
            hi,
            sets,
            _category: PhantomData,
        }
    }

    /// Build a universe whose set `i` peaks at `peaks[i]` and falls to zero
    /// at the neighbouring peaks (or the universe edges).
    pub fn from_peaks(peaks: [f32; 5], lo: f32, hi: f32, gap: f32, kind: UniverseKind) -> Self {
        let mut peaks = peaks;
        enforce_spacing(&mut peaks, lo, hi, gap);
        let raw = core::array::from_fn(|i| {
            let left = if i == 0 { lo } else { peaks[i - 1] };
            let right = if i == 4 { hi } else { peaks[i + 1] };
            [left, peaks[i], right]
        });
        Self::from_breakpoints(raw, lo, hi, gap, kind)
    }

    pub fn set(&self, category: C) -> &MembershipSet {
        &self.sets[category.index()]
    }

    /// Membership degree of `x` in every category, in category order.
    pub fn degrees(&self, x: f32) -> [f32; 5] {
        self.sets.map(|s| s.degree(x))
    }

    pub fn peaks(&self) -> [f32; 5] {
        self.sets.map(|s| s.peak)
    }

    pub fn breakpoints(&self) -> [[f32; 3]; 5] {
        self.sets.map(|s| s.breakpoints())
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.lo, self.hi)
    }
}

impl Universe<InputCategory> {
    /// Distance universe centred on `setpoint`.
    ///
    /// Very-low and very-high are anchored to the universe edges; the middle
    /// three scale with the setpoint so the "ideal" band tightens as the
    /// object is asked to float higher.
    pub fn for_setpoint(setpoint: f32, distance_max: f32, gap: f32) -> Self {
        let s = setpoint;
        let dmax = distance_max;
        let raw = [
            [0.0, 0.0, (s * 0.3).max(5.0)],
            [0.0, s * 0.5, s * 0.9],
            [s * 0.7, s, s * 1.3],
            [s * 1.1, s * 1.5, (s * 2.0).min(dmax * 0.8)],
            [(s * 1.5).max(dmax * 0.6), dmax, dmax],
        ];
        Self::from_breakpoints(raw, 0.0, dmax, gap, UniverseKind::Input)
    }
}

impl Universe<OutputCategory> {
    /// Fan power universe, 0–100%, with no set reaching below `minimum_power`.
    pub fn standard_power(minimum_power: f32, gap: f32) -> Self {
        let raw = [
            [0.0, 0.0, 20.0],
            [0.0, 20.0, 40.0],
            [30.0, 50.0, 70.0],
            [60.0, 80.0, 100.0],
            [80.0, 100.0, 100.0],
        ];
        Self::from_breakpoints(raw, minimum_power, 100.0, gap, UniverseKind::Output)
    }
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

/// Force `values` into `[lo, hi]`, strictly increasing with at least `gap`
/// between neighbours.  Requires `hi - lo >= 4 * gap`.
pub fn enforce_spacing(values: &mut [f32; 5], lo: f32, hi: f32, gap: f32) {
    for v in values.iter_mut() {
        *v = if v.is_nan() { lo } else { v.clamp(lo, hi) };
    }
    for i in 1..5 {
        values[i] = values[i].max(values[i - 1] + gap);
    }
    values[4] = values[4].min(hi);
    for i in (0..4).rev() {
        values[i] = values[i].min(values[i + 1] - gap);
    }
}

/// Narrowest interior flank or neighbour overlap, in multiples of `gap`.
const MIN_FLANK_GAPS: f32 = 4.0;

/// Make a set of five triangles well-formed.
///
/// 1. clamp to `[lo, hi]` and space the peaks;
/// 2. widen every interior flank narrower than `MIN_FLANK_GAPS * gap` out
///    to the neighbouring peak;
/// 3. (input only) give neighbours at least that much overlap, then add
///    shoulders.
///
/// Peaks are never moved by steps 2 and 3.
fn repair(sets: &mut [MembershipSet; 5], lo: f32, hi: f32, gap: f32, kind: UniverseKind) {
    let mut peaks = sets.map(|s| s.peak);
    enforce_spacing(&mut peaks, lo, hi, gap);
    let min_flank = gap * MIN_FLANK_GAPS;

    for (i, set) in sets.iter_mut().enumerate() {
        set.peak = peaks[i];
        set.left = clamp_or(set.left, lo, hi).min(set.peak);
        set.right = clamp_or(set.right, lo, hi).max(set.peak);
        if i > 0 && set.peak - set.left < min_flank {
            set.left = set.left.min(peaks[i - 1]);
        }
        if i < 4 && set.right - set.peak < min_flank {
            set.right = set.right.max(peaks[i + 1]);
        }
    }

    if kind == UniverseKind::Input {
        for i in 0..4 {
            if sets[i].right - sets[i + 1].left < min_flank {
                sets[i].right = sets[i].right.max(peaks[i + 1]);
                sets[i + 1].left = sets[i + 1].left.min(peaks[i]);
            }
        }
        sets[0].shape = Shape::LeftShoulder;
        sets[4].shape = Shape::RightShoulder;
    }
}

fn clamp_or(v: f32, lo: f32, hi: f32) -> f32 {
    if v.is_nan() { lo } else { v.clamp(lo, hi) }
}
