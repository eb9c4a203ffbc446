//! Calibrated setpoint → power table with linear interpolation.
//!
//! Keys are setpoint distances (cm), values are fan power (%).  The table is
//! fixed-capacity so it can be swapped into a running controller without
//! touching the allocator.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::error::{CalibrationDataError, Result};

/// Maximum number of calibration points a table holds.
pub const MAX_LOOKUP_POINTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookupPoint {
    pub setpoint_cm: f32,
    pub power_pct: f32,
}

/// Serialized as a bare point list; loading goes through
/// [`LookupTable::from_points`] so keys are always sorted and unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "std::vec::Vec<LookupPoint>", into = "std::vec::Vec<LookupPoint>")]
pub struct LookupTable {
    points: Vec<LookupPoint, MAX_LOOKUP_POINTS>,
}

impl LookupTable {
    /// Build a table from unordered points.
    ///
    /// Non-finite points are discarded, keys are sorted and duplicate keys
    /// collapse to the mean of their powers.
    pub fn from_points(points: &[LookupPoint]) -> Result<Self> {
        let mut sorted: std::vec::Vec<LookupPoint> = points
            .iter()
            .copied()
            .filter(|p| p.setpoint_cm.is_finite() && p.power_pct.is_finite())
            .collect();
        sorted.sort_by(|a, b| a.setpoint_cm.total_cmp(&b.setpoint_cm));

        let mut table = Vec::new();
        let mut i = 0;
        while i < sorted.len() {
            let key = sorted[i].setpoint_cm;
            let mut sum = 0.0;
            let mut n = 0u32;
            while i < sorted.len() && sorted[i].setpoint_cm == key {
                sum += sorted[i].power_pct;
                n += 1;
                i += 1;
            }
            table
                .push(LookupPoint {
                    setpoint_cm: key,
                    power_pct: sum / n as f32,
                })
                .map_err(|_| CalibrationDataError::TableOverflow)?;
        }
        Ok(Self { points: table })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[LookupPoint] {
        &self.points
    }

    /// Power for `setpoint_cm`, linear between neighbours and held flat
    /// beyond either end.  `None` for an empty table or a non-finite key.
    pub fn interpolate(&self, setpoint_cm: f32) -> Option<f32> {
        if !setpoint_cm.is_finite() {
            return None;
        }
        let first = self.points.first()?;
        let last = self.points.last()?;
        if setpoint_cm <= first.setpoint_cm {
            return Some(first.power_pct);
        }
        if setpoint_cm >= last.setpoint_cm {
            return Some(last.power_pct);
        }
        let upper = self
            .points
            .iter()
            .position(|p| p.setpoint_cm >= setpoint_cm)?;
        let hi = self.points[upper];
        let lo = self.points[upper - 1];
        let t = (setpoint_cm - lo.setpoint_cm) / (hi.setpoint_cm - lo.setpoint_cm);
        Some(lo.power_pct + t * (hi.power_pct - lo.power_pct))
    }
}

impl TryFrom<std::vec::Vec<LookupPoint>> for LookupTable {
    type Error = crate::error::Error;

    fn try_from(points: std::vec::Vec<LookupPoint>) -> Result<Self> {
        Self::from_points(&points)
    }
}

impl From<LookupTable> for std::vec::Vec<LookupPoint> {
    fn from(table: LookupTable) -> Self {
        table.points.iter().copied().collect()
    }
}
