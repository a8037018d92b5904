//! Temperature to fan speed policy
//!
//! Maps a temperature to one of five discrete tiers using four ascending
//! thresholds. Each band includes its lower bound:
//!
//! | temperature      | tier   | duty |
//! |------------------|--------|------|
//! | `t >= t3`        | Full   | 0.0  |
//! | `t2 <= t < t3`   | High   | 0.25 |
//! | `t1 <= t < t2`   | Medium | 0.5  |
//! | `t0 <= t < t1`   | Low    | 0.75 |
//! | `t < t0`         | Off    | 1.0  |
//!
//! There is no hysteresis here. Chatter between tiers is absorbed by the
//! actuator's minimum-delta write suppression.

use serde::Serialize;

use crate::constants::thresholds;
use crate::data::SpeedTier;
use crate::error::{PoeError, Result};

/// Four strictly ascending temperature boundaries in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSet {
    levels: [f64; 4],
}

impl ThresholdSet {
    /// Build a threshold set, rejecting non-finite or non-ascending levels
    pub fn new(t0: f64, t1: f64, t2: f64, t3: f64) -> Result<Self> {
        let levels = [t0, t1, t2, t3];

        if let Some((index, value)) = levels.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(PoeError::InvalidThresholds(format!(
                "lv{} is not a finite number ({})",
                index, value
            )));
        }

        for (index, window) in levels.windows(2).enumerate() {
            if window[0] >= window[1] {
                return Err(PoeError::InvalidThresholds(format!(
                    "lv{} ({}) must be greater than lv{} ({})",
                    index + 1,
                    window[1],
                    index,
                    window[0]
                )));
            }
        }

        Ok(Self { levels })
    }

    /// Lower bound of the given tier's band; None for Off
    pub fn lower_bound(&self, tier: SpeedTier) -> Option<f64> {
        match tier {
            SpeedTier::Off => None,
            SpeedTier::Low => Some(self.levels[0]),
            SpeedTier::Medium => Some(self.levels[1]),
            SpeedTier::High => Some(self.levels[2]),
            SpeedTier::Full => Some(self.levels[3]),
        }
    }

    pub fn levels(&self) -> [f64; 4] {
        self.levels
    }
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            levels: [
                thresholds::DEFAULT_LV0,
                thresholds::DEFAULT_LV1,
                thresholds::DEFAULT_LV2,
                thresholds::DEFAULT_LV3,
            ],
        }
    }
}

/// Decide the speed tier and duty cycle for a temperature
///
/// Total over all inputs: NaN compares false against every bound and maps to Off.
pub fn decide(temperature: f64, thresholds: &ThresholdSet) -> (SpeedTier, f64) {
    let [t0, t1, t2, t3] = thresholds.levels;

    let tier = if temperature >= t3 {
        SpeedTier::Full
    } else if temperature >= t2 {
        SpeedTier::High
    } else if temperature >= t1 {
        SpeedTier::Medium
    } else if temperature >= t0 {
        SpeedTier::Low
    } else {
        SpeedTier::Off
    };

    (tier, tier.duty_cycle())
}
