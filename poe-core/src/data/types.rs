//! Core data types for rockpi-poe
//!
//! Defines the values that flow through one control tick.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::duty;

/// A single temperature sample in degrees Celsius
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureReading {
    celsius: f64,
    sensor: String,
}

impl TemperatureReading {
    pub fn new(celsius: f64, sensor: impl Into<String>) -> Self {
        Self {
            celsius,
            sensor: sensor.into(),
        }
    }

    pub fn celsius(&self) -> f64 {
        self.celsius
    }

    /// Label of the sensor that produced this reading
    pub fn sensor(&self) -> &str {
        &self.sensor
    }
}

impl fmt::Display for TemperatureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°C ({})", self.celsius, self.sensor)
    }
}

/// Discrete fan speed level
///
/// Ordered from slowest to fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    Off,
    Low,
    Medium,
    High,
    Full,
}

impl SpeedTier {
    /// All tiers, slowest first
    pub const ALL: [SpeedTier; 5] = [
        SpeedTier::Off,
        SpeedTier::Low,
        SpeedTier::Medium,
        SpeedTier::High,
        SpeedTier::Full,
    ];

    /// PWM duty cycle for this tier (inverted: 1.0 = no drive, 0.0 = full drive)
    pub fn duty_cycle(self) -> f64 {
        match self {
            SpeedTier::Off => duty::OFF,
            SpeedTier::Low => duty::LOW,
            SpeedTier::Medium => duty::MEDIUM,
            SpeedTier::High => duty::HIGH,
            SpeedTier::Full => duty::FULL,
        }
    }

    /// Fan speed as a percentage for display and metrics
    pub fn percent(self) -> f64 {
        match self {
            SpeedTier::Off => 0.0,
            SpeedTier::Low => 25.0,
            SpeedTier::Medium => 50.0,
            SpeedTier::High => 75.0,
            SpeedTier::Full => 100.0,
        }
    }

    pub fn is_off(self) -> bool {
        self == SpeedTier::Off
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpeedTier::Off => "off",
            SpeedTier::Low => "low",
            SpeedTier::Medium => "medium",
            SpeedTier::High => "high",
            SpeedTier::Full => "full",
        }
    }
}

impl fmt::Display for SpeedTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}%)", self.as_str(), self.percent())
    }
}

/// Hardware state as last written by the actuator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActuatorState {
    /// Level of the enable line
    pub enabled: bool,
    /// Last duty cycle written; None until the first write
    pub duty_cycle: Option<f64>,
    /// Last tier whose writes all succeeded
    pub tier: SpeedTier,
}

impl Default for ActuatorState {
    fn default() -> Self {
        Self {
            enabled: false,
            duty_cycle: None,
            tier: SpeedTier::Off,
        }
    }
}

/// Which hardware writes an `apply_tier` call performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub enable_written: bool,
    pub duty_written: bool,
}

impl ApplyOutcome {
    /// True when the call did not touch the hardware
    pub fn is_noop(&self) -> bool {
        !self.enable_written && !self.duty_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_duty_cycles_are_inverted() {
        assert_eq!(SpeedTier::Off.duty_cycle(), 1.0);
        assert_eq!(SpeedTier::Low.duty_cycle(), 0.75);
        assert_eq!(SpeedTier::Medium.duty_cycle(), 0.5);
        assert_eq!(SpeedTier::High.duty_cycle(), 0.25);
        assert_eq!(SpeedTier::Full.duty_cycle(), 0.0);
    }

    #[test]
    fn test_tier_ordering_matches_percent() {
        for pair in SpeedTier::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].percent() < pair[1].percent());
            assert!(pair[0].duty_cycle() > pair[1].duty_cycle());
        }
    }

    #[test]
    fn test_tier_serializes_lowercase() {
        let json = serde_json::to_string(&SpeedTier::Medium).expect("tier should serialize");
        assert_eq!(json, "\"medium\"");
    }

    #[test]
    fn test_reading_display() {
        let reading = TemperatureReading::new(47.34, "thermal_zone_cpu");
        assert_eq!(reading.to_string(), "47.3°C (thermal_zone_cpu)");
    }
}
