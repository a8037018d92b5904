//! Fan actuator
//!
//! Owns the last written hardware state and turns speed tiers into the
//! minimal sequence of enable and duty writes.
//!
//! # Write ordering
//! - Turning on: enable first, then the duty cycle
//! - Turning off: duty 1.0 first, then disable
//! - Duty changes of `NOISE_THRESHOLD` or less are not written
//!
//! State is only updated after the corresponding write succeeds, so a failed
//! write is retried on the next call.

use tracing::{debug, error, info, warn};

use crate::constants::duty;
use crate::data::{validate_duty_cycle, ActuatorState, ApplyOutcome, SpeedTier};
use crate::error::{PoeError, Result};
use crate::hw::driver::FanDriver;

/// Lazy initialization result
#[derive(Debug, Clone)]
enum Availability {
    Unknown,
    Ready,
    Unavailable(String),
}

pub struct Actuator<D: FanDriver> {
    driver: D,
    availability: Availability,
    state: ActuatorState,
}

/// Attribute a driver error to the operation that produced it
fn as_fault(operation: &str, err: PoeError) -> PoeError {
    match err {
        PoeError::ActuatorFault { .. } | PoeError::InvalidDutyCycle { .. } => err,
        other => PoeError::actuator_fault(operation, other.to_string()),
    }
}

impl<D: FanDriver> Actuator<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            availability: Availability::Unknown,
            state: ActuatorState::default(),
        }
    }

    /// Initialize the hardware once
    ///
    /// A failure is permanent: later calls fail with `ActuatorUnavailable`
    /// without touching the driver again.
    pub fn ensure_available(&mut self) -> Result<()> {
        match &self.availability {
            Availability::Ready => Ok(()),
            Availability::Unavailable(reason) => Err(PoeError::ActuatorUnavailable(reason.clone())),
            Availability::Unknown => match self.driver.initialize() {
                Ok(()) => {
                    info!("Fan actuator ready");
                    self.availability = Availability::Ready;
                    Ok(())
                }
                Err(e) => {
                    let reason = e.to_string();
                    error!("Fan actuator initialization failed: {}", reason);
                    self.availability = Availability::Unavailable(reason.clone());
                    Err(PoeError::ActuatorUnavailable(reason))
                }
            },
        }
    }

    /// True once initialization has succeeded
    pub fn is_available(&self) -> bool {
        matches!(self.availability, Availability::Ready)
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn write_enable(&mut self, enabled: bool) -> Result<()> {
        self.driver
            .set_enable(enabled)
            .map_err(|e| as_fault("set_enable", e))?;
        self.state.enabled = enabled;
        Ok(())
    }

    fn write_duty(&mut self, duty_cycle: f64) -> Result<()> {
        let duty_cycle = validate_duty_cycle(duty_cycle)?;
        self.driver
            .set_duty_cycle(duty_cycle)
            .map_err(|e| as_fault("set_duty_cycle", e))?;
        self.state.duty_cycle = Some(duty_cycle);
        Ok(())
    }

    /// Drive the hardware to the given tier
    pub fn apply_tier(&mut self, tier: SpeedTier) -> Result<ApplyOutcome> {
        self.ensure_available()?;

        let target_duty = validate_duty_cycle(tier.duty_cycle())?;
        let enabled = !tier.is_off();
        let mut outcome = ApplyOutcome::default();

        if enabled && !self.state.enabled {
            self.write_enable(true)?;
            outcome.enable_written = true;
            info!("Fan enabled at {}%", tier.percent());
        } else if !enabled && self.state.enabled {
            self.write_duty(duty::OFF)?;
            outcome.duty_written = true;
            self.write_enable(false)?;
            outcome.enable_written = true;
            info!("Fan disabled");
        }

        let needs_write = match self.state.duty_cycle {
            None => true,
            Some(last) => (target_duty - last).abs() > duty::NOISE_THRESHOLD,
        };
        if needs_write {
            self.write_duty(target_duty)?;
            outcome.duty_written = true;
            debug!(tier = tier.as_str(), duty_cycle = target_duty, "Duty cycle written");
        }

        self.state.tier = tier;
        Ok(outcome)
    }

    /// Disable the fan and park the duty at 1.0, logging instead of failing
    pub fn force_off(&mut self) {
        if let Err(e) = self.ensure_available() {
            warn!("Cannot force fan off: {}", e);
            return;
        }

        let disabled = self.write_enable(false);
        if let Err(ref e) = disabled {
            error!("Failed to disable fan: {}", e);
        }
        let parked = self.write_duty(duty::OFF);
        if let Err(ref e) = parked {
            error!("Failed to park fan duty cycle: {}", e);
        }

        if disabled.is_ok() && parked.is_ok() {
            self.state.tier = SpeedTier::Off;
            info!("Fan forced off");
        }
    }

    /// Force off, then release the hardware
    pub fn shutdown(&mut self) {
        self.force_off();
        if self.is_available() {
            if let Err(e) = self.driver.release() {
                warn!("Failed to release fan hardware: {}", e);
            }
        }
    }
}
