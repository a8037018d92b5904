//! Fan control loop
//!
//! Drives the sense, decide, actuate and report cycle at a fixed interval.
//!
//! # Lifecycle
//!
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`
//!
//! A [`ControlHandle`] can be cloned into signal handlers or other tasks to
//! request a stop. The request is observed at the top of a tick or while the
//! loop sleeps between ticks. Every exit path leaves the fan forced off.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::data::{ActuatorState, ApplyOutcome, SpeedTier};
use crate::engine::policy::{decide, ThresholdSet};
use crate::error::{PoeError, Result};
use crate::hw::{Actuator, CompositeSensor, FanDriver, SensorSource, TemperatureSource};
use crate::metrics::{MetricsServer, MetricsSink};

/// Lifecycle state of a [`ControlLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct Shared {
    state: Mutex<LoopState>,
    stop_requested: AtomicBool,
    wake: Notify,
}

impl Shared {
    fn set_state(&self, state: LoopState) {
        *self.state.lock() = state;
    }

    /// Return to `Stopped`, discarding any stop request made on the way out
    fn finish(&self) {
        let mut state = self.state.lock();
        self.stop_requested.store(false, Ordering::SeqCst);
        *state = LoopState::Stopped;
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }
}

/// Cloneable stop and status handle for a running loop
#[derive(Clone)]
pub struct ControlHandle {
    shared: Arc<Shared>,
}

impl ControlHandle {
    /// Request a stop; does nothing when the loop is stopped
    pub fn stop(&self) {
        let state = self.shared.state.lock();
        if *state == LoopState::Stopped {
            return;
        }
        self.shared.request_stop();
    }

    /// Request a stop that also applies to a loop that has not started yet
    ///
    /// Meant for termination signals, which may arrive before `start()` runs.
    /// A cancelled loop that is then started forces the fan off and returns.
    pub fn cancel(&self) {
        let _state = self.shared.state.lock();
        self.shared.request_stop();
    }

    pub fn state(&self) -> LoopState {
        *self.shared.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Composite temperature, if any sensor answered
    pub temperature: Option<f64>,
    /// Tier chosen for the temperature
    pub tier: Option<SpeedTier>,
    /// Hardware writes performed, if the actuator succeeded
    pub outcome: Option<ApplyOutcome>,
    /// Actuator failure message, if it failed
    pub actuator_error: Option<String>,
    /// True when the tick panicked and was abandoned
    pub panicked: bool,
    /// Actuator state after the tick
    pub state: ActuatorState,
}

/// Operation label used for actuator error metrics
fn failed_operation(err: &PoeError) -> &str {
    match err {
        PoeError::ActuatorFault { operation, .. } => operation.as_str(),
        PoeError::ActuatorUnavailable(_) => "initialize",
        PoeError::InvalidDutyCycle { .. } => "set_duty_cycle",
        _ => "unknown",
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct ControlLoop<D: FanDriver, S: TemperatureSource = SensorSource> {
    sensor: CompositeSensor<S>,
    actuator: Actuator<D>,
    thresholds: ThresholdSet,
    interval: Duration,
    metrics: Arc<dyn MetricsSink>,
    exporter: Option<MetricsServer>,
    shared: Arc<Shared>,
    started_at: Instant,
}

impl<D: FanDriver, S: TemperatureSource> ControlLoop<D, S> {
    pub fn new(
        sensor: CompositeSensor<S>,
        actuator: Actuator<D>,
        thresholds: ThresholdSet,
        interval: Duration,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            sensor,
            actuator,
            thresholds,
            interval,
            metrics,
            exporter: None,
            shared: Arc::new(Shared {
                state: Mutex::new(LoopState::Stopped),
                stop_requested: AtomicBool::new(false),
                wake: Notify::new(),
            }),
            started_at: Instant::now(),
        }
    }

    /// Serve metrics over HTTP while the loop runs
    pub fn with_exporter(mut self, exporter: MetricsServer) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> LoopState {
        *self.shared.state.lock()
    }

    pub fn actuator(&self) -> &Actuator<D> {
        &self.actuator
    }

    pub fn exporter(&self) -> Option<&MetricsServer> {
        self.exporter.as_ref()
    }

    /// Abort a start attempt with the fan off
    fn abort_start(&mut self, err: PoeError) -> Result<()> {
        self.actuator.force_off();
        self.shared.finish();
        Err(err)
    }

    /// Run until a stop is requested
    ///
    /// Returns an error only when the loop could not start: the fan hardware
    /// is unavailable or the metrics listener could not bind.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if matches!(*state, LoopState::Running | LoopState::Starting) {
                warn!("Control loop already running");
                return Ok(());
            }
            *state = LoopState::Starting;
        }

        // May block on sysfs export settle; must run before the exporter is spawned
        if let Err(e) = self.actuator.ensure_available() {
            error!("Cannot start fan control: {}", e);
            return self.abort_start(PoeError::ControllerUnavailable(e.to_string()));
        }

        if let Some(exporter) = self.exporter.as_mut() {
            if let Err(e) = exporter.start().await {
                error!("Cannot start metrics exporter: {}", e);
                return self.abort_start(e);
            }
        }

        self.started_at = Instant::now();
        self.shared.set_state(LoopState::Running);
        info!(
            "Fan control running (interval {:?}, {} temperature sources, thresholds {:?})",
            self.interval,
            self.sensor.len(),
            self.thresholds.levels()
        );

        while !self.shared.stop_requested.load(Ordering::SeqCst) {
            self.tick();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shared.wake.notified() => {
                    debug!("Control loop woken for stop");
                }
            }
        }

        self.shared.set_state(LoopState::Stopping);
        info!("Stopping fan control");

        self.actuator.shutdown();
        let state = self.actuator.state();
        self.metrics.observe_fan_speed(state.tier.percent());
        self.metrics.observe_fan_enabled(state.enabled);

        if let Some(exporter) = self.exporter.as_mut() {
            exporter.stop().await;
        }

        self.shared.finish();
        info!("Fan control stopped");
        Ok(())
    }

    /// Run a single tick, isolating panics
    pub fn tick(&mut self) -> TickReport {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_tick())) {
            Ok(report) => report,
            Err(payload) => {
                error!("Control tick panicked: {}", panic_message(payload.as_ref()));
                TickReport {
                    panicked: true,
                    state: self.actuator.state(),
                    ..TickReport::default()
                }
            }
        }
    }

    fn run_tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        match self.sensor.read() {
            Ok(reading) => {
                let (tier, duty_cycle) = decide(reading.celsius(), &self.thresholds);
                report.temperature = Some(reading.celsius());
                report.tier = Some(tier);

                match self.actuator.apply_tier(tier) {
                    Ok(outcome) => {
                        if outcome.duty_written {
                            self.metrics.increment_speed_change();
                        }
                        if !outcome.is_noop() {
                            info!(
                                "Temperature {:.1}°C: fan {} (duty {:.2})",
                                reading.celsius(),
                                tier,
                                duty_cycle
                            );
                        }
                        report.outcome = Some(outcome);
                    }
                    Err(e) => {
                        error!("Failed to apply fan speed {}: {}", tier, e);
                        self.metrics.increment_actuator_error(failed_operation(&e));
                        report.actuator_error = Some(e.to_string());
                    }
                }
            }
            // The composite sensor has already counted this failure
            Err(e) => warn!("Skipping fan update: {}", e),
        }

        let state = self.actuator.state();
        self.metrics.observe_fan_speed(state.tier.percent());
        self.metrics.observe_fan_enabled(state.enabled);
        self.metrics
            .observe_uptime(self.started_at.elapsed().as_secs_f64());

        debug!(
            temperature = ?report.temperature,
            tier = state.tier.as_str(),
            enabled = state.enabled,
            duty_cycle = ?state.duty_cycle,
            "Tick complete"
        );

        report.state = state;
        report
    }
}
