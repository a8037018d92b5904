//! Fan control engine modules
//!
//! Contains the temperature policy and the control loop that applies it.

mod control_loop;
mod policy;

pub use control_loop::{ControlHandle, ControlLoop, LoopState, TickReport};
pub use policy::{decide, ThresholdSet};
