//! Pan/tilt positioning.
//!
//! The scanner only needs "point the sensor at cell (x, y)". `ServoRig`
//! turns grid cells into pan/tilt angles and forwards them to an
//! `Actuator`, which is whatever drives the hardware.

pub mod servo;

pub use servo::{duty_cycle_for_angle, ServoLimits, ServoRig};

use anyhow::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Horizontal => write!(f, "horizontal"),
            Axis::Vertical => write!(f, "vertical"),
        }
    }
}

/// Best-effort positioning. No settle acknowledgement exists; callers wait.
pub trait Actuator: Send {
    fn move_to(&mut self, axis: Axis, degrees: f64) -> Result<()>;
}

/// Stand-in used on the bench: logs every command and moves nothing.
#[derive(Debug, Default)]
pub struct LoggingActuator;

impl Actuator for LoggingActuator {
    fn move_to(&mut self, axis: Axis, degrees: f64) -> Result<()> {
        crate::log(&format!(
            "Servo {} -> {:.1}° (duty {})",
            axis,
            degrees,
            duty_cycle_for_angle(degrees)
        ));
        Ok(())
    }
}
