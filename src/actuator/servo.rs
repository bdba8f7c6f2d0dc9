//! Grid-cell to servo-angle mapping.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{Actuator, Axis};

/// Servo pulse width at 0°, in microseconds.
const MIN_PULSE_US: f64 = 500.0;
/// Servo pulse width at 180°, in microseconds.
const MAX_PULSE_US: f64 = 2500.0;
/// Period of a 50 Hz servo signal, in microseconds.
const PERIOD_US: f64 = 20_000.0;

/// Field of view expressed as servo angle limits, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoLimits {
    /// Leftmost pan angle
    pub h_min: f64,
    /// Rightmost pan angle
    pub h_max: f64,
    /// Top tilt angle
    pub v_min: f64,
    /// Bottom tilt angle
    pub v_max: f64,
}

impl Default for ServoLimits {
    fn default() -> Self {
        Self {
            h_min: 0.0,
            h_max: 180.0,
            v_min: 0.0,
            v_max: 90.0,
        }
    }
}

/// Angle of step `index` out of `steps` evenly spaced positions in `[min, max]`.
///
/// A single step stays at `min`.
fn step_angle(min: f64, max: f64, index: usize, steps: usize) -> f64 {
    if steps > 1 {
        min + index as f64 * (max - min) / (steps - 1) as f64
    } else {
        min
    }
}

/// 16-bit PWM duty cycle for a servo angle (clamped to 0-180°).
pub fn duty_cycle_for_angle(degrees: f64) -> u16 {
    let degrees = degrees.clamp(0.0, 180.0);
    let pulse_us = MIN_PULSE_US + (MAX_PULSE_US - MIN_PULSE_US) * (degrees / 180.0);
    (pulse_us / PERIOD_US * u16::MAX as f64) as u16
}

pub struct ServoRig {
    actuator: Box<dyn Actuator>,
    limits: ServoLimits,
}

impl ServoRig {
    pub fn new(actuator: Box<dyn Actuator>, limits: ServoLimits) -> Self {
        Self { actuator, limits }
    }

    /// Pan/tilt angles for cell `(x, y)` of a `width x height` grid.
    pub fn angles_for(&self, x: usize, y: usize, width: usize, height: usize) -> (f64, f64) {
        let l = &self.limits;
        (
            step_angle(l.h_min, l.h_max, x, width),
            step_angle(l.v_min, l.v_max, y, height),
        )
    }

    /// Points the rig at a grid cell.
    pub fn position(&mut self, x: usize, y: usize, width: usize, height: usize) -> Result<()> {
        let (h, v) = self.angles_for(x, y, width, height);
        self.actuator.move_to(Axis::Horizontal, h)?;
        self.actuator.move_to(Axis::Vertical, v)
    }

    /// Returns to the top-left home position.
    pub fn home(&mut self) -> Result<()> {
        self.actuator.move_to(Axis::Horizontal, self.limits.h_min)?;
        self.actuator.move_to(Axis::Vertical, self.limits.v_min)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingActuator;
    use super::*;

    #[test]
    fn test_angles_span_limits() {
        let rig = ServoRig::new(Box::new(RecordingActuator::default()), ServoLimits::default());
        assert_eq!(rig.angles_for(0, 0, 5, 3), (0.0, 0.0));
        assert_eq!(rig.angles_for(4, 2, 5, 3), (180.0, 90.0));
        assert_eq!(rig.angles_for(2, 1, 5, 3), (90.0, 45.0));
    }

    #[test]
    fn test_single_step_stays_at_min() {
        let limits = ServoLimits {
            h_min: 30.0,
            h_max: 150.0,
            v_min: 10.0,
            v_max: 80.0,
        };
        let rig = ServoRig::new(Box::new(RecordingActuator::default()), limits);
        assert_eq!(rig.angles_for(0, 0, 1, 1), (30.0, 10.0));
    }

    #[test]
    fn test_position_moves_both_axes() {
        let recorder = RecordingActuator::default();
        let moves = recorder.moves.clone();
        let mut rig = ServoRig::new(Box::new(recorder), ServoLimits::default());

        rig.position(1, 1, 3, 2).unwrap();
        rig.home().unwrap();

        let moves = moves.lock().unwrap();
        assert_eq!(
            *moves,
            vec![
                (Axis::Horizontal, 90.0),
                (Axis::Vertical, 90.0),
                (Axis::Horizontal, 0.0),
                (Axis::Vertical, 0.0),
            ]
        );
    }

    #[test]
    fn test_duty_cycle() {
        assert_eq!(duty_cycle_for_angle(0.0), 1638);
        assert_eq!(duty_cycle_for_angle(90.0), 4915);
        assert_eq!(duty_cycle_for_angle(180.0), 8191);
        // Clamped
        assert_eq!(duty_cycle_for_angle(-20.0), 1638);
        assert_eq!(duty_cycle_for_angle(270.0), 8191);
    }
}
