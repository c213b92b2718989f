//! Animator sources: instrument-style inputs that drive hydro beams.

use serde::{Deserialize, Serialize};

/// Input an animated hydro follows. Aero sources carry the engine index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimSource {
    Rpm,
    Airspeed,
    Vvi,
    /// Altimeter needle, 100 000 ft per turn.
    Altimeter100k,
    Altimeter10k,
    Altimeter1k,
    Aoa,
    Roll,
    Pitch,
    Brake,
    ParkingBrake,
    Accelerator,
    Clutch,
    Turbo,
    ShiftLeftRight,
    ShiftBackForth,
    Sequential,
    ShifterLin,
    DiffLock,
    Heading,
    Torque,
    BoatThrottle,
    BoatRudder,
    AeroRpm(usize),
    AeroThrottle(usize),
    AeroTorque(usize),
    AeroPitch(usize),
    AeroStatus(usize),
}

/// Per-tick snapshot of the values animators read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimatorInputs {
    pub rpm_ratio: f32,
    /// Knots.
    pub airspeed: f32,
    /// Vertical speed, m/s.
    pub vvi: f32,
    /// Feet.
    pub altitude: f32,
    /// Degrees.
    pub aoa: f32,
    pub roll: f32,
    pub pitch: f32,
    pub heading: f32,
    pub brake: f32,
    pub parking_brake: bool,
    pub accelerator: f32,
    pub clutch: f32,
    pub turbo_ratio: f32,
    pub gear: i32,
    pub forward_gears: i32,
    pub diff_locked: bool,
    pub torque_ratio: f32,
    pub boat_throttle: f32,
    pub boat_rudder: f32,
    pub aero: Vec<AeroInputs>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AeroInputs {
    pub rpm_ratio: f32,
    pub throttle: f32,
    pub torque_ratio: f32,
    /// Degrees.
    pub pitch: f32,
    pub ignition: bool,
    pub failed: bool,
}

/// Animation binding of a hydro: sources plus an optional output range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animator {
    pub sources: Vec<AnimSource>,
    /// Clamp for the resulting length factor.
    pub lower_limit: Option<f32>,
    pub upper_limit: Option<f32>,
}

impl Animator {
    pub fn new(sources: Vec<AnimSource>) -> Self {
        Self {
            sources,
            lower_limit: None,
            upper_limit: None,
        }
    }

    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.lower_limit = Some(lower);
        self.upper_limit = Some(upper);
        self
    }

    /// Sum of the source states and the number of sources contributing.
    pub fn evaluate(&self, inputs: &AnimatorInputs) -> (f32, u32) {
        let mut cstate = 0.0;
        let mut div = 0;
        for source in &self.sources {
            if let Some(value) = source_state(*source, inputs) {
                cstate += value;
                div += 1;
            }
        }
        (cstate, div)
    }

    pub fn limit(&self, factor: f32) -> f32 {
        let mut factor = factor;
        if let Some(lower) = self.lower_limit {
            factor = factor.max(lower);
        }
        if let Some(upper) = self.upper_limit {
            factor = factor.min(upper);
        }
        factor
    }
}

fn shifter_lr(gear: i32, forward_gears: i32) -> f32 {
    if gear < 0 {
        return -1.0;
    }
    if gear == 0 {
        return 0.0;
    }
    let columns = ((forward_gears + 1) / 2).max(1) as f32;
    let column = ((gear + 1) / 2) as f32;
    -1.0 + 2.0 * column / columns
}

fn shifter_bf(gear: i32) -> f32 {
    match gear {
        g if g < 0 => -1.0,
        0 => 0.0,
        g if g % 2 == 1 => 1.0,
        _ => -1.0,
    }
}

/// Normalized state of one source, `None` when the source is unavailable.
pub fn source_state(source: AnimSource, inputs: &AnimatorInputs) -> Option<f32> {
    let value = match source {
        AnimSource::Rpm => inputs.rpm_ratio,
        AnimSource::Airspeed => inputs.airspeed / 180.0,
        AnimSource::Vvi => (inputs.vvi / 30.0).clamp(-1.0, 1.0),
        AnimSource::Altimeter100k => (inputs.altitude / 100_000.0).rem_euclid(1.0),
        AnimSource::Altimeter10k => (inputs.altitude / 10_000.0).rem_euclid(1.0),
        AnimSource::Altimeter1k => (inputs.altitude / 1_000.0).rem_euclid(1.0),
        AnimSource::Aoa => (inputs.aoa / 90.0).clamp(-1.0, 1.0),
        AnimSource::Roll => inputs.roll / 180.0,
        AnimSource::Pitch => (inputs.pitch / 90.0).clamp(-1.0, 1.0),
        AnimSource::Heading => inputs.heading.rem_euclid(360.0) / 360.0,
        AnimSource::Brake => inputs.brake,
        AnimSource::ParkingBrake => {
            if inputs.parking_brake {
                1.0
            } else {
                0.0
            }
        }
        AnimSource::Accelerator => inputs.accelerator,
        AnimSource::Clutch => 1.0 - inputs.clutch,
        AnimSource::Turbo => inputs.turbo_ratio,
        AnimSource::ShiftLeftRight => shifter_lr(inputs.gear, inputs.forward_gears),
        AnimSource::ShiftBackForth => shifter_bf(inputs.gear),
        AnimSource::Sequential => {
            if inputs.forward_gears <= 0 {
                0.0
            } else {
                inputs.gear as f32 / inputs.forward_gears as f32
            }
        }
        AnimSource::ShifterLin => {
            (inputs.gear + 1) as f32 / (inputs.forward_gears + 1).max(1) as f32
        }
        AnimSource::DiffLock => {
            if inputs.diff_locked {
                1.0
            } else {
                0.0
            }
        }
        AnimSource::Torque => inputs.torque_ratio,
        AnimSource::BoatThrottle => inputs.boat_throttle,
        AnimSource::BoatRudder => inputs.boat_rudder,
        AnimSource::AeroRpm(i) => inputs.aero.get(i)?.rpm_ratio,
        AnimSource::AeroThrottle(i) => inputs.aero.get(i)?.throttle,
        AnimSource::AeroTorque(i) => inputs.aero.get(i)?.torque_ratio,
        AnimSource::AeroPitch(i) => inputs.aero.get(i)?.pitch / 30.0,
        AnimSource::AeroStatus(i) => {
            let aero = inputs.aero.get(i)?;
            if aero.failed {
                1.0
            } else if aero.ignition {
                0.5
            } else {
                0.0
            }
        }
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_sources_report_their_count() {
        let inputs = AnimatorInputs {
            brake: 0.5,
            accelerator: 1.0,
            ..AnimatorInputs::default()
        };
        let animator = Animator::new(vec![AnimSource::Brake, AnimSource::Accelerator]);
        assert_eq!(animator.evaluate(&inputs), (1.5, 2));
    }

    #[test]
    fn missing_aero_engine_is_skipped() {
        let inputs = AnimatorInputs::default();
        let animator = Animator::new(vec![AnimSource::AeroRpm(2), AnimSource::Rpm]);
        assert_eq!(animator.evaluate(&inputs).1, 1);
    }

    #[test]
    fn h_pattern_shifter_positions() {
        assert_eq!(shifter_lr(1, 6), -1.0 + 2.0 / 3.0);
        assert_eq!(shifter_lr(6, 6), 1.0);
        assert_eq!(shifter_bf(1), 1.0);
        assert_eq!(shifter_bf(2), -1.0);
        assert_eq!(shifter_lr(-1, 6), -1.0);
    }
}
