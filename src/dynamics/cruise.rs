use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::CC_ACCS_WINDOW;
use crate::core::engine::EngineState;

/// Gain of the speed law, per m/s of error and kg per kW.
const CC_SPEED_GAIN: f32 = 0.002;
/// Gain of the neutral RPM law, per rpm of error and unit of inertia.
const CC_RPM_GAIN: f32 = 0.0002;
/// Brake input above which an engaged cruise control lets go.
const CC_BRAKE_DISENGAGE: f32 = 0.05;

/// Cruise control and speed limiter of an actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CruiseControl {
    pub mode: bool,
    pub target_speed: f32,
    pub target_rpm: f32,
    /// Lower bound the target speed can be adjusted to.
    pub target_speed_lower_limit: f32,
    /// Allows braking when going faster than the target.
    pub can_brake: bool,
    #[serde(skip)]
    pub accs: VecDeque<f32>,
    pub speed_limiter: bool,
    pub speed_limit: f32,
}

/// Vehicle state cruise control reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CruiseInputs {
    pub wheel_speed: f32,
    pub brake: f32,
    pub parking_brake: bool,
    pub total_mass: f32,
}

impl CruiseControl {
    pub fn toggle(&mut self, engine: Option<&EngineState>, wheel_speed: f32) {
        self.mode = !self.mode;
        if self.mode {
            self.target_speed = wheel_speed.max(self.target_speed_lower_limit);
            self.target_rpm = engine.map(|e| e.rpm).unwrap_or(0.0);
        } else {
            self.disengage();
        }
    }

    fn disengage(&mut self) {
        self.mode = false;
        self.target_speed = 0.0;
        self.target_rpm = 0.0;
        self.accs.clear();
    }

    /// Runs one cruise control tick and returns an extra brake request.
    pub fn update(&mut self, engine: &mut EngineState, inputs: CruiseInputs) -> f32 {
        if !self.mode {
            self.apply_speed_limiter(engine, inputs.wheel_speed);
            return 0.0;
        }

        if (engine.gear > 0 && inputs.brake > CC_BRAKE_DISENGAGE)
            || inputs.parking_brake
            || engine.gear == -1
            || !engine.running
            || !engine.contact
        {
            log::debug!("cruise control disengaged");
            self.disengage();
            return 0.0;
        }

        let mut acc = engine.acc_to_hold_rpm();
        let mut brake = 0.0;
        if engine.gear > 0 {
            let power_weight_ratio = inputs.total_mass / engine.power_kw().max(1.0);
            acc += (self.target_speed - inputs.wheel_speed) * power_weight_ratio * CC_SPEED_GAIN;
            if self.can_brake && inputs.wheel_speed > self.target_speed + 0.5 {
                brake = ((inputs.wheel_speed - self.target_speed) * 0.1).clamp(0.0, 1.0);
            }
        } else if engine.gear == 0 {
            acc += (self.target_rpm - engine.rpm) * engine.inertia * CC_RPM_GAIN;
        }

        self.accs.push_front(acc);
        self.accs.truncate(CC_ACCS_WINDOW);
        let avg_acc = self.accs.iter().sum::<f32>() / self.accs.len() as f32;

        let floor = engine.throttle_input.clamp(0.0, 1.0);
        engine.acc = avg_acc.clamp(floor, 1.0);
        self.apply_speed_limiter(engine, inputs.wheel_speed);
        brake
    }

    fn apply_speed_limiter(&self, engine: &mut EngineState, wheel_speed: f32) {
        if !self.speed_limiter || engine.gear <= 0 {
            return;
        }
        let over = wheel_speed - self.speed_limit;
        if over > 0.0 {
            engine.acc *= (1.0 - over * 0.5).clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_engine(gear: i32) -> EngineState {
        let mut engine = EngineState::default();
        engine.start();
        engine.set_gear(gear);
        engine
    }

    fn inputs(wheel_speed: f32, brake: f32) -> CruiseInputs {
        CruiseInputs {
            wheel_speed,
            brake,
            parking_brake: false,
            total_mass: 5000.0,
        }
    }

    #[test]
    fn brake_disengages_in_gear() {
        let mut engine = running_engine(2);
        let mut cc = CruiseControl {
            mode: true,
            target_speed: 20.0,
            ..CruiseControl::default()
        };
        cc.update(&mut engine, inputs(20.0, 0.06));
        assert!(!cc.mode);
        assert_eq!(cc.target_speed, 0.0);
    }

    #[test]
    fn slow_vehicle_gets_more_accelerator() {
        let mut engine = running_engine(3);
        let mut cc = CruiseControl {
            mode: true,
            target_speed: 20.0,
            ..CruiseControl::default()
        };
        cc.update(&mut engine, inputs(10.0, 0.0));
        assert!(cc.mode);
        assert!(engine.acc > 0.0);
        assert!(engine.acc <= 1.0);
    }

    #[test]
    fn driver_throttle_is_a_floor() {
        let mut engine = running_engine(3);
        engine.throttle_input = 0.8;
        let mut cc = CruiseControl {
            mode: true,
            target_speed: 10.0,
            ..CruiseControl::default()
        };
        cc.update(&mut engine, inputs(15.0, 0.0));
        assert_eq!(engine.acc, 0.8);
    }

    #[test]
    fn stays_engaged_while_briefly_airborne() {
        let mut engine = running_engine(3);
        let mut cc = CruiseControl::default();
        cc.toggle(Some(&engine), 20.0);
        // Wheels leave the ground for a few ticks at speed.
        for _ in 0..3 {
            cc.update(&mut engine, inputs(20.0, 0.0));
        }
        assert!(cc.mode);
        assert_eq!(cc.target_speed, 20.0);
    }

    #[test]
    fn reverse_gear_disengages() {
        let mut engine = running_engine(-1);
        let mut cc = CruiseControl::default();
        cc.toggle(Some(&engine), 5.0);
        assert_eq!(cc.target_speed, 5.0);
        cc.update(&mut engine, inputs(5.0, 0.0));
        assert!(!cc.mode);
    }
}
