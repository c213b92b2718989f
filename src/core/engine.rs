//! Engine and gearbox state driving the propulsed wheels.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use super::shock::EngineTriggerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ShiftMode {
    #[default]
    Automatic,
    SemiAuto,
    Manual,
    ManualStick,
    ManualRanges,
}

impl ShiftMode {
    pub fn index(self) -> u8 {
        match self {
            ShiftMode::Automatic => 0,
            ShiftMode::SemiAuto => 1,
            ShiftMode::Manual => 2,
            ShiftMode::ManualStick => 3,
            ShiftMode::ManualRanges => 4,
        }
    }

    pub fn from_index(index: u8) -> Self {
        match index {
            1 => ShiftMode::SemiAuto,
            2 => ShiftMode::Manual,
            3 => ShiftMode::ManualStick,
            4 => ShiftMode::ManualRanges,
            _ => ShiftMode::Automatic,
        }
    }
}

/// Engine, clutch and gearbox of an actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub rpm: f32,
    /// Effective accelerator after assists such as cruise control.
    pub acc: f32,
    /// Accelerator requested by the driver.
    pub throttle_input: f32,
    pub clutch: f32,
    /// -1 reverse, 0 neutral, 1.. forward gears.
    pub gear: i32,
    pub running: bool,
    pub contact: bool,
    pub shift_mode: ShiftMode,
    pub idle_rpm: f32,
    pub max_rpm: f32,
    pub stall_rpm: f32,
    /// Peak torque at the crankshaft (Nm).
    pub max_torque: f32,
    pub inertia: f32,
    pub diff_ratio: f32,
    /// Ratios for reverse followed by the forward gears.
    pub gear_ratios: Vec<f32>,
    pub turbo_psi: f32,
    pub max_turbo_psi: f32,
    /// Torque currently delivered to the wheels (Nm).
    pub wheel_torque: f32,
    /// Brake input requested by triggers, merged with the driver's.
    pub trigger_brake: f32,
    pub rpm_control: Option<f32>,
    pub shift_timer: f32,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            rpm: 0.0,
            acc: 0.0,
            throttle_input: 0.0,
            clutch: 1.0,
            gear: 0,
            running: false,
            contact: false,
            shift_mode: ShiftMode::Automatic,
            idle_rpm: 800.0,
            max_rpm: 5000.0,
            stall_rpm: 300.0,
            max_torque: 1500.0,
            inertia: 10.0,
            diff_ratio: 3.5,
            gear_ratios: vec![-10.0, 13.0, 8.0, 5.5, 4.0, 3.0, 2.2, 1.6, 1.2],
            turbo_psi: 0.0,
            max_turbo_psi: 20.0,
            wheel_torque: 0.0,
            trigger_brake: 0.0,
            rpm_control: None,
            shift_timer: 0.0,
        }
    }
}

const SHIFT_TIME: f32 = 0.5;

impl EngineState {
    pub fn forward_gears(&self) -> i32 {
        self.gear_ratios.len() as i32 - 1
    }

    /// Overall ratio between wheel and crankshaft speed for the current gear.
    pub fn gear_ratio(&self) -> f32 {
        let ratio = match self.gear {
            0 => 0.0,
            g if g < 0 => self.gear_ratios.first().copied().unwrap_or(0.0),
            g => self.gear_ratios.get(g as usize).copied().unwrap_or(0.0),
        };
        ratio * self.diff_ratio
    }

    /// Peak power estimate in kW.
    pub fn power_kw(&self) -> f32 {
        self.max_torque * self.max_rpm * 0.75 * 2.0 * PI / 60.0 / 1000.0
    }

    /// Hydraulic pump factor: 1 at idle, growing with engine speed, 0 when off.
    pub fn crank_factor(&self) -> f32 {
        if !self.running {
            return 0.0;
        }
        let span = (self.max_rpm - self.idle_rpm).max(1.0);
        1.0 + ((self.rpm - self.idle_rpm) / span).clamp(0.0, 1.0) * 2.0
    }

    pub fn start(&mut self) {
        self.contact = true;
        self.running = true;
        self.rpm = self.rpm.max(self.idle_rpm);
        log::debug!("engine started at {:.0} rpm", self.rpm);
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.wheel_torque = 0.0;
    }

    pub fn shift(&mut self, delta: i32) {
        let target = (self.gear + delta).clamp(-1, self.forward_gears());
        if target != self.gear {
            self.gear = target;
            self.shift_timer = SHIFT_TIME;
        }
    }

    pub fn set_gear(&mut self, gear: i32) {
        self.gear = gear.clamp(-1, self.forward_gears());
    }

    /// Accelerator needed to keep the engine at its current speed.
    pub fn acc_to_hold_rpm(&self) -> f32 {
        let span = (self.max_rpm - self.idle_rpm).max(1.0);
        ((self.rpm - self.idle_rpm) / span).clamp(0.0, 1.0) * 0.2
    }

    /// Applies an engine input requested by a trigger beam.
    pub fn apply_trigger(&mut self, kind: EngineTriggerKind, value: f32) {
        match kind {
            EngineTriggerKind::Clutch => self.clutch = 1.0 - value.clamp(0.0, 1.0),
            EngineTriggerKind::Brake => self.trigger_brake = value.clamp(0.0, 1.0),
            EngineTriggerKind::Accelerator => {
                self.throttle_input = value.clamp(0.0, 1.0);
                self.acc = self.throttle_input;
            }
            EngineTriggerKind::RpmControl => {
                self.rpm_control = (value > 0.0).then(|| self.idle_rpm + value * (self.max_rpm - self.idle_rpm));
            }
            EngineTriggerKind::ShiftUp => {
                if value > 0.5 {
                    self.shift(1);
                }
            }
            EngineTriggerKind::ShiftDown => {
                if value > 0.5 {
                    self.shift(-1);
                }
            }
        }
    }

    /// Advances engine speed and wheel torque.
    ///
    /// `wheel_angular_speed` is the mean angular speed of the propulsed wheels (rad/s).
    pub fn update(&mut self, dt: f32, wheel_angular_speed: f32) {
        if self.shift_timer > 0.0 {
            self.shift_timer = (self.shift_timer - dt).max(0.0);
        }

        if !self.running || !self.contact {
            self.rpm = (self.rpm - self.max_rpm * dt).max(0.0);
            self.wheel_torque = 0.0;
            self.turbo_psi = (self.turbo_psi - self.max_turbo_psi * dt).max(0.0);
            return;
        }

        let mut acc = self.acc;
        if let Some(target) = self.rpm_control {
            acc = acc.max(((target - self.rpm) / 500.0).clamp(0.0, 1.0));
        }
        if self.rpm < self.idle_rpm {
            acc = acc.max(((self.idle_rpm - self.rpm) / 200.0).clamp(0.0, 1.0));
        }

        let rpm_factor = (1.0 - self.rpm / (self.max_rpm * 1.2)).clamp(0.0, 1.0);
        let crank_torque = acc * self.max_torque * rpm_factor;
        let friction = (self.rpm / self.max_rpm) * self.max_torque * 0.15;
        let ratio = self.gear_ratio();
        let coupled = ratio != 0.0 && self.shift_timer <= 0.0;
        let clutch = if coupled { self.clutch.clamp(0.0, 1.0) } else { 0.0 };

        let free_rpm = self.rpm + (crank_torque - friction) / self.inertia.max(0.01) * dt * 60.0;
        let wheel_rpm = wheel_angular_speed * ratio * 60.0 / (2.0 * PI);
        self.rpm = free_rpm + (wheel_rpm - free_rpm) * clutch * 0.5;
        self.rpm = self.rpm.clamp(0.0, self.max_rpm * 1.1);

        self.wheel_torque = crank_torque * ratio * clutch;
        self.turbo_psi += (acc * self.max_turbo_psi - self.turbo_psi) * (dt * 2.0).min(1.0);

        if coupled && clutch > 0.5 && self.rpm < self.stall_rpm {
            log::debug!("engine stalled in gear {}", self.gear);
            self.stop();
            return;
        }

        if self.shift_mode == ShiftMode::Automatic && self.gear > 0 && self.shift_timer <= 0.0 {
            if self.rpm > self.max_rpm * 0.92 && self.gear < self.forward_gears() {
                self.shift(1);
            } else if self.rpm < self.idle_rpm * 1.3 && self.gear > 1 {
                self.shift(-1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_inputs_drive_engine_controls() {
        let mut engine = EngineState::default();
        engine.apply_trigger(EngineTriggerKind::Accelerator, 0.7);
        assert!((engine.acc - 0.7).abs() < 1e-6);
        engine.apply_trigger(EngineTriggerKind::ShiftUp, 1.0);
        assert_eq!(engine.gear, 1);
        engine.apply_trigger(EngineTriggerKind::Clutch, 1.0);
        assert_eq!(engine.clutch, 0.0);
    }

    #[test]
    fn stopped_engine_delivers_no_torque() {
        let mut engine = EngineState::default();
        engine.acc = 1.0;
        engine.update(0.01, 0.0);
        assert_eq!(engine.wheel_torque, 0.0);
        engine.start();
        engine.set_gear(1);
        engine.update(0.01, 0.0);
        engine.shift_timer = 0.0;
        engine.update(0.01, 10.0);
        assert!(engine.wheel_torque > 0.0);
    }
}
