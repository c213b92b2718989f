//! Vehicle subsystems owned by an actor besides the node/beam store.

use serde::{Deserialize, Serialize};

/// A wheel built from rim/tyre nodes arranged around an axis.
///
/// `nodes` alternates between the side of `axis_node_0` (even indices) and
/// the side of `axis_node_1` (odd indices), going around the rim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wheel {
    pub nodes: Vec<usize>,
    pub axis_node_0: usize,
    pub axis_node_1: usize,
    /// Defines the zero rotation phase together with the axis.
    pub reference_node: usize,
    pub radius: f32,
    pub propulsed: bool,
    pub braked: bool,
    pub detached: bool,
    /// Tangential speed at the tread (m/s).
    pub speed: f32,
    pub angular_speed: f32,
    /// Rotation phase in radians, sent over the network.
    pub net_rp: f32,
}

impl Wheel {
    pub fn new(axis_node_0: usize, axis_node_1: usize, reference_node: usize, nodes: Vec<usize>, radius: f32) -> Self {
        Self {
            nodes,
            axis_node_0,
            axis_node_1,
            reference_node,
            radius,
            propulsed: false,
            braked: true,
            detached: false,
            speed: 0.0,
            angular_speed: 0.0,
            net_rp: 0.0,
        }
    }

    pub fn propulsed(mut self) -> Self {
        self.propulsed = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffType {
    Open,
    Locked,
    Split,
    Viscous,
}

/// Differential with a list of selectable modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Differential {
    pub wheel_a: usize,
    pub wheel_b: usize,
    pub available: Vec<DiffType>,
    pub active: usize,
}

impl Differential {
    pub fn new(wheel_a: usize, wheel_b: usize, available: Vec<DiffType>) -> Self {
        Self {
            wheel_a,
            wheel_b,
            available,
            active: 0,
        }
    }

    pub fn active_type(&self) -> DiffType {
        self.available.get(self.active).copied().unwrap_or(DiffType::Open)
    }

    pub fn toggle(&mut self) {
        if !self.available.is_empty() {
            self.active = (self.active + 1) % self.available.len();
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.active_type(), DiffType::Locked)
    }
}

/// Transfer case selecting 2WD/4WD and a range ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCase {
    /// Wheels driven only in 4WD mode.
    pub alt_wheels: Vec<usize>,
    pub four_wd: bool,
    pub ratios: Vec<f32>,
    pub active_ratio: usize,
}

impl Default for TransferCase {
    fn default() -> Self {
        Self {
            alt_wheels: Vec::new(),
            four_wd: false,
            ratios: vec![1.0],
            active_ratio: 0,
        }
    }
}

impl TransferCase {
    pub fn ratio(&self) -> f32 {
        self.ratios.get(self.active_ratio).copied().unwrap_or(1.0)
    }
}

/// Differentials and transfer case of the drivetrain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drivetrain {
    pub wheel_diffs: Vec<Differential>,
    pub axle_diffs: Vec<Differential>,
    pub transfer_case: Option<TransferCase>,
}

/// Propeller or turbine engine for aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AeroEngine {
    pub ref_node: usize,
    pub back_node: usize,
    pub max_power: f32,
    pub max_rpm: f32,
    pub throttle: f32,
    pub rpm: f32,
    pub ignition: bool,
    pub failed: bool,
    pub reverse: bool,
    /// Blade pitch in degrees.
    pub pitch: f32,
    pub thrust: f32,
}

impl AeroEngine {
    pub fn new(ref_node: usize, back_node: usize, max_power: f32) -> Self {
        Self {
            ref_node,
            back_node,
            max_power,
            max_rpm: 2500.0,
            throttle: 0.0,
            rpm: 0.0,
            ignition: false,
            failed: false,
            reverse: false,
            pitch: 0.0,
            thrust: 0.0,
        }
    }

    /// Spins up toward the throttle setting and updates thrust (N).
    pub fn update(&mut self, dt: f32) {
        let target = if self.ignition && !self.failed {
            self.max_rpm * (0.2 + 0.8 * self.throttle.clamp(0.0, 1.0))
        } else {
            0.0
        };
        self.rpm += (target - self.rpm) * (dt * 0.5).min(1.0);
        let ratio = self.rpm / self.max_rpm;
        self.pitch = 5.0 + 25.0 * self.throttle.clamp(0.0, 1.0);
        let sign = if self.reverse { -1.0 } else { 1.0 };
        self.thrust = sign * self.max_power * ratio * ratio;
    }

    /// Torque share shown on instruments, 0..1.
    pub fn torque_ratio(&self) -> f32 {
        if self.max_power <= 0.0 {
            return 0.0;
        }
        (self.thrust.abs() / self.max_power).clamp(0.0, 1.0)
    }
}

/// Boat propeller pushing at a node while submerged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrewProp {
    pub ref_node: usize,
    pub back_node: usize,
    pub up_node: usize,
    pub power: f32,
    pub throttle: f32,
    pub rudder: f32,
}

impl ScrewProp {
    pub fn new(ref_node: usize, back_node: usize, up_node: usize, power: f32) -> Self {
        Self {
            ref_node,
            back_node,
            up_node,
            power,
            throttle: 0.0,
            rudder: 0.0,
        }
    }
}

/// Light and signal switches, mirrored into the network flag mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lights {
    pub headlights: bool,
    pub high_beams: bool,
    pub fog_lights: bool,
    pub side_lights: bool,
    pub brake_lights: bool,
    pub reverse_lights: bool,
    pub blink_left: bool,
    pub blink_right: bool,
    pub warning: bool,
    pub beacons: bool,
    pub horn: bool,
    /// Custom light toggles, bit n = custom light n.
    pub custom: u16,
}

impl Lights {
    pub fn custom_light(&self, n: usize) -> bool {
        n < 16 && self.custom & (1 << n) != 0
    }

    pub fn set_custom_light(&mut self, n: usize, on: bool) {
        if n >= 16 {
            return;
        }
        if on {
            self.custom |= 1 << n;
        } else {
            self.custom &= !(1 << n);
        }
    }
}

/// Anti-lock or traction control assist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assist {
    pub present: bool,
    pub enabled: bool,
    /// Slip ratio at which the assist intervenes.
    pub ratio: f32,
}

impl Default for Assist {
    fn default() -> Self {
        Self {
            present: false,
            enabled: false,
            ratio: 1.0,
        }
    }
}

/// Driver controls that are not engine inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    pub brake: f32,
    pub parking_brake: bool,
    pub brake_force: f32,
    pub steering: f32,
    pub anti_lock: Assist,
    pub traction: Assist,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            brake: 0.0,
            parking_brake: false,
            brake_force: 30_000.0,
            steering: 0.0,
            anti_lock: Assist::default(),
            traction: Assist::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differential_cycles_available_modes() {
        let mut diff = Differential::new(0, 1, vec![DiffType::Open, DiffType::Locked]);
        assert!(!diff.is_locked());
        diff.toggle();
        assert!(diff.is_locked());
        diff.toggle();
        assert_eq!(diff.active_type(), DiffType::Open);
    }

    #[test]
    fn custom_lights_are_bit_addressed() {
        let mut lights = Lights::default();
        lights.set_custom_light(3, true);
        assert!(lights.custom_light(3));
        assert_eq!(lights.custom, 0b1000);
        lights.set_custom_light(3, false);
        assert_eq!(lights.custom, 0);
    }
}
