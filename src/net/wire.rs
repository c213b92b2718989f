//! Fixed-layout snapshot header and the flag masks it carries.

use bytemuck::{Pod, Zeroable};

use crate::core::actor::Actor;
use crate::core::engine::ShiftMode;

/// Header at the front of every actor snapshot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct VehicleState {
    /// Sender clock in milliseconds.
    pub time: i32,
    pub engine_speed: f32,
    pub engine_force: f32,
    pub engine_clutch: f32,
    pub engine_gear: i32,
    pub hydro_dir_state: f32,
    pub brake: f32,
    pub wheel_speed: f32,
    pub flag_mask: u32,
    pub light_mask: u32,
}

pub const VEHICLE_STATE_SIZE: usize = std::mem::size_of::<VehicleState>();

macro_rules! bitmask {
    ($name:ident) => {
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
        pub struct $name(pub u32);

        impl $name {
            pub fn bits(self) -> u32 {
                self.0
            }

            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn set(&mut self, other: Self, on: bool) {
                if on {
                    self.0 |= other.0;
                } else {
                    self.0 &= !other.0;
                }
            }
        }
    };
}

bitmask!(NetMask);
bitmask!(LightMask);

impl NetMask {
    pub const HORN: Self = Self(1 << 0);
    pub const PARKING_BRAKE: Self = Self(1 << 1);
    pub const TRACTION_CONTROL: Self = Self(1 << 2);
    pub const ANTI_LOCK: Self = Self(1 << 3);
    pub const ENGINE_CONTACT: Self = Self(1 << 4);
    pub const ENGINE_RUN: Self = Self(1 << 5);
    pub const ENGINE_MODE_AUTOMATIC: Self = Self(1 << 6);
    pub const ENGINE_MODE_SEMIAUTO: Self = Self(1 << 7);
    pub const ENGINE_MODE_MANUAL: Self = Self(1 << 8);
    pub const ENGINE_MODE_MANUAL_STICK: Self = Self(1 << 9);
    pub const ENGINE_MODE_MANUAL_RANGES: Self = Self(1 << 10);

    fn shift_mode_bit(mode: ShiftMode) -> Self {
        match mode {
            ShiftMode::Automatic => Self::ENGINE_MODE_AUTOMATIC,
            ShiftMode::SemiAuto => Self::ENGINE_MODE_SEMIAUTO,
            ShiftMode::Manual => Self::ENGINE_MODE_MANUAL,
            ShiftMode::ManualStick => Self::ENGINE_MODE_MANUAL_STICK,
            ShiftMode::ManualRanges => Self::ENGINE_MODE_MANUAL_RANGES,
        }
    }

    pub fn shift_mode(self) -> Option<ShiftMode> {
        [
            ShiftMode::Automatic,
            ShiftMode::SemiAuto,
            ShiftMode::Manual,
            ShiftMode::ManualStick,
            ShiftMode::ManualRanges,
        ]
        .into_iter()
        .find(|&mode| self.contains(Self::shift_mode_bit(mode)))
    }

    pub fn from_actor(actor: &Actor) -> Self {
        let mut mask = Self::default();
        mask.set(Self::HORN, actor.lights.horn);
        mask.set(Self::PARKING_BRAKE, actor.controls.parking_brake);
        mask.set(Self::TRACTION_CONTROL, actor.controls.traction.enabled);
        mask.set(Self::ANTI_LOCK, actor.controls.anti_lock.enabled);
        if let Some(engine) = &actor.engine {
            mask.set(Self::ENGINE_CONTACT, engine.contact);
            mask.set(Self::ENGINE_RUN, engine.running);
            mask.set(Self::shift_mode_bit(engine.shift_mode), true);
        }
        mask
    }

    /// Mirrors the flags onto a remote actor.
    pub fn apply(self, actor: &mut Actor) {
        actor.lights.horn = self.contains(Self::HORN);
        actor.controls.parking_brake = self.contains(Self::PARKING_BRAKE);
        actor.controls.traction.enabled = self.contains(Self::TRACTION_CONTROL);
        actor.controls.anti_lock.enabled = self.contains(Self::ANTI_LOCK);
        if let Some(engine) = actor.engine.as_mut() {
            engine.contact = self.contains(Self::ENGINE_CONTACT);
            engine.running = self.contains(Self::ENGINE_RUN);
            if let Some(mode) = self.shift_mode() {
                engine.shift_mode = mode;
            }
        }
    }
}

impl LightMask {
    pub const HEADLIGHTS: Self = Self(1 << 0);
    pub const HIGH_BEAMS: Self = Self(1 << 1);
    pub const FOG_LIGHTS: Self = Self(1 << 2);
    pub const SIDE_LIGHTS: Self = Self(1 << 3);
    pub const BRAKE_LIGHTS: Self = Self(1 << 4);
    pub const REVERSE_LIGHTS: Self = Self(1 << 5);
    pub const BLINK_LEFT: Self = Self(1 << 6);
    pub const BLINK_RIGHT: Self = Self(1 << 7);
    pub const WARNING: Self = Self(1 << 8);
    pub const BEACONS: Self = Self(1 << 9);
    /// Custom light n is bit `CUSTOM_SHIFT + n`.
    pub const CUSTOM_SHIFT: u32 = 16;

    pub fn from_actor(actor: &Actor) -> Self {
        let l = &actor.lights;
        let mut mask = Self(u32::from(l.custom) << Self::CUSTOM_SHIFT);
        mask.set(Self::HEADLIGHTS, l.headlights);
        mask.set(Self::HIGH_BEAMS, l.high_beams);
        mask.set(Self::FOG_LIGHTS, l.fog_lights);
        mask.set(Self::SIDE_LIGHTS, l.side_lights);
        mask.set(Self::BRAKE_LIGHTS, l.brake_lights);
        mask.set(Self::REVERSE_LIGHTS, l.reverse_lights);
        mask.set(Self::BLINK_LEFT, l.blink_left);
        mask.set(Self::BLINK_RIGHT, l.blink_right);
        mask.set(Self::WARNING, l.warning);
        mask.set(Self::BEACONS, l.beacons);
        mask
    }

    pub fn apply(self, actor: &mut Actor) {
        let l = &mut actor.lights;
        l.headlights = self.contains(Self::HEADLIGHTS);
        l.high_beams = self.contains(Self::HIGH_BEAMS);
        l.fog_lights = self.contains(Self::FOG_LIGHTS);
        l.side_lights = self.contains(Self::SIDE_LIGHTS);
        l.brake_lights = self.contains(Self::BRAKE_LIGHTS);
        l.reverse_lights = self.contains(Self::REVERSE_LIGHTS);
        l.blink_left = self.contains(Self::BLINK_LEFT);
        l.blink_right = self.contains(Self::BLINK_RIGHT);
        l.warning = self.contains(Self::WARNING);
        l.beacons = self.contains(Self::BEACONS);
        l.custom = (self.0 >> Self::CUSTOM_SHIFT) as u16;
    }
}

/// Packs `bits` MSB-first, eight per byte.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}

/// Reads `count` MSB-first bits; missing bytes read as zero.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (0x80 >> (i % 8)) != 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_has_no_padding() {
        assert_eq!(VEHICLE_STATE_SIZE, 40);
    }

    #[test]
    fn bits_are_msb_first() {
        let bits = [true, false, false, false, false, false, false, true, true];
        let packed = pack_bits(&bits);
        assert_eq!(packed, vec![0b1000_0001, 0b1000_0000]);
        assert_eq!(unpack_bits(&packed, bits.len()), bits.to_vec());
    }

    #[test]
    fn flag_mask_carries_engine_mode() {
        let mut mask = NetMask::default();
        mask.set(NetMask::ENGINE_MODE_MANUAL, true);
        mask.set(NetMask::HORN, true);
        assert_eq!(mask.shift_mode(), Some(ShiftMode::Manual));
        mask.set(NetMask::HORN, false);
        assert!(!mask.contains(NetMask::HORN));
        assert_eq!(mask.bits(), NetMask::ENGINE_MODE_MANUAL.bits());
    }
}
