//! Compressed actor snapshots: encoding on the owning side, buffering and
//! interpolation on the receiving side.
//!
//! Layout after the [`VehicleState`] header:
//!
//! * node 0 absolute position, three `f32`
//! * nodes `1..first_wheel_node`, three `i16` each: offset from node 0
//!   multiplied by the compression factor
//! * one `f32` rotation phase per wheel
//! * prop animation toggles, one bit each, MSB-first
//!
//! Wheel rim nodes are not sent; the receiver rebuilds them from the axis
//! nodes and the phase.

use std::collections::VecDeque;

use glam::Vec3;
use log::{debug, warn};

use crate::config::NET_UPDATE_INTERVAL_MS;
use crate::core::actor::Actor;
use crate::dynamics::wheels::place_rim_nodes;
use crate::error::NetError;
use crate::net::wire::{pack_bits, unpack_bits, LightMask, NetMask, VehicleState, VEHICLE_STATE_SIZE};
use crate::utils::allocator::ActorId;
use crate::world::World;

/// Snapshots kept for interpolation.
pub const NET_BUFFER_LEN: usize = 10;

/// Clock value carried in the snapshot header; wraps every 2^31 ms.
pub fn wire_time(now_ms: i64) -> i32 {
    i32::try_from(now_ms.rem_euclid(i64::from(i32::MAX) + 1)).unwrap_or_default()
}

/// Limits snapshot emission to one per interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetSendThrottle {
    pub interval_ms: i64,
    last_sent: Option<i64>,
}

impl Default for NetSendThrottle {
    fn default() -> Self {
        Self::new(NET_UPDATE_INTERVAL_MS)
    }
}

impl NetSendThrottle {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            last_sent: None,
        }
    }

    /// True (and restarts the interval) when a snapshot may be sent at `now_ms`.
    pub fn ready(&mut self, now_ms: i64) -> bool {
        match self.last_sent {
            Some(last) if now_ms - last < self.interval_ms => false,
            _ => {
                self.last_sent = Some(now_ms);
                true
            }
        }
    }
}

/// One decoded snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct NetUpdate {
    pub state: VehicleState,
    pub node_positions: Vec<Vec3>,
    pub wheel_rotations: Vec<f32>,
    pub prop_anims: Vec<bool>,
}

#[derive(Debug, Clone)]
pub struct NetworkCodec {
    first_wheel_node: usize,
    /// Wheels whose axis and reference nodes are sent, so their rims can be rebuilt.
    rebuild_wheels: Vec<bool>,
    compression: f32,
    wheel_count: usize,
    prop_anim_count: usize,
    updates: VecDeque<NetUpdate>,
    /// Local clock minus sender clock, fixed by the first interpolation.
    time_offset: Option<i64>,
    mismatch_reported: bool,
    pub throttle: NetSendThrottle,
}

impl NetworkCodec {
    pub fn new(actor: &Actor) -> Result<Self, NetError> {
        let Some(first) = actor.nodes.first().map(|n| n.abs_position) else {
            return Err(NetError::NotEnoughNodes);
        };

        // Rims are only skipped when every node from the first rim node on
        // belongs to a wheel.
        let mut is_rim = vec![false; actor.nodes.len()];
        for wheel in &actor.wheels {
            for &n in &wheel.nodes {
                if let Some(slot) = is_rim.get_mut(n) {
                    *slot = true;
                }
            }
        }
        let first_wheel_node = match is_rim.iter().position(|&r| r) {
            Some(i) if i > 0 && is_rim[i..].iter().all(|&r| r) => i,
            _ => actor.nodes.len(),
        };
        let rebuild_wheels = actor
            .wheels
            .iter()
            .map(|w| {
                first_wheel_node < actor.nodes.len()
                    && w.axis_node_0 < first_wheel_node
                    && w.axis_node_1 < first_wheel_node
                    && w.reference_node < first_wheel_node
            })
            .collect();

        let max_distance = actor.nodes[..first_wheel_node]
            .iter()
            .map(|n| (n.abs_position - first).length())
            .fold(0.0f32, f32::max);
        let compression = if max_distance > f32::EPSILON {
            (f32::from(i16::MAX) / (1.5 * max_distance)).max(1.0)
        } else {
            f32::from(i16::MAX)
        };

        debug!(
            "Network codec for '{}': {} sent nodes, compression {:.1}",
            actor.name, first_wheel_node, compression
        );
        Ok(Self {
            first_wheel_node,
            rebuild_wheels,
            compression,
            wheel_count: actor.wheels.len(),
            prop_anim_count: actor.prop_anim_keys.len(),
            updates: VecDeque::with_capacity(NET_BUFFER_LEN),
            time_offset: None,
            mismatch_reported: false,
            throttle: NetSendThrottle::default(),
        })
    }

    pub fn compression(&self) -> f32 {
        self.compression
    }

    pub fn first_wheel_node(&self) -> usize {
        self.first_wheel_node
    }

    pub fn buffered(&self) -> usize {
        self.updates.len()
    }

    pub fn mismatch_reported(&self) -> bool {
        self.mismatch_reported
    }

    /// Size in bytes of a snapshot for this layout, header included.
    pub fn packet_size(&self) -> usize {
        VEHICLE_STATE_SIZE
            + 3 * 4
            + (self.first_wheel_node - 1) * 3 * 2
            + self.wheel_count * 4
            + self.prop_anim_count.div_ceil(8)
    }

    pub fn encode(&self, actor: &Actor, time_ms: i32) -> Vec<u8> {
        let engine = actor.engine.as_ref();
        let state = VehicleState {
            time: time_ms,
            engine_speed: engine.map_or(0.0, |e| e.rpm),
            engine_force: engine.map_or(0.0, |e| e.acc),
            engine_clutch: engine.map_or(0.0, |e| e.clutch),
            engine_gear: engine.map_or(0, |e| e.gear),
            hydro_dir_state: actor.hydro_state.dir_state,
            brake: actor.controls.brake,
            wheel_speed: actor.wheel_speed,
            flag_mask: NetMask::from_actor(actor).bits(),
            light_mask: LightMask::from_actor(actor).bits(),
        };

        let mut buf = Vec::with_capacity(self.packet_size());
        buf.extend_from_slice(bytemuck::bytes_of(&state));

        let origin = actor.nodes.first().map_or(Vec3::ZERO, |n| n.abs_position);
        for c in origin.to_array() {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        for node in actor.nodes.iter().take(self.first_wheel_node).skip(1) {
            let delta = (node.abs_position - origin) * self.compression;
            for c in delta.to_array() {
                let q = c.round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
                buf.extend_from_slice(&q.to_le_bytes());
            }
        }
        for i in 0..self.wheel_count {
            let rp = actor.wheels.get(i).map_or(0.0, |w| w.net_rp);
            buf.extend_from_slice(&rp.to_le_bytes());
        }
        let mut anims = actor.prop_anim_keys.clone();
        anims.resize(self.prop_anim_count, false);
        buf.extend_from_slice(&pack_bits(&anims));
        buf
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<NetUpdate, NetError> {
        let expected = self.packet_size();
        if bytes.len() != expected {
            return Err(NetError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        let state: VehicleState = bytemuck::pod_read_unaligned(&bytes[..VEHICLE_STATE_SIZE]);
        let mut at = VEHICLE_STATE_SIZE;

        let first = Vec3::new(
            read_f32(bytes, &mut at),
            read_f32(bytes, &mut at),
            read_f32(bytes, &mut at),
        );
        let mut node_positions = Vec::with_capacity(self.first_wheel_node);
        node_positions.push(first);
        for _ in 1..self.first_wheel_node {
            let delta = Vec3::new(
                read_i16(bytes, &mut at),
                read_i16(bytes, &mut at),
                read_i16(bytes, &mut at),
            );
            node_positions.push(first + delta / self.compression);
        }
        let wheel_rotations = (0..self.wheel_count)
            .map(|_| read_f32(bytes, &mut at))
            .collect();
        let prop_anims = unpack_bits(&bytes[at..], self.prop_anim_count);

        Ok(NetUpdate {
            state,
            node_positions,
            wheel_rotations,
            prop_anims,
        })
    }

    /// Buffers a received snapshot, dropping the oldest beyond [`NET_BUFFER_LEN`].
    ///
    /// The first size mismatch is reported once; the caller removes the actor.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        let update = match self.decode(bytes) {
            Ok(update) => update,
            Err(err) => {
                if !self.mismatch_reported {
                    warn!("Network stream rejected: {err}");
                    self.mismatch_reported = true;
                }
                return Err(err);
            }
        };
        if self.updates.len() >= NET_BUFFER_LEN {
            self.updates.pop_front();
        }
        self.updates.push_back(update);
        Ok(())
    }

    /// Moves a remote actor to its interpolated state at local time `now_ms`.
    ///
    /// Waits until two snapshots are buffered.
    pub fn calc_network(&mut self, actor: &mut Actor, now_ms: i64) {
        if self.updates.len() < 2 {
            return;
        }
        let offset = *self
            .time_offset
            .get_or_insert_with(|| now_ms - i64::from(self.updates[0].state.time));
        let render_time = now_ms - offset;

        while self.updates.len() > 2 && i64::from(self.updates[1].state.time) <= render_time {
            self.updates.pop_front();
        }
        let (a, b) = (&self.updates[0], &self.updates[1]);
        let (ta, tb) = (i64::from(a.state.time), i64::from(b.state.time));
        let span = tb - ta;
        let tratio = if span > 0 {
            ((render_time - ta) as f32 / span as f32).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let span_s = if span > 0 { span as f32 / 1000.0 } else { 0.0 };

        let origin = actor.origin;
        for (i, node) in actor.nodes.iter_mut().take(self.first_wheel_node).enumerate() {
            let (Some(pa), Some(pb)) = (a.node_positions.get(i), b.node_positions.get(i)) else {
                continue;
            };
            node.set_abs_position(pa.lerp(*pb, tratio), origin);
            node.velocity = if span_s > 0.0 { (*pb - *pa) / span_s } else { Vec3::ZERO };
        }

        let wheel_count = actor.wheels.len().min(self.wheel_count);
        for w in 0..wheel_count {
            let rp = lerp_angle(a.wheel_rotations[w], b.wheel_rotations[w], tratio);
            actor.wheels[w].net_rp = rp;
            if self.rebuild_wheels.get(w).copied().unwrap_or(false) {
                let wheel = &actor.wheels[w];
                place_rim_nodes(&mut actor.nodes, wheel, rp, origin);
            }
        }

        let (sa, sb) = (&a.state, &b.state);
        if let Some(engine) = actor.engine.as_mut() {
            engine.rpm = lerp(sa.engine_speed, sb.engine_speed, tratio);
            engine.acc = lerp(sa.engine_force, sb.engine_force, tratio);
            engine.clutch = lerp(sa.engine_clutch, sb.engine_clutch, tratio);
            engine.gear = sb.engine_gear;
        }
        actor.controls.brake = lerp(sa.brake, sb.brake, tratio);
        actor.hydro_state.dir_state = lerp(sa.hydro_dir_state, sb.hydro_dir_state, tratio);
        actor.wheel_speed = lerp(sa.wheel_speed, sb.wheel_speed, tratio);
        NetMask(sb.flag_mask).apply(actor);
        LightMask(sb.light_mask).apply(actor);
        for (key, &on) in actor.prop_anim_keys.iter_mut().zip(&b.prop_anims) {
            *key = on;
        }

        actor.update_bounding_boxes();
        actor.update_average_position();
    }
}

// Callers check the packet size first.
fn read_f32(bytes: &[u8], at: &mut usize) -> f32 {
    let b = &bytes[*at..*at + 4];
    *at += 4;
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn read_i16(bytes: &[u8], at: &mut usize) -> f32 {
    let b = &bytes[*at..*at + 2];
    *at += 2;
    f32::from(i16::from_le_bytes([b[0], b[1]]))
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolates along the shorter arc.
fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut diff = (b - a).rem_euclid(TAU);
    if diff > PI {
        diff -= TAU;
    }
    (a + diff * t).rem_euclid(TAU)
}

impl Actor {
    /// Sets up snapshot encoding and decoding for this actor's layout.
    pub fn enable_network(&mut self) -> Result<(), NetError> {
        self.net = Some(NetworkCodec::new(self)?);
        Ok(())
    }

    /// Feeds a received snapshot to a remote actor.
    ///
    /// A malformed stream marks the actor for removal.
    pub fn push_network_update(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        let Some(net) = self.net.as_mut() else {
            return Err(NetError::UnknownActor);
        };
        let result = net.push(bytes);
        if result.is_err() {
            self.remove_requested = true;
        }
        result
    }

    /// Snapshot of the local actor when its send interval has elapsed.
    pub fn send_network_update(&mut self, now_ms: i64) -> Option<Vec<u8>> {
        let mut net = self.net.take()?;
        let packet = net
            .throttle
            .ready(now_ms)
            .then(|| net.encode(self, wire_time(now_ms)));
        self.net = Some(net);
        packet
    }
}

impl World {
    /// Routes a received snapshot to the remote actor `id`.
    pub fn push_network_update(&mut self, id: ActorId, bytes: &[u8]) -> Result<(), NetError> {
        match self.actors.get_mut(id) {
            Some(actor) if actor.state.is_networked() => actor.push_network_update(bytes),
            _ => Err(NetError::UnknownActor),
        }
    }

    /// Snapshots of every locally simulated actor whose send interval elapsed.
    pub fn collect_network_updates(&mut self) -> Vec<(ActorId, Vec<u8>)> {
        let now = self.clock_ms();
        self.actors
            .iter_mut()
            .filter(|(_, a)| a.state.is_locally_simulated())
            .filter_map(|(id, a)| a.send_network_update(now).map(|p| (id, p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimSettings;
    use crate::core::builder::ActorBuilder;

    fn cube() -> Actor {
        ActorBuilder::cube("cube", Vec3::new(3.0, 1.0, -2.0), 2.0, 100.0)
            .prop_anim_keys(3)
            .build(&SimSettings::default())
    }

    #[test]
    fn packet_size_matches_layout() {
        let actor = cube();
        let codec = NetworkCodec::new(&actor).expect("codec");
        assert_eq!(codec.first_wheel_node(), 8);
        assert_eq!(codec.packet_size(), VEHICLE_STATE_SIZE + 12 + 7 * 6 + 1);
        assert_eq!(codec.encode(&actor, 0).len(), codec.packet_size());
    }

    #[test]
    fn compression_bounds_error() {
        let actor = cube();
        let codec = NetworkCodec::new(&actor).expect("codec");
        let update = codec.decode(&codec.encode(&actor, 5)).expect("decode");
        assert_eq!(update.node_positions[0], actor.nodes[0].abs_position);
        for (decoded, node) in update.node_positions.iter().zip(&actor.nodes) {
            assert!((*decoded - node.abs_position).abs().max_element() <= 1.0 / codec.compression());
        }
        assert_eq!(update.state.time, 5);
    }

    #[test]
    fn wrong_size_is_reported_once() {
        let mut actor = cube();
        actor.enable_network().expect("codec");
        assert!(matches!(
            actor.push_network_update(&[0u8; 4]),
            Err(NetError::SizeMismatch { actual: 4, .. })
        ));
        assert!(actor.remove_requested);
        assert!(actor.net.as_ref().is_some_and(|n| n.mismatch_reported()));
    }

    #[test]
    fn throttle_limits_rate() {
        let mut throttle = NetSendThrottle::new(100);
        assert!(throttle.ready(0));
        assert!(!throttle.ready(50));
        assert!(throttle.ready(100));

        let mut default = NetSendThrottle::default();
        assert_eq!(default.interval_ms, NET_UPDATE_INTERVAL_MS);
        assert!(default.ready(0));
        assert!(!default.ready(NET_UPDATE_INTERVAL_MS - 1));
    }

    #[test]
    fn wire_time_wraps_instead_of_truncating() {
        assert_eq!(wire_time(1234), 1234);
        assert_eq!(wire_time(i64::from(i32::MAX)), i32::MAX);
        assert_eq!(wire_time(i64::from(i32::MAX) + 5), 4);
        assert!(wire_time(30 * 24 * 3_600_000) >= 0);
    }

    #[test]
    fn angle_lerp_takes_short_way() {
        let mid = lerp_angle(6.0, 0.2, 0.5);
        assert!(mid > 6.0 || mid < 0.2);
    }
}
