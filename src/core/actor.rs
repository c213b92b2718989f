use glam::Vec3;

use crate::config::{
    SimSettings, BOUNDING_BOX_PADDING, DEFAULT_COLLISION_RANGE, DEFAULT_MINIMASS, MAX_COMMANDS,
    ORIGIN_RECENTER_THRESHOLD_SQ, ROPE_NODE_MASS,
};
use crate::core::beam::{Beam, BeamType};
use crate::core::engine::EngineState;
use crate::core::mesh::{Aabb, CabMesh};
use crate::core::node::Node;
use crate::core::shock::Shock;
use crate::core::types::{ActorState, AveragePositionPolicy, DebugView};
use crate::core::vehicle::{AeroEngine, Controls, Drivetrain, Lights, ScrewProp, Wheel};
use crate::dynamics::animators::{AeroInputs, AnimatorInputs};
use crate::dynamics::beams::{calc_beams, BeamPassReport};
use crate::dynamics::commands::{update_commands, CommandKey};
use crate::dynamics::cruise::{CruiseControl, CruiseInputs};
use crate::dynamics::forces::{ForceContext, ForceRegistry};
use crate::dynamics::hydros::{calc_hydros, HydroBeam, HydroState};
use crate::dynamics::integrator::{IntegrationReport, Integrator};
use crate::dynamics::rotators::{calc_rotators, Rotator};
use crate::dynamics::triggers::{evaluate_triggers, TriggerQueue};
use crate::dynamics::wheels::{calc_wheels, WheelInputs};
use crate::core::ground::Terrain;
use crate::linkage::hooks::Hook;
use crate::linkage::ropes::{Ropable, Rope};
use crate::linkage::ties::{calc_ties, Tie};
use crate::net::codec::NetworkCodec;
use crate::utils::allocator::ActorId;

/// One simulated body: node/beam store plus every subsystem acting on it.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    /// Template file name the actor was spawned from.
    pub name: String,
    pub skin: Option<String>,
    pub section_config: Option<String>,
    pub state: ActorState,

    pub nodes: Vec<Node>,
    pub beams: Vec<Beam>,
    pub shocks: Vec<Shock>,
    pub initial_positions: Vec<Vec3>,
    pub minimass: Vec<f32>,
    pub node_neighbours: Vec<Vec<usize>>,
    pub cab: CabMesh,

    pub hydros: Vec<HydroBeam>,
    pub hydro_state: HydroState,
    pub rotators: Vec<Rotator>,
    /// Command slots `1..=MAX_COMMANDS`; slot 0 is unused.
    pub commands: Vec<CommandKey>,

    pub hooks: Vec<Hook>,
    pub ties: Vec<Tie>,
    pub ropes: Vec<Rope>,
    pub ropables: Vec<Ropable>,

    pub wheels: Vec<Wheel>,
    pub engine: Option<EngineState>,
    pub cruise: CruiseControl,
    pub drivetrain: Drivetrain,
    pub aero_engines: Vec<AeroEngine>,
    pub screwprops: Vec<ScrewProp>,
    pub lights: Lights,
    pub controls: Controls,
    pub prop_anim_keys: Vec<bool>,

    pub dry_mass: f32,
    pub load_mass: f32,
    pub total_mass: f32,
    /// Nodes sharing the load mass.
    pub masscount: usize,

    pub avg_position: Vec3,
    pub bounding_box: Aabb,
    pub predicted_bounding_box: Aabb,
    pub collision_boxes: Vec<Aabb>,
    pub predicted_collision_boxes: Vec<Aabb>,
    /// Floating physics origin; `abs = origin + rel` for every node.
    pub origin: Vec3,
    pub camera_policy: AveragePositionPolicy,
    /// Camera position, direction and roll nodes defining the actor frame.
    pub camera_nodes: Option<[usize; 3]>,
    pub linked_actors: Vec<ActorId>,
    pub debug_view: DebugView,
    pub scale: f32,
    pub wheel_speed: f32,
    pub collision_range: f32,

    pub events: TriggerQueue,
    pub net: Option<NetworkCodec>,
    pub instability_detected: bool,
    pub remove_requested: bool,
    pub(crate) extra_brake: f32,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ActorId::default(),
            name: name.into(),
            skin: None,
            section_config: None,
            state: ActorState::LocalSimulated,
            nodes: Vec::new(),
            beams: Vec::new(),
            shocks: Vec::new(),
            initial_positions: Vec::new(),
            minimass: Vec::new(),
            node_neighbours: Vec::new(),
            cab: CabMesh::default(),
            hydros: Vec::new(),
            hydro_state: HydroState::default(),
            rotators: Vec::new(),
            commands: vec![CommandKey::default(); MAX_COMMANDS + 1],
            hooks: Vec::new(),
            ties: Vec::new(),
            ropes: Vec::new(),
            ropables: Vec::new(),
            wheels: Vec::new(),
            engine: None,
            cruise: CruiseControl::default(),
            drivetrain: Drivetrain::default(),
            aero_engines: Vec::new(),
            screwprops: Vec::new(),
            lights: Lights::default(),
            controls: Controls::default(),
            prop_anim_keys: Vec::new(),
            dry_mass: 0.0,
            load_mass: 0.0,
            total_mass: 0.0,
            masscount: 0,
            avg_position: Vec3::ZERO,
            bounding_box: Aabb::empty(),
            predicted_bounding_box: Aabb::empty(),
            collision_boxes: Vec::new(),
            predicted_collision_boxes: Vec::new(),
            origin: Vec3::ZERO,
            camera_policy: AveragePositionPolicy::Classic,
            camera_nodes: None,
            linked_actors: Vec::new(),
            debug_view: DebugView::None,
            scale: 1.0,
            wheel_speed: 0.0,
            collision_range: DEFAULT_COLLISION_RANGE,
            events: TriggerQueue::new(),
            net: None,
            instability_detected: false,
            remove_requested: false,
            extra_brake: 0.0,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn beam_count(&self) -> usize {
        self.beams.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.state == ActorState::Disposed
    }

    /// Completes a freshly populated actor: spawn positions, per-node
    /// minimum masses, node neighbourhoods, masses and bounds.
    pub fn finalize(&mut self, settings: &SimSettings) {
        self.initial_positions = self.nodes.iter().map(|n| n.abs_position).collect();
        self.minimass.resize(self.nodes.len(), DEFAULT_MINIMASS);
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.pos = i;
            node.rel_position = node.abs_position - self.origin;
        }

        self.node_neighbours = vec![Vec::new(); self.nodes.len()];
        for beam in &self.beams {
            if beam.beam_type == BeamType::Virtual || beam.p1 == beam.p2 {
                continue;
            }
            if beam.p1 < self.nodes.len() && beam.p2 < self.nodes.len() {
                self.node_neighbours[beam.p1].push(beam.p2);
                self.node_neighbours[beam.p2].push(beam.p1);
            }
        }
        for list in &mut self.node_neighbours {
            list.sort_unstable();
            list.dedup();
        }

        for beam in &mut self.beams {
            beam.capture_initial();
        }
        for &tri in &self.cab.collcabs {
            if let Some(nodes) = self.cab.triangles.get(tri) {
                for &n in nodes {
                    if let Some(node) = self.nodes.get_mut(n) {
                        node.flags.is_cab_vertex = true;
                    }
                }
            }
        }

        self.recalculate_node_masses(settings.debug_mass, settings.minimass_skip_loaded_nodes);
        self.update_bounding_boxes();
        self.update_average_position();
    }

    /// Spreads dry mass along the beams and load mass over the loaded nodes,
    /// then clamps every node to its minimum mass.
    pub fn recalculate_node_masses(&mut self, debug: bool, skip_loaded: bool) {
        for node in &mut self.nodes {
            if !node.flags.is_tyre {
                node.mass = 0.0;
            }
        }

        let node_count = self.nodes.len();
        let spans_nodes = |beam: &Beam| beam.p1 < node_count && beam.p2 < node_count;
        let mut length = 0.0;
        for (i, beam) in self.beams.iter().enumerate() {
            if beam.beam_type == BeamType::Virtual {
                continue;
            }
            if !spans_nodes(beam) {
                log::warn!(
                    "actor {}: beam {} references node {}/{} of {}, no mass assigned",
                    self.name,
                    i,
                    beam.p1,
                    beam.p2,
                    node_count
                );
                continue;
            }
            let half = beam.ref_length * 0.5;
            if !self.nodes[beam.p1].flags.is_tyre {
                length += half;
            }
            if !self.nodes[beam.p2].flags.is_tyre {
                length += half;
            }
        }
        if length > 0.0 {
            for beam in &self.beams {
                if beam.beam_type == BeamType::Virtual || !spans_nodes(beam) {
                    continue;
                }
                let half_mass = beam.ref_length * self.dry_mass / length / 2.0;
                if !self.nodes[beam.p1].flags.is_tyre {
                    self.nodes[beam.p1].mass += half_mass;
                }
                if !self.nodes[beam.p2].flags.is_tyre {
                    self.nodes[beam.p2].mass += half_mass;
                }
            }
        }

        for rope in &self.ropes {
            if let Some(node) = self.nodes.get_mut(rope.end_node) {
                node.mass = ROPE_NODE_MASS * self.scale;
            }
        }

        self.masscount = self
            .nodes
            .iter()
            .filter(|n| n.flags.loaded_mass && n.override_mass.is_none())
            .count();
        for node in &mut self.nodes {
            if !node.flags.loaded_mass {
                continue;
            }
            match node.override_mass {
                Some(mass) => node.mass = mass,
                None if self.masscount > 0 => node.mass += self.load_mass / self.masscount as f32,
                None => {}
            }
        }

        for (i, node) in self.nodes.iter_mut().enumerate() {
            if node.flags.is_tyre || (skip_loaded && node.flags.loaded_mass) {
                continue;
            }
            let minimum = self.minimass.get(i).copied().unwrap_or(DEFAULT_MINIMASS);
            if node.mass < minimum {
                if debug {
                    log::debug!(
                        "actor {}: node {} mass {:.2} kg raised to {:.2} kg",
                        self.name,
                        i,
                        node.mass,
                        minimum
                    );
                }
                node.mass = minimum;
            }
        }

        self.total_mass = self.nodes.iter().map(|n| n.mass).sum();
        log::trace!("actor {} total mass {:.1} kg", self.name, self.total_mass);
    }

    /// Scales the actor geometry and mass by `factor` around node 0.
    pub fn scale_actor(&mut self, factor: f32) -> bool {
        if factor <= 0.0 || !factor.is_finite() {
            log::warn!("actor {}: refusing to scale by {factor}", self.name);
            return false;
        }
        if self.is_disposed() {
            log::warn!("actor {}: refusing to scale a disposed actor", self.name);
            return false;
        }

        self.scale *= factor;
        for beam in &mut self.beams {
            beam.k *= factor;
            beam.d *= factor;
            beam.length *= factor;
            beam.ref_length *= factor;
        }
        for hydro in &mut self.hydros {
            hydro.ref_length *= factor;
            hydro.speed *= factor;
        }

        let Some(reference) = self.nodes.first().map(|n| n.abs_position) else {
            return true;
        };
        let initial_reference = self.initial_positions.first().copied().unwrap_or(reference);
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let abs = reference + (node.abs_position - reference) * factor;
            node.set_abs_position(abs, self.origin);
            node.velocity *= factor;
            node.forces *= factor;
            node.mass *= factor;
            if let Some(mass) = &mut node.override_mass {
                *mass *= factor;
            }
            if let Some(initial) = self.initial_positions.get_mut(i) {
                *initial = initial_reference + (*initial - initial_reference) * factor;
            }
        }
        for minimum in &mut self.minimass {
            *minimum *= factor;
        }
        self.dry_mass *= factor;
        self.load_mass *= factor;
        self.total_mass = self.nodes.iter().map(|n| n.mass).sum();
        self.update_bounding_boxes();
        true
    }

    /// Restores spawn-time node and beam state plus actuator state.
    ///
    /// Links to other actors must already be released by the world.
    pub fn reset_local_state(&mut self, settings: &SimSettings) {
        self.origin = Vec3::ZERO;
        for (node, initial) in self.nodes.iter_mut().zip(&self.initial_positions) {
            node.set_abs_position(*initial, Vec3::ZERO);
            node.velocity = Vec3::ZERO;
            node.forces = Vec3::ZERO;
            node.contact = Default::default();
        }
        for beam in &mut self.beams {
            beam.reset();
        }
        for shock in &mut self.shocks {
            shock.reset();
        }
        for command in &mut self.commands {
            command.reset();
        }
        self.hydro_state.reset();
        for hydro in &mut self.hydros {
            if let Some(inertia) = &mut hydro.inertia {
                inertia.reset();
            }
            if let Some(beam) = self.beams.get_mut(hydro.beam) {
                beam.length = hydro.ref_length;
            }
        }
        for rotator in &mut self.rotators {
            rotator.angle = 0.0;
            rotator.angle_error = 0.0;
        }
        for wheel in &mut self.wheels {
            wheel.detached = false;
            wheel.speed = 0.0;
            wheel.angular_speed = 0.0;
        }
        if let Some(engine) = &mut self.engine {
            engine.stop();
            engine.rpm = 0.0;
            engine.acc = 0.0;
            engine.throttle_input = 0.0;
            engine.gear = 0;
            engine.wheel_torque = 0.0;
            engine.turbo_psi = 0.0;
            engine.trigger_brake = 0.0;
            engine.rpm_control = None;
            engine.shift_timer = 0.0;
        }
        self.cruise = CruiseControl {
            target_speed_lower_limit: self.cruise.target_speed_lower_limit,
            can_brake: self.cruise.can_brake,
            speed_limit: self.cruise.speed_limit,
            ..CruiseControl::default()
        };
        self.events = TriggerQueue::new();
        self.instability_detected = false;
        self.extra_brake = 0.0;
        self.recalculate_node_masses(settings.debug_mass, settings.minimass_skip_loaded_nodes);
        self.update_bounding_boxes();
        self.update_average_position();
    }

    /// Lowest absolute node height, optionally ignoring nodes without ground contact.
    pub fn get_min_height(&self, skip_virtual: bool) -> f32 {
        self.nodes
            .iter()
            .filter(|n| !skip_virtual || !n.flags.no_ground_contact)
            .map(|n| n.abs_position.y)
            .fold(f32::INFINITY, f32::min)
    }

    /// Moves the actor so node 0 sits at `(x, ·, z)` and its lowest node at `min_height`.
    pub fn reset_position(&mut self, x: f32, z: f32, set_initial: bool, min_height: f32) {
        let Some(first) = self.nodes.first().map(|n| n.abs_position) else {
            return;
        };
        let horizontal = Vec3::new(x - first.x, 0.0, z - first.z);
        let lowest = self.get_min_height(true);
        let lowest = if lowest.is_finite() { lowest } else { first.y };
        let offset = horizontal + Vec3::new(0.0, min_height - lowest, 0.0);
        self.translate(offset);
        if set_initial {
            self.initial_positions = self.nodes.iter().map(|n| n.abs_position).collect();
        }
        self.update_bounding_boxes();
        self.update_average_position();
    }

    /// Translates every node by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        for node in &mut self.nodes {
            node.set_abs_position(node.abs_position + offset, self.origin);
        }
    }

    /// Forward direction of the actor from its camera nodes (or -Z).
    pub fn get_direction(&self) -> Vec3 {
        self.camera_nodes
            .and_then(|[pos, dir, _]| {
                let p = self.nodes.get(pos)?.rel_position;
                let d = self.nodes.get(dir)?.rel_position;
                Some((p - d).normalize_or_zero())
            })
            .filter(|v| *v != Vec3::ZERO)
            .unwrap_or(Vec3::NEG_Z)
    }

    pub(crate) fn side_direction(&self) -> Vec3 {
        self.camera_nodes
            .and_then(|[pos, _, roll]| {
                let p = self.nodes.get(pos)?.rel_position;
                let r = self.nodes.get(roll)?.rel_position;
                Some((p - r).normalize_or_zero())
            })
            .filter(|v| *v != Vec3::ZERO)
            .unwrap_or(Vec3::X)
    }

    /// Current box of all nodes, predicted box including one second of motion,
    /// and the same per collision group.
    pub fn update_bounding_boxes(&mut self) {
        let mut current = Aabb::empty();
        let mut predicted = Aabb::empty();
        let groups = self
            .nodes
            .iter()
            .filter_map(|n| n.coll_bbox_id)
            .map(|g| g as usize + 1)
            .max()
            .unwrap_or(0);
        self.collision_boxes = vec![Aabb::empty(); groups];
        self.predicted_collision_boxes = vec![Aabb::empty(); groups];

        for node in &self.nodes {
            let p = node.abs_position;
            let ahead = p + node.velocity;
            current.extend(p);
            predicted.extend(p);
            predicted.extend(ahead);
            if let Some(group) = node.coll_bbox_id {
                let g = group as usize;
                self.collision_boxes[g].extend(p);
                self.predicted_collision_boxes[g].extend(p);
                self.predicted_collision_boxes[g].extend(ahead);
            }
        }
        for aabb in self
            .collision_boxes
            .iter_mut()
            .chain(self.predicted_collision_boxes.iter_mut())
        {
            if !aabb.is_empty() {
                aabb.pad(BOUNDING_BOX_PADDING);
            }
        }
        if !current.is_empty() {
            current.pad(BOUNDING_BOX_PADDING);
            predicted.pad(BOUNDING_BOX_PADDING);
        }
        self.bounding_box = current;
        self.predicted_bounding_box = predicted;
    }

    pub fn update_average_position(&mut self) {
        let node_position = |index: usize| self.nodes.get(index).map(|n| n.abs_position);
        let position = match self.camera_policy {
            AveragePositionPolicy::CustomCameraNode(i)
            | AveragePositionPolicy::CinecamNode(i)
            | AveragePositionPolicy::ExternCameraNode(i) => node_position(i),
            AveragePositionPolicy::Classic => None,
        };
        self.avg_position = position.unwrap_or_else(|| {
            if self.nodes.is_empty() {
                Vec3::ZERO
            } else {
                self.nodes.iter().map(|n| n.abs_position).sum::<Vec3>() / self.nodes.len() as f32
            }
        });
    }

    /// Moves the floating origin onto node 0 once it drifted too far.
    pub fn update_physics_origin(&mut self) -> bool {
        let Some(offset) = self.nodes.first().map(|n| n.rel_position) else {
            return false;
        };
        if offset.length_squared() <= ORIGIN_RECENTER_THRESHOLD_SQ {
            return false;
        }
        self.origin += offset;
        for node in &mut self.nodes {
            node.rel_position -= offset;
        }
        log::trace!("actor {} recentred origin to {:?}", self.name, self.origin);
        true
    }

    /// Snapshot of the instrument values animators read.
    pub fn animator_inputs(&self) -> AnimatorInputs {
        let velocity = self.nodes.first().map(|n| n.velocity).unwrap_or(Vec3::ZERO);
        let altitude = self.nodes.first().map(|n| n.abs_position.y).unwrap_or(0.0);
        let forward = self.get_direction();
        let side = self.side_direction();
        let speed = velocity.length();
        let aoa = if speed > 1.0 {
            let up = side.cross(forward).normalize_or_zero();
            (-velocity.dot(up)).atan2(velocity.dot(forward)).to_degrees()
        } else {
            0.0
        };

        let mut inputs = AnimatorInputs {
            airspeed: speed * 1.943_844,
            vvi: velocity.y,
            altitude: altitude * 3.280_84,
            aoa,
            roll: side.y.clamp(-1.0, 1.0).asin().to_degrees(),
            pitch: forward.y.clamp(-1.0, 1.0).asin().to_degrees(),
            heading: forward.x.atan2(-forward.z).to_degrees(),
            brake: self.controls.brake,
            parking_brake: self.controls.parking_brake,
            diff_locked: self
                .drivetrain
                .wheel_diffs
                .iter()
                .chain(&self.drivetrain.axle_diffs)
                .any(|d| d.is_locked()),
            ..AnimatorInputs::default()
        };
        if let Some(engine) = &self.engine {
            inputs.rpm_ratio = engine.rpm / engine.max_rpm.max(1.0);
            inputs.accelerator = engine.acc;
            inputs.clutch = engine.clutch;
            inputs.turbo_ratio = if engine.max_turbo_psi > 0.0 {
                engine.turbo_psi / engine.max_turbo_psi
            } else {
                0.0
            };
            inputs.gear = engine.gear;
            inputs.forward_gears = engine.forward_gears();
            inputs.torque_ratio = if engine.max_torque > 0.0 {
                (engine.wheel_torque.abs() / (engine.max_torque * engine.gear_ratio().abs().max(1.0))).min(1.0)
            } else {
                0.0
            };
        }
        if let Some(prop) = self.screwprops.first() {
            inputs.boat_throttle = prop.throttle;
            inputs.boat_rudder = prop.rudder;
        }
        inputs.aero = self
            .aero_engines
            .iter()
            .map(|a| AeroInputs {
                rpm_ratio: a.rpm / a.max_rpm.max(1.0),
                throttle: a.throttle,
                torque_ratio: a.torque_ratio(),
                pitch: a.pitch,
                ignition: a.ignition,
                failed: a.failed,
            })
            .collect();
        inputs
    }

    /// Clears transient contact state and seeds forces from the environment.
    pub fn begin_step(&mut self, forces: &ForceRegistry, dt: f32, water_level: Option<f32>) {
        for node in &mut self.nodes {
            node.contact.has_mesh_contact = false;
        }
        let ctx = ForceContext {
            dt,
            origin: self.origin,
            water_level,
        };
        forces.apply_all(&mut self.nodes, &ctx);
    }

    /// Engine, wheels, cruise control, propulsion, commands, hydros, rotators and ties.
    pub fn calc_actuators(&mut self, dt: f32, water_level: Option<f32>) {
        let wheel_torque = self.engine.as_ref().map(|e| e.wheel_torque).unwrap_or(0.0);
        let trigger_brake = self.engine.as_ref().map(|e| e.trigger_brake).unwrap_or(0.0);
        let report = calc_wheels(
            &mut self.nodes,
            &mut self.wheels,
            &self.drivetrain,
            WheelInputs {
                wheel_torque,
                controls: self.controls,
                extra_brake: self.extra_brake + trigger_brake,
            },
        );
        self.wheel_speed = report.wheel_speed;

        if let Some(engine) = &mut self.engine {
            engine.update(dt, report.propulsed_angular_speed);
            self.extra_brake = self.cruise.update(
                engine,
                CruiseInputs {
                    wheel_speed: self.wheel_speed,
                    brake: self.controls.brake,
                    parking_brake: self.controls.parking_brake,
                    total_mass: self.total_mass,
                },
            );
        }

        for aero in &mut self.aero_engines {
            aero.update(dt);
            let (Some(r), Some(b)) = (self.nodes.get(aero.ref_node), self.nodes.get(aero.back_node)) else {
                continue;
            };
            let axis = (r.rel_position - b.rel_position).normalize_or_zero();
            self.nodes[aero.ref_node].forces += axis * aero.thrust;
        }
        if let Some(level) = water_level {
            for prop in &self.screwprops {
                let (Some(r), Some(b), Some(u)) = (
                    self.nodes.get(prop.ref_node),
                    self.nodes.get(prop.back_node),
                    self.nodes.get(prop.up_node),
                ) else {
                    continue;
                };
                if r.abs_position.y > level {
                    continue;
                }
                let forward = (r.rel_position - b.rel_position).normalize_or_zero();
                let up = (u.rel_position - r.rel_position).normalize_or_zero();
                let thrust = crate::utils::math::rotate_about_axis(forward, up, prop.rudder * 0.5);
                self.nodes[prop.ref_node].forces += thrust * prop.power * prop.throttle;
            }
        }

        update_commands(
            &mut self.commands,
            &mut self.beams,
            &mut self.rotators,
            self.engine.as_ref(),
            dt,
        );

        self.hydro_state.update(dt, self.wheel_speed);
        if !self.hydros.is_empty() {
            let inputs = self.animator_inputs();
            calc_hydros(
                &mut self.hydros,
                &mut self.hydro_state,
                &mut self.beams,
                &inputs,
                self.wheel_speed,
                dt,
            );
        }
        calc_rotators(&mut self.nodes, &mut self.rotators);
        calc_ties(&mut self.ties, &mut self.beams, dt);
    }

    /// Intra-actor beam forces followed by the trigger state machine.
    pub fn calc_beam_pass(&mut self, settings: &SimSettings, dt: f32) -> BeamPassReport {
        let report = calc_beams(
            &mut self.nodes,
            &mut self.beams,
            &mut self.shocks,
            settings.beam_break_debug,
        );
        if !report.triggers.is_empty() {
            evaluate_triggers(
                &report.triggers,
                &mut self.shocks,
                &self.beams,
                &mut self.commands,
                &mut self.events,
                dt,
                settings.trigger_debug,
            );
        }
        report
    }

    /// Integrates nodes; instability is logged once and flagged for a reset.
    pub fn integrate(&mut self, integrator: &Integrator, terrain: &dyn Terrain) -> IntegrationReport {
        let report = integrator.step(&mut self.nodes, self.origin, terrain);
        if report.unstable && !self.instability_detected {
            log::warn!(
                "actor {} ({}) became unstable, a reset is required",
                self.name,
                self.id
            );
            self.instability_detected = true;
        }
        report
    }

    /// Bounds, average position and origin after integration.
    pub fn finish_step(&mut self) {
        self.update_physics_origin();
        self.update_bounding_boxes();
        self.update_average_position();
    }
}
