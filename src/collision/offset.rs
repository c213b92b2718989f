//! One-shot displacement search used to move a freshly placed actor out of
//! another one. Not part of the per-tick contact pipeline.

use glam::Vec3;
use log::{debug, warn};

use crate::collision::narrowphase::TriangleCoords;
use crate::collision::queries::Raycast;
use crate::config::COLLISION_OFFSET_STEP;
use crate::core::actor::Actor;
use crate::core::beam::BeamType;
use crate::utils::allocator::ActorId;
use crate::world::World;

/// Horizontal clearance added on top of a found escape offset.
const ESCAPE_MARGIN: f32 = 0.2;
/// Contacter proximity is tested with a wider range than per-tick contact.
const PROXIMITY_RANGE_FACTOR: f32 = 3.0;
const SIDE_PREFERENCE: f32 = 1.1;
const LONGITUDINAL_PREFERENCE: f32 = 1.2;

fn collcab_positions(actor: &Actor, shift: Vec3) -> impl Iterator<Item = [Vec3; 3]> + '_ {
    (0..actor.cab.collcab_count()).filter_map(move |i| {
        let tri = actor.cab.collcab(i)?;
        let a = actor.nodes.get(tri[0])?.abs_position + shift;
        let b = actor.nodes.get(tri[1])?.abs_position + shift;
        let c = actor.nodes.get(tri[2])?.abs_position + shift;
        Some([a, b, c])
    })
}

fn contacter_beams(actor: &Actor) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
    actor
        .beams
        .iter()
        .filter(|b| b.is_active() && b.beam_type != BeamType::Virtual)
        .filter_map(move |b| {
            let p1 = actor.nodes.get(b.p1)?;
            let p2 = actor.nodes.get(b.p2)?;
            (p1.flags.contacter && p2.flags.contacter).then_some((p1.abs_position, p2.abs_position))
        })
}

/// Contacter nodes of `points` (shifted) close to the collision faces of `faces` (shifted).
fn points_touch_faces(points: &Actor, point_shift: Vec3, faces: &Actor, face_shift: Vec3, range: f32) -> bool {
    let triangles: Vec<[Vec3; 3]> = collcab_positions(faces, face_shift).collect();
    if triangles.is_empty() {
        return false;
    }
    points
        .nodes
        .iter()
        .filter(|n| n.flags.contacter)
        .map(|n| n.abs_position + point_shift)
        .any(|p| {
            triangles.iter().any(|&[a, b, c]| {
                TriangleCoords::new(a, b, c, p).is_some_and(|coords| coords.is_inside(range))
            })
        })
}

/// Contacter beams of `segments` (shifted) piercing the collision faces of `faces` (shifted).
fn segments_cross_faces(segments: &Actor, segment_shift: Vec3, faces: &Actor, face_shift: Vec3) -> bool {
    let triangles: Vec<[Vec3; 3]> = collcab_positions(faces, face_shift).collect();
    if triangles.is_empty() {
        return false;
    }
    contacter_beams(segments).any(|(p1, p2)| {
        let (p1, p2) = (p1 + segment_shift, p2 + segment_shift);
        let length = (p2 - p1).length();
        if length <= f32::EPSILON {
            return false;
        }
        let dir = (p2 - p1) / length;
        triangles.iter().any(|&[a, b, c]| {
            Raycast::ray_triangle(p1, dir, a, b, c).is_some_and(|t| t <= length)
        })
    })
}

impl World {
    /// Whether `id` moved by `offset` touches any other actor.
    fn collides_with_offset(&self, id: ActorId, actor: &Actor, offset: Vec3) -> bool {
        let bounds = actor.bounding_box.translated(offset);
        let range = actor.collision_range * PROXIMITY_RANGE_FACTOR;
        self.actors.iter().any(|(other_id, other)| {
            other_id != id
                && !other.is_disposed()
                && bounds.intersects(&other.bounding_box)
                && (points_touch_faces(actor, offset, other, Vec3::ZERO, range)
                    || points_touch_faces(other, Vec3::ZERO, actor, offset, range)
                    || segments_cross_faces(actor, offset, other, Vec3::ZERO)
                    || segments_cross_faces(other, Vec3::ZERO, actor, offset))
        })
    }

    /// Walks along `direction` in fixed steps until `id` no longer touches
    /// anything, giving up at `|direction|`.
    ///
    /// Returns the zero vector when the actor is already free; a result at
    /// least as long as `direction` means no free spot was found.
    pub fn calculate_collision_offset(&self, id: ActorId, direction: Vec3) -> Vec3 {
        let Some(actor) = self.actors.get(id) else {
            return Vec3::ZERO;
        };
        let max_distance = direction.length();
        if max_distance <= 0.0 {
            return Vec3::ZERO;
        }
        let step = direction / max_distance * COLLISION_OFFSET_STEP;

        let mut offset = Vec3::ZERO;
        while offset.length() < max_distance {
            if !self.collides_with_offset(id, actor, offset) {
                break;
            }
            offset += step;
        }
        offset
    }

    fn apply_escape_offset(&mut self, id: ActorId, mut offset: Vec3, set_initial: bool) {
        offset += Vec3::new(offset.x, 0.0, offset.z).normalize_or_zero() * ESCAPE_MARGIN;
        let Some(actor) = self.actors.get_mut(id) else {
            return;
        };
        let Some(first) = actor.nodes.first().map(|n| n.abs_position) else {
            return;
        };
        let min_height = actor.get_min_height(true);
        actor.reset_position(
            first.x + offset.x,
            first.z + offset.z,
            set_initial,
            min_height + offset.y,
        );
    }

    /// Moves `id` along `direction` far enough to clear other actors.
    pub fn resolve_collisions_direction(&mut self, id: ActorId, direction: Vec3) {
        let offset = self.calculate_collision_offset(id, direction);
        if offset == Vec3::ZERO {
            return;
        }
        self.apply_escape_offset(id, offset, false);
    }

    /// Searches sideways and lengthwise (and optionally upwards) for the
    /// shortest escape within `max_distance`, then places the actor there.
    ///
    /// Sideways escapes are slightly preferred over lengthwise ones.
    pub fn resolve_collisions(&mut self, id: ActorId, max_distance: f32, consider_up: bool) {
        let Some(actor) = self.actors.get(id) else {
            return;
        };
        let flat = |v: Vec3| Vec3::new(v.x, 0.0, v.z).normalize_or_zero();
        let forward = flat(actor.get_direction());
        let side = flat(actor.side_direction());

        let candidates = [
            (self.calculate_collision_offset(id, -side * max_distance), SIDE_PREFERENCE),
            (self.calculate_collision_offset(id, side * max_distance), SIDE_PREFERENCE),
            (self.calculate_collision_offset(id, forward * max_distance), LONGITUDINAL_PREFERENCE),
            (self.calculate_collision_offset(id, -forward * max_distance), LONGITUDINAL_PREFERENCE),
        ];
        let mut best = candidates
            .iter()
            .filter(|(off, _)| off.length() < max_distance)
            .min_by(|a, b| (a.0.length() * a.1).total_cmp(&(b.0.length() * b.1)))
            .map(|&(off, _)| off);

        if consider_up {
            let up = self.calculate_collision_offset(id, Vec3::Y * max_distance);
            if up.length() < max_distance && best.map_or(true, |b| up.length() < b.length()) {
                best = Some(up);
            }
        }

        match best {
            Some(offset) if offset == Vec3::ZERO => {}
            Some(offset) => {
                debug!("Actor {id}: resolving collision with offset {offset:?}");
                self.apply_escape_offset(id, offset, true);
            }
            None => warn!("Actor {id}: no collision-free position within {max_distance} m"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SimSettings;
    use crate::core::builder::ActorBuilder;
    use crate::world::World;
    use glam::Vec3;

    #[test]
    fn overlapping_cubes_are_separated() {
        let settings = SimSettings::default();
        let mut world = World::new(settings.clone());
        let _a = world.add_actor(ActorBuilder::cube("a", Vec3::new(0.0, 0.5, 0.0), 1.0, 100.0).build(&settings));
        let b = world.add_actor(ActorBuilder::cube("b", Vec3::new(0.4, 0.5, 0.0), 1.0, 100.0).build(&settings));

        let offset = world.calculate_collision_offset(b, Vec3::X * 5.0);
        assert!(offset.x > 0.5 && offset.x < 5.0, "offset {offset:?}");

        let free = world.calculate_collision_offset(b, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(free, Vec3::ZERO);
    }

    #[test]
    fn distant_actor_needs_no_offset() {
        let settings = SimSettings::default();
        let mut world = World::new(settings.clone());
        world.add_actor(ActorBuilder::cube("a", Vec3::ZERO, 1.0, 100.0).build(&settings));
        let b = world.add_actor(ActorBuilder::cube("b", Vec3::new(10.0, 0.0, 0.0), 1.0, 100.0).build(&settings));
        assert_eq!(world.calculate_collision_offset(b, Vec3::X * 3.0), Vec3::ZERO);
        let before = world.actor(b).map(|a| a.nodes[0].abs_position);
        world.resolve_collisions(b, 3.0, true);
        assert_eq!(world.actor(b).map(|a| a.nodes[0].abs_position), before);
    }
}
