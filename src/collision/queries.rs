use glam::Vec3;

use crate::core::actor::Actor;
use crate::core::mesh::Aabb;
use crate::utils::allocator::{ActorId, Arena};
use crate::world::World;

/// Result of a ray cast against actor cab triangles.
#[derive(Debug, Clone, PartialEq)]
pub struct RaycastHit {
    pub actor: ActorId,
    /// Index into the actor's `cab.triangles`.
    pub triangle: usize,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RaycastQuery {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
    /// Also test actors that are asleep or not simulated locally.
    pub include_inactive: bool,
}

impl RaycastQuery {
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction,
            max_distance,
            include_inactive: true,
        }
    }
}

pub struct Raycast;

impl Raycast {
    /// Every triangle hit along the ray, nearest first.
    pub fn cast(query: &RaycastQuery, actors: &Arena<Actor>) -> Vec<RaycastHit> {
        let dir = query.direction.normalize_or_zero();
        if dir == Vec3::ZERO || query.max_distance <= 0.0 {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for (id, actor) in actors.iter() {
            if actor.is_disposed() {
                continue;
            }
            if !query.include_inactive && !actor.state.is_locally_simulated() {
                continue;
            }
            if Self::ray_aabb(query.origin, dir, query.max_distance, &actor.bounding_box).is_none() {
                continue;
            }
            for (t, &[i0, i1, i2]) in actor.cab.triangles.iter().enumerate() {
                let (Some(a), Some(b), Some(c)) = (
                    actor.nodes.get(i0).map(|n| n.abs_position),
                    actor.nodes.get(i1).map(|n| n.abs_position),
                    actor.nodes.get(i2).map(|n| n.abs_position),
                ) else {
                    continue;
                };
                if let Some(distance) = Self::ray_triangle(query.origin, dir, a, b, c) {
                    if distance > query.max_distance {
                        continue;
                    }
                    let mut normal = (b - a).cross(c - a).normalize_or_zero();
                    if normal.dot(dir) > 0.0 {
                        normal = -normal;
                    }
                    hits.push(RaycastHit {
                        actor: id,
                        triangle: t,
                        point: query.origin + dir * distance,
                        normal,
                        distance,
                    });
                }
            }
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Moller-Trumbore; distance along a unit `dir`, double sided.
    pub fn ray_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
        let e1 = b - a;
        let e2 = c - a;
        let p = dir.cross(e2);
        let det = e1.dot(p);
        if det.abs() < 1e-9 {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = dir.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }

    /// Entry distance of the ray into `bounds`, zero when starting inside.
    pub fn ray_aabb(origin: Vec3, dir: Vec3, max_distance: f32, bounds: &Aabb) -> Option<f32> {
        if bounds.is_empty() {
            return None;
        }
        let mut t_min = 0.0f32;
        let mut t_max = max_distance;

        for i in 0..3 {
            let o = origin[i];
            let d = dir[i];
            let (min, max) = (bounds.min[i], bounds.max[i]);

            if d.abs() < 1e-6 {
                if o < min || o > max {
                    return None;
                }
            } else {
                let inv_dir = 1.0 / d;
                let mut t1 = (min - o) * inv_dir;
                let mut t2 = (max - o) * inv_dir;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }
        Some(t_min)
    }
}

impl World {
    /// Nearest cab triangle hit by the ray, if any.
    pub fn raycast(&self, query: &RaycastQuery) -> Option<RaycastHit> {
        Raycast::cast(query, &self.actors).into_iter().next()
    }

    pub fn raycast_all(&self, query: &RaycastQuery) -> Vec<RaycastHit> {
        Raycast::cast(query, &self.actors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ray_hits_triangle_from_either_side() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Z);
        let down = Raycast::ray_triangle(Vec3::new(0.2, 1.0, 0.2), -Vec3::Y, a, b, c);
        assert_relative_eq!(down.unwrap_or(f32::NAN), 1.0, epsilon = 1e-6);
        let up = Raycast::ray_triangle(Vec3::new(0.2, -2.0, 0.2), Vec3::Y, a, b, c);
        assert_relative_eq!(up.unwrap_or(f32::NAN), 2.0, epsilon = 1e-6);
        assert!(Raycast::ray_triangle(Vec3::new(0.9, 1.0, 0.9), -Vec3::Y, a, b, c).is_none());
        assert!(Raycast::ray_triangle(Vec3::new(0.2, 1.0, 0.2), Vec3::Y, a, b, c).is_none());
    }

    #[test]
    fn ray_misses_distant_box() {
        let bounds = Aabb::new(Vec3::splat(4.0), Vec3::splat(5.0));
        assert!(Raycast::ray_aabb(Vec3::ZERO, Vec3::X, 100.0, &bounds).is_none());
        let t = Raycast::ray_aabb(Vec3::new(0.0, 4.5, 4.5), Vec3::X, 100.0, &bounds);
        assert_relative_eq!(t.unwrap_or(f32::NAN), 4.0, epsilon = 1e-6);
    }
}
