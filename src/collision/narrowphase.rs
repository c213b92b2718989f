//! Node versus cab triangle contact: local triangle coordinates, backface
//! resolution and the contact response.

use std::sync::OnceLock;

use glam::Vec3;

use crate::collision::broadphase::PointGrid;
use crate::config::DEFAULT_POINT_GRID_CELL_SIZE;
use crate::core::actor::Actor;
use crate::core::ground::GroundModel;
use crate::core::mesh::Aabb;
use crate::core::node::Node;

/// Outward speed per metre of penetration requested from the contact response.
const PENETRATION_RECOVERY: f32 = 10.0;

/// Position of a point in the frame of a triangle `(a, b, c)`.
///
/// `p = a + u·(b - a) + v·(c - a) + distance·normal`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleCoords {
    pub u: f32,
    pub v: f32,
    pub distance: f32,
    pub normal: Vec3,
}

impl TriangleCoords {
    pub fn new(a: Vec3, b: Vec3, c: Vec3, p: Vec3) -> Option<Self> {
        let e1 = b - a;
        let e2 = c - a;
        let normal = e1.cross(e2).normalize_or_zero();
        if normal == Vec3::ZERO {
            return None;
        }
        let rel = p - a;
        let distance = rel.dot(normal);
        let q = rel - normal * distance;
        let (d11, d12, d22) = (e1.dot(e1), e1.dot(e2), e2.dot(e2));
        let det = d11 * d22 - d12 * d12;
        if det.abs() < 1e-12 {
            return None;
        }
        let (q1, q2) = (q.dot(e1), q.dot(e2));
        Some(Self {
            u: (d22 * q1 - d12 * q2) / det,
            v: (d11 * q2 - d12 * q1) / det,
            distance,
            normal,
        })
    }

    /// Barycentric weights of the projected point on `(a, b, c)`.
    pub fn weights(&self) -> [f32; 3] {
        [1.0 - self.u - self.v, self.u, self.v]
    }

    pub fn is_inside(&self, range: f32) -> bool {
        self.u >= 0.0 && self.v >= 0.0 && self.u + self.v <= 1.0 && self.distance.abs() <= range
    }
}

/// A node touching a triangle, ready to be resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleContact {
    pub weights: [f32; 3],
    /// Points from the triangle towards the side the node belongs to.
    pub normal: Vec3,
    pub penetration: f32,
}

/// Decides which side of the triangle the node came from.
///
/// The node's own neighbours are a better witness than the node itself,
/// which may already have crossed the plane: if most of them lie behind
/// the face, the node approached from behind.
pub fn resolve_contact_side(
    coords: &TriangleCoords,
    a: Vec3,
    neighbours: impl Iterator<Item = Vec3>,
    range: f32,
) -> TriangleContact {
    let (mut behind, mut total) = (0usize, 0usize);
    for p in neighbours {
        total += 1;
        if (p - a).dot(coords.normal) < 0.0 {
            behind += 1;
        }
    }
    let flip = if total > 0 {
        behind * 2 > total
    } else {
        coords.distance < 0.0
    };
    let (normal, distance) = if flip {
        (-coords.normal, -coords.distance)
    } else {
        (coords.normal, coords.distance)
    };
    TriangleContact {
        weights: coords.weights(),
        normal,
        penetration: range - distance,
    }
}

/// Surface used for triangle contacts.
pub fn cab_ground_model() -> &'static GroundModel {
    static METAL: OnceLock<GroundModel> = OnceLock::new();
    METAL.get_or_init(GroundModel::default_metal)
}

/// Force on the hit node for a contact; triangle nodes receive the
/// negation spread by `weights`.
///
/// With `remote_triangle` the triangle is treated as immovable.
pub fn resolve_collision_forces(
    hit: &Node,
    triangle: [&Node; 3],
    contact: &TriangleContact,
    dt: f32,
    remote_triangle: bool,
) -> Vec3 {
    let w = contact.weights;
    let tri_velocity =
        triangle[0].velocity * w[0] + triangle[1].velocity * w[1] + triangle[2].velocity * w[2];
    let relative = hit.velocity - tri_velocity;
    let reduced_mass = if remote_triangle {
        hit.mass
    } else {
        let tri_mass = triangle[0].mass * w[0] + triangle[1].mass * w[1] + triangle[2].mass * w[2];
        if hit.mass + tri_mass > 0.0 {
            hit.mass * tri_mass / (hit.mass + tri_mass)
        } else {
            0.0
        }
    };
    if reduced_mass <= 0.0 {
        return Vec3::ZERO;
    }
    let bias = contact.normal * contact.penetration.max(0.0) * PENETRATION_RECOVERY;
    cab_ground_model()
        .contact_force(
            hit.forces,
            relative - bias,
            reduced_mass,
            contact.normal,
            dt,
            contact.penetration,
        )
        .force
}

fn triangle_bounds(positions: &[Vec3; 3], range: f32) -> Aabb {
    let mut bounds = Aabb::from_points(positions);
    bounds.pad(range);
    bounds
}

fn mark_contact(node: &mut Node, force: Vec3) {
    node.contact.has_mesh_contact = true;
    node.contact.last_collision_force = force;
    node.contact.last_collision_surface = Some(cab_ground_model().id);
}

/// Contactable nodes of `actor` against its own collision triangles.
pub fn intra_actor_collisions(actor: &mut Actor, dt: f32) -> usize {
    if actor.cab.collcabs.is_empty() {
        return 0;
    }
    let range = actor.collision_range;
    let grid = PointGrid::from_nodes(&actor.nodes, DEFAULT_POINT_GRID_CELL_SIZE, |n| {
        n.flags.contactable
    });
    if grid.is_empty() {
        return 0;
    }

    let mut contacts = 0;
    for i in 0..actor.cab.collcab_count() {
        if !actor.cab.intra_rate[i].tick() {
            continue;
        }
        let Some(tri) = actor.cab.collcab(i) else {
            continue;
        };
        if tri.iter().any(|&n| n >= actor.nodes.len()) {
            continue;
        }
        let positions = tri.map(|n| actor.nodes[n].abs_position);
        let mut had_contact = false;
        for hit in grid.query(&triangle_bounds(&positions, range)) {
            if tri.contains(&hit) {
                continue;
            }
            let Some(coords) =
                TriangleCoords::new(positions[0], positions[1], positions[2], actor.nodes[hit].abs_position)
            else {
                continue;
            };
            if !coords.is_inside(range) {
                continue;
            }
            let neighbours = actor.node_neighbours[hit]
                .iter()
                .filter(|&&n| !tri.contains(&n))
                .map(|&n| actor.nodes[n].abs_position);
            let contact = resolve_contact_side(&coords, positions[0], neighbours, range);
            let force = {
                let nodes = &actor.nodes;
                resolve_collision_forces(
                    &nodes[hit],
                    [&nodes[tri[0]], &nodes[tri[1]], &nodes[tri[2]]],
                    &contact,
                    dt,
                    false,
                )
            };
            actor.nodes[hit].forces += force;
            mark_contact(&mut actor.nodes[hit], force);
            for (k, &n) in tri.iter().enumerate() {
                actor.nodes[n].forces -= force * contact.weights[k];
            }
            had_contact = true;
            contacts += 1;
        }
        actor.cab.intra_rate[i].update(had_contact);
    }
    contacts
}

/// Contacter nodes of `hit_actor` against the collision triangles of `tri_actor`.
pub fn inter_actor_collisions(tri_actor: &mut Actor, hit_actor: &mut Actor, dt: f32, remote: bool) -> usize {
    if tri_actor.cab.collcabs.is_empty() {
        return 0;
    }
    let range = tri_actor.collision_range;
    let grid = PointGrid::from_nodes(&hit_actor.nodes, DEFAULT_POINT_GRID_CELL_SIZE, |n| {
        n.flags.contacter
    });
    if grid.is_empty() {
        return 0;
    }

    let mut contacts = 0;
    for i in 0..tri_actor.cab.collcab_count() {
        if !tri_actor.cab.inter_rate[i].tick() {
            continue;
        }
        let Some(tri) = tri_actor.cab.collcab(i) else {
            continue;
        };
        if tri.iter().any(|&n| n >= tri_actor.nodes.len()) {
            continue;
        }
        let positions = tri.map(|n| tri_actor.nodes[n].abs_position);
        let bounds = triangle_bounds(&positions, range);
        if !bounds.intersects(&hit_actor.predicted_bounding_box) {
            tri_actor.cab.inter_rate[i].update(false);
            continue;
        }
        let mut had_contact = false;
        for hit in grid.query(&bounds) {
            let Some(coords) = TriangleCoords::new(
                positions[0],
                positions[1],
                positions[2],
                hit_actor.nodes[hit].abs_position,
            ) else {
                continue;
            };
            if !coords.is_inside(range) {
                continue;
            }
            let neighbours = hit_actor.node_neighbours[hit]
                .iter()
                .map(|&n| hit_actor.nodes[n].abs_position);
            let contact = resolve_contact_side(&coords, positions[0], neighbours, range);
            let t = &tri_actor.nodes;
            let force = resolve_collision_forces(
                &hit_actor.nodes[hit],
                [&t[tri[0]], &t[tri[1]], &t[tri[2]]],
                &contact,
                dt,
                remote,
            );
            hit_actor.nodes[hit].forces += force;
            mark_contact(&mut hit_actor.nodes[hit], force);
            if !remote {
                for (k, &n) in tri.iter().enumerate() {
                    tri_actor.nodes[n].forces -= force * contact.weights[k];
                    tri_actor.nodes[n].contact.has_mesh_contact = true;
                }
            }
            had_contact = true;
            contacts += 1;
        }
        tri_actor.cab.inter_rate[i].update(had_contact);
    }
    contacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const A: Vec3 = Vec3::ZERO;
    const B: Vec3 = Vec3::X;
    const C: Vec3 = Vec3::Z;

    #[test]
    fn local_coordinates_reconstruct_the_point() {
        let p = Vec3::new(0.25, -0.01, 0.5);
        let coords = TriangleCoords::new(A, B, C, p).expect("valid triangle");
        assert_relative_eq!(coords.u, 0.25, epsilon = 1e-6);
        assert_relative_eq!(coords.v, 0.5, epsilon = 1e-6);
        // (b - a) × (c - a) = X × Z = -Y
        assert_relative_eq!(coords.distance, 0.01, epsilon = 1e-6);
        let rebuilt = A + (B - A) * coords.u + (C - A) * coords.v + coords.normal * coords.distance;
        assert!((rebuilt - p).length() < 1e-6);
        assert!(coords.is_inside(0.02));
        assert!(!coords.is_inside(0.005));
    }

    #[test]
    fn degenerate_triangle_has_no_frame() {
        assert!(TriangleCoords::new(A, B, B * 2.0, Vec3::Y).is_none());
    }

    #[test]
    fn neighbours_decide_the_side() {
        let coords = TriangleCoords::new(A, B, C, Vec3::new(0.2, 0.01, 0.2)).expect("valid triangle");
        // Normal is -Y; the node sits just behind it (y > 0 means distance < 0).
        assert!(coords.distance < 0.0);
        let above = [Vec3::new(0.2, 1.0, 0.2), Vec3::new(0.3, 1.0, 0.2)];
        let contact = resolve_contact_side(&coords, A, above.into_iter(), 0.02);
        assert_relative_eq!(contact.normal.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(contact.penetration, 0.01, epsilon = 1e-5);

        let lonely = resolve_contact_side(&coords, A, std::iter::empty(), 0.02);
        assert_relative_eq!(lonely.normal.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn approaching_node_is_pushed_out() {
        let mut hit = Node::new(0, Vec3::new(0.2, 0.005, 0.2));
        hit.mass = 10.0;
        hit.velocity = Vec3::new(0.0, -2.0, 0.0);
        let mut tri: Vec<Node> = [A, B, C].iter().enumerate().map(|(i, &p)| Node::new(i, p)).collect();
        for n in &mut tri {
            n.mass = 10.0;
        }
        let contact = TriangleContact {
            weights: [0.6, 0.2, 0.2],
            normal: Vec3::Y,
            penetration: 0.015,
        };
        let force = resolve_collision_forces(&hit, [&tri[0], &tri[1], &tri[2]], &contact, 0.001, false);
        assert!(force.y > 0.0);
    }
}
