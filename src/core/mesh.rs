use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::types::CollcabRate;

/// Axis-aligned bounding box used for actor bounds and collision prefilters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn merge(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &p in points {
            bounds.extend(p);
        }
        bounds
    }

    /// Grows the box by `amount` on every side. Empty boxes stay empty.
    pub fn pad(&mut self, amount: f32) {
        if self.is_empty() {
            return;
        }
        self.min -= Vec3::splat(amount);
        self.max += Vec3::splat(amount);
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn radius(&self) -> f32 {
        self.extent().length()
    }
}

/// Cab faces of an actor; a subset of them takes part in collisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CabMesh {
    /// Node index triples.
    pub triangles: Vec<[usize; 3]>,
    /// Indices into `triangles` of the collision-enabled faces.
    pub collcabs: Vec<usize>,
    pub intra_rate: Vec<CollcabRate>,
    pub inter_rate: Vec<CollcabRate>,
}

impl CabMesh {
    pub fn add_triangle(&mut self, nodes: [usize; 3], collidable: bool) -> usize {
        let index = self.triangles.len();
        self.triangles.push(nodes);
        if collidable {
            self.collcabs.push(index);
            self.intra_rate.push(CollcabRate::default());
            self.inter_rate.push(CollcabRate::default());
        }
        index
    }

    /// Node triple of the i-th collision triangle.
    pub fn collcab(&self, i: usize) -> Option<[usize; 3]> {
        self.collcabs
            .get(i)
            .and_then(|&tri| self.triangles.get(tri))
            .copied()
    }

    pub fn collcab_count(&self) -> usize {
        self.collcabs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_box_contains_its_points() {
        let mut bounds = Aabb::from_points(&[Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)]);
        bounds.pad(0.05);
        assert!(bounds.contains(Vec3::new(-0.04, 2.04, 0.0)));
        assert!(!bounds.contains(Vec3::new(-0.06, 0.0, 0.0)));
        let mut empty = Aabb::empty();
        empty.pad(1.0);
        assert!(empty.is_empty());
    }
}
