use std::collections::HashMap;

use glam::Vec3;

use crate::core::mesh::Aabb;
use crate::core::node::Node;
use crate::utils::allocator::ActorId;

/// Uniform grid over node positions, queried with triangle bounds.
#[derive(Debug, Clone)]
pub struct PointGrid {
    cell_size: f32,
    grid: HashMap<(i32, i32, i32), Vec<usize>>,
    points: usize,
}

impl PointGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1e-3),
            grid: HashMap::new(),
            points: 0,
        }
    }

    /// Grid of every node accepted by `filter`, keyed by node index.
    pub fn from_nodes(nodes: &[Node], cell_size: f32, filter: impl Fn(&Node) -> bool) -> Self {
        let mut grid = Self::new(cell_size);
        for (i, node) in nodes.iter().enumerate() {
            if filter(node) {
                grid.insert(i, node.abs_position);
            }
        }
        grid
    }

    fn world_to_grid(&self, pos: Vec3) -> (i32, i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, index: usize, position: Vec3) {
        let cell = self.world_to_grid(position);
        self.grid.entry(cell).or_default().push(index);
        self.points += 1;
    }

    pub fn clear(&mut self) {
        self.grid.clear();
        self.points = 0;
    }

    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    /// Indices stored in cells overlapping `bounds`, in no particular order.
    ///
    /// Callers still test the exact positions; the grid only prunes.
    pub fn query(&self, bounds: &Aabb) -> Vec<usize> {
        let mut results = Vec::new();
        if bounds.is_empty() || self.grid.is_empty() {
            return results;
        }
        let min_cell = self.world_to_grid(bounds.min);
        let max_cell = self.world_to_grid(bounds.max);
        let cells = (max_cell.0 - min_cell.0 + 1) as i64
            * (max_cell.1 - min_cell.1 + 1) as i64
            * (max_cell.2 - min_cell.2 + 1) as i64;
        if cells > self.grid.len() as i64 {
            let within = |&(x, y, z): &(i32, i32, i32)| {
                (min_cell.0..=max_cell.0).contains(&x)
                    && (min_cell.1..=max_cell.1).contains(&y)
                    && (min_cell.2..=max_cell.2).contains(&z)
            };
            for (_, bucket) in self.grid.iter().filter(|(cell, _)| within(cell)) {
                results.extend_from_slice(bucket);
            }
            return results;
        }
        for x in min_cell.0..=max_cell.0 {
            for y in min_cell.1..=max_cell.1 {
                for z in min_cell.2..=max_cell.2 {
                    if let Some(bucket) = self.grid.get(&(x, y, z)) {
                        results.extend_from_slice(bucket);
                    }
                }
            }
        }
        results
    }
}

/// Sweep over the x axis returning every pair of overlapping boxes,
/// ordered by the first id then the second.
pub fn overlapping_pairs(boxes: &[(ActorId, Aabb)]) -> Vec<(ActorId, ActorId)> {
    let mut order: Vec<usize> = (0..boxes.len())
        .filter(|&i| !boxes[i].1.is_empty())
        .collect();
    order.sort_by(|&a, &b| boxes[a].1.min.x.total_cmp(&boxes[b].1.min.x));

    let mut pairs = Vec::new();
    for (i, &a) in order.iter().enumerate() {
        let (id_a, box_a) = boxes[a];
        for &b in &order[i + 1..] {
            let (id_b, box_b) = boxes[b];
            if box_b.min.x > box_a.max.x {
                break;
            }
            if box_a.intersects(&box_b) {
                pairs.push(if id_a < id_b { (id_a, id_b) } else { (id_b, id_a) });
            }
        }
    }
    pairs.sort();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_query_finds_nearby_points_only() {
        let mut nodes = vec![
            Node::new(0, Vec3::new(0.1, 0.1, 0.1)),
            Node::new(1, Vec3::new(5.0, 0.0, 0.0)),
            Node::new(2, Vec3::new(0.9, 0.2, 0.0)),
        ];
        nodes[2].flags.contacter = true;
        nodes[0].flags.contacter = true;
        let grid = PointGrid::from_nodes(&nodes, 1.0, |n| n.flags.contacter);
        assert_eq!(grid.len(), 2);
        let mut hits = grid.query(&Aabb::new(Vec3::ZERO, Vec3::splat(0.5)));
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 2]);
        assert!(grid.query(&Aabb::new(Vec3::splat(10.0), Vec3::splat(11.0))).is_empty());
    }

    #[test]
    fn sweep_reports_each_overlap_once() {
        let a = ActorId::new(0, 0);
        let b = ActorId::new(1, 0);
        let c = ActorId::new(2, 0);
        let boxes = [
            (b, Aabb::new(Vec3::splat(0.5), Vec3::splat(1.5))),
            (a, Aabb::new(Vec3::ZERO, Vec3::ONE)),
            (c, Aabb::new(Vec3::splat(5.0), Vec3::splat(6.0))),
        ];
        assert_eq!(overlapping_pairs(&boxes), vec![(a, b)]);
    }
}
