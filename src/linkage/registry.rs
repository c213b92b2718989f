use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::types::BeamKey;
use crate::utils::allocator::ActorId;

/// Tracks which actor pair every inter-actor beam connects.
///
/// Keys are stable `(owner, beam index)` pairs; the value is `(owner, partner)`.
#[derive(Debug, Default, Clone)]
pub struct LinkRegistry {
    links: HashMap<BeamKey, (ActorId, ActorId)>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_inter_actor_beam(&mut self, key: BeamKey, owner: ActorId, partner: ActorId) {
        debug_assert_eq!(key.actor, owner);
        if let Some(previous) = self.links.insert(key, (owner, partner)) {
            log::debug!(
                "beam {} of actor {} relinked from {} to {}",
                key.beam,
                owner,
                previous.1,
                partner
            );
        }
    }

    pub fn remove_inter_actor_beam(&mut self, key: BeamKey) -> Option<(ActorId, ActorId)> {
        self.links.remove(&key)
    }

    pub fn get(&self, key: &BeamKey) -> Option<(ActorId, ActorId)> {
        self.links.get(key).copied()
    }

    pub fn contains(&self, key: &BeamKey) -> bool {
        self.links.contains_key(key)
    }

    /// Removes every entry touching `actor` and returns them sorted by key.
    pub fn disjoin_actor(&mut self, actor: ActorId) -> Vec<(BeamKey, (ActorId, ActorId))> {
        let mut removed: Vec<_> = self
            .links
            .iter()
            .filter(|(_, (a, b))| *a == actor || *b == actor)
            .map(|(key, pair)| (*key, *pair))
            .collect();
        for (key, _) in &removed {
            self.links.remove(key);
        }
        removed.sort_by_key(|(key, _)| *key);
        removed
    }

    /// Actors directly connected to `actor`, in id order.
    pub fn partners_of(&self, actor: ActorId) -> Vec<ActorId> {
        let mut partners: Vec<ActorId> = self
            .links
            .values()
            .filter_map(|&(a, b)| {
                if a == actor {
                    Some(b)
                } else if b == actor {
                    Some(a)
                } else {
                    None
                }
            })
            .filter(|&other| other != actor)
            .collect();
        partners.sort();
        partners.dedup();
        partners
    }

    /// Transitive closure of actors linked to `start`, excluding `start`.
    pub fn determine_linked_actors(&self, start: ActorId) -> Vec<ActorId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut linked = Vec::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for partner in self.partners_of(current) {
                if visited.insert(partner) {
                    linked.push(partner);
                    queue.push_back(partner);
                }
            }
        }

        linked
    }

    /// Inter-actor beams owned by `actor`, sorted by beam index.
    pub fn beams_of(&self, actor: ActorId) -> Vec<(BeamKey, ActorId)> {
        let mut beams: Vec<_> = self
            .links
            .iter()
            .filter(|(key, _)| key.actor == actor)
            .map(|(key, (_, partner))| (*key, *partner))
            .collect();
        beams.sort_by_key(|(key, _)| key.beam);
        beams
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BeamKey, &(ActorId, ActorId))> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> ActorId {
        ActorId::new(i, 0)
    }

    #[test]
    fn closure_follows_chains_of_links() {
        let mut registry = LinkRegistry::new();
        registry.add_inter_actor_beam(BeamKey::new(id(0), 3), id(0), id(1));
        registry.add_inter_actor_beam(BeamKey::new(id(2), 0), id(2), id(1));
        registry.add_inter_actor_beam(BeamKey::new(id(3), 1), id(3), id(4));

        let mut linked = registry.determine_linked_actors(id(0));
        linked.sort();
        assert_eq!(linked, vec![id(1), id(2)]);
        assert_eq!(registry.determine_linked_actors(id(4)), vec![id(3)]);
    }

    #[test]
    fn disjoin_removes_every_entry_of_the_actor() {
        let mut registry = LinkRegistry::new();
        registry.add_inter_actor_beam(BeamKey::new(id(0), 3), id(0), id(1));
        registry.add_inter_actor_beam(BeamKey::new(id(1), 5), id(1), id(0));
        registry.add_inter_actor_beam(BeamKey::new(id(2), 0), id(2), id(3));

        let removed = registry.disjoin_actor(id(0));
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.partners_of(id(1)).is_empty());
    }
}
