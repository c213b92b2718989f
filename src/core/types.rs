use serde::{Deserialize, Serialize};

use crate::utils::allocator::ActorId;

/// Lifecycle state of an actor. Exactly one applies at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ActorState {
    #[default]
    LocalSimulated,
    /// Remote actor driven by network snapshots.
    NetworkedOk,
    /// Remote actor outside the visible range.
    NetworkedHidden,
    LocalReplay,
    LocalSleeping,
    Disposed,
}

impl ActorState {
    /// Whether the local force integrator steps this actor.
    pub fn is_locally_simulated(self) -> bool {
        matches!(self, ActorState::LocalSimulated)
    }

    pub fn is_networked(self) -> bool {
        matches!(self, ActorState::NetworkedOk | ActorState::NetworkedHidden)
    }
}

/// Visualization mode propagated across linked actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DebugView {
    #[default]
    None,
    Skeleton,
    Nodes,
    Beams,
}

/// How the aggregate average position is derived; fixed per actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AveragePositionPolicy {
    CustomCameraNode(usize),
    CinecamNode(usize),
    ExternCameraNode(usize),
    /// Arithmetic mean of every node.
    #[default]
    Classic,
}

/// Stable identifier of a beam: owning actor plus index in its beam array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeamKey {
    pub actor: ActorId,
    pub beam: usize,
}

impl BeamKey {
    pub fn new(actor: ActorId, beam: usize) -> Self {
        Self { actor, beam }
    }
}

/// Skip counter limiting how often a collision triangle is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CollcabRate {
    /// Ticks to skip between two tests.
    pub rate: i32,
    /// Ticks skipped so far.
    pub distance: i32,
}

/// Upper bound for the collcab skip rate.
pub const MAX_COLLCAB_RATE: i32 = 12;

impl CollcabRate {
    /// Returns true when the triangle should be tested this tick.
    pub fn tick(&mut self) -> bool {
        if self.distance < self.rate {
            self.distance += 1;
            false
        } else {
            self.distance = 0;
            true
        }
    }

    /// Adjusts the rate after a test; contact keeps the triangle hot.
    pub fn update(&mut self, had_contact: bool) {
        if had_contact {
            self.rate = 0;
        } else if self.rate < MAX_COLLCAB_RATE {
            self.rate += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collcab_rate_backs_off_without_contact() {
        let mut rate = CollcabRate::default();
        assert!(rate.tick());
        rate.update(false);
        rate.update(false);
        assert_eq!(rate.rate, 2);
        assert!(!rate.tick());
        assert!(!rate.tick());
        assert!(rate.tick());
        rate.update(true);
        assert_eq!(rate.rate, 0);
        for _ in 0..20 {
            rate.update(false);
        }
        assert_eq!(rate.rate, MAX_COLLCAB_RATE);
    }
}
