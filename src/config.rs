//! Global configuration constants and runtime settings for the softbeam core.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Default gravity vector applied to every node (Y-up).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.807, 0.0];

/// Default physics timestep (in seconds). Beam stiffness assumes 2 kHz.
pub const DEFAULT_PHYSICS_DT: f32 = 1.0 / 2000.0;

/// Default spring constant used by beams and shock hard bumps.
pub const DEFAULT_SPRING: f32 = 9_000_000.0;

/// Default damping constant used by beams and shock hard bumps.
pub const DEFAULT_DAMP: f32 = 12_000.0;

/// Default viscous drag coefficient applied to every node.
pub const DEFAULT_DRAG: f32 = 0.05;

/// Default per-node minimum mass (kg).
pub const DEFAULT_MINIMASS: f32 = 50.0;

/// Mass given to the far node of every rope beam.
pub const ROPE_NODE_MASS: f32 = 100.0;

/// Beams never shrink below this rest length through plastic deformation.
pub const MIN_BEAM_LENGTH: f32 = 0.1;

/// Squared drift of node 0 from the physics origin that triggers recentring.
pub const ORIGIN_RECENTER_THRESHOLD_SQ: f32 = 10_000.0;

/// Padding added on every side of actor bounding boxes.
pub const BOUNDING_BOX_PADDING: f32 = 0.05;

/// Number of command keys available to an actor (1-based, slot 0 unused).
pub const MAX_COMMANDS: usize = 84;

/// Number of accelerator samples averaged by cruise control.
pub const CC_ACCS_WINDOW: usize = 30;

/// Minimum interval between two network snapshots of one actor.
pub const NET_UPDATE_INTERVAL_MS: i64 = 100;

/// Savegame documents carry this version; anything else is rejected.
pub const SAVEGAME_FORMAT_VERSION: i32 = 5;

/// Nodes in this lock group never accept hooks.
pub const DENY_LOCK_GROUP: i32 = 9999;

/// Node speed (m/s, roughly mach 20) above which an actor is considered exploded.
pub const MAX_NODE_SPEED: f32 = 6860.0;

/// Default collision range for cab triangles (m).
pub const DEFAULT_COLLISION_RANGE: f32 = 0.02;

/// Step length used by the displacement search (m).
pub const COLLISION_OFFSET_STEP: f32 = 0.05;

/// Cell size of the contact point grid (m).
pub const DEFAULT_POINT_GRID_CELL_SIZE: f32 = 1.0;

/// Runtime-tunable settings, loadable from a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Physics timestep in seconds.
    pub physics_dt: f32,
    /// Upper bound for physics steps per rendered frame (0 = unlimited).
    pub physics_fps_cap: u32,
    pub gravity: Vec3,
    pub trigger_debug: bool,
    pub beam_break_debug: bool,
    pub debug_mass: bool,
    pub intra_collisions: bool,
    pub inter_collisions: bool,
    pub collision_range: f32,
    /// Skip `loaded_mass` nodes when clamping to the minimum mass.
    pub minimass_skip_loaded_nodes: bool,
    /// Named feature toggles such as `"Background Loading"` or `"REPO_MODE"`.
    pub features: BTreeMap<String, bool>,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            physics_dt: DEFAULT_PHYSICS_DT,
            physics_fps_cap: 0,
            gravity: Vec3::from_slice(&DEFAULT_GRAVITY),
            trigger_debug: false,
            beam_break_debug: false,
            debug_mass: false,
            intra_collisions: true,
            inter_collisions: true,
            collision_range: DEFAULT_COLLISION_RANGE,
            minimass_skip_loaded_nodes: false,
            features: BTreeMap::new(),
        }
    }
}

impl SimSettings {
    /// Parses settings from JSON, filling missing fields with defaults.
    pub fn from_json_str(text: &str) -> Result<Self, SettingsError> {
        let settings: SimSettings = serde_json::from_str(text)?;
        if !(settings.physics_dt > 0.0 && settings.physics_dt.is_finite()) {
            return Err(SettingsError::InvalidTimestep(settings.physics_dt));
        }
        Ok(settings)
    }

    /// Looks up a named feature toggle; unknown names are disabled.
    pub fn feature(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }

    pub fn set_feature(&mut self, name: impl Into<String>, enabled: bool) {
        self.features.insert(name.into(), enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_parse_with_defaults_and_features() {
        let settings = SimSettings::from_json_str(
            r#"{ "physics_dt": 0.001, "features": { "REPO_MODE": true } }"#,
        )
        .expect("valid settings");
        assert!((settings.physics_dt - 0.001).abs() < 1e-9);
        assert!(settings.feature("REPO_MODE"));
        assert!(!settings.feature("Background Loading"));
        assert!(settings.inter_collisions);
    }

    #[test]
    fn settings_reject_non_positive_timestep() {
        let err = SimSettings::from_json_str(r#"{ "physics_dt": 0.0 }"#).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidTimestep(_)));
    }
}
