//! Serde layout of a scene document. Cross-actor references are indices
//! into [`SaveDocument::actors`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::SAVEGAME_FORMAT_VERSION;
use crate::core::engine::ShiftMode;
use crate::core::types::ActorState;
use crate::core::vehicle::{Controls, Lights};
use crate::error::SaveError;
use crate::linkage::hooks::HookState;
use crate::linkage::ropes::RopeState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveDocument {
    pub format_version: i32,
    pub terrain_name: String,
    pub scene_name: String,
    #[serde(default)]
    pub forced_awake: bool,
    #[serde(default)]
    pub physics_paused: bool,
    pub player_position: Vec3,
    /// Heading of the player character in radians.
    pub player_rotation: f32,
    /// Actor the player is driving, if any.
    #[serde(default)]
    pub player_actor: Option<usize>,
    #[serde(default)]
    pub sim_time: f64,
    pub actors: Vec<ActorSave>,
}

impl SaveDocument {
    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses `json` and rejects documents written by another format version.
    pub fn from_json(json: &str) -> Result<Self, SaveError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let found = value
            .get("format_version")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(-1) as i32;
        if found != SAVEGAME_FORMAT_VERSION {
            return Err(SaveError::FormatVersion {
                expected: SAVEGAME_FORMAT_VERSION,
                found,
            });
        }
        let doc: SaveDocument = serde_json::from_value(value)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Every partner index must point at an entry of this document.
    pub fn validate(&self) -> Result<(), SaveError> {
        let count = self.actors.len();
        let check = |actor: usize, what: &str, index: Option<usize>| match index {
            Some(i) if i >= count => Err(SaveError::InvalidReference {
                actor,
                detail: format!("{what} refers to actor {i} of {count}"),
            }),
            _ => Ok(()),
        };
        if let Some(p) = self.player_actor {
            check(count, "player", Some(p))?;
        }
        for (i, a) in self.actors.iter().enumerate() {
            for (h, hook) in a.hooks.iter().enumerate() {
                check(i, &format!("hook {h}"), hook.locked_actor)?;
            }
            for (t, tie) in a.ties.iter().enumerate() {
                check(i, &format!("tie {t}"), tie.locked_actor)?;
            }
            for (r, rope) in a.ropes.iter().enumerate() {
                check(i, &format!("rope {r}"), rope.locked_actor)?;
            }
            for (b, beam) in a.beams.iter().enumerate() {
                check(i, &format!("beam {b}"), beam.locked_actor)?;
            }
        }
        Ok(())
    }
}

/// Template identity; a live actor matching it is reused on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub filename: String,
    #[serde(default)]
    pub skin: Option<String>,
    #[serde(default)]
    pub section_config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSave {
    #[serde(flatten)]
    pub identity: ActorIdentity,
    pub state: ActorState,
    pub position: Vec3,
    pub origin: Vec3,
    pub scale: f32,
    #[serde(default)]
    pub engine: Option<EngineSave>,
    pub cruise: CruiseSave,
    pub controls: Controls,
    pub lights: Lights,
    #[serde(default)]
    pub hydro_dir_state: f32,
    pub aero_engines: Vec<AeroEngineSave>,
    pub screwprops: Vec<ScrewPropSave>,
    pub rotator_angles: Vec<f32>,
    pub wheels_detached: Vec<bool>,
    pub wheel_diffs: Vec<usize>,
    pub axle_diffs: Vec<usize>,
    #[serde(default)]
    pub transfer_case: Option<TransferCaseSave>,
    pub commands: Vec<CommandSave>,
    pub hooks: Vec<HookSave>,
    pub ties: Vec<TieSave>,
    pub ropes: Vec<RopeSave>,
    pub ropables: Vec<RopableSave>,
    pub nodes: Vec<NodeSave>,
    pub beams: Vec<BeamSave>,
    pub prop_anim_keys: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSave {
    pub rpm: f32,
    pub acc: f32,
    pub clutch: f32,
    pub gear: i32,
    pub running: bool,
    pub contact: bool,
    pub shift_mode: ShiftMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CruiseSave {
    pub mode: bool,
    pub target_speed: f32,
    pub target_rpm: f32,
    pub speed_limiter: bool,
    pub speed_limit: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AeroEngineSave {
    pub throttle: f32,
    pub rpm: f32,
    pub ignition: bool,
    pub failed: bool,
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrewPropSave {
    pub throttle: f32,
    pub rudder: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCaseSave {
    pub four_wd: bool,
    pub active_ratio: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSave {
    pub command_value: f32,
    /// Per bound beam: auto-moving mode and centering mode.
    pub beams: Vec<CommandBeamSave>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandBeamSave {
    pub auto_moving_mode: i8,
    pub pressed_center_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookSave {
    pub state: HookState,
    pub locked_actor: Option<usize>,
    pub locked_node: Option<usize>,
    pub timer: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieSave {
    pub tied: bool,
    pub tying: bool,
    pub locked_actor: Option<usize>,
    pub locked_ropable: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RopeSave {
    pub state: RopeState,
    pub locked_actor: Option<usize>,
    pub locked_ropable: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RopableSave {
    pub attached_ties: u32,
    pub attached_ropes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSave {
    pub position: Vec3,
    pub velocity: Vec3,
    pub initial_position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamSave {
    pub p2: usize,
    pub length: f32,
    pub ref_length: f32,
    pub stress: f32,
    pub max_pos_stress: f32,
    pub max_neg_stress: f32,
    pub min_max_pos_neg_stress: f32,
    pub strength: f32,
    pub plastic_coef: f32,
    pub broken: bool,
    pub disabled: bool,
    pub inter_actor: bool,
    pub locked_actor: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_doc() -> SaveDocument {
        SaveDocument {
            format_version: SAVEGAME_FORMAT_VERSION,
            terrain_name: "flat".into(),
            scene_name: "test".into(),
            forced_awake: false,
            physics_paused: false,
            player_position: Vec3::ZERO,
            player_rotation: 0.0,
            player_actor: None,
            sim_time: 0.0,
            actors: Vec::new(),
        }
    }

    #[test]
    fn other_version_is_rejected() {
        let mut doc = empty_doc();
        doc.format_version = SAVEGAME_FORMAT_VERSION + 1;
        let json = serde_json::to_string(&doc).expect("serialize");
        assert!(matches!(
            SaveDocument::from_json(&json),
            Err(SaveError::FormatVersion { found, .. }) if found == SAVEGAME_FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(SaveDocument::from_json("{not json"), Err(SaveError::Json(_))));
    }

    #[test]
    fn dangling_player_is_rejected() {
        let mut doc = empty_doc();
        doc.player_actor = Some(3);
        assert!(matches!(doc.validate(), Err(SaveError::InvalidReference { .. })));
    }

    #[test]
    fn clock_survives_the_document_bit_exact() {
        let tick = f64::from(crate::config::DEFAULT_PHYSICS_DT);
        for sim_time in [0.020000000949949026, tick * 40.0, tick * 123_457.0, 1.0 / 3.0] {
            let mut doc = empty_doc();
            doc.sim_time = sim_time;
            let json = doc.to_json().expect("serialize");
            let back = SaveDocument::from_json(&json).expect("parse");
            assert_eq!(back.sim_time.to_bits(), sim_time.to_bits(), "clock {sim_time}");
        }
    }
}
