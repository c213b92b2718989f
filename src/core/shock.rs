use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DAMP, DEFAULT_SPRING};

/// Progressive shock rates, separate for extension (out) and compression (in).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shock2Params {
    pub spring_in: f32,
    pub damp_in: f32,
    pub sprog_in: f32,
    pub dprog_in: f32,
    pub spring_out: f32,
    pub damp_out: f32,
    pub sprog_out: f32,
    pub dprog_out: f32,
    /// Blend toward the bump rates close to and past the bound.
    pub soft_bump: bool,
}

/// Split-rate shock: slow/fast damping either side of a split velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shock3Params {
    pub spring_in: f32,
    pub damp_in: f32,
    pub spring_out: f32,
    pub damp_out: f32,
    pub split_in: f32,
    pub dslow_in: f32,
    pub dfast_in: f32,
    pub split_out: f32,
    pub dslow_out: f32,
    pub dfast_out: f32,
}

/// Engine inputs a trigger beam can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineTriggerKind {
    Clutch,
    Brake,
    Accelerator,
    RpmControl,
    ShiftUp,
    ShiftDown,
}

/// Side effect selected for a trigger beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TriggerAction {
    /// Feeds the trigger input of command key `cmd_short` or `cmd_long`.
    Command,
    /// Disables the next `range` trigger beams while outside bounds.
    Blocker { range: usize },
    /// Enables the next `range` trigger beams while outside bounds.
    InvertedBlocker { range: usize },
    /// Blocks the trigger input of both command keys while outside bounds.
    CmdKeyBlocker,
    /// Swaps the command keys of the next `range` trigger beams.
    CmdSwitch { range: usize },
    HookLock { group: i32 },
    HookUnlock { group: i32 },
    Engine(EngineTriggerKind),
}

/// Last state a trigger logged, so transitions are logged once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerDebugState {
    Inside,
    PastShortBound,
    PastLongBound,
    Disabled,
}

/// Trigger-specific state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub action: TriggerAction,
    pub cmd_short: usize,
    pub cmd_long: usize,
    /// Cool-down applied after a command switch fires.
    pub boundary_time: f32,
    pub enabled: bool,
    pub switch_timer: f32,
    /// Set once the beam returned inside its bounds after the last switch.
    pub armed: bool,
    pub last_debug_state: Option<TriggerDebugState>,
    /// Emit a proportional value every tick instead of a 0/1 step.
    pub continuous: bool,
}

impl Trigger {
    pub fn new(action: TriggerAction, cmd_short: usize, cmd_long: usize) -> Self {
        Self {
            action,
            cmd_short,
            cmd_long,
            boundary_time: 1.0,
            enabled: true,
            switch_timer: 0.0,
            armed: true,
            last_debug_state: None,
            continuous: false,
        }
    }

    pub fn with_boundary_time(mut self, boundary_time: f32) -> Self {
        self.boundary_time = boundary_time;
        self
    }

    pub fn continuous(mut self) -> Self {
        self.continuous = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShockKind {
    /// Beam k/d inside the bounds, fixed bump rates outside.
    Shock1,
    Shock2(Shock2Params),
    Shock3(Shock3Params),
    Trigger(Trigger),
}

/// Non-linear response extension owned by exactly one beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shock {
    pub beam: usize,
    pub kind: ShockKind,
    /// Bump spring rate used past the bounds.
    pub sbd_spring: f32,
    /// Bump damping rate used past the bounds.
    pub sbd_damp: f32,
    pub last_spring: f32,
    pub last_damp: f32,
    /// Initial trigger state for resets.
    pub initial_kind: ShockKind,
}

impl Shock {
    pub fn new(beam: usize, kind: ShockKind) -> Self {
        Self {
            beam,
            kind,
            sbd_spring: DEFAULT_SPRING,
            sbd_damp: DEFAULT_DAMP,
            last_spring: 0.0,
            last_damp: 0.0,
            initial_kind: kind,
        }
    }

    pub fn with_bump(mut self, sbd_spring: f32, sbd_damp: f32) -> Self {
        self.sbd_spring = sbd_spring;
        self.sbd_damp = sbd_damp;
        self
    }

    pub fn trigger(&self) -> Option<&Trigger> {
        match &self.kind {
            ShockKind::Trigger(trigger) => Some(trigger),
            _ => None,
        }
    }

    pub fn trigger_mut(&mut self) -> Option<&mut Trigger> {
        match &mut self.kind {
            ShockKind::Trigger(trigger) => Some(trigger),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.kind = self.initial_kind;
        self.last_spring = 0.0;
        self.last_damp = 0.0;
    }
}
