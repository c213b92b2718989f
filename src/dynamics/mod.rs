//! Per-tick dynamics: forces, beams, shocks and triggers, actuators, integration.

pub mod animators;
pub mod autotune;
pub mod beams;
pub mod commands;
pub mod cruise;
pub mod forces;
pub mod hydros;
pub mod integrator;
pub mod rotators;
pub mod shocks;
pub mod triggers;
pub mod wheels;

pub use autotune::{search_beam_defaults, TuneReport, TuneSettings};
pub use beams::{beam_kernel, calc_beams, BeamForce, BeamPassReport};
pub use forces::{BuoyancyForce, DragForce, ForceGenerator, ForceRegistry, GravityForce};
pub use integrator::{IntegrationReport, Integrator};
pub use triggers::{TriggerEvent, TriggerQueue};
