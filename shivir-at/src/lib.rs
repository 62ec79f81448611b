//! shivir-at library - Attendance tracker
//!
//! Face-recognition attendance eligibility and progression engine:
//! - `matcher`: closest-candidate face matching with confidence bands
//! - `progression`: curriculum eligibility and level advancement rules
//! - `cooldown`: minimum time between markings
//! - `ledger` / `repeater`: day-advance state machine and repeat visits
//! - `engine`: the full pipeline for one recognition event
//! - `messages`: English/Hindi text for each outcome

pub mod cooldown;
pub mod db;
pub mod engine;
pub mod ledger;
pub mod matcher;
pub mod messages;
pub mod progression;
pub mod repeater;
pub mod settings;

pub use engine::AttendanceEngine;
pub use matcher::{MatchThresholds, MatchVerdict};
pub use settings::{load_engine_config, CooldownScope, EngineConfig};
