//! Hoplite - a deterministic hex tactics simulation core
//!
//! This crate provides the engine behind a turn-based tactical battle on a
//! hexagonal battlefield, including:
//! - Hex geometry and A* pathfinding over the 88-cell board
//! - Entities built from per-type templates, with stable never-reused ids
//! - Priority-list ability resolution for autonomous entities
//! - Reversible actions with validate/execute/rollback
//! - A reaction cascade and a turn engine with full undo/redo history
//!
//! # Architecture
//!
//! State changes only through `Action::execute` inside the [`engine`]. Every
//! committed turn can be rolled back exactly, and a history exported in the
//! record format replays to the same game from an empty engine.
//!
//! # Modules
//!
//! - [`hex`]: Axial coordinates, directions and shape queries
//! - [`pathfinding`]: Deterministic A* toward a goal set
//! - [`entity`]: Entities, templates and the id-assigning factory
//! - [`board`]: Cell occupancy plus turn order
//! - [`abilities`]: Decision and targeting logic per ability
//! - [`actions`]: The reversible action model
//! - [`reactions`]: Follow-up rules (slash, lunge, die)
//! - [`engine`]: Turn recording, playback and observers
//! - [`records`]: The logical history format
//! - [`level`]: Opening turns for generated levels

pub mod abilities;
pub mod actions;
pub mod board;
pub mod engine;
pub mod entity;
pub mod hex;
pub mod level;
pub mod pathfinding;
pub mod reactions;
pub mod records;

// Re-export commonly used types
pub use abilities::Ability;
pub use actions::{Action, ActionKind, Element};
pub use board::Board;
pub use engine::{Engine, EngineError, EngineStatus, Observer, Turn};
pub use entity::{
    Control, Cooldowns, Entity, EntityFactory, EntityId, EntityKind, EntityRecord, Team,
    Template, TemplateError, Templates,
};
pub use hex::{board_cells, Direction, HexCoord};
pub use level::{EnemyCount, LevelConfig, LevelError, LevelSpec, DEFAULT_HERO_START};
pub use pathfinding::{find_path, PathError};
pub use reactions::determine_reactions;
pub use records::{
    history_from_json, history_from_records, history_to_json, history_to_records, ActionRecord,
    RecordError, TurnRecord,
};
