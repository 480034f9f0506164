//! Level population.
//!
//! A level turns into a single opening Turn: the hero spawns at a fixed
//! start cell, then each configured enemy spawns on a distinct random cell
//! that is empty on the given board. The rng is supplied by the caller so
//! seeded runs reproduce.

use crate::actions::Action;
use crate::board::Board;
use crate::engine::Turn;
use crate::entity::{EntityFactory, EntityKind, TemplateError};
use crate::hex::{board_cells, HexCoord};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Where the hero starts unless configured otherwise
pub const DEFAULT_HERO_START: HexCoord = HexCoord::new(5, 0);

/// Errors from level population
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("Unknown level {0}")]
    UnknownLevel(u32),

    #[error("Level needs {needed} free cells but only {available} exist")]
    NotEnoughRoom { needed: usize, available: usize },

    #[error("Invalid hero start {0}")]
    InvalidStart(HexCoord),

    #[error("Hero start {0} is already occupied")]
    StartOccupied(HexCoord),

    #[error("{0} future turns must be replayed or discarded first")]
    PendingTurns(usize),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Invalid level JSON: {0}")]
    Json(String),
}

/// How many enemies of one type a level holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyCount {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub count: usize,
}

/// One level's roster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    #[serde(default)]
    pub enemies: Vec<EnemyCount>,
}

impl LevelSpec {
    fn with(enemies: &[(EntityKind, usize)]) -> Self {
        Self {
            enemies: enemies
                .iter()
                .map(|&(kind, count)| EnemyCount { kind, count })
                .collect(),
        }
    }

    /// Total number of enemies
    pub fn enemy_total(&self) -> usize {
        self.enemies.iter().map(|enemy| enemy.count).sum()
    }
}

fn default_hero_start() -> HexCoord {
    DEFAULT_HERO_START
}

/// Level table plus the hero start cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    #[serde(default = "default_hero_start")]
    pub hero_start: HexCoord,
    pub levels: BTreeMap<u32, LevelSpec>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        use EntityKind::*;

        let mut levels = BTreeMap::new();
        levels.insert(1, LevelSpec::with(&[(Footman, 2)]));
        levels.insert(2, LevelSpec::with(&[(Footman, 2), (Archer, 1)]));
        levels.insert(
            3,
            LevelSpec::with(&[(Footman, 2), (Archer, 1), (Wizard, 1)]),
        );
        levels.insert(
            4,
            LevelSpec::with(&[(Footman, 3), (Archer, 1), (Wizard, 1), (Bomber, 1)]),
        );
        Self {
            hero_start: DEFAULT_HERO_START,
            levels,
        }
    }
}

impl LevelConfig {
    /// Parse a level table from JSON
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        serde_json::from_str(json).map_err(|e| LevelError::Json(e.to_string()))
    }

    pub fn level(&self, key: u32) -> Option<&LevelSpec> {
        self.levels.get(&key)
    }

    /// Opening turn for level `key` on top of `board`
    pub fn populate<R: Rng>(
        &self,
        key: u32,
        board: &Board,
        factory: &mut EntityFactory,
        rng: &mut R,
    ) -> Result<Turn, LevelError> {
        let spec = self.level(key).ok_or(LevelError::UnknownLevel(key))?;
        if !self.hero_start.is_valid() {
            return Err(LevelError::InvalidStart(self.hero_start));
        }
        if board.is_occupied(self.hero_start) {
            return Err(LevelError::StartOccupied(self.hero_start));
        }

        let mut free: Vec<HexCoord> = board_cells()
            .filter(|cell| *cell != self.hero_start && !board.is_occupied(*cell))
            .collect();
        let needed = spec.enemy_total();
        if needed > free.len() {
            return Err(LevelError::NotEnoughRoom {
                needed,
                available: free.len(),
            });
        }
        free.shuffle(rng);

        let hero = Action::spawn(factory.create(EntityKind::Hero)?, self.hero_start);
        let mut enemies = Vec::with_capacity(needed);
        let mut cells = free.into_iter();
        for enemy in &spec.enemies {
            for _ in 0..enemy.count {
                let entity = factory.create(enemy.kind)?;
                if let Some(cell) = cells.next() {
                    enemies.push(Action::spawn(entity, cell));
                }
            }
        }

        Ok(Turn::starting_with(hero, enemies))
    }
}
