//! Headless game session.
//!
//! A session owns one engine, seeds it from a saved history or a generated
//! level, and advances it until the game ends, the hero needs input that the
//! script does not provide, or the turn limit is hit.

use hoplite_core::{
    history_to_json, ActionRecord, Engine, EngineError, EngineStatus, EntityId, LevelConfig,
    LevelError, RecordError, Team, TemplateError, Templates, TurnRecord,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid value '{value}' for {name}")]
    InvalidSetting { name: &'static str, value: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Level(#[from] LevelError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Runner settings, read from `HOPLITE_*` environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Saved history to resume instead of generating a level
    pub history: Option<PathBuf>,
    pub level: u32,
    pub seed: u64,
    /// Upper bound on turns recorded by one run
    pub max_turns: usize,
    /// JSON list of scripted hero action records
    pub input: Option<PathBuf>,
    pub templates: Option<PathBuf>,
    pub levels: Option<PathBuf>,
    /// Autosave destination; stdout when unset
    pub autosave: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history: None,
            level: 1,
            seed: 0,
            max_turns: 200,
            input: None,
            templates: None,
            levels: None,
            autosave: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SessionError> {
        let defaults = Self::default();
        let path = |name: &str| lookup(name).map(PathBuf::from);

        Ok(Self {
            history: path("HOPLITE_HISTORY"),
            level: parse_setting("HOPLITE_LEVEL", lookup("HOPLITE_LEVEL"), defaults.level)?,
            seed: parse_setting("HOPLITE_SEED", lookup("HOPLITE_SEED"), defaults.seed)?,
            max_turns: parse_setting(
                "HOPLITE_MAX_TURNS",
                lookup("HOPLITE_MAX_TURNS"),
                defaults.max_turns,
            )?,
            input: path("HOPLITE_INPUT"),
            templates: path("HOPLITE_TEMPLATES"),
            levels: path("HOPLITE_LEVELS"),
            autosave: path("HOPLITE_AUTOSAVE"),
        })
    }
}

fn parse_setting<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, SessionError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| SessionError::InvalidSetting { name, value }),
    }
}

fn read(path: &Path) -> Result<String, SessionError> {
    std::fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Why `advance` stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Finished { winner: Team },
    AwaitingInput { entity: EntityId },
    TurnLimit,
    Empty,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Finished { winner } => write!(f, "{} wins", winner),
            Outcome::AwaitingInput { entity } => write!(f, "waiting for {}", entity),
            Outcome::TurnLimit => f.write_str("turn limit reached"),
            Outcome::Empty => f.write_str("board is empty"),
        }
    }
}

pub struct Session {
    engine: Engine,
    script: VecDeque<ActionRecord>,
    max_turns: usize,
}

impl Session {
    /// Set up an engine from `config`
    pub fn start(config: &Config) -> Result<Self, SessionError> {
        let templates = match &config.templates {
            Some(path) => Templates::from_json(&read(path)?)?,
            None => Templates::standard(),
        };
        let mut engine = Engine::with_templates(templates);

        match &config.history {
            Some(path) => {
                let records: Vec<TurnRecord> =
                    serde_json::from_str(&read(path)?).map_err(RecordError::from)?;
                engine.load_history(&records)?;
                info!(path = %path.display(), turns = records.len(), "resuming history");
            }
            None => {
                let levels = match &config.levels {
                    Some(path) => LevelConfig::from_json(&read(path)?)?,
                    None => LevelConfig::default(),
                };
                let mut rng = StdRng::seed_from_u64(config.seed);
                engine.populate_level(&levels, config.level, &mut rng)?;
            }
        }

        let script = match &config.input {
            Some(path) => {
                serde_json::from_str::<Vec<ActionRecord>>(&read(path)?).map_err(RecordError::from)?
            }
            None => Vec::new(),
        };

        Ok(Self {
            engine,
            script: script.into(),
            max_turns: config.max_turns,
        })
    }

    /// Replace the scripted hero input
    pub fn with_script(mut self, script: Vec<ActionRecord>) -> Self {
        self.script = script.into();
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Scripted records not yet consumed
    pub fn remaining_script(&self) -> usize {
        self.script.len()
    }

    /// Play until the game ends, input runs out, or the turn limit is hit
    pub fn advance(&mut self) -> Result<Outcome, SessionError> {
        let mut recorded = 0;

        loop {
            match self.engine.status() {
                EngineStatus::Replaying => self.engine.fast_forward(),
                EngineStatus::Finished { winner } => return Ok(Outcome::Finished { winner }),
                EngineStatus::Empty => return Ok(Outcome::Empty),
                EngineStatus::AwaitingInput { entity } => {
                    let Some(record) = self.script.pop_front() else {
                        return Ok(Outcome::AwaitingInput { entity });
                    };
                    let action = record.to_action(self.engine.factory_mut())?;
                    debug!(%entity, %action, "scripted input");
                    self.engine.supply_input(action);
                }
                EngineStatus::Ready { next } => {
                    if recorded >= self.max_turns {
                        return Ok(Outcome::TurnLimit);
                    }
                    match self.engine.record() {
                        Ok(()) => recorded += 1,
                        Err(EngineError::InvalidMove { entity, action }) => {
                            // The rejected input is consumed; the next scripted record gets a try
                            warn!(%entity, %action, "scripted input rejected");
                        }
                        Err(e) => {
                            warn!(entity = %next, error = %e, "record failed");
                            return Err(e.into());
                        }
                    }
                }
            }
        }
    }

    /// The applied history as pretty-printed JSON
    pub fn autosave(&self) -> Result<String, SessionError> {
        Ok(history_to_json(self.engine.past())?)
    }
}
