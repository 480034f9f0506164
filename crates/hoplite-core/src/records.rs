//! Logical history and level records.
//!
//! A history is a list of turns; a turn is a list of
//! `{"type": ..., "element": ..., "target": [q, r]}` objects. The element is
//! an entity id string, except for Spawn where it is a nested entity
//! descriptor. Decoding fails fast: an unknown type or a malformed element is
//! an error, never skipped.

use crate::actions::{Action, ActionKind, Element};
use crate::engine::Turn;
use crate::entity::{EntityFactory, EntityId, EntityRecord};
use crate::hex::HexCoord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors from decoding or encoding records
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Unknown action type '{0}'")]
    UnknownActionType(String),

    #[error("Invalid element for {kind}: {reason}")]
    InvalidElement { kind: ActionKind, reason: String },

    #[error("Invalid record JSON: {0}")]
    Json(String),

    #[error("Turn contains no actions")]
    EmptyTurn,

    #[error("Invalid target {target} for {kind}")]
    InvalidTarget { kind: ActionKind, target: HexCoord },

    #[error("Spawn target {0} is already occupied")]
    CellOccupied(HexCoord),

    #[error("Entity id {0} is spawned more than once")]
    DuplicateId(EntityId),
}

impl From<serde_json::Error> for RecordError {
    fn from(e: serde_json::Error) -> Self {
        RecordError::Json(e.to_string())
    }
}

/// One action as stored in a history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub element: Value,
    pub target: [i32; 2],
}

/// One turn as stored in a history
pub type TurnRecord = Vec<ActionRecord>;

impl ActionRecord {
    /// Record referring to an entity by id
    pub fn new(kind: ActionKind, element: EntityId, target: HexCoord) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            element: Value::String(element.to_string()),
            target: target.into(),
        }
    }

    /// Decode into an action.
    ///
    /// Spawn descriptors are built through `factory`, so their ids are
    /// reserved there.
    pub fn to_action(&self, factory: &mut EntityFactory) -> Result<Action, RecordError> {
        let kind: ActionKind = self.kind.parse()?;
        let target = HexCoord::from(self.target);
        let invalid = |reason: String| RecordError::InvalidElement { kind, reason };

        if kind == ActionKind::Spawn {
            if !target.is_valid() {
                return Err(RecordError::InvalidTarget { kind, target });
            }
            let descriptor: EntityRecord = serde_json::from_value(self.element.clone())
                .map_err(|e| invalid(e.to_string()))?;
            let entity = factory
                .build(descriptor)
                .map_err(|e| invalid(e.to_string()))?;
            return Ok(Action::spawn(entity, target));
        }

        let id = match &self.element {
            Value::String(id) => id.as_str(),
            // A full descriptor is accepted; only its id matters here
            Value::Object(fields) => fields
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("descriptor has no id".to_string()))?,
            other => return Err(invalid(format!("expected an entity id, found {}", other))),
        };
        let id = id
            .parse::<EntityId>()
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Action::new(kind, id, target))
    }
}

impl Action {
    /// Encode this action in the record format
    pub fn to_record(&self) -> Result<ActionRecord, RecordError> {
        let element = match self.element() {
            Element::Spawn(entity) => serde_json::to_value(entity.to_record())?,
            Element::Ref(id) => Value::String(id.to_string()),
        };
        Ok(ActionRecord {
            kind: self.kind().as_str().to_string(),
            element,
            target: self.target().into(),
        })
    }
}

/// Decode one turn, rejecting empty turns
pub fn turn_from_records(
    records: &[ActionRecord],
    factory: &mut EntityFactory,
) -> Result<Turn, RecordError> {
    let actions = records
        .iter()
        .map(|record| record.to_action(factory))
        .collect::<Result<Vec<_>, _>>()?;
    Turn::new(actions).ok_or(RecordError::EmptyTurn)
}

/// Decode a whole history.
///
/// An id may be spawned at most once across the history.
pub fn history_from_records(
    records: &[TurnRecord],
    factory: &mut EntityFactory,
) -> Result<Vec<Turn>, RecordError> {
    let turns = records
        .iter()
        .map(|turn| turn_from_records(turn, factory))
        .collect::<Result<Vec<_>, _>>()?;

    let mut spawned = BTreeSet::new();
    for id in turns.iter().flat_map(Turn::spawned_ids) {
        if !spawned.insert(id) {
            return Err(RecordError::DuplicateId(id));
        }
    }
    Ok(turns)
}

/// Encode turns in the record format
pub fn history_to_records<'a>(
    turns: impl IntoIterator<Item = &'a Turn>,
) -> Result<Vec<TurnRecord>, RecordError> {
    turns.into_iter().map(Turn::to_records).collect()
}

/// Parse a JSON history
pub fn history_from_json(
    json: &str,
    factory: &mut EntityFactory,
) -> Result<Vec<Turn>, RecordError> {
    let records: Vec<TurnRecord> = serde_json::from_str(json)?;
    history_from_records(&records, factory)
}

/// Serialize turns as pretty-printed JSON
pub fn history_to_json<'a>(
    turns: impl IntoIterator<Item = &'a Turn>,
) -> Result<String, RecordError> {
    let records = history_to_records(turns)?;
    Ok(serde_json::to_string_pretty(&records)?)
}
