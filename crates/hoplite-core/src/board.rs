//! Battlefield state: who stands where, and who acts next.
//!
//! This module contains:
//! - The cell mapping (at most one entity per cell)
//! - The turn-order queue of entity ids
//! - Read-only queries used by abilities, actions and the engine
//!
//! Entities are stored behind `Arc` and mutated through `Arc::make_mut`, so
//! cloning a board for an observer snapshot shares every untouched entity.
//! Mutators are crate-private: state changes only through action execution.

use crate::entity::{Entity, EntityId, Team};
use crate::hex::HexCoord;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// Board state: cell occupancy plus turn order
#[derive(Debug, Clone, Default)]
pub struct Board {
    /// Occupants indexed by cell
    cells: BTreeMap<HexCoord, Arc<Entity>>,
    /// Entity ids in acting order; the head acts next
    turn_order: VecDeque<EntityId>,
}

impl Board {
    /// Create an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupant of a cell
    pub fn get(&self, cell: HexCoord) -> Option<&Entity> {
        self.cells.get(&cell).map(Arc::as_ref)
    }

    pub fn is_occupied(&self, cell: HexCoord) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Cell currently occupied by the entity with `id`
    pub fn find(&self, id: EntityId) -> Option<HexCoord> {
        self.cells
            .iter()
            .find(|(_, entity)| entity.id() == id)
            .map(|(cell, _)| *cell)
    }

    /// Entity with `id` together with its cell
    pub fn locate(&self, id: EntityId) -> Option<(HexCoord, &Entity)> {
        self.cells
            .iter()
            .find(|(_, entity)| entity.id() == id)
            .map(|(cell, entity)| (*cell, entity.as_ref()))
    }

    /// All occupied cells in `(q, r)` order
    pub fn occupants(&self) -> impl Iterator<Item = (HexCoord, &Entity)> {
        self.cells
            .iter()
            .map(|(cell, entity)| (*cell, entity.as_ref()))
    }

    pub fn entity_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn turn_order(&self) -> &VecDeque<EntityId> {
        &self.turn_order
    }

    /// Entity that acts next
    pub fn head(&self) -> Option<EntityId> {
        self.turn_order.front().copied()
    }

    /// Distinct teams among current occupants
    pub fn teams(&self) -> BTreeSet<&Team> {
        self.cells.values().map(|entity| entity.team()).collect()
    }

    /// Whether occupants span exactly one team
    pub fn is_decided(&self) -> bool {
        self.teams().len() == 1
    }

    /// The single remaining team, once the board is decided
    pub fn winner(&self) -> Option<Team> {
        let teams = self.teams();
        if teams.len() == 1 {
            teams.into_iter().next().cloned()
        } else {
            None
        }
    }

    /// Place an entity and append it to the turn order
    pub(crate) fn insert(&mut self, cell: HexCoord, entity: Entity) {
        self.insert_shared(cell, Arc::new(entity), None);
    }

    /// Place an entity, restoring it at a specific queue position when given
    pub(crate) fn insert_shared(
        &mut self,
        cell: HexCoord,
        entity: Arc<Entity>,
        queue_index: Option<usize>,
    ) {
        let id = entity.id();
        self.cells.insert(cell, entity);
        match queue_index {
            Some(index) if index <= self.turn_order.len() => self.turn_order.insert(index, id),
            _ => self.turn_order.push_back(id),
        }
    }

    /// Take the occupant of `cell` off the board entirely.
    ///
    /// Returns the entity and the queue position it held.
    pub(crate) fn remove(&mut self, cell: HexCoord) -> Option<(Arc<Entity>, Option<usize>)> {
        let entity = self.cells.remove(&cell)?;
        let index = self.turn_order.iter().position(|id| *id == entity.id());
        if let Some(index) = index {
            self.turn_order.remove(index);
        }
        Some((entity, index))
    }

    /// Relocate an occupant without touching the queue
    pub(crate) fn relocate(&mut self, from: HexCoord, to: HexCoord) -> bool {
        if from == to || self.cells.contains_key(&to) {
            return false;
        }
        match self.cells.remove(&from) {
            Some(entity) => {
                self.cells.insert(to, entity);
                true
            }
            None => false,
        }
    }

    /// Mutable access to the occupant of `cell`, cloning it if shared
    pub(crate) fn entity_mut(&mut self, cell: HexCoord) -> Option<&mut Entity> {
        self.cells.get_mut(&cell).map(Arc::make_mut)
    }

    /// Head moves to the tail
    pub(crate) fn rotate_forward(&mut self) {
        if let Some(id) = self.turn_order.pop_front() {
            self.turn_order.push_back(id);
        }
    }

    /// Tail moves back to the head
    pub(crate) fn rotate_backward(&mut self) {
        if let Some(id) = self.turn_order.pop_back() {
            self.turn_order.push_front(id);
        }
    }
}
