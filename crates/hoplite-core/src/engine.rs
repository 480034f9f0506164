//! Turn engine.
//!
//! This module contains the `Engine`, which owns the authoritative board and
//! the history of committed turns:
//! - `record` asks the head of the turn order for a decision, expands the
//!   reaction cascade on a working copy, and commits the result as a `Turn`
//! - `step_forward` / `step_backward` move single turns between `future`
//!   and `past`, executing or rolling back every action
//! - observers see a snapshot of the board before each executed action
//!
//! A directed entity with no supplied decision suspends `record` with
//! `EngineError::RequiresInput`; nothing is mutated before that point, so the
//! call can be retried once input arrives.

use crate::actions::{Action, ActionKind, Element};
use crate::board::Board;
use crate::entity::{Control, EntityFactory, EntityId, Team, Templates};
use crate::level::{LevelConfig, LevelError};
use crate::reactions::determine_reactions;
use crate::records::{history_from_records, history_to_records, RecordError, TurnRecord};
use rand::Rng;
use std::collections::{BTreeSet, VecDeque};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur when recording turns
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("{entity} requires input")]
    RequiresInput { entity: EntityId },

    #[error("{action} is not permitted for {entity}")]
    InvalidMove {
        entity: EntityId,
        action: Box<Action>,
    },

    #[error("Cannot record a turn while future turns exist")]
    FutureNotEmpty,

    #[error("No entities left to act")]
    NoActors,

    #[error("{0} is in the turn order but not on the board")]
    MissingEntity(EntityId),
}

impl EngineError {
    /// Whether this is the suspend signal rather than a failure
    pub fn is_suspension(&self) -> bool {
        matches!(self, EngineError::RequiresInput { .. })
    }
}

/// A root action plus its fully expanded reactions, committed atomically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn(Vec<Action>);

impl Turn {
    /// A turn from `actions`, or `None` if there are none
    pub fn new(actions: Vec<Action>) -> Option<Self> {
        if actions.is_empty() {
            None
        } else {
            Some(Turn(actions))
        }
    }

    /// A turn led by `root`
    pub fn starting_with(root: Action, rest: Vec<Action>) -> Self {
        let mut actions = Vec::with_capacity(rest.len() + 1);
        actions.push(root);
        actions.extend(rest);
        Turn(actions)
    }

    pub fn actions(&self) -> &[Action] {
        &self.0
    }

    /// The action that started this turn
    pub fn root(&self) -> &Action {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.0.iter()
    }

    /// Encode in the record format
    pub fn to_records(&self) -> Result<TurnRecord, RecordError> {
        self.0.iter().map(Action::to_record).collect()
    }

    /// Ids of the entities this turn brings onto the board
    pub(crate) fn spawned_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.0.iter().filter_map(|action| match action.element() {
            Element::Spawn(entity) => Some(entity.id()),
            Element::Ref(_) => None,
        })
    }
}

/// Receives every executed action during forward playback
pub trait Observer {
    /// Called before `action` executes; `snapshot` is the board at that point
    fn on_action(&mut self, snapshot: &Board, action: &Action);
}

impl<F> Observer for F
where
    F: FnMut(&Board, &Action),
{
    fn on_action(&mut self, snapshot: &Board, action: &Action) {
        self(snapshot, action)
    }
}

/// What the engine would do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// Future turns are waiting to be replayed
    Replaying,
    /// Only one team remains
    Finished { winner: Team },
    /// Nobody is on the board
    Empty,
    /// The next entity needs a supplied decision
    AwaitingInput { entity: EntityId },
    /// `record` can run for this entity
    Ready { next: EntityId },
}

/// The turn engine
pub struct Engine {
    /// Authoritative battlefield state
    board: Board,
    /// Applied turns, oldest first
    past: Vec<Turn>,
    /// Pending or undone turns, next first
    future: VecDeque<Turn>,
    observers: Vec<Box<dyn Observer>>,
    /// Id allocation for spawned entities
    factory: EntityFactory,
    /// Decision for the next directed entity
    input: Option<Action>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with the built-in templates and an empty board
    pub fn new() -> Self {
        Self::with_templates(Templates::standard())
    }

    pub fn with_templates(templates: Templates) -> Self {
        Self {
            board: Board::new(),
            past: Vec::new(),
            future: VecDeque::new(),
            observers: Vec::new(),
            factory: EntityFactory::new(templates),
            input: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn past(&self) -> &[Turn] {
        &self.past
    }

    pub fn future(&self) -> &VecDeque<Turn> {
        &self.future
    }

    pub fn factory(&self) -> &EntityFactory {
        &self.factory
    }

    /// Factory used for new entities, so externally built spawns share ids
    pub fn factory_mut(&mut self) -> &mut EntityFactory {
        &mut self.factory
    }

    /// Register an observer for forward playback
    pub fn subscribe(&mut self, observer: impl Observer + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Store a decision for the next directed entity
    pub fn supply_input(&mut self, action: Action) {
        self.input = Some(action);
    }

    pub fn pending_input(&self) -> Option<&Action> {
        self.input.as_ref()
    }

    /// Whether only one team remains on the board
    pub fn is_finished(&self) -> bool {
        self.board.is_decided()
    }

    pub fn winner(&self) -> Option<Team> {
        self.board.winner()
    }

    pub fn status(&self) -> EngineStatus {
        if !self.future.is_empty() {
            return EngineStatus::Replaying;
        }
        if let Some(winner) = self.board.winner() {
            return EngineStatus::Finished { winner };
        }
        match self.board.head() {
            None => EngineStatus::Empty,
            Some(next) => {
                let directed = self
                    .board
                    .locate(next)
                    .is_some_and(|(_, entity)| entity.control() == Control::Directed);
                if directed && self.input.is_none() {
                    EngineStatus::AwaitingInput { entity: next }
                } else {
                    EngineStatus::Ready { next }
                }
            }
        }
    }

    /// Append a turn to the future
    pub fn queue_turn(&mut self, turn: Turn) {
        self.future.push_back(turn);
    }

    /// Drop all pending or undone turns
    pub fn discard_future(&mut self) {
        if !self.future.is_empty() {
            debug!(turns = self.future.len(), "discarding future");
            self.future.clear();
        }
    }

    /// Decode a history and queue it for replay.
    ///
    /// Nothing is queued, and no id is reserved, unless every turn decodes
    /// and every Spawn lands on a free cell with an id never used before.
    pub fn load_history(&mut self, records: &[TurnRecord]) -> Result<(), RecordError> {
        let mut factory = self.factory.clone();
        let turns = history_from_records(records, &mut factory)?;
        self.check_spawns(&turns)?;

        debug!(turns = turns.len(), "loaded history");
        self.factory = factory;
        self.future.extend(turns);
        Ok(())
    }

    /// Replay `turns` on a scratch board after the current future, checking
    /// each Spawn against the state it would meet
    fn check_spawns(&self, turns: &[Turn]) -> Result<(), RecordError> {
        let mut used: BTreeSet<EntityId> = self
            .past
            .iter()
            .chain(self.future.iter())
            .flat_map(Turn::spawned_ids)
            .collect();
        used.extend(self.board.occupants().map(|(_, entity)| entity.id()));

        let mut scratch = self.board.clone();
        for turn in self.future.iter() {
            scratch.rotate_forward();
            for action in turn.clone().0.iter_mut() {
                action.execute(&mut scratch);
            }
        }

        for turn in turns {
            scratch.rotate_forward();
            for action in turn.clone().0.iter_mut() {
                if action.kind() == ActionKind::Spawn {
                    let target = action.target();
                    if !target.is_valid() {
                        return Err(RecordError::InvalidTarget {
                            kind: ActionKind::Spawn,
                            target,
                        });
                    }
                    if scratch.is_occupied(target) {
                        return Err(RecordError::CellOccupied(target));
                    }
                    if !used.insert(action.actor()) {
                        return Err(RecordError::DuplicateId(action.actor()));
                    }
                }
                action.execute(&mut scratch);
            }
        }
        Ok(())
    }

    /// Applied turns in the record format
    pub fn export(&self) -> Result<Vec<TurnRecord>, RecordError> {
        history_to_records(&self.past)
    }

    /// Generate the opening turn of a level and queue it.
    ///
    /// Spawns avoid every occupied cell; pending future turns must be
    /// replayed or discarded first.
    pub fn populate_level<R: Rng>(
        &mut self,
        config: &LevelConfig,
        key: u32,
        rng: &mut R,
    ) -> Result<(), LevelError> {
        if !self.future.is_empty() {
            return Err(LevelError::PendingTurns(self.future.len()));
        }
        let turn = config.populate(key, &self.board, &mut self.factory, rng)?;
        info!(level = key, spawns = turn.len(), "populated level");
        self.queue_turn(turn);
        Ok(())
    }

    /// Resolve and commit one turn for the head of the turn order
    pub fn record(&mut self) -> Result<(), EngineError> {
        if !self.future.is_empty() {
            return Err(EngineError::FutureNotEmpty);
        }

        let head = self.board.head().ok_or(EngineError::NoActors)?;
        let (origin, actor) = self
            .board
            .locate(head)
            .ok_or(EngineError::MissingEntity(head))?;

        let misdirected = self
            .input
            .as_ref()
            .is_some_and(|input| input.actor() != head);
        if actor.control() == Control::Directed && misdirected {
            if let Some(input) = self.input.take() {
                warn!(entity = %head, action = %input, "input belongs to another entity");
                return Err(EngineError::InvalidMove {
                    entity: head,
                    action: Box::new(input),
                });
            }
        }

        let roots = actor
            .decide(origin, &self.board, &mut self.input)
            .ok_or(EngineError::RequiresInput { entity: head })?;
        if let Some(rejected) = roots
            .iter()
            .find(|action| !action.kind().is_decision() || !action.validate(&self.board))
        {
            warn!(entity = %head, action = %rejected, "rejected action");
            return Err(EngineError::InvalidMove {
                entity: head,
                action: Box::new(rejected.clone()),
            });
        }

        let mut pending: VecDeque<Action> = roots.into();
        if actor.cooldowns().any_active() {
            pending.push_back(Action::recharge(head, origin));
        }

        let mut working = self.board.clone();
        working.rotate_forward();

        let mut actions = Vec::with_capacity(pending.len());
        while let Some(mut action) = pending.pop_front() {
            // Reactions resolve before anything queued earlier in the turn
            for reaction in determine_reactions(&action, &working).into_iter().rev() {
                pending.push_front(reaction);
            }
            action.execute(&mut working);
            actions.push(action);
        }

        let turn = Turn(actions);
        debug!(entity = %head, actions = turn.len(), root = %turn.root(), "recorded turn");
        self.future.push_back(turn);
        self.step_forward();

        if let Some(winner) = self.winner() {
            info!(%winner, turns = self.past.len(), "finished");
        }
        Ok(())
    }

    /// Replay the next future turn. Returns false when there is none.
    pub fn step_forward(&mut self) -> bool {
        let Some(mut turn) = self.future.pop_front() else {
            return false;
        };

        self.board.rotate_forward();
        for action in turn.0.iter_mut() {
            if !self.observers.is_empty() {
                let snapshot = self.board.clone();
                for observer in self.observers.iter_mut() {
                    observer.on_action(&snapshot, action);
                }
            }
            action.execute(&mut self.board);
        }

        info!(turn = self.past.len(), root = %turn.root(), "committed turn");
        self.past.push(turn);
        true
    }

    /// Undo the last applied turn. Returns false when there is none.
    pub fn step_backward(&mut self) -> bool {
        let Some(mut turn) = self.past.pop() else {
            return false;
        };

        for action in turn.0.iter_mut().rev() {
            action.rollback(&mut self.board);
        }
        self.board.rotate_backward();

        debug!(turn = self.past.len(), root = %turn.root(), "rolled back turn");
        self.future.push_front(turn);
        true
    }

    /// Replay every future turn
    pub fn fast_forward(&mut self) {
        while self.step_forward() {}
    }

    /// Undo every applied turn
    pub fn rewind(&mut self) {
        while self.step_backward() {}
    }
}
