//! Reversible state transitions.
//!
//! An `Action` is a typed record {kind, element, target}. Every kind knows
//! how to validate itself against a board, execute, and roll back exactly
//! what it executed. Execution stores the data rollback needs (source cell
//! of a move, queue index of a removed entity, prior cooldowns) in a private
//! cache on the action itself.

use crate::abilities::{Ability, BEAM_RANGE, BOMB_RANGE, MIN_SHOOT_RANGE, SHOOT_RANGE};
use crate::board::Board;
use crate::entity::{Cooldowns, Entity, EntityId};
use crate::hex::HexCoord;
use crate::records::RecordError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Health removed by one attack
pub const ATTACK_DAMAGE: i32 = 1;

/// Kinds of action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    /// Bring a new entity onto the board
    Spawn,
    /// Step to an adjacent cell
    Move,
    /// Leap two cells
    Jump,
    Stab,
    Slash,
    Lunge,
    Shoot,
    WizardsBeam,
    ThrowBomb,
    Explode,
    BlastWave,
    /// Remove an entity from the board
    Die,
    /// Push an adjacent occupant
    Bash,
    /// Tick the actor's cooldowns
    Recharge,
    /// Do nothing
    Null,
}

impl ActionKind {
    pub const ALL: [ActionKind; 15] = [
        ActionKind::Spawn,
        ActionKind::Move,
        ActionKind::Jump,
        ActionKind::Stab,
        ActionKind::Slash,
        ActionKind::Lunge,
        ActionKind::Shoot,
        ActionKind::WizardsBeam,
        ActionKind::ThrowBomb,
        ActionKind::Explode,
        ActionKind::BlastWave,
        ActionKind::Die,
        ActionKind::Bash,
        ActionKind::Recharge,
        ActionKind::Null,
    ];

    /// Name used in records
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Spawn => "Spawn",
            ActionKind::Move => "Move",
            ActionKind::Jump => "Jump",
            ActionKind::Stab => "Stab",
            ActionKind::Slash => "Slash",
            ActionKind::Lunge => "Lunge",
            ActionKind::Shoot => "Shoot",
            ActionKind::WizardsBeam => "WizardsBeam",
            ActionKind::ThrowBomb => "ThrowBomb",
            ActionKind::Explode => "Explode",
            ActionKind::BlastWave => "BlastWave",
            ActionKind::Die => "Die",
            ActionKind::Bash => "Bash",
            ActionKind::Recharge => "Recharge",
            ActionKind::Null => "Null",
        }
    }

    /// Whether this kind damages its target cell
    pub fn is_attack(&self) -> bool {
        matches!(
            self,
            ActionKind::Stab
                | ActionKind::Slash
                | ActionKind::Lunge
                | ActionKind::Shoot
                | ActionKind::WizardsBeam
                | ActionKind::ThrowBomb
                | ActionKind::Explode
                | ActionKind::BlastWave
        )
    }

    /// Health removed from the target by this kind
    pub fn damage(&self) -> i32 {
        if self.is_attack() {
            ATTACK_DAMAGE
        } else {
            0
        }
    }

    /// Ability tag the actor must own for this kind to validate
    pub fn required_ability(&self) -> Option<Ability> {
        match self {
            ActionKind::Move => Some(Ability::Move),
            ActionKind::Jump => Some(Ability::Jump),
            ActionKind::Stab => Some(Ability::Stab),
            ActionKind::Shoot => Some(Ability::Shoot),
            ActionKind::WizardsBeam => Some(Ability::WizardsBeam),
            ActionKind::ThrowBomb => Some(Ability::ThrowBomb),
            ActionKind::Explode => Some(Ability::Explode),
            ActionKind::BlastWave => Some(Ability::BlastWave),
            ActionKind::Bash => Some(Ability::Bash),
            ActionKind::Spawn
            | ActionKind::Slash
            | ActionKind::Lunge
            | ActionKind::Die
            | ActionKind::Recharge
            | ActionKind::Null => None,
        }
    }

    /// Whether an entity may choose this kind as the root of its turn.
    ///
    /// Spawns come from levels and histories, Slash and Lunge only as
    /// reactions to a move, and Recharge only from the engine.
    pub fn is_decision(&self) -> bool {
        !matches!(
            self,
            ActionKind::Spawn | ActionKind::Slash | ActionKind::Lunge | ActionKind::Recharge
        )
    }

    /// Gated ability whose cooldown this kind engages
    fn gated_ability(&self) -> Option<Ability> {
        self.required_ability()
            .filter(|ability| ability.cooldown_period().is_some())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RecordError::UnknownActionType(s.to_string()))
    }
}

/// What an action acts on: an entity on the board, or a new entity
#[derive(Debug, Clone)]
pub enum Element {
    Ref(EntityId),
    Spawn(Arc<Entity>),
}

impl Element {
    pub fn id(&self) -> EntityId {
        match self {
            Element::Ref(id) => *id,
            Element::Spawn(entity) => entity.id(),
        }
    }
}

/// Rollback data captured at execution time
#[derive(Debug, Clone)]
enum Undo {
    Spawned,
    Moved {
        from: HexCoord,
    },
    Struck {
        hit: bool,
        prior_cooldown: Option<u32>,
    },
    Removed {
        entity: Arc<Entity>,
        queue_index: Option<usize>,
    },
    Pushed {
        to: HexCoord,
    },
    Recharged {
        prior: Cooldowns,
    },
    Nothing,
}

/// One reversible state transition
#[derive(Debug, Clone)]
pub struct Action {
    kind: ActionKind,
    element: Element,
    target: HexCoord,
    undo: Option<Undo>,
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.element.id() == other.element.id()
            && self.target == other.target
    }
}

impl Eq for Action {}

impl Action {
    /// Action of `kind` performed by (or on) the entity `actor`
    pub fn new(kind: ActionKind, actor: EntityId, target: HexCoord) -> Self {
        Self {
            kind,
            element: Element::Ref(actor),
            target,
            undo: None,
        }
    }

    /// Bring `entity` onto the board at `target`
    pub fn spawn(entity: Entity, target: HexCoord) -> Self {
        Self {
            kind: ActionKind::Spawn,
            element: Element::Spawn(Arc::new(entity)),
            target,
            undo: None,
        }
    }

    pub fn null(actor: EntityId, target: HexCoord) -> Self {
        Self::new(ActionKind::Null, actor, target)
    }

    pub fn recharge(actor: EntityId, target: HexCoord) -> Self {
        Self::new(ActionKind::Recharge, actor, target)
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Id of the entity this action belongs to
    pub fn actor(&self) -> EntityId {
        self.element.id()
    }

    pub fn target(&self) -> HexCoord {
        self.target
    }

    pub fn is_attack(&self) -> bool {
        self.kind.is_attack()
    }

    /// Whether this action is legal on `board` as it stands
    pub fn validate(&self, board: &Board) -> bool {
        match self.kind {
            ActionKind::Spawn => {
                self.target.is_valid()
                    && !board.is_occupied(self.target)
                    && board.find(self.actor()).is_none()
            }
            ActionKind::Die => board
                .get(self.target)
                .is_some_and(|occupant| occupant.id() == self.actor()),
            ActionKind::Null => true,
            _ => match board.locate(self.actor()) {
                Some((origin, actor)) => {
                    let owns_ability = self
                        .kind
                        .required_ability()
                        .map_or(true, |ability| actor.has_ability(ability));
                    owns_ability && self.validate_from(origin, actor, board)
                }
                None => false,
            },
        }
    }

    fn validate_from(&self, origin: HexCoord, actor: &Entity, board: &Board) -> bool {
        let target = self.target;
        if !target.is_valid() {
            return false;
        }
        let distance = origin.distance_to(&target);
        let enemy_at_target = board
            .get(target)
            .is_some_and(|occupant| actor.is_enemy_of(occupant));

        match self.kind {
            ActionKind::Move => distance == 1 && !board.is_occupied(target),
            ActionKind::Jump => distance == 2 && !board.is_occupied(target),
            ActionKind::Stab | ActionKind::Slash | ActionKind::Lunge => {
                distance == 1 && enemy_at_target
            }
            ActionKind::Shoot => {
                origin.direction_to(&target).is_some()
                    && (MIN_SHOOT_RANGE..=SHOOT_RANGE).contains(&distance)
                    && origin
                        .between(&target)
                        .iter()
                        .all(|cell| !board.is_occupied(*cell))
                    && enemy_at_target
            }
            ActionKind::WizardsBeam => match origin.direction_to(&target) {
                Some(direction) => {
                    (1..=BEAM_RANGE).contains(&distance)
                        && origin.line(direction, BEAM_RANGE).iter().all(|cell| {
                            board
                                .get(*cell)
                                .map_or(true, |occupant| actor.is_enemy_of(occupant))
                        })
                        && !actor.cooldowns().is_cooling(Ability::WizardsBeam)
                }
                None => false,
            },
            ActionKind::ThrowBomb => {
                (1..=BOMB_RANGE + 1).contains(&distance)
                    && !actor.cooldowns().is_cooling(Ability::ThrowBomb)
            }
            ActionKind::Explode | ActionKind::BlastWave => distance == 1,
            ActionKind::Bash => {
                distance == 1
                    && board
                        .get(target)
                        .is_some_and(|occupant| occupant.is_displaceable())
            }
            ActionKind::Recharge => true,
            ActionKind::Spawn | ActionKind::Die | ActionKind::Null => true,
        }
    }

    /// Apply this action to `board`, caching what rollback needs
    pub fn execute(&mut self, board: &mut Board) {
        let undo = match self.kind {
            ActionKind::Spawn => self.execute_spawn(board),
            ActionKind::Move | ActionKind::Jump => match board.find(self.actor()) {
                Some(from) if board.relocate(from, self.target) => Undo::Moved { from },
                _ => Undo::Nothing,
            },
            ActionKind::Die => match board.get(self.target) {
                Some(occupant) if occupant.id() == self.actor() => {
                    Self::remove_occupant(board, self.target)
                }
                _ => Undo::Nothing,
            },
            ActionKind::Bash => self.execute_bash(board),
            ActionKind::Recharge => match board
                .find(self.actor())
                .and_then(|cell| board.entity_mut(cell))
            {
                Some(actor) => {
                    let prior = actor.cooldowns().clone();
                    actor.cooldowns_mut().tick();
                    Undo::Recharged { prior }
                }
                None => Undo::Nothing,
            },
            ActionKind::Null => Undo::Nothing,
            _ => self.execute_attack(board),
        };
        debug!(action = %self, "execute");
        self.undo = Some(undo);
    }

    /// Undo the last `execute` on `board`
    pub fn rollback(&mut self, board: &mut Board) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        match undo {
            Undo::Spawned => {
                board.remove(self.target);
            }
            Undo::Moved { from } => {
                board.relocate(self.target, from);
            }
            Undo::Struck {
                hit,
                prior_cooldown,
            } => {
                if hit {
                    if let Some(health) = board
                        .entity_mut(self.target)
                        .and_then(Entity::health_mut)
                    {
                        *health += self.kind.damage();
                    }
                }
                if let (Some(prior), Some(ability)) = (prior_cooldown, self.kind.gated_ability()) {
                    if let Some(actor) = board
                        .find(self.actor())
                        .and_then(|cell| board.entity_mut(cell))
                    {
                        actor.cooldowns_mut().set(ability, prior);
                    }
                }
            }
            Undo::Removed {
                entity,
                queue_index,
            } => board.insert_shared(self.target, entity, queue_index),
            Undo::Pushed { to } => {
                board.relocate(to, self.target);
            }
            Undo::Recharged { prior } => {
                if let Some(actor) = board
                    .find(self.actor())
                    .and_then(|cell| board.entity_mut(cell))
                {
                    actor.replace_cooldowns(prior);
                }
            }
            Undo::Nothing => {}
        }
    }

    fn execute_spawn(&self, board: &mut Board) -> Undo {
        match &self.element {
            Element::Spawn(entity) if self.validate(board) => {
                board.insert_shared(self.target, Arc::clone(entity), None);
                Undo::Spawned
            }
            _ => {
                warn!(action = %self, "spawn target unavailable, entity not placed");
                Undo::Nothing
            }
        }
    }

    fn execute_attack(&self, board: &mut Board) -> Undo {
        let damage = self.kind.damage();
        let hit = match board.entity_mut(self.target).and_then(Entity::health_mut) {
            Some(health) => {
                *health -= damage;
                true
            }
            None => false,
        };

        let prior_cooldown = self.kind.gated_ability().and_then(|ability| {
            let period = ability.cooldown_period()?;
            let actor = board
                .find(self.actor())
                .and_then(|cell| board.entity_mut(cell))?;
            let prior = actor.cooldowns().remaining(ability);
            actor.cooldowns_mut().set(ability, period);
            Some(prior)
        });

        Undo::Struck {
            hit,
            prior_cooldown,
        }
    }

    fn execute_bash(&self, board: &mut Board) -> Undo {
        let Some(origin) = board.find(self.actor()) else {
            return Undo::Nothing;
        };
        if !board.is_occupied(self.target) {
            return Undo::Nothing;
        }
        let landing = self.target.offset_by(origin.unit_vector(&self.target));
        if landing.is_valid() && board.relocate(self.target, landing) {
            Undo::Pushed { to: landing }
        } else {
            // Nowhere to go: the occupant is knocked off the board
            Self::remove_occupant(board, self.target)
        }
    }

    fn remove_occupant(board: &mut Board, cell: HexCoord) -> Undo {
        match board.remove(cell) {
            Some((entity, queue_index)) => Undo::Removed {
                entity,
                queue_index,
            },
            None => Undo::Nothing,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {} {}>", self.kind, self.element.id(), self.target)
    }
}
