//! Ability resolution for autonomous entities.
//!
//! Each ability is a stateless strategy over (actor, board). An autonomous
//! entity walks its abilities in declared order and commits to the first one
//! that proposes anything, so the ordering of an entity's ability list is its
//! priority list:
//! - Attacks: Stab, Shoot, WizardsBeam, ThrowBomb, Explode
//! - Movement: Move (paths toward `Entity::targets`)
//! - Directed-only and reactive tags propose nothing on their own
//!
//! Abilities also answer two spatial questions used for movement: which
//! cells the actor threatens, and which cells it would like to stand on.

use crate::actions::{Action, ActionKind};
use crate::board::Board;
use crate::entity::Entity;
use crate::hex::{Direction, HexCoord};
use crate::pathfinding::find_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

/// Maximum distance of a Shoot
pub const SHOOT_RANGE: u32 = 5;

/// Adjacent targets cannot be shot
pub const MIN_SHOOT_RANGE: u32 = 2;

/// Reach of a wizard's beam
pub const BEAM_RANGE: u32 = 5;

/// Farthest cell a bomb can land on
pub const BOMB_RANGE: u32 = 3;

/// Decisions skipped after a beam fires
pub const BEAM_COOLDOWN: u32 = 1;

/// Decisions skipped after a bomb is thrown
pub const BOMB_COOLDOWN: u32 = 1;

/// Ability tags an entity can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    /// Step to an adjacent empty cell
    Move,
    /// Leap exactly two cells
    Jump,
    /// Melee attack on an adjacent enemy
    Stab,
    /// Reaction: strike an enemy adjacent to both ends of a move
    Slash,
    /// Reaction: strike an enemy just beyond the end of a move
    Lunge,
    /// Ranged attack along a straight, unobstructed line
    Shoot,
    /// Damages every cell along one ray; gated by a cooldown
    WizardsBeam,
    /// Area attack thrown over obstacles; gated by a cooldown
    ThrowBomb,
    /// Destroys the owner and damages every neighbor
    Explode,
    /// Push an adjacent displaceable occupant one cell back
    Bash,
    /// Hit an adjacent cell regardless of team
    BlastWave,
    /// Passive: this entity can be pushed by Bash
    Bashable,
}

impl Ability {
    /// Cooldown engaged when this ability fires, for gated abilities
    pub fn cooldown_period(self) -> Option<u32> {
        match self {
            Ability::WizardsBeam => Some(BEAM_COOLDOWN),
            Ability::ThrowBomb => Some(BOMB_COOLDOWN),
            _ => None,
        }
    }

    /// Proposed root actions for `actor` standing at `origin`.
    ///
    /// An empty result means this ability abstains and the next one in the
    /// actor's list is consulted.
    pub fn propose(self, actor: &Entity, origin: HexCoord, board: &Board) -> Vec<Action> {
        if self.cooldown_period().is_some() && actor.cooldowns().is_cooling(self) {
            return Vec::new();
        }

        match self {
            Ability::Move => propose_move(actor, origin, board),
            Ability::Stab => propose_stab(actor, origin, board),
            Ability::Shoot => propose_shoot(actor, origin, board),
            Ability::WizardsBeam => propose_beam(actor, origin, board),
            Ability::ThrowBomb => propose_bomb(actor, origin, board),
            Ability::Explode => propose_explode(actor, origin),
            Ability::Jump
            | Ability::Slash
            | Ability::Lunge
            | Ability::Bash
            | Ability::BlastWave
            | Ability::Bashable => Vec::new(),
        }
    }

    /// Cells an entity at `origin` could attack right now with this ability
    pub fn threatened_cells(self, origin: HexCoord, board: &Board) -> BTreeSet<HexCoord> {
        match self {
            Ability::Stab
            | Ability::Slash
            | Ability::Lunge
            | Ability::Explode
            | Ability::Bash
            | Ability::BlastWave => origin.neighbors().into_iter().collect(),
            Ability::Shoot => Direction::ALL
                .into_iter()
                .flat_map(|direction| shot_lane(origin, direction, board, None))
                .collect(),
            Ability::WizardsBeam => origin.lines(BEAM_RANGE),
            Ability::ThrowBomb => {
                let mut cells = origin.burst(BOMB_RANGE + 1);
                cells.remove(&origin);
                cells
            }
            Ability::Move | Ability::Jump | Ability::Bashable => BTreeSet::new(),
        }
    }

    /// Cells from which `actor` could strike some enemy with this ability
    pub fn targets(self, actor: &Entity, board: &Board) -> BTreeSet<HexCoord> {
        let enemies: Vec<HexCoord> = board
            .occupants()
            .filter(|(_, other)| actor.is_enemy_of(other) && other.has_health())
            .map(|(cell, _)| cell)
            .collect();

        match self {
            Ability::Stab | Ability::Explode => enemies
                .iter()
                .flat_map(|cell| cell.neighbors())
                .collect(),
            Ability::Shoot => enemies
                .iter()
                .flat_map(|cell| {
                    Direction::ALL
                        .into_iter()
                        .flat_map(move |direction| shot_lane(*cell, direction, board, Some(actor)))
                })
                .collect(),
            Ability::WizardsBeam => enemies
                .iter()
                .flat_map(|cell| cell.lines(BEAM_RANGE))
                .collect(),
            Ability::ThrowBomb => enemies
                .iter()
                .flat_map(|cell| {
                    let mut cells = cell.burst(BOMB_RANGE + 1);
                    cells.remove(cell);
                    cells
                })
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

/// Cells at shooting distance from `from` along one direction.
///
/// The lane stops at the first occupant; an occupant at shooting distance is
/// itself part of the lane. When `ignore` is given, that entity does not
/// block (an archer does not stand in its own way).
fn shot_lane(
    from: HexCoord,
    direction: Direction,
    board: &Board,
    ignore: Option<&Entity>,
) -> Vec<HexCoord> {
    let mut lane = Vec::new();
    for cell in from.line(direction, SHOOT_RANGE) {
        let distance = from.distance_to(&cell);
        let occupant = board
            .get(cell)
            .filter(|occupant| ignore.map_or(true, |skip| skip.id() != occupant.id()));
        if distance >= MIN_SHOOT_RANGE {
            lane.push(cell);
        }
        if occupant.is_some() {
            break;
        }
    }
    lane
}

fn propose_move(actor: &Entity, origin: HexCoord, board: &Board) -> Vec<Action> {
    let goals: BTreeSet<HexCoord> = actor
        .targets(board)
        .into_iter()
        .filter(|cell| cell.is_valid() && (*cell == origin || !board.is_occupied(*cell)))
        .collect();

    if goals.is_empty() {
        return Vec::new();
    }
    if goals.contains(&origin) {
        return vec![Action::null(actor.id(), origin)];
    }

    match find_path(board, origin, &goals) {
        Ok(path) => path
            .first()
            .map(|step| vec![Action::new(ActionKind::Move, actor.id(), *step)])
            .unwrap_or_default(),
        Err(e) => {
            trace!(actor = %actor.id(), "{}", e);
            Vec::new()
        }
    }
}

fn propose_stab(actor: &Entity, origin: HexCoord, board: &Board) -> Vec<Action> {
    origin
        .neighbors()
        .into_iter()
        .find(|cell| {
            board
                .get(*cell)
                .is_some_and(|other| actor.is_enemy_of(other) && other.has_health())
        })
        .map(|cell| vec![Action::new(ActionKind::Stab, actor.id(), cell)])
        .unwrap_or_default()
}

fn propose_shoot(actor: &Entity, origin: HexCoord, board: &Board) -> Vec<Action> {
    // Scan ring by ring so the nearest target wins; a ray closes at the
    // first occupant of any team.
    let mut blocked = [false; 6];
    for distance in 1..=SHOOT_RANGE {
        for (index, direction) in Direction::ALL.into_iter().enumerate() {
            if blocked[index] {
                continue;
            }
            let cell = origin.step(direction, distance as i32);
            if !cell.is_valid() {
                blocked[index] = true;
                continue;
            }
            if let Some(other) = board.get(cell) {
                blocked[index] = true;
                if distance >= MIN_SHOOT_RANGE && actor.is_enemy_of(other) && other.has_health()
                {
                    return vec![Action::new(ActionKind::Shoot, actor.id(), cell)];
                }
            }
        }
    }
    Vec::new()
}

fn propose_beam(actor: &Entity, origin: HexCoord, board: &Board) -> Vec<Action> {
    let mut best: Option<(usize, Vec<HexCoord>)> = None;

    for direction in Direction::ALL {
        let ray = origin.line(direction, BEAM_RANGE);
        let mut enemies = 0;
        let mut friendly_fire = false;
        for cell in &ray {
            if let Some(other) = board.get(*cell) {
                if actor.is_enemy_of(other) {
                    enemies += 1;
                } else {
                    friendly_fire = true;
                }
            }
        }
        if friendly_fire || enemies == 0 {
            continue;
        }
        if best.as_ref().map_or(true, |(most, _)| enemies > *most) {
            best = Some((enemies, ray));
        }
    }

    best.map(|(_, ray)| {
        ray.into_iter()
            .map(|cell| Action::new(ActionKind::WizardsBeam, actor.id(), cell))
            .collect()
    })
    .unwrap_or_default()
}

fn propose_bomb(actor: &Entity, origin: HexCoord, board: &Board) -> Vec<Action> {
    let mut best: Option<(usize, HexCoord)> = None;

    for landing in origin.burst(BOMB_RANGE) {
        if landing == origin || board.is_occupied(landing) {
            continue;
        }
        let mut enemies = 0;
        let mut hurts_someone = false;
        let mut friendly_fire = false;
        for cell in landing.neighbors() {
            if let Some(other) = board.get(cell) {
                if !actor.is_enemy_of(other) {
                    friendly_fire = true;
                    break;
                }
                enemies += 1;
                hurts_someone |= other.has_health();
            }
        }
        if friendly_fire || !hurts_someone {
            continue;
        }
        if best.map_or(true, |(most, _)| enemies > most) {
            best = Some((enemies, landing));
        }
    }

    best.map(|(_, landing)| {
        landing
            .burst(1)
            .into_iter()
            .map(|cell| Action::new(ActionKind::ThrowBomb, actor.id(), cell))
            .collect()
    })
    .unwrap_or_default()
}

fn propose_explode(actor: &Entity, origin: HexCoord) -> Vec<Action> {
    let mut actions = vec![Action::new(ActionKind::Die, actor.id(), origin)];
    actions.extend(
        origin
            .neighbors()
            .into_iter()
            .map(|cell| Action::new(ActionKind::Explode, actor.id(), cell)),
    );
    actions
}
