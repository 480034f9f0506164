//! Follow-up actions triggered by other actions.
//!
//! Rules only read the board. They are evaluated against an action before it
//! executes, and their results are concatenated in table order.

use crate::abilities::Ability;
use crate::actions::{Action, ActionKind};
use crate::board::Board;
use crate::entity::Entity;
use crate::hex::HexCoord;
use std::collections::BTreeSet;

/// A reaction rule: follow-ups for `action` on `board`
pub type ReactionRule = fn(&Action, &Board) -> Vec<Action>;

/// Rules in evaluation order
pub const REACTIONS: [ReactionRule; 3] = [slash, lunge, die];

/// All follow-up actions for `action`, in rule order
pub fn determine_reactions(action: &Action, board: &Board) -> Vec<Action> {
    REACTIONS
        .iter()
        .flat_map(|rule| rule(action, board))
        .collect()
}

/// Mover with the given ability, and the cell it is leaving
fn mover_with<'a>(
    action: &Action,
    board: &'a Board,
    ability: Ability,
) -> Option<(HexCoord, &'a Entity)> {
    if action.kind() != ActionKind::Move {
        return None;
    }
    board
        .locate(action.actor())
        .filter(|(_, actor)| actor.has_ability(ability))
}

fn is_live_enemy(actor: &Entity, board: &Board, cell: HexCoord) -> bool {
    board
        .get(cell)
        .is_some_and(|other| actor.is_enemy_of(other) && other.has_health())
}

/// Strike every enemy adjacent to both ends of a move
pub fn slash(action: &Action, board: &Board) -> Vec<Action> {
    let Some((src, actor)) = mover_with(action, board, Ability::Slash) else {
        return Vec::new();
    };
    let dest = action.target();

    let before: BTreeSet<HexCoord> = src.neighbors().into_iter().collect();
    let after: BTreeSet<HexCoord> = dest.neighbors().into_iter().collect();
    before
        .intersection(&after)
        .filter(|cell| is_live_enemy(actor, board, **cell))
        .map(|cell| Action::new(ActionKind::Slash, actor.id(), *cell))
        .collect()
}

/// Strike the enemy just beyond the end of a straight move
pub fn lunge(action: &Action, board: &Board) -> Vec<Action> {
    let Some((src, actor)) = mover_with(action, board, Ability::Lunge) else {
        return Vec::new();
    };
    let dest = action.target();
    let Some(direction) = src.direction_to(&dest) else {
        return Vec::new();
    };

    let beyond = dest.step(direction, 1);
    if is_live_enemy(actor, board, beyond) {
        vec![Action::new(ActionKind::Lunge, actor.id(), beyond)]
    } else {
        Vec::new()
    }
}

/// Remove a target the attack will bring to zero health
pub fn die(action: &Action, board: &Board) -> Vec<Action> {
    if !action.is_attack() {
        return Vec::new();
    }
    match board.get(action.target()) {
        Some(victim) => match victim.health() {
            Some(health) if health - action.kind().damage() <= 0 => {
                vec![Action::new(ActionKind::Die, victim.id(), action.target())]
            }
            _ => Vec::new(),
        },
        None => Vec::new(),
    }
}
