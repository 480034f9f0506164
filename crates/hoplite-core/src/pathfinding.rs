//! A* pathfinding on the battlefield.
//!
//! Empty cells cost one step; occupied cells (goals included) are
//! impassable. The search is fully deterministic: frontier ties are broken
//! by lower f, then lower heuristic, then earlier insertion, and neighbors
//! are expanded in canonical direction order.

use crate::board::Board;
use crate::hex::HexCoord;
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use thiserror::Error;

/// Errors from path search
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("No path exists to any goal")]
    NoPathExists,
}

/// Node in the A* priority queue.
#[derive(Clone, Eq, PartialEq)]
struct PathNode {
    coord: HexCoord,
    g_cost: u32,
    h_cost: u32,
    seq: u64,
}

impl PathNode {
    fn f_cost(&self) -> u32 {
        self.g_cost + self.h_cost
    }
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .f_cost()
            .cmp(&self.f_cost())
            .then_with(|| other.h_cost.cmp(&self.h_cost))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest path from `start` to the nearest reachable cell in `goals`.
///
/// The returned steps exclude `start` and end at the reached goal; the path
/// is empty when `start` is itself a goal.
pub fn find_path(
    board: &Board,
    start: HexCoord,
    goals: &BTreeSet<HexCoord>,
) -> Result<Vec<HexCoord>, PathError> {
    if goals.is_empty() {
        return Err(PathError::NoPathExists);
    }
    if goals.contains(&start) {
        return Ok(Vec::new());
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: HashMap<HexCoord, HexCoord> = HashMap::new();
    let mut g_scores: HashMap<HexCoord, u32> = HashMap::new();
    let mut seq = 0;

    g_scores.insert(start, 0);
    open_set.push(PathNode {
        coord: start,
        g_cost: 0,
        h_cost: heuristic(&start, goals),
        seq,
    });

    while let Some(current) = open_set.pop() {
        if goals.contains(&current.coord) {
            return Ok(reconstruct_path(&came_from, current.coord, start));
        }

        let current_g = *g_scores.get(&current.coord).unwrap_or(&u32::MAX);
        if current.g_cost > current_g {
            // Stale entry superseded by a cheaper one
            continue;
        }

        for neighbor in current.coord.neighbors() {
            if board.is_occupied(neighbor) {
                continue;
            }

            let tentative_g = current_g.saturating_add(1);
            if tentative_g >= *g_scores.get(&neighbor).unwrap_or(&u32::MAX) {
                continue;
            }

            came_from.insert(neighbor, current.coord);
            g_scores.insert(neighbor, tentative_g);

            seq += 1;
            open_set.push(PathNode {
                coord: neighbor,
                g_cost: tentative_g,
                h_cost: heuristic(&neighbor, goals),
                seq,
            });
        }
    }

    Err(PathError::NoPathExists)
}

/// Hex distance to the nearest goal
fn heuristic(from: &HexCoord, goals: &BTreeSet<HexCoord>) -> u32 {
    goals
        .iter()
        .map(|goal| from.distance_to(goal))
        .min()
        .unwrap_or(0)
}

fn reconstruct_path(
    came_from: &HashMap<HexCoord, HexCoord>,
    goal: HexCoord,
    start: HexCoord,
) -> Vec<HexCoord> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}
