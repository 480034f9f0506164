//! Hex coordinate system using axial coordinates (q, r).
//!
//! This module provides the geometry the rest of the engine is built on:
//! - `HexCoord`: Identifies individual cells of the battlefield
//! - `Direction`: The six axial directions, in a fixed canonical order
//! - Shape queries (`neighbors`, `line`, `lines`, `burst`) clipped to the board
//!
//! The battlefield is a fixed region of 88 cells. Every shape query filters
//! its output to that region so callers never see an off-board cell.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest `q` (and largest `q + r`) on the board
const BOARD_SPAN: i32 = 11;

/// Largest `|r|` on the board
const BOARD_ROWS: i32 = 4;

/// The six axial directions.
///
/// `Direction::ALL` is the canonical order used for every scan, neighbor
/// expansion and tie-break in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// (0, -1)
    NorthWest,
    /// (-1, 0)
    West,
    /// (-1, 1)
    SouthWest,
    /// (0, 1)
    SouthEast,
    /// (1, 0)
    East,
    /// (1, -1)
    NorthEast,
}

impl Direction {
    /// All directions in canonical order starting from NorthWest
    pub const ALL: [Direction; 6] = [
        Direction::NorthWest,
        Direction::West,
        Direction::SouthWest,
        Direction::SouthEast,
        Direction::East,
        Direction::NorthEast,
    ];

    /// Axial offset of one step in this direction
    pub const fn offset(&self) -> HexCoord {
        match self {
            Direction::NorthWest => HexCoord::new(0, -1),
            Direction::West => HexCoord::new(-1, 0),
            Direction::SouthWest => HexCoord::new(-1, 1),
            Direction::SouthEast => HexCoord::new(0, 1),
            Direction::East => HexCoord::new(1, 0),
            Direction::NorthEast => HexCoord::new(1, -1),
        }
    }

    /// The direction whose offset equals `vector`, if any.
    ///
    /// Used together with [`HexCoord::unit_vector`] to confirm that two cells
    /// lie on a straight axial line.
    pub fn from_vector(vector: HexCoord) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.offset() == vector)
    }
}

/// Axial coordinate for a battlefield cell.
///
/// In axial coordinates:
/// - `q` increases going east
/// - `r` increases going southeast
/// - The third coordinate `s` (not stored) satisfies: q + r + s = 0
///
/// Ordering is `(q, r)` lexicographic; sets of cells iterate in that order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    /// Column (increases going east)
    pub q: i32,
    /// Row (increases going southeast)
    pub r: i32,
}

impl HexCoord {
    /// Create a new hex coordinate
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The implicit third coordinate (s = -q - r)
    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Whether this cell lies on the battlefield
    pub const fn is_valid(&self) -> bool {
        self.r.abs() <= BOARD_ROWS
            && 0 <= self.q
            && self.q <= BOARD_SPAN
            && 0 <= self.q + self.r
            && self.q + self.r <= BOARD_SPAN
    }

    /// Component-wise sum, used for offsets and direction steps
    pub const fn offset_by(&self, vector: HexCoord) -> HexCoord {
        HexCoord::new(self.q + vector.q, self.r + vector.r)
    }

    /// Step `steps` cells in `direction` (not clipped to the board)
    pub const fn step(&self, direction: Direction, steps: i32) -> HexCoord {
        let offset = direction.offset();
        HexCoord::new(self.q + offset.q * steps, self.r + offset.r * steps)
    }

    /// The six adjacent cells in canonical order, including off-board ones
    pub fn adjacent(&self) -> [HexCoord; 6] {
        Direction::ALL.map(|d| self.step(d, 1))
    }

    /// Adjacent cells that lie on the board, in canonical order
    pub fn neighbors(&self) -> Vec<HexCoord> {
        self.adjacent().into_iter().filter(HexCoord::is_valid).collect()
    }

    /// Distance to another hex (in hex steps)
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Whether `other` is one step away
    pub fn is_adjacent(&self, other: &HexCoord) -> bool {
        self.distance_to(other) == 1
    }

    /// On-board cells along one ray, at distances `1..=max_distance`
    pub fn line(&self, direction: Direction, max_distance: u32) -> Vec<HexCoord> {
        (1..=max_distance as i32)
            .map(|d| self.step(direction, d))
            .filter(HexCoord::is_valid)
            .collect()
    }

    /// On-board cells along all six rays, at distances `1..=max_distance`
    pub fn lines(&self, max_distance: u32) -> BTreeSet<HexCoord> {
        Direction::ALL
            .into_iter()
            .flat_map(|d| self.line(d, max_distance))
            .collect()
    }

    /// All on-board cells within `radius` of this one, the center included
    /// when it is on the board.
    pub fn burst(&self, radius: u32) -> BTreeSet<HexCoord> {
        let mut results: BTreeSet<HexCoord> = BTreeSet::new();
        if self.is_valid() {
            results.insert(*self);
        }
        let mut frontier = vec![*self];
        for _ in 0..radius {
            let mut next = Vec::new();
            for cell in frontier {
                for neighbor in cell.neighbors() {
                    if results.insert(neighbor) {
                        next.push(neighbor);
                    }
                }
            }
            frontier = next;
        }
        results
    }

    /// Vector from `self` to `dest`, normalized so the larger axial
    /// magnitude is 1. Integer division truncates toward zero, so cells off
    /// a straight line produce vectors that are not a `Direction` offset.
    pub fn unit_vector(&self, dest: &HexCoord) -> HexCoord {
        let dq = dest.q - self.q;
        let dr = dest.r - self.r;
        let denominator = dq.abs().max(dr.abs());
        if denominator == 0 {
            return HexCoord::new(0, 0);
        }
        HexCoord::new(dq / denominator, dr / denominator)
    }

    /// The axial direction from `self` to `dest`, when both lie on one ray
    pub fn direction_to(&self, dest: &HexCoord) -> Option<Direction> {
        let direction = Direction::from_vector(self.unit_vector(dest))?;
        let steps = self.distance_to(dest) as i32;
        (self.step(direction, steps) == *dest).then_some(direction)
    }

    /// Cells strictly between `self` and `dest` along their shared ray.
    ///
    /// Empty when the two cells are adjacent, identical, or not aligned.
    pub fn between(&self, dest: &HexCoord) -> Vec<HexCoord> {
        match self.direction_to(dest) {
            Some(direction) => {
                let steps = self.distance_to(dest) as i32;
                (1..steps).map(|d| self.step(direction, d)).collect()
            }
            None => Vec::new(),
        }
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

impl From<[i32; 2]> for HexCoord {
    fn from([q, r]: [i32; 2]) -> Self {
        HexCoord::new(q, r)
    }
}

impl From<HexCoord> for [i32; 2] {
    fn from(coord: HexCoord) -> Self {
        [coord.q, coord.r]
    }
}

/// Every on-board cell in `(q, r)` order
pub fn board_cells() -> impl Iterator<Item = HexCoord> {
    (0..=BOARD_SPAN)
        .flat_map(|q| (-BOARD_ROWS..=BOARD_ROWS).map(move |r| HexCoord::new(q, r)))
        .filter(HexCoord::is_valid)
}
