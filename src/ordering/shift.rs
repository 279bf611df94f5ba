//! Dense-shift planning: the minimal block of positions that must move by one
//! to keep a queue's positions contiguous.

use serde::{Deserialize, Serialize};

use crate::types::Position;

/// Direction every position in a [`Shift`] moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Towards the front (`p - 1`).
    Down,
    /// Towards the back (`p + 1`).
    Up,
}

/// Inclusive block `first..=last` of positions moving one step in `direction`.
/// `last == None` means the block runs to the end of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    /// First position in the block.
    pub first: Position,
    /// Last position in the block, or open-ended.
    pub last: Option<Position>,
    /// Step direction.
    pub direction: Direction,
}

impl Shift {
    /// Block that fills the hole left at `removed`.
    pub fn close_gap(removed: Position) -> Self {
        Self {
            first: removed + 1,
            last: None,
            direction: Direction::Down,
        }
    }

    /// Block to move when a member is lifted out of `old` and put back at
    /// `new`. `None` when nothing moves.
    pub fn relocate(old: Position, new: Position) -> Option<Self> {
        use std::cmp::Ordering;

        match new.cmp(&old) {
            Ordering::Equal => None,
            Ordering::Less => Some(Self {
                first: new,
                last: Some(old - 1),
                direction: Direction::Up,
            }),
            Ordering::Greater => Some(Self {
                first: old + 1,
                last: Some(new),
                direction: Direction::Down,
            }),
        }
    }

    /// True when `position` lies inside the block.
    pub fn contains(&self, position: Position) -> bool {
        position >= self.first && self.last.is_none_or(|last| position <= last)
    }

    /// Where `position` lands after the shift.
    pub fn apply(&self, position: Position) -> Position {
        if !self.contains(position) {
            return position;
        }
        match self.direction {
            Direction::Down => position - 1,
            Direction::Up => position + 1,
        }
    }
}
