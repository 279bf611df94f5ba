use hashbrown::HashMap;

use crate::{
    error::QueueResult,
    types::{Position, QueueId, UserId},
};

use super::{PositionTable, Shift};

/// Position table held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryPositions {
    queues: HashMap<QueueId, HashMap<UserId, Position>>,
}

impl MemoryPositions {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// `(user, position)` pairs of `queue` ordered by position.
    pub fn ordered(&self, queue: QueueId) -> Vec<(UserId, Position)> {
        let mut out: Vec<(UserId, Position)> = self
            .queues
            .get(&queue)
            .into_iter()
            .flat_map(|rows| rows.iter().map(|(user, pos)| (*user, *pos)))
            .collect();
        out.sort_by_key(|(user, pos)| (*pos, *user));
        out
    }
}

impl PositionTable for MemoryPositions {
    fn position_of(&self, queue: QueueId, user: UserId) -> QueueResult<Option<Position>> {
        Ok(self.queues.get(&queue).and_then(|rows| rows.get(&user)).copied())
    }

    fn member_at(&self, queue: QueueId, position: Position) -> QueueResult<Option<UserId>> {
        Ok(self.queues.get(&queue).and_then(|rows| {
            rows.iter()
                .find(|(_, pos)| **pos == position)
                .map(|(user, _)| *user)
        }))
    }

    fn max_position(&self, queue: QueueId) -> QueueResult<Option<Position>> {
        Ok(self
            .queues
            .get(&queue)
            .and_then(|rows| rows.values().copied().max()))
    }

    fn count(&self, queue: QueueId) -> QueueResult<u32> {
        let len = self.queues.get(&queue).map_or(0, |rows| rows.len());
        Ok(u32::try_from(len).unwrap_or(u32::MAX))
    }

    fn insert(&mut self, queue: QueueId, user: UserId, position: Position) -> QueueResult<()> {
        self.queues.entry(queue).or_default().insert(user, position);
        Ok(())
    }

    fn set(&mut self, queue: QueueId, user: UserId, position: Position) -> QueueResult<()> {
        if let Some(slot) = self.queues.get_mut(&queue).and_then(|rows| rows.get_mut(&user)) {
            *slot = position;
        }
        Ok(())
    }

    fn remove(&mut self, queue: QueueId, user: UserId) -> QueueResult<bool> {
        let Some(rows) = self.queues.get_mut(&queue) else {
            return Ok(false);
        };
        let removed = rows.remove(&user).is_some();
        if rows.is_empty() {
            self.queues.remove(&queue);
        }
        Ok(removed)
    }

    fn shift(&mut self, queue: QueueId, shift: Shift) -> QueueResult<usize> {
        let Some(rows) = self.queues.get_mut(&queue) else {
            return Ok(0);
        };
        let mut touched = 0;
        for pos in rows.values_mut() {
            if shift.contains(*pos) {
                *pos = shift.apply(*pos);
                touched += 1;
            }
        }
        Ok(touched)
    }
}
