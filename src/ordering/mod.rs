//! Ordering engine: keeps each queue's positions dense under mutation.

/// In-memory position table.
pub mod memory;
/// Dense-shift planning.
pub mod shift;
/// Storage seam used by the ordering operations.
pub mod table;

use tracing::debug;

use crate::{
    error::{QueueError, QueueResult, invalid_position},
    model::Reposition,
    types::{Position, QueueId, UserId},
};

pub use memory::MemoryPositions;
pub use shift::{Direction, Shift};
pub use table::PositionTable;

/// Appends `user` at `max + 1` (or 1 on an empty queue).
pub fn join<T: PositionTable + ?Sized>(
    table: &mut T,
    queue: QueueId,
    user: UserId,
) -> QueueResult<Position> {
    if table.position_of(queue, user)?.is_some() {
        return Err(QueueError::AlreadyMember);
    }
    let position = next_position(table, queue)?;
    table.insert(queue, user, position)?;
    debug!(queue, user, position, "joined");
    Ok(position)
}

/// Removes `user` from `known_position` and closes the gap behind it.
pub fn leave<T: PositionTable + ?Sized>(
    table: &mut T,
    queue: QueueId,
    user: UserId,
    known_position: Position,
) -> QueueResult<()> {
    if !table.remove(queue, user)? {
        return Err(QueueError::NotAMember);
    }
    table.shift(queue, Shift::close_gap(known_position))?;
    debug!(queue, user, position = known_position, "left");
    Ok(())
}

/// Moves `user` to the last position, joining when not yet a member.
pub fn move_to_end<T: PositionTable + ?Sized>(
    table: &mut T,
    queue: QueueId,
    user: UserId,
) -> QueueResult<Position> {
    if let Some(current) = table.position_of(queue, user)? {
        // Already last: the delete/shift/append cycle would land on the same slot.
        if table.max_position(queue)? == Some(current) {
            return Ok(current);
        }
        leave(table, queue, user, current)?;
    }
    let position = next_position(table, queue)?;
    table.insert(queue, user, position)?;
    debug!(queue, user, position, "moved to end");
    Ok(position)
}

/// Relocates `user` to `new_position`, shifting the block in between by one.
pub fn set_position<T: PositionTable + ?Sized>(
    table: &mut T,
    queue: QueueId,
    user: UserId,
    new_position: Position,
) -> QueueResult<Reposition> {
    let old = table
        .position_of(queue, user)?
        .ok_or(QueueError::NotAMember)?;
    let count = table.count(queue)?;
    if new_position == 0 || new_position > count {
        return Err(invalid_position(i64::from(new_position), count));
    }

    let Some(shift) = Shift::relocate(old, new_position) else {
        return Ok(Reposition { old, new: old });
    };

    table.remove(queue, user)?;
    table.shift(queue, shift)?;
    table.insert(queue, user, new_position)?;
    debug!(queue, user, old, new = new_position, "repositioned");
    Ok(Reposition {
        old,
        new: new_position,
    })
}

/// Swaps `user` with the member right behind it. Returns false when the user
/// is last or not a member.
pub fn skip_one<T: PositionTable + ?Sized>(
    table: &mut T,
    queue: QueueId,
    user: UserId,
) -> QueueResult<bool> {
    let Some(current) = table.position_of(queue, user)? else {
        return Ok(false);
    };
    let behind = current + 1;
    let Some(other) = table.member_at(queue, behind)? else {
        return Ok(false);
    };
    table.set(queue, other, current)?;
    table.set(queue, user, behind)?;
    debug!(queue, user, other, position = behind, "skipped one");
    Ok(true)
}

/// True when `positions` is exactly `{1, ..., n}` for its length `n`.
pub fn is_dense(positions: impl IntoIterator<Item = Position>) -> bool {
    let mut sorted: Vec<Position> = positions.into_iter().collect();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(idx, p)| usize::try_from(*p).is_ok_and(|p| p == idx + 1))
}

fn next_position<T: PositionTable + ?Sized>(table: &T, queue: QueueId) -> QueueResult<Position> {
    Ok(table.max_position(queue)?.map_or(1, |max| max + 1))
}
