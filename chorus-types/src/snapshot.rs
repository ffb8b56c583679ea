//! Decoded sync and history responses.

use crate::cursor::Cursor;
use crate::event::{Membership, TimelineEvent};
use crate::ids::{EventId, RoomId, UserId};
use std::collections::HashMap;

/// The view of one room inside a sync snapshot.
#[derive(Debug, Clone, Default)]
pub struct RoomView {
    /// Membership state as of this snapshot, keyed by user.
    pub membership: HashMap<UserId, Membership>,
    /// Timeline entries newly delivered in this poll.
    pub timeline: Vec<TimelineEvent>,
    /// Pagination token for history immediately before this timeline chunk.
    pub prev_batch: Option<Cursor>,
}

/// The decoded result of one sync poll: a projection over room membership
/// state and newly delivered timeline entries, keyed by room.
///
/// Created per poll response, immutable once returned; callers extract the
/// predicate result and cursor and discard it.
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
    pub rooms: HashMap<RoomId, RoomView>,
}

impl SyncSnapshot {
    pub fn room(&self, room: &RoomId) -> Option<&RoomView> {
        self.rooms.get(room)
    }

    /// Membership of `user` in `room`, if this snapshot carries it.
    pub fn membership_of(&self, room: &RoomId, user: &UserId) -> Option<Membership> {
        self.rooms.get(room)?.membership.get(user).copied()
    }

    /// True if this snapshot's timeline for `room` contains `event_id`.
    pub fn timeline_has(&self, room: &RoomId, event_id: &EventId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|view| view.timeline.iter().any(|ev| &ev.event_id == event_id))
    }

    /// True if no room carries any membership or timeline data.
    pub fn is_empty(&self) -> bool {
        self.rooms
            .values()
            .all(|view| view.membership.is_empty() && view.timeline.is_empty())
    }
}

/// One page of a paginated history response.
#[derive(Debug, Clone, Default)]
pub struct MessagesPage {
    pub chunk: Vec<TimelineEvent>,
    pub start: Option<Cursor>,
    pub end: Option<Cursor>,
}
