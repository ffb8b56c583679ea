//! Long-poll-aware sync client.

use crate::error::{HarnessError, HarnessResult};
use crate::homeserver::Homeserver;
use chorus_types::{Cursor, EventId, Membership, RoomId, SyncSnapshot, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Server-side wait per poll. Each poll is individually bounded so one
/// failed predicate check never blocks indefinitely; the client composes
/// repeated bounded waits instead of a single unbounded one. Cursor
/// advancement happens at poll boundaries, which also bounds the
/// resolution of race-window tests.
const DEFAULT_SERVER_WAIT: Duration = Duration::from_secs(25);

/// Issues blocking sync polls against the server until a caller-supplied
/// predicate over the returned state becomes true or a deadline elapses.
///
/// Retains no state between calls beyond what the caller threads through
/// via cursors.
#[derive(Clone)]
pub struct LongPollSyncClient {
    server: Arc<dyn Homeserver>,
    user: UserId,
    server_wait: Duration,
}

impl LongPollSyncClient {
    pub fn new(server: Arc<dyn Homeserver>, user: UserId) -> Self {
        Self {
            server,
            user,
            server_wait: DEFAULT_SERVER_WAIT,
        }
    }

    /// Overrides the per-poll server-side wait.
    pub fn with_server_wait(mut self, wait: Duration) -> Self {
        self.server_wait = wait;
        self
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Polls until `predicate` is true over a returned snapshot, starting
    /// from `start` (None = initial sync). Returns the satisfying
    /// snapshot and the cursor to resume from.
    ///
    /// Fails with `DeadlineExceeded` once cumulative elapsed time passes
    /// `timeout`; overshoot is bounded by one server-side wait because
    /// the final poll's wait is clamped to the remaining budget.
    pub async fn await_condition<P>(
        &self,
        start: Option<Cursor>,
        predicate: P,
        timeout: Duration,
    ) -> HarnessResult<(SyncSnapshot, Cursor)>
    where
        P: Fn(&SyncSnapshot) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut cursor = start;
        let mut polls: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() && polls > 0 {
                return Err(HarnessError::DeadlineExceeded {
                    user: self.user.to_string(),
                    waited: timeout,
                    polls,
                });
            }

            let wait = self.server_wait.min(remaining);
            let (snapshot, next) = self.server.sync(&self.user, cursor.as_ref(), wait).await?;
            polls += 1;
            debug!(
                "[SYNC] poll {} for {} returned cursor {}",
                polls, self.user, next
            );

            if predicate(&snapshot) {
                return Ok((snapshot, next));
            }
            cursor = Some(next);
        }
    }
}

// ── Predicate constructors ──
//
// Absent an explicit gate or relay, two actions issued from different
// routines have no defined relative order; these predicates are how a
// routine observes that a sibling's action has been delivered.

/// True once `user` appears invited to `room`.
pub fn invited_to(user: UserId, room: RoomId) -> impl Fn(&SyncSnapshot) -> bool {
    move |snapshot| snapshot.membership_of(&room, &user) == Some(Membership::Invite)
}

/// True once `user` appears joined to `room`.
pub fn joined_to(user: UserId, room: RoomId) -> impl Fn(&SyncSnapshot) -> bool {
    move |snapshot| snapshot.membership_of(&room, &user) == Some(Membership::Join)
}

/// True once the timeline for `room` delivers `event_id`.
pub fn timeline_has_event(room: RoomId, event_id: EventId) -> impl Fn(&SyncSnapshot) -> bool {
    move |snapshot| snapshot.timeline_has(&room, &event_id)
}
