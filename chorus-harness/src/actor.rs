//! Scenario actors.

use crate::error::HarnessResult;
use crate::homeserver::Homeserver;
use crate::sync::LongPollSyncClient;
use chorus_types::{
    Cursor, EventId, EventTemplate, HistoryQuery, MessagesPage, MxcUri, RoomId, RoomOptions,
    SyncSnapshot, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A logical participant in a scenario: one authenticated identity, one
/// sync position, and the action primitives wired to the server under
/// test.
///
/// The cursor is exclusively owned by this actor. When a choreography
/// needs another routine to resume this actor's sync stream, ownership
/// transfers through `take_cursor` / `adopt_cursor` across a
/// `TokenRelay`; the relinquishing side must not sync again until it
/// adopts a cursor back.
pub struct Actor {
    user: UserId,
    server: Arc<dyn Homeserver>,
    sync: LongPollSyncClient,
    cursor: Option<Cursor>,
}

impl Actor {
    pub fn new(server: Arc<dyn Homeserver>, user: UserId) -> Self {
        let sync = LongPollSyncClient::new(server.clone(), user.clone());
        Self {
            user,
            server,
            sync,
            cursor: None,
        }
    }

    /// Overrides the per-poll server-side wait on this actor's sync
    /// client.
    pub fn with_server_wait(mut self, wait: Duration) -> Self {
        self.sync = self.sync.with_server_wait(wait);
        self
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Relinquishes the current sync position, typically into a
    /// `TokenRelay`.
    pub fn take_cursor(&mut self) -> Option<Cursor> {
        self.cursor.take()
    }

    /// Resumes syncing from a relayed-in cursor.
    pub fn adopt_cursor(&mut self, cursor: Cursor) {
        self.cursor = Some(cursor);
    }

    /// Performs an initial sync to establish a cursor, like a client
    /// coming online. The snapshot is discarded.
    pub async fn prime(&mut self, timeout: Duration) -> HarnessResult<()> {
        let snapshot = self.sync_until(|_| true, timeout).await?;
        debug!(
            "[ACTOR] {} primed with {} visible rooms",
            self.user,
            snapshot.rooms.len()
        );
        Ok(())
    }

    /// Long-polls from the owned cursor until `predicate` holds, then
    /// advances the cursor past the satisfying response.
    pub async fn sync_until<P>(
        &mut self,
        predicate: P,
        timeout: Duration,
    ) -> HarnessResult<SyncSnapshot>
    where
        P: Fn(&SyncSnapshot) -> bool,
    {
        let (snapshot, next) = self
            .sync
            .await_condition(self.cursor.take(), predicate, timeout)
            .await?;
        self.cursor = Some(next);
        Ok(snapshot)
    }

    // ── Action primitives: individually synchronous network calls ──

    pub async fn create_room(&self, options: &RoomOptions) -> HarnessResult<RoomId> {
        self.server.create_room(&self.user, options).await
    }

    pub async fn invite(&self, room: &RoomId, invitee: &UserId) -> HarnessResult<()> {
        self.server.invite(&self.user, room, invitee).await
    }

    pub async fn join_room(&self, room: &RoomId) -> HarnessResult<()> {
        self.server.join_room(&self.user, room).await
    }

    pub async fn leave_room(&self, room: &RoomId) -> HarnessResult<()> {
        self.server.leave_room(&self.user, room).await
    }

    pub async fn send_message(&self, room: &RoomId, body: &str) -> HarnessResult<EventId> {
        self.server.send_message(&self.user, room, body).await
    }

    pub async fn send_event(
        &self,
        room: &RoomId,
        event: &EventTemplate,
    ) -> HarnessResult<EventId> {
        self.server.send_event(&self.user, room, event).await
    }

    pub async fn messages(
        &self,
        room: &RoomId,
        query: &HistoryQuery,
    ) -> HarnessResult<MessagesPage> {
        self.server.messages(&self.user, room, query).await
    }

    pub async fn state_event_content(
        &self,
        room: &RoomId,
        kind: &str,
        state_key: &str,
    ) -> HarnessResult<serde_json::Value> {
        self.server
            .state_event_content(&self.user, room, kind, state_key)
            .await
    }

    pub async fn upload_media(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> HarnessResult<MxcUri> {
        self.server
            .upload_media(&self.user, bytes, filename, content_type)
            .await
    }

    pub async fn download_media(&self, mxc: &MxcUri) -> HarnessResult<Vec<u8>> {
        self.server.download_media(&self.user, mxc).await
    }

    pub async fn set_avatar(&self, mxc: &MxcUri) -> HarnessResult<()> {
        self.server.set_avatar(&self.user, mxc).await
    }
}
