//! Boundary to the server under test.
//!
//! The harness treats the homeserver as a black box whose only observable
//! contract is "eventually a long-poll predicate becomes true". This trait
//! is the entire surface the core consumes: one long-poll fetch, a set of
//! synchronous state-changing calls, one paginated read, and the media
//! operations needed by restricted-media scenarios. Tests substitute
//! in-process doubles behind the same trait.

mod http;

pub use http::{HomeserverConfig, HttpHomeserver};

use crate::error::HarnessResult;
use async_trait::async_trait;
use chorus_types::{
    Cursor, EventId, EventTemplate, HistoryQuery, MessagesPage, MxcUri, RoomId, RoomOptions,
    SyncSnapshot, UserId,
};
use std::time::Duration;

/// Operations the harness performs against the server under test.
///
/// All mutate calls are synchronous request/response; any unexpected
/// result code surfaces as `HarnessError::UnexpectedStatus`.
#[async_trait]
pub trait Homeserver: Send + Sync {
    /// Long-poll state fetch: blocks server-side up to `wait` until state
    /// newer than `since` exists, then returns a snapshot and the cursor
    /// to resume from.
    async fn sync(
        &self,
        user: &UserId,
        since: Option<&Cursor>,
        wait: Duration,
    ) -> HarnessResult<(SyncSnapshot, Cursor)>;

    async fn create_room(&self, user: &UserId, options: &RoomOptions) -> HarnessResult<RoomId>;

    async fn invite(&self, user: &UserId, room: &RoomId, invitee: &UserId) -> HarnessResult<()>;

    async fn join_room(&self, user: &UserId, room: &RoomId) -> HarnessResult<()>;

    async fn leave_room(&self, user: &UserId, room: &RoomId) -> HarnessResult<()>;

    /// Sends a plain text message, returning its event id.
    async fn send_message(
        &self,
        user: &UserId,
        room: &RoomId,
        body: &str,
    ) -> HarnessResult<EventId>;

    /// Sends an arbitrary message or state event, optionally linking
    /// restricted media to it.
    async fn send_event(
        &self,
        user: &UserId,
        room: &RoomId,
        event: &EventTemplate,
    ) -> HarnessResult<EventId>;

    /// Paginated history read; the ordered chunk is the object handed to
    /// checklist verification.
    async fn messages(
        &self,
        user: &UserId,
        room: &RoomId,
        query: &HistoryQuery,
    ) -> HarnessResult<MessagesPage>;

    /// Content of one state event, e.g. a membership event's
    /// `avatar_url`.
    async fn state_event_content(
        &self,
        user: &UserId,
        room: &RoomId,
        kind: &str,
        state_key: &str,
    ) -> HarnessResult<serde_json::Value>;

    /// Uploads restricted media; invisible until attached to an event.
    async fn upload_media(
        &self,
        user: &UserId,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> HarnessResult<MxcUri>;

    /// Authenticated media download. Visibility denials surface as
    /// `UnexpectedStatus` with the denial code.
    async fn download_media(&self, user: &UserId, mxc: &MxcUri) -> HarnessResult<Vec<u8>>;

    /// Sets the user's global profile avatar.
    async fn set_avatar(&self, user: &UserId, mxc: &MxcUri) -> HarnessResult<()>;
}
