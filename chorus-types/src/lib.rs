//! Shared data model for the chorus harness.
//!
//! Identifiers are opaque newtypes over the wire-format strings so that a
//! user id can never be passed where a room id is expected. The sync
//! snapshot types are the decoded projection of one long-poll response:
//! per-room membership state plus newly delivered timeline entries.

mod cursor;
mod event;
mod ids;
mod room;
mod snapshot;

pub use cursor::Cursor;
pub use event::{EventTemplate, Membership, TimelineEvent};
pub use ids::{EventId, MxcUri, RoomId, UserId};
pub use room::{Direction, HistoryQuery, HistoryVisibility, RoomOptions};
pub use snapshot::{MessagesPage, RoomView, SyncSnapshot};
