//! Timeline events and outbound event templates.

use crate::ids::{EventId, MxcUri, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Room membership state for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Invite,
    Join,
    Leave,
}

impl Membership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Membership::Invite => "invite",
            Membership::Join => "join",
            Membership::Leave => "leave",
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded timeline entry from a sync response or history page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub event_id: EventId,
    pub sender: UserId,
    /// Event type, e.g. `m.room.message` or `m.room.member`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl TimelineEvent {
    /// True for state events (those carrying a state key).
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }
}

/// Template for an event to be sent into a room.
///
/// Message events leave `state_key` unset; state events (membership
/// updates) carry one. `attached_media` links an uploaded restricted
/// medium to this event so the server can scope its visibility.
#[derive(Debug, Clone)]
pub struct EventTemplate {
    pub kind: String,
    pub state_key: Option<String>,
    pub content: serde_json::Value,
    pub attached_media: Option<MxcUri>,
}

impl EventTemplate {
    pub fn new(kind: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            state_key: None,
            content,
            attached_media: None,
        }
    }

    pub fn with_state_key(mut self, state_key: impl Into<String>) -> Self {
        self.state_key = Some(state_key.into());
        self
    }

    pub fn with_attached_media(mut self, mxc: MxcUri) -> Self {
        self.attached_media = Some(mxc);
        self
    }
}
