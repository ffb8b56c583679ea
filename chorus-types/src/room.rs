//! Room creation options and history query shapes.

use crate::cursor::Cursor;
use serde::{Deserialize, Serialize};

/// Who may read a room's history (and, under restricted media rules,
/// its attached media).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryVisibility {
    Joined,
    Invited,
    Shared,
    WorldReadable,
}

impl HistoryVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryVisibility::Joined => "joined",
            HistoryVisibility::Invited => "invited",
            HistoryVisibility::Shared => "shared",
            HistoryVisibility::WorldReadable => "world_readable",
        }
    }
}

/// Options for room creation.
#[derive(Debug, Clone, Default)]
pub struct RoomOptions {
    pub preset: Option<String>,
    pub name: Option<String>,
    pub room_version: Option<String>,
    pub history_visibility: Option<HistoryVisibility>,
}

impl RoomOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn room_version(mut self, version: impl Into<String>) -> Self {
        self.room_version = Some(version.into());
        self
    }

    pub fn history_visibility(mut self, visibility: HistoryVisibility) -> Self {
        self.history_visibility = Some(visibility);
        self
    }
}

/// Pagination direction for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Wire value for the `dir` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            Direction::Forward => "f",
            Direction::Backward => "b",
        }
    }
}

/// A paginated history query.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub dir: Direction,
    pub from: Option<Cursor>,
    pub limit: Option<u32>,
    /// Event-type filter; `None` means unfiltered.
    pub types: Option<Vec<String>>,
}

impl HistoryQuery {
    pub fn backward() -> Self {
        Self {
            dir: Direction::Backward,
            from: None,
            limit: None,
            types: None,
        }
    }

    pub fn forward() -> Self {
        Self {
            dir: Direction::Forward,
            from: None,
            limit: None,
            types: None,
        }
    }

    pub fn from(mut self, cursor: Cursor) -> Self {
        self.from = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn types(mut self, types: &[&str]) -> Self {
        self.types = Some(types.iter().map(|t| t.to_string()).collect());
        self
    }
}
