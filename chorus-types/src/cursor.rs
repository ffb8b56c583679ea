//! Sync continuation cursor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque continuation token marking a position in the server's
/// state-change stream.
///
/// A cursor obtained from one sync response must seed exactly one
/// subsequent poll by its owner; the server guarantees no-gap,
/// no-duplicate delivery only under that discipline. Ownership moves
/// between routines through a `TokenRelay` hand-off, never by sharing.
/// The contents are server-defined and must not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self(value)
    }
}
