//! Opaque identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// A fully-qualified user id (`@local:server`).
    UserId
}

string_id! {
    /// A room id (`!opaque:server`).
    RoomId
}

string_id! {
    /// An event id (`$opaque`).
    EventId
}

string_id! {
    /// A media content URI (`mxc://server/media-id`).
    MxcUri
}

impl MxcUri {
    /// The server-name component, if this is a well-formed `mxc://` URI.
    pub fn server_name(&self) -> Option<&str> {
        self.0.strip_prefix("mxc://")?.split('/').next()
    }

    /// The media-id component, if this is a well-formed `mxc://` URI.
    pub fn media_id(&self) -> Option<&str> {
        self.0.strip_prefix("mxc://")?.split('/').nth(1)
    }
}
