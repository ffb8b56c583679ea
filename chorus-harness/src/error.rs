//! Harness error types.
//!
//! Every failure propagates to the scenario runner and terminates the
//! scenario; the primitives themselves never retry. Scenario-level policy
//! may tolerate an expected error (e.g. a permission-denied invite) by
//! matching on `UnexpectedStatus`.

use std::time::Duration;
use thiserror::Error;

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while choreographing or verifying a scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A long-poll predicate never became true within budget. Always
    /// fatal: the server never reached the expected state, or the wait
    /// was miscalibrated.
    #[error("deadline exceeded for {user}: predicate still false after {waited:?} ({polls} polls)")]
    DeadlineExceeded {
        user: String,
        waited: Duration,
        polls: u32,
    },

    /// A state-changing call returned an unexpected result code.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Checklist verification: required keys absent from the observed
    /// collection, reported in full for diagnosability.
    #[error("checklist missing required keys: [{}]", .missing.join(", "))]
    MissingRequired { missing: Vec<String> },

    /// Checklist verification: unrequired keys present while extras were
    /// forbidden.
    #[error("checklist found unexpected extra keys: [{}]", .extra.join(", "))]
    UnexpectedExtra { extra: Vec<String> },

    /// The scenario deadline elapsed with routines still pending. A
    /// never-consumed relay or never-signaled gate surfaces here rather
    /// than as a silent skip.
    #[error("scenario '{scenario}' timed out; still pending: [{}]", .pending.join(", "))]
    ScenarioTimeout {
        scenario: String,
        pending: Vec<String>,
    },

    #[error("scenario '{scenario}' routine '{routine}' failed: {source}")]
    RoutineFailed {
        scenario: String,
        routine: String,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("scenario '{scenario}' routine '{routine}' panicked")]
    RoutinePanicked { scenario: String, routine: String },

    /// The counterpart end of a token relay is gone.
    #[error("token relay closed")]
    RelayClosed,

    /// No access token registered for this actor identity.
    #[error("unknown actor: {0}")]
    UnknownActor(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
