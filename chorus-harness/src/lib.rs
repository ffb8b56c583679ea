//! Choreography harness for validating eventual-consistency behavior of a
//! federated messaging server.
//!
//! The server under test schedules state transitions (invite, join, send)
//! and observation operations (long-poll sync, paginated history)
//! opaquely; this crate reproduces specific interleavings between them
//! instead of avoiding races:
//! - `CompletionGate` / `TokenRelay` pin the relative order of steps
//!   across concurrently running actors
//! - `LongPollSyncClient` blocks until a predicate over server state
//!   becomes true or a deadline expires
//! - `verify_checklist` asserts a required subset of an observed
//!   collection order-insensitively, with race-exposed extras declared
//!   rather than flaky
//!
//! The server itself is reached only through the `Homeserver` trait; an
//! HTTP implementation is provided, and tests substitute in-process
//! doubles.

pub mod actor;
pub mod checklist;
pub mod error;
pub mod gate;
pub mod homeserver;
pub mod relay;
pub mod scenario;
pub mod sync;

pub use actor::Actor;
pub use checklist::verify_checklist;
pub use error::{HarnessError, HarnessResult};
pub use gate::CompletionGate;
pub use homeserver::{Homeserver, HomeserverConfig, HttpHomeserver};
pub use relay::TokenRelay;
pub use scenario::{settle, Scenario};
pub use sync::{invited_to, joined_to, timeline_has_event, LongPollSyncClient};
