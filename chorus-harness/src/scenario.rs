//! Scenario orchestration.

use crate::error::{HarnessError, HarnessResult};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tracing::{info, warn};

/// A top-level choreography: a fixed set of named concurrent routines,
/// one scenario deadline, and fail-fast reporting.
///
/// Routines pin the relative order of specific steps via gates and relays
/// while leaving unconstrained steps free to race; that is the mechanism
/// for reproducing a race rather than avoiding it. A routine stuck on a
/// hand-off its counterpart never performs is a choreography bug, and it
/// surfaces here as `ScenarioTimeout` naming the pending routines — never
/// as a silent skip.
///
/// The first routine failure aborts the whole scenario; the remaining
/// tasks are cancelled when the set drops, so siblings are not left
/// blocking on preconditions that became unreachable.
pub struct Scenario {
    name: String,
    deadline: Duration,
    tasks: JoinSet<HarnessResult<()>>,
    names: HashMap<Id, String>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, deadline: Duration) -> Self {
        Self {
            name: name.into(),
            deadline,
            tasks: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    /// Spawns a named routine. The name is what failure reports point at,
    /// so name the step, not the actor alone.
    pub fn spawn<F>(&mut self, routine: impl Into<String>, future: F)
    where
        F: Future<Output = HarnessResult<()>> + Send + 'static,
    {
        let routine = routine.into();
        info!("[SCENARIO] {}: spawning routine '{}'", self.name, routine);
        let id = self.tasks.spawn(future).id();
        self.names.insert(id, routine);
    }

    /// Runs all routines to completion or to the scenario deadline.
    pub async fn run(mut self) -> HarnessResult<()> {
        let deadline = Instant::now() + self.deadline;

        loop {
            let joined = match tokio::time::timeout_at(deadline, self.tasks.join_next_with_id())
                .await
            {
                Ok(joined) => joined,
                Err(_) => {
                    let mut pending: Vec<String> = self.names.into_values().collect();
                    pending.sort();
                    warn!(
                        "[SCENARIO] {}: deadline hit with pending routines: {:?}",
                        self.name, pending
                    );
                    return Err(HarnessError::ScenarioTimeout {
                        scenario: self.name,
                        pending,
                    });
                }
            };

            let Some(result) = joined else {
                info!("[SCENARIO] {}: all routines completed", self.name);
                return Ok(());
            };

            match result {
                Ok((id, Ok(()))) => {
                    let routine = self.names.remove(&id).unwrap_or_default();
                    info!("[SCENARIO] {}: routine '{}' completed", self.name, routine);
                }
                Ok((id, Err(error))) => {
                    let routine = self.names.remove(&id).unwrap_or_default();
                    return Err(HarnessError::RoutineFailed {
                        scenario: self.name,
                        routine,
                        source: Box::new(error),
                    });
                }
                Err(join_error) => {
                    let routine = self.names.remove(&join_error.id()).unwrap_or_default();
                    return Err(HarnessError::RoutinePanicked {
                        scenario: self.name,
                        routine,
                    });
                }
            }
        }
    }
}

/// Best-effort fixed delay for milestones that expose no observable
/// signal. This is not a synchronization primitive: whenever any
/// predicate-observable signal exists, use
/// `LongPollSyncClient::await_condition` or a `CompletionGate` instead.
pub async fn settle(duration: Duration) {
    warn!(
        "[SCENARIO] settling for {:?} with no observable signal; best-effort only",
        duration
    );
    tokio::time::sleep(duration).await;
}
