//! Restore dispatch and supervision.
//!
//! Exactly one dispatch per confirmed selection, then one bounded wait for
//! the session to reconcile the log push that carries the result. Both
//! waits share a single deadline. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use rewind_core::usage::discarded_usage;
use rewind_core::{Event, RestoreRequest, RewindError, UsageSummary};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::{RestoreAck, RestoreEngine};
use crate::selection::RestoreIntent;

/// A restore ready to dispatch, with everything that must be read from the
/// local log before the truncating merge removes it.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorePlan {
    pub request: RestoreRequest,
    /// Usage in the range a conversation restore discards.
    pub discarded: Option<UsageSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    pub request: RestoreRequest,
    pub ack: RestoreAck,
    pub discarded: Option<UsageSummary>,
}

#[derive(Clone)]
pub struct RestoreCoordinator {
    engine: Arc<dyn RestoreEngine>,
    reconciled: watch::Receiver<u64>,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl RestoreCoordinator {
    pub fn new(
        engine: Arc<dyn RestoreEngine>,
        reconciled: watch::Receiver<u64>,
        timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            reconciled,
            timeout,
            shutdown,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the request and capture the discarded-usage summary.
    pub fn plan(&self, intent: &RestoreIntent, local: &[Event]) -> RestorePlan {
        let request = RestoreRequest::for_checkpoint(&intent.checkpoint, intent.scope)
            .with_boundary(intent.options.boundary)
            .with_mode(intent.options.mode);
        let discarded = request
            .scope
            .restores_conversation()
            .then(|| discarded_usage(local, request.timestamp, request.boundary));
        RestorePlan { request, discarded }
    }

    /// Dispatch the plan and wait for the reconciled push.
    pub async fn execute(&self, plan: RestorePlan) -> Result<RestoreOutcome, RewindError> {
        let deadline = Instant::now() + self.timeout;
        let request = plan.request;
        tracing::info!(
            ts = request.timestamp,
            snapshot_ref = %request.snapshot_ref,
            scope = ?request.scope,
            mode = ?request.mode,
            boundary = ?request.boundary,
            "dispatching restore"
        );

        let ack = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(RewindError::Cancelled),
            res = tokio::time::timeout_at(deadline, self.engine.restore(request.clone())) => {
                match res {
                    Err(_) => return Err(self.timed_out("acknowledgement")),
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "engine rejected restore");
                        return Err(RewindError::RestoreFailure(e.to_string()));
                    }
                    Ok(Ok(ack)) => ack,
                }
            }
        };

        let mut reconciled = self.reconciled.clone();
        let generation = ack.generation;
        let synced = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(RewindError::Cancelled),
            res = tokio::time::timeout_at(deadline, reconciled.wait_for(|g| *g >= generation)) => {
                res.map(|r| r.is_ok())
            }
        };
        match synced {
            Err(_) => return Err(self.timed_out("reconciled log")),
            Ok(false) => {
                return Err(RewindError::RestoreFailure(
                    "session stopped receiving engine updates".into(),
                ))
            }
            Ok(true) => {}
        }

        tracing::info!(generation, "restore reconciled");
        Ok(RestoreOutcome {
            request,
            ack,
            discarded: plan.discarded,
        })
    }

    fn timed_out(&self, stage: &str) -> RewindError {
        let waited_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(stage, waited_ms, "restore timed out");
        RewindError::RestoreTimeout { waited_ms }
    }
}
