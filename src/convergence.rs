//! Status convergence for asynchronous Strato mutations.
//!
//! Creating, resizing, or deleting a cluster or node pool returns before the
//! backend has finished acting on it. Every mutating operation therefore
//! polls the object's reported status until it reaches a terminal value,
//! bounded by an attempt budget derived from the operation's node count.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Which status vocabulary applies to an observed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Cluster,
    NodePool,
}

impl ResourceKind {
    fn label(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "cluster",
            ResourceKind::NodePool => "node pool",
        }
    }
}

/// Whether the wait follows a create/resize mutation or a deletion.
///
/// The pending set depends on the mode: `DELETING` means progress while
/// tearing down, but an object that starts deleting mid-create or mid-resize
/// is broken, not converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    CreateOrUpdate,
    Delete,
}

/// Classification of a reported status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The backend is still working; keep polling.
    Pending,
    /// Terminal success.
    Ready,
    /// Terminal failure.
    Failed,
    /// Unrecognized status. Treated as a terminal failure, never as success.
    Unknown,
}

/// One observation of a remote object, as reported by a fetch closure.
#[derive(Debug, Clone)]
pub enum Observation {
    Found { status: String, deleted: bool },
    Missing,
}

/// Result of a convergence wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceOutcome {
    /// A terminal success status was observed (or, for deletions, the object
    /// is gone).
    Converged,
    /// A terminal failure status, an unrecognized status, or a fetch error.
    ConvergenceFailed(String),
    /// The attempt budget ran out while the object was still pending.
    TimedOut,
    /// The cancellation signal fired before convergence.
    Cancelled,
}

impl fmt::Display for ConvergenceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceOutcome::Converged => write!(f, "converged"),
            ConvergenceOutcome::ConvergenceFailed(reason) => write!(f, "{}", reason),
            ConvergenceOutcome::TimedOut => {
                write!(f, "timed out waiting for a terminal status")
            }
            ConvergenceOutcome::Cancelled => write!(f, "operation was cancelled"),
        }
    }
}

/// Parameters of one convergence wait. The attempt budget is fixed for the
/// lifetime of the request.
#[derive(Debug, Clone)]
pub struct ConvergenceRequest {
    pub kind: ResourceKind,
    pub mode: WaitMode,
    pub attempts: u32,
    pub delay: Duration,
    pub cancel: CancellationToken,
}

/// Fixed delay between status observations.
pub const POLL_DELAY: Duration = Duration::from_secs(10);

/// Attempt budget for deletions, independent of node count (10 minutes).
pub const DELETE_ATTEMPTS: u32 = 60;

/// Attempt budget for create and resize waits based on node count.
///
/// 10 minutes of 10-second attempts for pools of up to three nodes, 20
/// minutes above that.
pub fn retry_attempts(node_count: i64) -> u32 {
    let base = 60;
    if node_count > 3 {
        base + 60
    } else {
        base
    }
}

/// Map a reported status to its class. Pure and total: any string outside
/// the kind's vocabulary maps to [`StatusClass::Unknown`].
pub fn classify(kind: ResourceKind, mode: WaitMode, status: &str) -> StatusClass {
    match (kind, status) {
        (_, "READY") => StatusClass::Ready,
        (_, "ERROR") => StatusClass::Failed,
        (_, "DELETING") => match mode {
            WaitMode::Delete => StatusClass::Pending,
            WaitMode::CreateOrUpdate => StatusClass::Failed,
        },
        (ResourceKind::Cluster, "IN_PROGRESS") => match mode {
            WaitMode::CreateOrUpdate => StatusClass::Pending,
            WaitMode::Delete => StatusClass::Failed,
        },
        (ResourceKind::NodePool, "CREATING") | (ResourceKind::NodePool, "RESIZING") => match mode {
            WaitMode::CreateOrUpdate => StatusClass::Pending,
            WaitMode::Delete => StatusClass::Failed,
        },
        _ => StatusClass::Unknown,
    }
}

/// Poll the fetch closure until the object converges, fails, times out, or
/// the request is cancelled.
///
/// Only a `Pending` classification retries. Fetch errors and terminal
/// statuses stop the loop immediately: transport and auth failures are not
/// expected to self-heal within the polling window. Cancellation is
/// cooperative, checked between observations and raced against the
/// inter-attempt delay, never mid-fetch.
pub async fn converge<F, Fut, E>(req: &ConvergenceRequest, mut fetch: F) -> ConvergenceOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation, E>>,
    E: fmt::Display,
{
    let mut attempt: u32 = 1;

    loop {
        let observation = match fetch().await {
            Ok(observation) => observation,
            Err(e) => return ConvergenceOutcome::ConvergenceFailed(e.to_string()),
        };

        let status = match observation {
            Observation::Missing => {
                // Absence confirms a deletion; anywhere else it means the
                // object vanished mid-operation.
                if req.mode == WaitMode::Delete {
                    return ConvergenceOutcome::Converged;
                }
                return ConvergenceOutcome::ConvergenceFailed(format!(
                    "{} no longer exists",
                    req.kind.label()
                ));
            }
            Observation::Found { deleted: true, .. } if req.mode == WaitMode::Delete => {
                return ConvergenceOutcome::Converged;
            }
            Observation::Found { status, .. } => status,
        };

        match classify(req.kind, req.mode, &status) {
            StatusClass::Ready => return ConvergenceOutcome::Converged,
            StatusClass::Failed => {
                return ConvergenceOutcome::ConvergenceFailed(format!(
                    "{} is in {} state",
                    req.kind.label(),
                    status
                ));
            }
            StatusClass::Unknown => {
                return ConvergenceOutcome::ConvergenceFailed(format!(
                    "{} reported unrecognized status {:?}",
                    req.kind.label(),
                    status
                ));
            }
            StatusClass::Pending => {}
        }

        if req.cancel.is_cancelled() {
            return ConvergenceOutcome::Cancelled;
        }
        if attempt >= req.attempts {
            return ConvergenceOutcome::TimedOut;
        }

        tracing::debug!(
            kind = req.kind.label(),
            status = %status,
            attempt,
            budget = req.attempts,
            "still pending, waiting before next poll"
        );

        tokio::select! {
            _ = req.cancel.cancelled() => return ConvergenceOutcome::Cancelled,
            _ = tokio::time::sleep(req.delay) => {}
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request(kind: ResourceKind, mode: WaitMode, attempts: u32) -> ConvergenceRequest {
        ConvergenceRequest {
            kind,
            mode,
            attempts,
            delay: Duration::from_millis(1),
            cancel: CancellationToken::new(),
        }
    }

    fn found(status: &str) -> Observation {
        Observation::Found {
            status: status.to_string(),
            deleted: false,
        }
    }

    #[test]
    fn test_cluster_classification_create_or_update() {
        let mode = WaitMode::CreateOrUpdate;
        assert_eq!(
            classify(ResourceKind::Cluster, mode, "IN_PROGRESS"),
            StatusClass::Pending
        );
        assert_eq!(
            classify(ResourceKind::Cluster, mode, "DELETING"),
            StatusClass::Failed
        );
        assert_eq!(
            classify(ResourceKind::Cluster, mode, "ERROR"),
            StatusClass::Failed
        );
        assert_eq!(
            classify(ResourceKind::Cluster, mode, "READY"),
            StatusClass::Ready
        );
    }

    #[test]
    fn test_cluster_classification_delete() {
        let mode = WaitMode::Delete;
        assert_eq!(
            classify(ResourceKind::Cluster, mode, "DELETING"),
            StatusClass::Pending
        );
        assert_eq!(
            classify(ResourceKind::Cluster, mode, "IN_PROGRESS"),
            StatusClass::Failed
        );
        assert_eq!(
            classify(ResourceKind::Cluster, mode, "ERROR"),
            StatusClass::Failed
        );
        assert_eq!(
            classify(ResourceKind::Cluster, mode, "READY"),
            StatusClass::Ready
        );
    }

    #[test]
    fn test_node_pool_classification_create_or_update() {
        let mode = WaitMode::CreateOrUpdate;
        assert_eq!(
            classify(ResourceKind::NodePool, mode, "CREATING"),
            StatusClass::Pending
        );
        assert_eq!(
            classify(ResourceKind::NodePool, mode, "RESIZING"),
            StatusClass::Pending
        );
        assert_eq!(
            classify(ResourceKind::NodePool, mode, "DELETING"),
            StatusClass::Failed
        );
        assert_eq!(
            classify(ResourceKind::NodePool, mode, "ERROR"),
            StatusClass::Failed
        );
        assert_eq!(
            classify(ResourceKind::NodePool, mode, "READY"),
            StatusClass::Ready
        );
    }

    #[test]
    fn test_node_pool_classification_delete() {
        let mode = WaitMode::Delete;
        assert_eq!(
            classify(ResourceKind::NodePool, mode, "DELETING"),
            StatusClass::Pending
        );
        assert_eq!(
            classify(ResourceKind::NodePool, mode, "CREATING"),
            StatusClass::Failed
        );
        assert_eq!(
            classify(ResourceKind::NodePool, mode, "RESIZING"),
            StatusClass::Failed
        );
    }

    #[test]
    fn test_unrecognized_status_is_unknown() {
        for status in ["", "ready", "PROVISIONING", "IN PROGRESS", "DELETED"] {
            assert_eq!(
                classify(ResourceKind::Cluster, WaitMode::CreateOrUpdate, status),
                StatusClass::Unknown
            );
            assert_eq!(
                classify(ResourceKind::NodePool, WaitMode::Delete, status),
                StatusClass::Unknown
            );
        }
        // Statuses from the other kind's vocabulary are unknown too.
        assert_eq!(
            classify(ResourceKind::Cluster, WaitMode::CreateOrUpdate, "CREATING"),
            StatusClass::Unknown
        );
        assert_eq!(
            classify(ResourceKind::NodePool, WaitMode::CreateOrUpdate, "IN_PROGRESS"),
            StatusClass::Unknown
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        for _ in 0..2 {
            assert_eq!(
                classify(ResourceKind::Cluster, WaitMode::CreateOrUpdate, "IN_PROGRESS"),
                StatusClass::Pending
            );
        }
    }

    #[test]
    fn test_retry_attempts_scales_with_node_count() {
        for node_count in 0..=3 {
            assert_eq!(retry_attempts(node_count), 60);
        }
        assert_eq!(retry_attempts(4), 120);
        assert_eq!(retry_attempts(100), 120);
    }

    #[tokio::test]
    async fn test_converges_on_first_ready() {
        let calls = AtomicU32::new(0);
        let req = request(ResourceKind::Cluster, WaitMode::CreateOrUpdate, 60);

        let outcome = converge(&req, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(found("READY")) }
        })
        .await;

        assert_eq!(outcome, ConvergenceOutcome::Converged);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_converges_after_pending_observations() {
        let calls = AtomicU32::new(0);
        let req = request(ResourceKind::NodePool, WaitMode::CreateOrUpdate, 60);

        let outcome = converge(&req, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let status = if n < 3 { "CREATING" } else { "READY" };
            async move { Ok::<_, String>(found(status)) }
        })
        .await;

        assert_eq!(outcome, ConvergenceOutcome::Converged);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_times_out_after_budget_exhausted() {
        let calls = AtomicU32::new(0);
        let req = request(ResourceKind::Cluster, WaitMode::CreateOrUpdate, 5);

        let outcome = converge(&req, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(found("IN_PROGRESS")) }
        })
        .await;

        assert_eq!(outcome, ConvergenceOutcome::TimedOut);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_error_status_fails_immediately() {
        let calls = AtomicU32::new(0);
        let req = request(ResourceKind::Cluster, WaitMode::CreateOrUpdate, 60);

        let outcome = converge(&req, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(found("ERROR")) }
        })
        .await;

        assert!(matches!(outcome, ConvergenceOutcome::ConvergenceFailed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_status_fails_immediately() {
        let req = request(ResourceKind::NodePool, WaitMode::CreateOrUpdate, 60);

        let outcome = converge(&req, || async {
            Ok::<_, String>(found("SOMETHING_NEW"))
        })
        .await;

        match outcome {
            ConvergenceOutcome::ConvergenceFailed(reason) => {
                assert!(reason.contains("SOMETHING_NEW"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let req = request(ResourceKind::Cluster, WaitMode::CreateOrUpdate, 60);

        let outcome = converge(&req, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<Observation, _>("connection refused".to_string()) }
        })
        .await;

        assert_eq!(
            outcome,
            ConvergenceOutcome::ConvergenceFailed("connection refused".to_string())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_converges_on_missing_object() {
        let calls = AtomicU32::new(0);
        let req = request(ResourceKind::Cluster, WaitMode::Delete, 60);

        let outcome = converge(&req, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(Observation::Missing) }
        })
        .await;

        assert_eq!(outcome, ConvergenceOutcome::Converged);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_converges_on_deleted_marker() {
        let req = request(ResourceKind::NodePool, WaitMode::Delete, 60);

        let outcome = converge(&req, || async {
            Ok::<_, String>(Observation::Found {
                status: "DELETING".to_string(),
                deleted: true,
            })
        })
        .await;

        assert_eq!(outcome, ConvergenceOutcome::Converged);
    }

    #[tokio::test]
    async fn test_delete_converges_on_ready_status() {
        let req = request(ResourceKind::Cluster, WaitMode::Delete, 60);

        let outcome = converge(&req, || async { Ok::<_, String>(found("READY")) }).await;

        assert_eq!(outcome, ConvergenceOutcome::Converged);
    }

    #[tokio::test]
    async fn test_missing_object_fails_create_wait() {
        let req = request(ResourceKind::NodePool, WaitMode::CreateOrUpdate, 60);

        let outcome = converge(&req, || async { Ok::<_, String>(Observation::Missing) }).await;

        assert!(matches!(outcome, ConvergenceOutcome::ConvergenceFailed(_)));
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_second_fetch() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let req = ConvergenceRequest {
            kind: ResourceKind::Cluster,
            mode: WaitMode::CreateOrUpdate,
            attempts: 60,
            delay: Duration::from_secs(30),
            cancel: cancel.clone(),
        };

        let outcome = converge(&req, || {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            async { Ok::<_, String>(found("IN_PROGRESS")) }
        })
        .await;

        assert_eq!(outcome, ConvergenceOutcome::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_delay() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let req = ConvergenceRequest {
            kind: ResourceKind::Cluster,
            mode: WaitMode::CreateOrUpdate,
            attempts: 60,
            delay: Duration::from_secs(30),
            cancel: cancel.clone(),
        };

        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            loop_cancel.cancel();
        });

        let outcome = converge(&req, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(found("IN_PROGRESS")) }
        })
        .await;

        handle.await.unwrap();
        assert_eq!(outcome, ConvergenceOutcome::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
