//! The agent-under-test contract and timeout racing

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::trace::Trace;

/// Runs the agent under test on one input and returns its sealed trace
///
/// Implementations drive the real or mocked pipeline and record it through a
/// [`TraceRecorder`](crate::trace::TraceRecorder). Any error is reported as a
/// failed case, never propagated out of a batch.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run_agent(&self, input: &str) -> anyhow::Result<Trace>;
}

/// Adapts an async closure into an [`AgentRunner`]
pub struct AgentFn<F>(pub F);

#[async_trait]
impl<F, Fut> AgentRunner for AgentFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Trace>> + Send,
{
    async fn run_agent(&self, input: &str) -> anyhow::Result<Trace> {
        (self.0)(input.to_string()).await
    }
}

/// How a timed agent call settled
#[derive(Debug)]
pub(crate) enum RaceOutcome<T> {
    Completed(T),
    Failed(String),
    TimedOut,
}

/// Race `work` against `timeout`
///
/// The work runs as its own task. When the timer wins, the task is detached
/// and keeps running; only the wait is abandoned.
pub(crate) async fn race_with_timeout<T, F>(work: F, timeout: Duration) -> RaceOutcome<T>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let handle = tokio::spawn(work);

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(value))) => RaceOutcome::Completed(value),
        Ok(Ok(Err(e))) => RaceOutcome::Failed(format!("{:#}", e)),
        Ok(Err(join_error)) => RaceOutcome::Failed(format!("agent task failed: {}", join_error)),
        Err(_) => RaceOutcome::TimedOut,
    }
}
