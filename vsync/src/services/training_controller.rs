//! Training lifecycle: name, submit, poll, publish
//!
//! Polling is driven by [`step`], a pure transition function over the last
//! observed status and the elapsed time. [`TrainingController::poll`] only
//! supplies the clock and the sleeping.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::PollPolicy;
use crate::error::SyncError;
use crate::models::{IterationId, IterationStatus, TrainingIteration, TrainingOutcome};
use crate::types::RemoteVisionService;

/// What the poll loop does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Sleep, then query again
    Wait(Duration),
    /// Stop polling
    Terminal(TrainingOutcome),
}

/// Poll transition
///
/// `status` is `None` when the last query failed; that counts as "still
/// pending" so transient errors are retried until the timeout. A terminal
/// status wins over an expired timeout.
pub fn step(status: Option<IterationStatus>, elapsed: Duration, policy: &PollPolicy) -> NextAction {
    match status {
        Some(IterationStatus::Completed) => return NextAction::Terminal(TrainingOutcome::Completed),
        Some(IterationStatus::Failed) => return NextAction::Terminal(TrainingOutcome::Failed),
        Some(IterationStatus::Canceled) => return NextAction::Terminal(TrainingOutcome::Canceled),
        Some(IterationStatus::Requested) | Some(IterationStatus::Training) | None => {}
    }

    if elapsed >= policy.timeout {
        return NextAction::Terminal(TrainingOutcome::TimedOut);
    }
    NextAction::Wait(policy.interval.min(policy.timeout - elapsed))
}

/// Next `{prefix}-{n}` name given the existing iteration names
///
/// Only names starting with `prefix` count; `n` is one more than the largest
/// trailing integer found, or 1 if there is none.
pub fn next_name_from<'a, I>(existing: I, prefix: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let max = existing
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .filter_map(trailing_number)
        .max()
        .unwrap_or(0);
    format!("{}-{}", prefix, max + 1)
}

fn trailing_number(name: &str) -> Option<u64> {
    let digits_start = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    name[digits_start..].parse().ok()
}

/// Result of the training stage
#[derive(Debug)]
pub struct TrainingRun {
    pub iteration_name: String,
    /// `None` when the submission itself failed
    pub outcome: Option<TrainingOutcome>,
    pub published: bool,
    /// Non-fatal problems (`TrainingIncomplete`, publish failure)
    pub issues: Vec<SyncError>,
}

/// Drives one training iteration on the upload project
pub struct TrainingController<'a> {
    remote: &'a dyn RemoteVisionService,
    policy: PollPolicy,
    advanced_training: bool,
    prediction_resource_id: String,
}

impl<'a> TrainingController<'a> {
    pub fn new(
        remote: &'a dyn RemoteVisionService,
        policy: PollPolicy,
        advanced_training: bool,
        prediction_resource_id: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            policy,
            advanced_training,
            prediction_resource_id: prediction_resource_id.into(),
        }
    }

    /// Next iteration name; listing failure falls back to `{prefix}-1`
    pub async fn next_iteration_name(&self, prefix: &str) -> String {
        match self.remote.list_iterations().await {
            Ok(iterations) => next_name_from(iterations.iter().map(|it| it.name.as_str()), prefix),
            Err(e) => {
                tracing::warn!("Could not list iterations, naming from 1: {}", e);
                format!("{prefix}-1")
            }
        }
    }

    /// Queue training; `None` if the request failed (not retried)
    pub async fn submit(&self, name: &str) -> Option<TrainingIteration> {
        match self.remote.train(self.advanced_training).await {
            Ok(mut iteration) => {
                iteration.name = name.to_string();
                tracing::info!(iteration = %name, id = %iteration.id, "Training submitted");
                Some(iteration)
            }
            Err(e) => {
                tracing::error!(iteration = %name, "Training request failed: {}", e);
                None
            }
        }
    }

    /// Poll until a terminal status or the timeout
    pub async fn poll(&self, id: IterationId) -> TrainingOutcome {
        let started = Instant::now();
        loop {
            let status = match self.remote.get_iteration(id).await {
                Ok(iteration) => Some(iteration.status),
                Err(e) => {
                    tracing::warn!(id = %id, "Training status query failed, will retry: {}", e);
                    None
                }
            };

            let elapsed = started.elapsed();
            if let Some(status) = status {
                tracing::info!(id = %id, status = %status, elapsed_secs = elapsed.as_secs(), "Training status");
            }

            match step(status, elapsed, &self.policy) {
                NextAction::Terminal(outcome) => {
                    if outcome == TrainingOutcome::TimedOut {
                        tracing::warn!(id = %id, "Gave up waiting for training after {:?}", elapsed);
                    }
                    return outcome;
                }
                NextAction::Wait(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Publish a completed iteration under `publish_name`
    pub async fn publish(&self, id: IterationId, publish_name: &str) -> Result<(), SyncError> {
        self.remote
            .publish_iteration(id, publish_name, &self.prediction_resource_id)
            .await
            .map_err(|e| {
                tracing::error!(id = %id, publish_name = %publish_name, "Publish failed: {}", e);
                SyncError::PartialWriteFailure {
                    item: format!("publish '{publish_name}'"),
                    reason: e.to_string(),
                }
            })?;
        tracing::info!(id = %id, publish_name = %publish_name, "Iteration published");
        Ok(())
    }

    /// Name, submit, poll and (on completion only) publish
    pub async fn run(&self, prefix: &str) -> TrainingRun {
        let iteration_name = self.next_iteration_name(prefix).await;
        let mut run = TrainingRun {
            iteration_name: iteration_name.clone(),
            outcome: None,
            published: false,
            issues: Vec::new(),
        };

        let Some(iteration) = self.submit(&iteration_name).await else {
            return run;
        };

        let outcome = self.poll(iteration.id).await;
        run.outcome = Some(outcome);

        if !outcome.is_success() {
            tracing::warn!(iteration = %iteration_name, outcome = %outcome, "Training incomplete, skipping publish");
            run.issues.push(SyncError::TrainingIncomplete {
                iteration: iteration_name,
                outcome,
            });
            return run;
        }

        match self.publish(iteration.id, &iteration.name).await {
            Ok(()) => run.published = true,
            Err(e) => run.issues.push(e),
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_step_terminal_statuses() {
        let p = policy();
        let zero = Duration::ZERO;
        assert_eq!(
            step(Some(IterationStatus::Completed), zero, &p),
            NextAction::Terminal(TrainingOutcome::Completed)
        );
        assert_eq!(
            step(Some(IterationStatus::Failed), zero, &p),
            NextAction::Terminal(TrainingOutcome::Failed)
        );
        assert_eq!(
            step(Some(IterationStatus::Canceled), zero, &p),
            NextAction::Terminal(TrainingOutcome::Canceled)
        );
    }

    #[test]
    fn test_step_pending_waits_interval() {
        let p = policy();
        assert_eq!(
            step(Some(IterationStatus::Training), Duration::from_secs(60), &p),
            NextAction::Wait(Duration::from_secs(30))
        );
        // Failed query counts as pending
        assert_eq!(
            step(None, Duration::from_secs(60), &p),
            NextAction::Wait(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_step_wait_capped_by_remaining_time() {
        assert_eq!(
            step(Some(IterationStatus::Requested), Duration::from_secs(3590), &policy()),
            NextAction::Wait(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_step_timeout() {
        let p = policy();
        assert_eq!(
            step(Some(IterationStatus::Training), Duration::from_secs(3600), &p),
            NextAction::Terminal(TrainingOutcome::TimedOut)
        );
        // Completion observed at the deadline still counts
        assert_eq!(
            step(Some(IterationStatus::Completed), Duration::from_secs(4000), &p),
            NextAction::Terminal(TrainingOutcome::Completed)
        );
    }

    #[test]
    fn test_next_name() {
        assert_eq!(next_name_from(Vec::<&str>::new(), "Iteration"), "Iteration-1");
        assert_eq!(
            next_name_from(["Iteration-3", "Iteration-12", "Iteration-7"], "Iteration"),
            "Iteration-13"
        );
        // Other prefixes and names without a trailing number are ignored
        assert_eq!(
            next_name_from(["Manual-40", "Iteration-2", "Iteration-final"], "Iteration"),
            "Iteration-3"
        );
    }

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("Iteration-42"), Some(42));
        assert_eq!(trailing_number("Iteration 7"), Some(7));
        assert_eq!(trailing_number("Iteration"), None);
    }
}
