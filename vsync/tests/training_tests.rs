//! Training lifecycle: naming, submit, poll, publish

mod helpers;

use std::time::Duration;

use helpers::{MockRemote, ScriptedStatus};
use vsync::config::PollPolicy;
use vsync::models::{IterationStatus, TrainingOutcome};
use vsync::services::TrainingController;
use vsync::SyncError;

const RESOURCE: &str = "/subscriptions/test/resource";

fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(5),
        timeout: Duration::from_secs(2),
    }
}

fn status(s: IterationStatus) -> ScriptedStatus {
    ScriptedStatus::Status(s)
}

#[tokio::test]
async fn test_completed_after_two_polls_publishes_once() {
    // Given: polls answer Training, Training, Completed
    let remote = MockRemote::new("upload")
        .with_iteration("Iteration-2", Some("Iteration-2"), "2025-06-01T03:10:00Z")
        .with_status_script(vec![
            status(IterationStatus::Training),
            status(IterationStatus::Training),
            status(IterationStatus::Completed),
        ]);
    let controller = TrainingController::new(&remote, fast_policy(), true, RESOURCE);

    // When: running the training stage
    let run = controller.run("Iteration").await;

    // Then: three status queries, one publish with the submitted id and name
    assert_eq!(run.iteration_name, "Iteration-3");
    assert_eq!(run.outcome, Some(TrainingOutcome::Completed));
    assert!(run.published);
    assert!(run.issues.is_empty());

    let state = remote.state();
    assert_eq!(state.train_calls, 1);
    assert_eq!(state.status_queries, 3);
    assert_eq!(state.published.len(), 1);
    let submitted = state.iterations.last().unwrap();
    let (id, name, resource) = &state.published[0];
    assert_eq!(*id, submitted.id);
    assert_eq!(name, "Iteration-3");
    assert_eq!(resource, RESOURCE);
}

#[tokio::test]
async fn test_failed_training_skips_publish() {
    let remote = MockRemote::new("upload").with_status_script(vec![
        status(IterationStatus::Training),
        status(IterationStatus::Failed),
    ]);
    let controller = TrainingController::new(&remote, fast_policy(), true, RESOURCE);

    let run = controller.run("Iteration").await;

    assert_eq!(run.outcome, Some(TrainingOutcome::Failed));
    assert!(!run.published);
    assert!(remote.state().published.is_empty());
    assert_eq!(run.issues.len(), 1);
    assert!(matches!(
        run.issues[0],
        SyncError::TrainingIncomplete {
            outcome: TrainingOutcome::Failed,
            ..
        }
    ));
    assert!(!run.issues[0].is_fatal());
}

#[tokio::test]
async fn test_poll_times_out() {
    // Given: training never finishes and the timeout is short
    let remote = MockRemote::new("upload")
        .with_status_script(vec![status(IterationStatus::Training)]);
    let policy = PollPolicy {
        interval: Duration::from_millis(10),
        timeout: Duration::from_millis(60),
    };
    let controller = TrainingController::new(&remote, policy, true, RESOURCE);

    let run = controller.run("Iteration").await;

    assert_eq!(run.outcome, Some(TrainingOutcome::TimedOut));
    assert!(!run.published);
    assert!(remote.state().status_queries >= 2);
    assert!(remote.state().published.is_empty());
}

#[tokio::test]
async fn test_query_errors_are_retried() {
    // Given: two failed status queries before completion
    let remote = MockRemote::new("upload").with_status_script(vec![
        ScriptedStatus::Error,
        ScriptedStatus::Error,
        status(IterationStatus::Completed),
    ]);
    let controller = TrainingController::new(&remote, fast_policy(), false, RESOURCE);

    let run = controller.run("Iteration").await;

    assert_eq!(run.outcome, Some(TrainingOutcome::Completed));
    assert!(run.published);
    assert_eq!(remote.state().status_queries, 3);
}

#[tokio::test]
async fn test_submit_failure_ends_stage_without_polling() {
    let remote = MockRemote::new("upload");
    remote.state().fail_train = true;
    let controller = TrainingController::new(&remote, fast_policy(), true, RESOURCE);

    let run = controller.run("Iteration").await;

    assert_eq!(run.outcome, None);
    assert!(!run.published);
    let state = remote.state();
    assert_eq!(state.train_calls, 1);
    assert_eq!(state.status_queries, 0);
}

#[tokio::test]
async fn test_publish_failure_is_recorded() {
    let remote = MockRemote::new("upload")
        .with_status_script(vec![status(IterationStatus::Completed)]);
    remote.state().fail_publish = true;
    let controller = TrainingController::new(&remote, fast_policy(), true, RESOURCE);

    let run = controller.run("Iteration").await;

    assert_eq!(run.outcome, Some(TrainingOutcome::Completed));
    assert!(!run.published);
    assert!(matches!(run.issues[0], SyncError::PartialWriteFailure { .. }));
}

#[tokio::test]
async fn test_iteration_naming() {
    let remote = MockRemote::new("upload")
        .with_iteration("Iteration-4", Some("Iteration-4"), "2025-06-01T03:00:00Z")
        .with_iteration("Iteration-11", None, "2025-06-02T03:00:00Z")
        .with_iteration("Manual-99", None, "2025-06-03T03:00:00Z");
    let controller = TrainingController::new(&remote, fast_policy(), true, RESOURCE);

    assert_eq!(controller.next_iteration_name("Iteration").await, "Iteration-12");

    // Listing failure falls back to 1
    remote.state().fail_list_iterations = true;
    assert_eq!(controller.next_iteration_name("Iteration").await, "Iteration-1");
}
