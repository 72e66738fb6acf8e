mod common;

use std::time::Duration;

use common::*;
use scenario_harness::prelude::*;
use scenario_harness::HarnessError;

fn make_session(
    scenario_id: u32,
    reports: &std::path::Path,
) -> (ScenarioSession<MockSurface>, MockSurface, AbortSignal) {
    let surface = MockSurface::new();
    let abort = AbortSignal::new();

    let mut options = SessionOptions::new(scenario_id, "viola");
    options.reports_dir = reports.to_path_buf();
    options.success_settle = Duration::ZERO;
    options.failure_settle = Duration::ZERO;

    let session = ScenarioSession::with_surface(surface.clone(), options, abort.clone());
    (session, surface, abort)
}

fn quick_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(5))
}

#[tokio::test]
async fn test_all_steps_pass() {
    let dir = create_test_dir();
    let store = ResultsStore::new(dir.path().join("results"));
    let (mut session, surface, _abort) = make_session(1, dir.path());
    session.seed(["A", "B"]);

    session
        .run_step("A", quick_retry(3), |_s| async { Ok(()) })
        .await
        .unwrap();
    session
        .run_step("B", quick_retry(3), |_s| async { Ok(()) })
        .await
        .unwrap();

    let result = session.close(&store).await.unwrap();

    assert!(result.passed());
    assert!(result
        .test_cases
        .iter()
        .all(|tc| tc.status == TestStatus::Pass));
    // One success screenshot per step.
    assert_eq!(surface.captured().len(), 2);
    assert!(result
        .test_cases
        .iter()
        .all(|tc| tc.screenshots.len() == 1));
}

#[tokio::test]
async fn test_failure_marks_remaining_steps_not_run() {
    let dir = create_test_dir();
    let store = ResultsStore::new(dir.path().join("results"));
    let (mut session, surface, _abort) = make_session(2, dir.path());
    session.seed(["A", "B", "C"]);

    session
        .run_step("A", quick_retry(3), |_s| async { Ok(()) })
        .await
        .unwrap();

    let err = session
        .run_step("B", quick_retry(2), |_s| async {
            Err::<(), _>(HarnessError::ActionFailed("selector not found".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::RetryExhausted { attempts: 2, .. }));

    let result = session.close(&store).await.unwrap();

    assert_eq!(result.test_cases[0].status, TestStatus::Pass);
    assert_eq!(result.test_cases[1].status, TestStatus::Fail);
    assert_eq!(result.test_cases[2].status, TestStatus::NotRun);
    assert!(!result.passed());

    // Aggregate error is B's error.
    let aggregate = result.error.as_ref().unwrap();
    assert!(aggregate.message.contains("selector not found"));

    // C explains why it never ran.
    assert!(result.test_cases[2]
        .error
        .as_ref()
        .unwrap()
        .message
        .contains("an earlier step failed"));

    // A's success screenshot plus B's failure screenshot.
    assert_eq!(surface.captured().len(), 2);
}

#[tokio::test]
async fn test_session_closed_before_evidence_downgrades_pass() {
    let dir = create_test_dir();
    let store = ResultsStore::new(dir.path().join("results"));
    let (mut session, surface, _abort) = make_session(3, dir.path());
    session.seed(["A", "B"]);

    // The step itself succeeds, but the browser dies before the success
    // screenshot can be taken.
    let closer = surface.clone();
    let err = session
        .run_step("A", quick_retry(3), move |_s| {
            let closer = closer.clone();
            async move {
                closer.close();
                Ok(())
            }
        })
        .await
        .unwrap_err();
    assert!(err.is_session_death());

    // Further steps are refused against a dead session.
    let err = session
        .run_step("B", quick_retry(3), |_s| async { Ok(()) })
        .await
        .unwrap_err();
    assert!(err.is_session_death());

    let result = session.close(&store).await.unwrap();

    assert_eq!(result.test_cases[0].status, TestStatus::Fail);
    assert!(result.test_cases[0]
        .error
        .as_ref()
        .unwrap()
        .message
        .contains("closed before evidence capture"));
    assert_eq!(result.test_cases[1].status, TestStatus::NotRun);
    assert!(!result.passed());
}

#[tokio::test]
async fn test_manual_abort_between_steps() {
    let dir = create_test_dir();
    let store = ResultsStore::new(dir.path().join("results"));
    let (mut session, _surface, abort) = make_session(4, dir.path());
    session.seed(["A", "B"]);

    session
        .run_step("A", quick_retry(3), |_s| async { Ok(()) })
        .await
        .unwrap();

    abort.raise("stop button");

    let err = session
        .run_step("B", quick_retry(3), |_s| async { Ok(()) })
        .await
        .unwrap_err();
    assert!(err.is_manual_abort());

    let result = session.close(&store).await.unwrap();

    assert_eq!(result.test_cases[0].status, TestStatus::Pass);
    assert_eq!(result.test_cases[1].status, TestStatus::NotRun);
    assert!(result.test_cases[1]
        .error
        .as_ref()
        .unwrap()
        .message
        .contains("aborted"));
    assert!(!result.passed());
}

#[tokio::test]
async fn test_screenshot_error_implying_session_death_downgrades() {
    let dir = create_test_dir();
    let store = ResultsStore::new(dir.path().join("results"));
    let (mut session, surface, _abort) = make_session(5, dir.path());
    session.seed(["A"]);

    surface.fail_screenshots_with("Target closed");

    let err = session
        .run_step("A", quick_retry(3), |_s| async { Ok(()) })
        .await
        .unwrap_err();
    assert!(err.is_session_death());

    let result = session.close(&store).await.unwrap();
    assert_eq!(result.test_cases[0].status, TestStatus::Fail);
    assert!(!result.passed());
}

#[tokio::test]
async fn test_benign_screenshot_error_keeps_pass() {
    let dir = create_test_dir();
    let store = ResultsStore::new(dir.path().join("results"));
    let (mut session, surface, _abort) = make_session(6, dir.path());
    session.seed(["A"]);

    surface.fail_screenshots_with("disk full");

    session
        .run_step("A", quick_retry(3), |_s| async { Ok(()) })
        .await
        .unwrap();

    let result = session.close(&store).await.unwrap();
    assert_eq!(result.test_cases[0].status, TestStatus::Pass);
    assert!(result.test_cases[0].screenshots.is_empty());
    assert!(result.passed());
}

#[tokio::test]
async fn test_close_persists_result_under_scenario_key() {
    let dir = create_test_dir();
    let store = ResultsStore::new(dir.path().join("results"));
    let (mut session, _surface, _abort) = make_session(7, dir.path());
    session.seed(["A"]);

    session
        .run_step("A", quick_retry(3), |_s| async { Ok(()) })
        .await
        .unwrap();
    session.close(&store).await.unwrap();

    let loaded = store.load("scenario-7").unwrap().expect("entry persisted");
    assert!(loaded.passed());
    assert_eq!(loaded.test_cases[0].name, "A");
}

#[tokio::test]
async fn test_retry_eventually_succeeds_within_step() {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    let dir = create_test_dir();
    let store = ResultsStore::new(dir.path().join("results"));
    let (mut session, _surface, _abort) = make_session(8, dir.path());
    session.seed(["flaky"]);

    let calls = Arc::new(AtomicU32::new(0));
    let counted = calls.clone();

    session
        .run_step("flaky", quick_retry(3), move |_s| {
            let counted = counted.clone();
            async move {
                if counted.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(HarnessError::ActionFailed("not yet".into()))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let result = session.close(&store).await.unwrap();
    assert!(result.passed());
}
