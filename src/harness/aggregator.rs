//! Scenario result aggregation
//!
//! One aggregator owns the authoritative [`ScenarioResult`] for a run and
//! mediates every status transition. Planned steps are pre-seeded as
//! `Pending`; execution moves them forward to `Pass` or `Fail`; whatever is
//! still `Pending` when the scenario ends is swept to `NotRun` so partial
//! runs are visible in reports instead of silently truncated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::HarnessError;

/// Status of a single test case. Transitions only move forward:
/// `Pending -> {Pass, Fail}`, with the finalization sweep rewriting any
/// leftover `Pending` to `NotRun`. A `Pass` may be retroactively downgraded
/// to `Fail` when the session is found dead before evidence capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    Pending,
    Pass,
    Fail,
    NotRun,
}

/// Overall scenario verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

/// One captured log line, appended while a step is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// One screenshot attached to a step, path relative to the reports dir.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRecord {
    pub path: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Serializable error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }
}

impl From<&HarnessError> for ErrorInfo {
    fn from(err: &HarnessError) -> Self {
        Self::new(err.to_string())
    }
}

/// One planned or executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    pub status: TestStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub error: Option<ErrorInfo>,
    pub logs: Vec<LogEntry>,
    pub screenshots: Vec<ScreenshotRecord>,
}

impl TestCase {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: TestStatus::Pending,
            start_time: None,
            end_time: None,
            duration_ms: 0,
            error: None,
            logs: Vec::new(),
            screenshots: Vec::new(),
        }
    }
}

/// Aggregate over one scenario run. Insertion order of `test_cases` is the
/// declared plan order; unplanned steps append at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub overall_status: OverallStatus,
    pub test_cases: Vec<TestCase>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_label: String,
    pub error: Option<ErrorInfo>,
}

impl ScenarioResult {
    fn empty() -> Self {
        Self {
            overall_status: OverallStatus::Pass,
            test_cases: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            duration_label: String::new(),
            error: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.overall_status == OverallStatus::Pass
    }
}

/// Owns the [`ScenarioResult`] for one run and mediates all transitions.
#[derive(Debug)]
pub struct ScenarioResultAggregator {
    result: ScenarioResult,
    planned: HashSet<String>,
    last_pass: Option<usize>,
}

impl ScenarioResultAggregator {
    pub fn new() -> Self {
        Self {
            result: ScenarioResult::empty(),
            planned: HashSet::new(),
            last_pass: None,
        }
    }

    /// Initialize one `Pending` case per planned name, in order. Calling
    /// again resets the aggregate for a fresh run.
    pub fn seed<I, S>(&mut self, planned_names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.result = ScenarioResult::empty();
        self.planned.clear();
        self.last_pass = None;

        for name in planned_names {
            let name = name.as_ref();
            if self.planned.insert(name.to_string()) {
                self.result.test_cases.push(TestCase::pending(name));
            }
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.result.test_cases.iter().position(|tc| tc.name == name)
    }

    /// Find or lazily create the case for `name` (unplanned steps are
    /// tolerated and appended), reset its per-run fields, and mark it
    /// in flight.
    pub fn begin_step(&mut self, name: &str) {
        let idx = match self.index_of(name) {
            Some(idx) => idx,
            None => {
                self.result.test_cases.push(TestCase::pending(name));
                self.result.test_cases.len() - 1
            }
        };

        let tc = &mut self.result.test_cases[idx];
        tc.status = TestStatus::Pending;
        tc.start_time = Some(Utc::now());
        tc.end_time = None;
        tc.duration_ms = 0;
        tc.error = None;
        tc.logs.clear();
        tc.screenshots.clear();
    }

    /// Append a log line to the in-flight case. No-op for unknown names.
    pub fn append_log(&mut self, name: &str, level: LogLevel, message: impl Into<String>) {
        if let Some(idx) = self.index_of(name) {
            self.result.test_cases[idx].logs.push(LogEntry {
                timestamp: Utc::now(),
                level,
                message: message.into(),
            });
        }
    }

    /// Attach a captured screenshot to the named case.
    pub fn attach_screenshot(&mut self, name: &str, path: impl Into<String>, description: impl Into<String>) {
        if let Some(idx) = self.index_of(name) {
            self.result.test_cases[idx].screenshots.push(ScreenshotRecord {
                path: path.into(),
                description: description.into(),
                timestamp: Utc::now(),
            });
        }
    }

    fn close_case(&mut self, idx: usize, status: TestStatus, error: Option<ErrorInfo>) {
        let tc = &mut self.result.test_cases[idx];
        let now = Utc::now();
        tc.status = status;
        tc.end_time = Some(now);
        if let Some(start) = tc.start_time {
            tc.duration_ms = (now - start).num_milliseconds().max(0) as u64;
        }
        tc.error = error;
    }

    pub fn end_step_success(&mut self, name: &str) {
        if let Some(idx) = self.index_of(name) {
            self.close_case(idx, TestStatus::Pass, None);
            self.last_pass = Some(idx);
        }
    }

    /// Terminal failure for a step. The first failure also becomes the
    /// aggregate-level error.
    pub fn end_step_failure(&mut self, name: &str, error: ErrorInfo) {
        if let Some(idx) = self.index_of(name) {
            self.close_case(idx, TestStatus::Fail, Some(error.clone()));
            self.result.overall_status = OverallStatus::Fail;
            if self.result.error.is_none() {
                self.result.error = Some(error);
            }
        }
    }

    /// Given a liveness probe taken right after a step's logical completion,
    /// downgrade the most recent `Pass` to `Fail` if the session died before
    /// evidence capture could run. Returns true when a downgrade happened.
    pub fn detect_post_hoc_failure(&mut self, session_alive: bool) -> bool {
        if session_alive {
            return false;
        }
        let Some(idx) = self.last_pass else {
            return false;
        };
        if self.result.test_cases[idx].status != TestStatus::Pass {
            return false;
        }

        let error = ErrorInfo::new("browser session closed before evidence capture");
        let tc = &mut self.result.test_cases[idx];
        tc.status = TestStatus::Fail;
        tc.error = Some(error.clone());
        self.result.overall_status = OverallStatus::Fail;
        if self.result.error.is_none() {
            self.result.error = Some(error);
        }
        self.last_pass = None;
        true
    }

    /// Sweep remaining `Pending` cases to `NotRun` and settle the overall
    /// verdict. `abort_reason` distinguishes an operator stop from an
    /// upstream failure in the synthetic per-case errors.
    pub fn finalize(&mut self, abort_reason: Option<&str>) -> &ScenarioResult {
        let any_fail = self
            .result
            .test_cases
            .iter()
            .any(|tc| tc.status == TestStatus::Fail);

        let mut planned_skipped = false;
        let now = Utc::now();

        for tc in &mut self.result.test_cases {
            if tc.status != TestStatus::Pending {
                continue;
            }
            if self.planned.contains(&tc.name) {
                planned_skipped = true;
            }
            tc.status = TestStatus::NotRun;
            tc.end_time = Some(now);
            tc.error = Some(ErrorInfo::new(match abort_reason {
                Some(reason) => format!("not run: scenario aborted: {reason}"),
                None if any_fail => "not run: an earlier step failed".to_string(),
                None => "not run: scenario ended before this step ran".to_string(),
            }));
        }

        // Appended bookkeeping cases that never ran do not fail an otherwise
        // clean scenario; a planned step left behind does.
        if any_fail || abort_reason.is_some() || planned_skipped {
            self.result.overall_status = OverallStatus::Fail;
        }
        if self.result.error.is_none() {
            if let Some(reason) = abort_reason {
                self.result.error = Some(ErrorInfo::new(format!("scenario aborted: {reason}")));
            } else if planned_skipped && !any_fail {
                self.result.error = Some(ErrorInfo::new("scenario ended before all planned steps ran"));
            }
        }

        self.result.finished_at = Some(now);
        self.result.duration_label = duration_label(self.result.started_at, now);
        &self.result
    }

    pub fn result(&self) -> &ScenarioResult {
        &self.result
    }

    pub fn into_result(self) -> ScenarioResult {
        self.result
    }
}

impl Default for ScenarioResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_label(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let total_secs = (end - start).num_seconds().max(0);
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    if mins > 0 {
        format!("{mins}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(names: &[&str]) -> ScenarioResultAggregator {
        let mut agg = ScenarioResultAggregator::new();
        agg.seed(names.iter().copied());
        agg
    }

    #[test]
    fn test_seed_creates_pending_cases_in_order() {
        let agg = seeded(&["A", "B", "C"]);
        let names: Vec<_> = agg.result().test_cases.iter().map(|tc| tc.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(agg
            .result()
            .test_cases
            .iter()
            .all(|tc| tc.status == TestStatus::Pending));
    }

    #[test]
    fn test_reseeding_resets_the_aggregate() {
        let mut agg = seeded(&["A"]);
        agg.begin_step("A");
        agg.end_step_failure("A", ErrorInfo::new("boom"));
        agg.seed(["X", "Y"]);
        assert_eq!(agg.result().test_cases.len(), 2);
        assert_eq!(agg.result().overall_status, OverallStatus::Pass);
        assert!(agg.result().error.is_none());
    }

    #[test]
    fn test_unplanned_steps_append() {
        let mut agg = seeded(&["A"]);
        agg.begin_step("surprise");
        agg.end_step_success("surprise");
        assert_eq!(agg.result().test_cases.len(), 2);
        assert_eq!(agg.result().test_cases[1].name, "surprise");
    }

    #[test]
    fn test_first_failure_wins_at_aggregate_level() {
        let mut agg = seeded(&["A", "B"]);
        agg.begin_step("A");
        agg.end_step_failure("A", ErrorInfo::new("first"));
        agg.begin_step("B");
        agg.end_step_failure("B", ErrorInfo::new("second"));
        assert_eq!(agg.result().error.as_ref().unwrap().message, "first");
    }

    #[test]
    fn test_finalize_with_zero_steps_run_fails_everything() {
        let mut agg = seeded(&["A", "B", "C"]);
        let result = agg.finalize(None);
        assert!(result
            .test_cases
            .iter()
            .all(|tc| tc.status == TestStatus::NotRun));
        assert_eq!(result.overall_status, OverallStatus::Fail);
    }

    #[test]
    fn test_pass_fail_notrun_end_to_end() {
        let mut agg = seeded(&["A", "B", "C"]);
        agg.begin_step("A");
        agg.end_step_success("A");
        agg.begin_step("B");
        agg.end_step_failure("B", ErrorInfo::new("retries exhausted"));
        let result = agg.finalize(None);

        assert_eq!(result.test_cases[0].status, TestStatus::Pass);
        assert_eq!(result.test_cases[1].status, TestStatus::Fail);
        assert_eq!(result.test_cases[2].status, TestStatus::NotRun);
        assert_eq!(result.overall_status, OverallStatus::Fail);
        assert_eq!(result.error.as_ref().unwrap().message, "retries exhausted");
        assert!(result.test_cases[2]
            .error
            .as_ref()
            .unwrap()
            .message
            .contains("an earlier step failed"));
    }

    #[test]
    fn test_abort_reason_is_reflected_in_skipped_cases() {
        let mut agg = seeded(&["A", "B"]);
        agg.begin_step("A");
        agg.end_step_success("A");
        let result = agg.finalize(Some("stop button"));

        assert_eq!(result.test_cases[1].status, TestStatus::NotRun);
        assert!(result.test_cases[1]
            .error
            .as_ref()
            .unwrap()
            .message
            .contains("aborted"));
        assert_eq!(result.overall_status, OverallStatus::Fail);
    }

    #[test]
    fn test_clean_run_stays_pass_even_with_unrun_bookkeeping_case() {
        let mut agg = seeded(&["A"]);
        agg.begin_step("A");
        agg.end_step_success("A");
        // Bookkeeping case appended mid-run but never executed.
        agg.begin_step("write report");
        let result = agg.finalize(None);

        assert_eq!(result.test_cases[1].status, TestStatus::NotRun);
        assert_eq!(result.overall_status, OverallStatus::Pass);
    }

    #[test]
    fn test_post_hoc_downgrade_of_most_recent_pass() {
        let mut agg = seeded(&["A", "B"]);
        agg.begin_step("A");
        agg.end_step_success("A");

        assert!(agg.detect_post_hoc_failure(false));
        let result = agg.finalize(None);

        assert_eq!(result.test_cases[0].status, TestStatus::Fail);
        assert!(result.test_cases[0]
            .error
            .as_ref()
            .unwrap()
            .message
            .contains("closed before evidence capture"));
        assert_eq!(result.test_cases[1].status, TestStatus::NotRun);
        assert_eq!(result.overall_status, OverallStatus::Fail);
    }

    #[test]
    fn test_post_hoc_probe_with_live_session_changes_nothing() {
        let mut agg = seeded(&["A"]);
        agg.begin_step("A");
        agg.end_step_success("A");
        assert!(!agg.detect_post_hoc_failure(true));
        assert_eq!(agg.result().test_cases[0].status, TestStatus::Pass);
    }

    #[test]
    fn test_no_case_is_ever_left_pending_after_finalize() {
        // Exhaustive over every pass/fail/skip pattern of a 4-step plan.
        let names = ["a", "b", "c", "d"];
        for pattern in 0..3u32.pow(names.len() as u32) {
            let mut agg = seeded(&names);
            let mut code = pattern;
            for name in names {
                match code % 3 {
                    0 => {
                        agg.begin_step(name);
                        agg.end_step_success(name);
                    }
                    1 => {
                        agg.begin_step(name);
                        agg.end_step_failure(name, ErrorInfo::new("x"));
                    }
                    _ => {} // never started
                }
                code /= 3;
            }
            let result = agg.finalize(None);

            assert!(result
                .test_cases
                .iter()
                .all(|tc| tc.status != TestStatus::Pending));

            // overall == Fail iff some case failed or a planned case was skipped.
            let any_fail = result.test_cases.iter().any(|tc| tc.status == TestStatus::Fail);
            let any_skip = result.test_cases.iter().any(|tc| tc.status == TestStatus::NotRun);
            let expect_fail = any_fail || any_skip;
            assert_eq!(
                result.overall_status == OverallStatus::Fail,
                expect_fail,
                "pattern {pattern}"
            );
        }
    }

    #[test]
    fn test_logs_and_screenshots_attach_to_in_flight_case() {
        let mut agg = seeded(&["A"]);
        agg.begin_step("A");
        agg.append_log("A", LogLevel::Info, "starting");
        agg.attach_screenshot("A", "screenshot-A-success-x.png", "A success screenshot");
        agg.end_step_success("A");

        let tc = &agg.result().test_cases[0];
        assert_eq!(tc.logs.len(), 1);
        assert_eq!(tc.screenshots.len(), 1);
        assert_eq!(tc.screenshots[0].path, "screenshot-A-success-x.png");
    }

    #[test]
    fn test_duration_label_format() {
        let start = Utc::now();
        let end = start + chrono::Duration::seconds(125);
        assert_eq!(duration_label(start, end), "2m 05s");
        let end = start + chrono::Duration::seconds(42);
        assert_eq!(duration_label(start, end), "42s");
    }
}
