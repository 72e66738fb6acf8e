//! Console summary of a finished scenario

use std::fmt::Write as _;

use crate::harness::aggregator::{ScenarioResult, TestStatus};

/// Render the final per-case table the CLI prints after a run.
pub fn render_summary(product: &str, scenario_name: &str, result: &ScenarioResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "--- {product} {scenario_name} results ---");
    for tc in &result.test_cases {
        let (mark, label) = match tc.status {
            TestStatus::Pass => ("✓", "PASS"),
            TestStatus::Fail => ("✗", "FAIL"),
            TestStatus::NotRun => ("-", "NOT RUN"),
            TestStatus::Pending => ("?", "PENDING"),
        };
        let _ = writeln!(out, "{mark} {}: {label} ({}ms)", tc.name, tc.duration_ms);
        if let Some(error) = &tc.error {
            let _ = writeln!(out, "    error: {}", error.message);
        }
    }
    let _ = writeln!(out, "----------------------------------");

    let passed = result.test_cases.iter().filter(|tc| tc.status == TestStatus::Pass).count();
    let failed = result.test_cases.iter().filter(|tc| tc.status == TestStatus::Fail).count();
    let not_run = result.test_cases.iter().filter(|tc| tc.status == TestStatus::NotRun).count();
    let _ = writeln!(
        out,
        "{} passed, {} failed, {} not run",
        passed, failed, not_run
    );

    let verdict = if result.passed() { "PASS" } else { "FAIL" };
    let _ = writeln!(out, "Overall: {verdict} ({})", result.duration_label);
    if let Some(error) = &result.error {
        let _ = writeln!(out, "Error: {}", error.message);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::aggregator::{ErrorInfo, ScenarioResultAggregator};

    #[test]
    fn test_summary_lists_every_case_with_verdict() {
        let mut agg = ScenarioResultAggregator::new();
        agg.seed(["A", "B", "C"]);
        agg.begin_step("A");
        agg.end_step_success("A");
        agg.begin_step("B");
        agg.end_step_failure("B", ErrorInfo::new("selector not found"));
        agg.finalize(None);

        let summary = render_summary("viola", "pod create", agg.result());
        assert!(summary.contains("✓ A: PASS"));
        assert!(summary.contains("✗ B: FAIL"));
        assert!(summary.contains("selector not found"));
        assert!(summary.contains("- C: NOT RUN"));
        assert!(summary.contains("1 passed, 1 failed, 1 not run"));
        assert!(summary.contains("Overall: FAIL"));
    }

    #[test]
    fn test_summary_pass_verdict() {
        let mut agg = ScenarioResultAggregator::new();
        agg.seed(["A"]);
        agg.begin_step("A");
        agg.end_step_success("A");
        agg.finalize(None);

        let summary = render_summary("viola", "smoke", agg.result());
        assert!(summary.contains("Overall: PASS"));
    }
}
