use crate::clock::{format_elapsed, format_timestamp_ms, Locale};
use crate::config::TestResultVerbosity;
use crate::events::{TestResultKind, TestResults, TestStatusMessage};
use crate::timeline::EventPair;
use std::path::PathBuf;
use std::sync::Mutex;

/// Formats test report fragments: the run header, one block per target, and
/// the run-complete summary.
#[derive(Debug, Clone)]
pub struct TestReportFormatter {
    verbosity: TestResultVerbosity,
    log_path: Option<PathBuf>,
    locale: Locale,
    utc_offset_minutes: i32,
}

impl TestReportFormatter {
    pub fn new(
        verbosity: TestResultVerbosity,
        log_path: Option<PathBuf>,
        locale: Locale,
        utc_offset_minutes: i32,
    ) -> Self {
        Self {
            verbosity,
            log_path,
            locale,
            utc_offset_minutes,
        }
    }

    pub fn run_started(&self, out: &mut Vec<String>, run_all: bool, target_names: &[String]) {
        if run_all {
            out.push("RESULTS FOR ALL TESTS".to_string());
        } else {
            out.push(format!("RESULTS FOR {}", target_names.join(" ")));
        }
    }

    pub fn report_result(&self, out: &mut Vec<String>, results: &TestResults) {
        let passes = results.count(TestResultKind::Success);
        let failures = results.count(TestResultKind::Failure);
        let skips = results.count(TestResultKind::AssumptionViolation);
        let status = if failures > 0 { "FAIL" } else { "PASS" };
        out.push(format!(
            "{status} {:>8} {passes} Passed {skips} Skipped {failures} Failed {}",
            format_elapsed(&self.locale, results.total_duration_ms()),
            results.target
        ));
        if self.verbosity == TestResultVerbosity::Brief {
            return;
        }
        for summary in &results.summaries {
            if summary.kind != TestResultKind::Failure {
                continue;
            }
            out.push(format!(
                "FAILURE {} {}: {}",
                summary.test_case,
                summary.test_name,
                summary.message.as_deref().unwrap_or("")
            ));
            if self.verbosity == TestResultVerbosity::Verbose {
                if let Some(stdout) = &summary.stdout {
                    out.push("====STANDARD OUT====".to_string());
                    out.extend(stdout.lines().map(str::to_string));
                }
                if let Some(stderr) = &summary.stderr {
                    out.push("====STANDARD ERR====".to_string());
                    out.extend(stderr.lines().map(str::to_string));
                }
            }
        }
    }

    pub fn run_complete(
        &self,
        out: &mut Vec<String>,
        results: &[TestResults],
        status_messages: &[TestStatusMessage],
    ) {
        let failures: usize = results
            .iter()
            .map(|r| r.count(TestResultKind::Failure))
            .sum();
        if failures == 0 {
            out.push("TESTS PASSED".to_string());
        } else {
            out.push(format!("TESTS FAILED: {failures} FAILURES"));
        }
        for message in status_messages {
            out.push(format!(
                "{} {}",
                format_timestamp_ms(self.utc_offset_minutes, message.timestamp_ms as i64),
                message.message
            ));
        }
        if let Some(path) = &self.log_path {
            out.push(format!("Updated test logs: {}", path.display()));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunInfo {
    pub started_ms: u64,
    pub run_all: bool,
    pub target_names: Vec<String>,
}

/// Accumulates per-test results and the formatted report. The report and
/// status-message buffers are the only write-path structures that need their
/// own locks.
#[derive(Debug, Default)]
pub struct TestAggregator {
    run_started: Mutex<Option<TestRunInfo>>,
    run_finished_ms: Mutex<Option<u64>>,
    report: Mutex<Vec<String>>,
    status_messages: Mutex<Vec<TestStatusMessage>>,
}

impl TestAggregator {
    /// Duplicate starts are a producer bug and must not be masked.
    pub fn record_run_started(&self, formatter: &TestReportFormatter, info: TestRunInfo) {
        let mut slot = self.run_started.lock().expect("test run slot lock");
        assert!(
            slot.is_none(),
            "test run started while another run is in progress"
        );
        let mut fragment = Vec::new();
        formatter.run_started(&mut fragment, info.run_all, &info.target_names);
        self.report
            .lock()
            .expect("test report lock")
            .extend(fragment);
        *slot = Some(info);
    }

    /// Formats every result plus the run summary into the report and returns
    /// the full report text for the stdout block.
    pub fn record_run_finished(
        &self,
        formatter: &TestReportFormatter,
        timestamp_ms: u64,
        results: &[TestResults],
    ) -> String {
        {
            let mut slot = self.run_finished_ms.lock().expect("test run slot lock");
            assert!(slot.is_none(), "test run finished twice");
            *slot = Some(timestamp_ms);
        }
        let mut fragment = Vec::new();
        for result in results {
            formatter.report_result(&mut fragment, result);
        }
        let messages = self
            .status_messages
            .lock()
            .expect("status message lock")
            .clone();
        formatter.run_complete(&mut fragment, results, &messages);

        let mut report = self.report.lock().expect("test report lock");
        report.extend(fragment);
        report.join("\n")
    }

    pub fn add_status_message(&self, message: TestStatusMessage) {
        self.status_messages
            .lock()
            .expect("status message lock")
            .push(message);
    }

    pub fn run_span(&self) -> EventPair {
        EventPair {
            start_ms: self
                .run_started
                .lock()
                .expect("test run slot lock")
                .as_ref()
                .map(|info| info.started_ms),
            end_ms: *self.run_finished_ms.lock().expect("test run slot lock"),
        }
    }
}
