use marquee::clock::FakeClock;
use marquee::config::DashboardConfig;
use marquee::console::ConsoleOutput;
use marquee::dashboard::Dashboard;
use marquee::events::{
    CacheResult, DistBuildLogRecord, DistBuildState, DistBuildStatus, Event, EventKind,
    RuleStatus, TestResultKind, TestResultSummary,
};
use marquee::progress::ProgressEstimator;
use std::sync::Arc;

fn dashboard(cfg: DashboardConfig) -> (Dashboard, FakeClock) {
    let clock = FakeClock::new(0);
    let (output, _stdout, _stderr) = ConsoleOutput::capture();
    let board = Dashboard::new(cfg, Arc::new(clock.clone()), output);
    (board, clock)
}

fn event(timestamp_ms: u64, worker_id: u64, event_key: u64, kind: EventKind) -> Event {
    Event::new(timestamp_ms, worker_id, event_key, kind)
}

fn finish_processing(board: &Dashboard, start_ms: u64, end_ms: u64) {
    board.handle_event(event(start_ms, 0, 1, EventKind::ParseStarted));
    board.handle_event(event(end_ms, 0, 1, EventKind::ParseFinished));
}

fn success(cache: CacheResult) -> EventKind {
    EventKind::RuleFinished {
        name: "//lib:rule".to_string(),
        status: RuleStatus::Success,
        cache,
    }
}

#[test]
fn empty_build_renders_zero_lines() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    assert!(board.render_lines_at(0).is_empty());
}

#[test]
fn intro_parse_line_shows_until_a_real_parse_starts() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    board.handle_event(event(0, 0, 1, EventKind::BuildFileParseStarted));
    let lines = board.render_lines_at(500);
    assert_eq!(lines, vec!["[+] PARSING BUILD FILES...0.5s".to_string()]);

    board.handle_event(event(600, 0, 2, EventKind::ParseStarted));
    let lines = board.render_lines_at(700);
    assert_eq!(lines, vec!["[+] PROCESSING BUILD FILES...0.1s".to_string()]);
}

#[test]
fn parse_then_build_produces_the_expected_frame() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    finish_processing(&board, 0, 1_000);
    board.handle_event(event(1_000, 0, 2, EventKind::BuildStarted { distributed: false }));
    board.handle_event(event(1_000, 0, 2, EventKind::RuleCountCalculated { rule_count: 10 }));
    for worker in 0..10 {
        board.handle_event(event(2_000, worker, 10 + worker, success(CacheResult::LocalKeyUnchangedHit)));
    }
    board.handle_event(event(
        2_000,
        0,
        2,
        EventKind::BuildFinished {
            build_id: "b-1".to_string(),
        },
    ));

    let lines = board.render_lines_at(2_500);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "[-] PROCESSING BUILD FILES...FINISHED 1.0s");
    assert!(lines[1].starts_with("[-] DOWNLOADING..."));
    assert!(lines[2].starts_with("[-] BUILDING...FINISHED 1.0s"));
    assert!(lines[2].contains("(10/10 JOBS, 0 UPDATED, 0 [0.0%] CACHE MISS)"));
}

#[test]
fn cache_percentages_divide_misses_by_rules_and_errors_by_updated() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    finish_processing(&board, 0, 1_000);
    board.handle_event(event(1_000, 0, 2, EventKind::BuildStarted { distributed: false }));
    board.handle_event(event(1_000, 0, 2, EventKind::RuleCountCalculated { rule_count: 4 }));
    board.handle_event(event(1_500, 0, 10, success(CacheResult::Miss)));
    board.handle_event(event(1_500, 1, 11, success(CacheResult::Error)));
    board.handle_event(event(1_500, 2, 12, success(CacheResult::Hit)));
    board.handle_event(event(1_500, 3, 13, success(CacheResult::LocalKeyUnchangedHit)));

    let lines = board.render_lines_at(2_000);
    let building = lines
        .iter()
        .find(|l| l.contains("BUILDING"))
        .expect("building line");
    assert!(building.contains(
        "(4/4 JOBS, 3 UPDATED, 1 [25.0%] CACHE MISS, 1 [33.3%] CACHE ERRORS)"
    ));
}

#[test]
fn building_suffix_links_the_trace_server_after_the_build() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    board.set_trace_server_port(9595);
    finish_processing(&board, 0, 1_000);
    board.handle_event(event(1_000, 0, 2, EventKind::BuildStarted { distributed: false }));

    // no link while the build is in flight
    let lines = board.render_lines_at(1_500);
    assert!(!lines.iter().any(|l| l.contains("Details:")));

    board.handle_event(event(
        2_000,
        0,
        2,
        EventKind::BuildFinished {
            build_id: "abc123".to_string(),
        },
    ));
    let lines = board.render_lines_at(2_500);
    let building = lines
        .iter()
        .find(|l| l.contains("BUILDING"))
        .expect("building line");
    assert!(building.contains("Details: http://localhost:9595/trace/abc123"));
}

#[test]
fn six_busy_workers_compress_into_three_thread_lines() {
    let mut cfg = DashboardConfig::default();
    cfg.render.thread_line_limit = 3;
    let (board, _clock) = dashboard(cfg);
    finish_processing(&board, 0, 1_000);
    board.handle_event(event(1_000, 0, 2, EventKind::BuildStarted { distributed: false }));
    for worker in 0..6u64 {
        board.handle_event(event(
            1_100,
            worker,
            20 + worker,
            EventKind::RuleStarted {
                name: format!("//lib:rule{worker}"),
            },
        ));
        board.handle_event(event(
            1_100,
            worker,
            30 + worker,
            EventKind::StepStarted {
                description: format!("compiling unit {worker}"),
                short_name: format!("cc{worker}"),
            },
        ));
    }

    let lines = board.render_lines_at(2_000);
    let building_at = lines
        .iter()
        .position(|l| l.contains("BUILDING"))
        .expect("building line");
    let thread_lines = &lines[building_at + 1..building_at + 4];
    assert!(thread_lines[0].starts_with(" |=> "));
    assert!(thread_lines[1].starts_with(" |=> "));
    let compressed = &thread_lines[2];
    assert!(compressed.starts_with(" |=> 4 MORE THREADS:"));
    assert_eq!(compressed.matches('[').count(), 4);
}

#[test]
fn distributed_build_renders_debug_block_status_line_and_local_progress() {
    let (board, clock) = dashboard(DashboardConfig::default());
    finish_processing(&board, 0, 1_000);
    board.handle_event(event(1_000, 0, 2, EventKind::BuildStarted { distributed: true }));
    clock.set(2_000);
    board.handle_event(event(
        2_000,
        0,
        3,
        EventKind::DistBuildStatusUpdate {
            status: DistBuildStatus {
                state: DistBuildState::Building,
                eta_ms: 3_000,
                message: Some("42 nodes".to_string()),
                log_book: Some(vec![DistBuildLogRecord {
                    timestamp_ms: 0,
                    name: "coordinator up".to_string(),
                }]),
            },
        },
    ));

    let lines = board.render_lines_at(2_000);
    assert!(lines[0].contains("Distributed build debug info:"));
    assert!(lines[1].contains("[1970-01-01 00:00:00.000] coordinator up"));
    let status = lines
        .iter()
        .find(|l| l.contains("DISTBUILD STATUS"))
        .expect("status line");
    assert!(status.contains("[+] DISTBUILD STATUS: BUILDING..."));
    assert!(status.contains("ETA: 3.0s"));
    assert!(status.contains("(42 nodes)"));
    // local progress: 1000 elapsed / (1000 + 3000) eta
    let building = lines
        .iter()
        .find(|l| l.starts_with("[+] BUILDING"))
        .expect("building line");
    assert!(building.contains("[25%]"), "{building}");
}

#[test]
fn emitting_the_debug_block_drops_the_thread_cap_to_the_warning_limit() {
    let mut cfg = DashboardConfig::default();
    cfg.render.thread_line_limit = 10;
    cfg.render.thread_line_limit_on_warning = 2;
    let (board, _clock) = dashboard(cfg);
    finish_processing(&board, 0, 1_000);
    board.handle_event(event(1_000, 0, 2, EventKind::BuildStarted { distributed: true }));
    board.handle_event(event(
        1_000,
        0,
        3,
        EventKind::DistBuildStatusUpdate {
            status: DistBuildStatus {
                state: DistBuildState::Building,
                eta_ms: 0,
                message: None,
                log_book: Some(vec![DistBuildLogRecord {
                    timestamp_ms: 0,
                    name: "boot".to_string(),
                }]),
            },
        },
    ));
    for worker in 0..3u64 {
        board.handle_event(event(
            1_100,
            worker,
            30 + worker,
            EventKind::StepStarted {
                description: format!("compiling unit {worker}"),
                short_name: format!("cc{worker}"),
            },
        ));
    }

    let lines = board.render_lines_at(2_000);
    let compressed = lines
        .iter()
        .find(|l| l.contains("MORE THREADS:"))
        .expect("compressed line");
    assert!(compressed.starts_with(" |=> 2 MORE THREADS:"));
}

#[test]
fn testing_line_orders_pass_skip_fail_and_composes_activity_slots() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    finish_processing(&board, 0, 1_000);
    board.handle_event(event(1_000, 0, 2, EventKind::BuildStarted { distributed: false }));
    board.handle_event(event(
        1_500,
        0,
        2,
        EventKind::BuildFinished {
            build_id: "b-1".to_string(),
        },
    ));
    board.handle_event(event(
        1_500,
        0,
        4,
        EventKind::TestRunStarted {
            run_all: true,
            target_names: vec![],
        },
    ));
    for (kind, name) in [
        (TestResultKind::Success, "adds"),
        (TestResultKind::Success, "subs"),
        (TestResultKind::AssumptionViolation, "skipped"),
        (TestResultKind::Failure, "boom"),
    ] {
        board.handle_event(event(
            1_600,
            1,
            5,
            EventKind::TestSummaryFinished {
                summary: TestResultSummary {
                    test_case: "CoreSuite".to_string(),
                    test_name: name.to_string(),
                    kind,
                    duration_ms: 10,
                    message: None,
                    stdout: None,
                    stderr: None,
                },
            },
        ));
    }
    board.handle_event(event(
        1_700,
        2,
        6,
        EventKind::TestSummaryStarted {
            test_case: "CoreSuite".to_string(),
            test_name: "muls".to_string(),
        },
    ));

    let lines = board.render_lines_at(2_000);
    let testing = lines
        .iter()
        .find(|l| l.contains("TESTING"))
        .expect("testing line");
    assert!(testing.contains("[+] TESTING..."));
    assert!(testing.contains("(2 PASS/1 SKIP/1 FAIL)"));
    // the running summary renders as a test thread line below TESTING
    let testing_at = lines.iter().position(|l| l.contains("TESTING")).expect("pos");
    assert!(lines[testing_at + 1].contains("CoreSuite muls"));
}

#[test]
fn install_and_http_upload_lines_gate_on_their_own_events() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    finish_processing(&board, 0, 1_000);
    board.handle_event(event(1_000, 0, 2, EventKind::BuildStarted { distributed: false }));
    board.handle_event(event(1_200, 0, 7, EventKind::InstallStarted));
    board.handle_event(event(1_400, 0, 7, EventKind::InstallFinished));
    board.handle_event(event(1_500, 0, 8, EventKind::HttpUploadScheduled));
    board.handle_event(event(1_500, 0, 9, EventKind::HttpUploadScheduled));
    board.handle_event(event(1_550, 0, 8, EventKind::HttpUploadStarted));
    board.handle_event(event(1_600, 0, 8, EventKind::HttpUploadFinished { success: true }));

    let lines = board.render_lines_at(2_000);
    assert!(lines
        .iter()
        .any(|l| l.starts_with("[-] INSTALLING...FINISHED 0.2s")));
    let upload = lines
        .iter()
        .find(|l| l.contains("HTTP CACHE UPLOAD"))
        .expect("upload line");
    assert!(upload.starts_with("[+] HTTP CACHE UPLOAD..."));
    assert!(upload.contains("(1 COMPLETE/0 FAILED/0 UPLOADING/1 PENDING)"));

    board.handle_event(event(2_500, 0, 9, EventKind::HttpCacheShutdown));
    let lines = board.render_lines_at(3_000);
    let upload = lines
        .iter()
        .find(|l| l.contains("HTTP CACHE UPLOAD"))
        .expect("upload line");
    assert!(upload.starts_with("[-] HTTP CACHE UPLOAD...FINISHED 1.0s"));
}

#[test]
fn network_line_reports_totals_and_switches_to_average_after_the_build() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    finish_processing(&board, 0, 1_000);
    board.handle_event(event(1_000, 0, 2, EventKind::BuildStarted { distributed: false }));
    board.handle_event(event(1_000, 0, 40, EventKind::BytesReceived { bytes: 1_024 }));
    board.handle_event(event(1_500, 0, 41, EventKind::BytesReceived { bytes: 1_024 }));
    board.handle_event(event(1_500, 0, 42, EventKind::HttpFetchFinished));

    let lines = board.render_lines_at(1_500);
    let network = lines
        .iter()
        .find(|l| l.contains("DOWNLOADING"))
        .expect("network line");
    assert!(network.starts_with("[+] DOWNLOADING..."));
    assert!(network.contains("TOTAL: 2.00 KB"));
    assert!(network.contains("1 Artifacts"));
    assert!(!network.contains("AVG"));

    board.handle_event(event(
        2_000,
        0,
        2,
        EventKind::BuildFinished {
            build_id: "b-1".to_string(),
        },
    ));
    let lines = board.render_lines_at(2_000);
    let network = lines
        .iter()
        .find(|l| l.contains("DOWNLOADING"))
        .expect("network line");
    assert!(network.starts_with("[-] DOWNLOADING..."));
    // 2048 bytes over the one second since the first byte event
    assert!(network.contains("2.00 KB/S AVG"));
}

struct FixedProgress;

impl ProgressEstimator for FixedProgress {
    fn processing_progress(&self) -> Option<f64> {
        Some(0.25)
    }
}

#[test]
fn estimator_progress_renders_while_running_and_pins_to_100_when_done() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    board.set_progress_estimator(Arc::new(FixedProgress));
    board.handle_event(event(0, 0, 1, EventKind::ParseStarted));
    let lines = board.render_lines_at(500);
    assert_eq!(lines, vec!["[+] PROCESSING BUILD FILES...0.5s [25%]".to_string()]);

    board.handle_event(event(1_000, 0, 1, EventKind::ParseFinished));
    let lines = board.render_lines_at(1_500);
    assert!(lines[0].starts_with("[-] PROCESSING BUILD FILES...FINISHED 1.0s [100%]"));
}

#[test]
fn concurrent_parse_spans_are_not_double_counted() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    board.handle_event(event(0, 0, 1, EventKind::ParseStarted));
    board.handle_event(event(200, 1, 2, EventKind::ActionGraphStarted));
    board.handle_event(event(800, 1, 2, EventKind::ActionGraphFinished));
    board.handle_event(event(1_000, 0, 1, EventKind::ParseFinished));

    let lines = board.render_lines_at(1_500);
    // overlapping spans merge: 0..1000, not 1000 + 600
    assert_eq!(lines[0], "[-] PROCESSING BUILD FILES...FINISHED 1.0s");
}

#[test]
fn building_time_subtracts_processing_overlap_inside_the_build_window() {
    let (board, _clock) = dashboard(DashboardConfig::default());
    // processing keeps running for the first 500 ms of the build
    board.handle_event(event(0, 0, 1, EventKind::ParseStarted));
    board.handle_event(event(200, 0, 2, EventKind::BuildStarted { distributed: false }));
    board.handle_event(event(700, 0, 1, EventKind::ParseFinished));
    board.handle_event(event(
        1_200,
        0,
        2,
        EventKind::BuildFinished {
            build_id: "b-1".to_string(),
        },
    ));

    let lines = board.render_lines_at(2_000);
    let building = lines
        .iter()
        .find(|l| l.contains("BUILDING"))
        .expect("building line");
    // build window is 1000 ms, 500 ms of which was still processing
    assert!(building.starts_with("[-] BUILDING...FINISHED 0.5s"));
}
