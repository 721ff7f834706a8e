use crate::clock::{format_decimal_1, format_decimal_2, format_elapsed, format_timestamp_ms, Locale};
use crate::console::as_warning;
use crate::counters::BuildCounters;
use crate::dashboard::{DashboardInner, DashboardState};
use crate::events::DistBuildState;
use crate::network::human_readable_bytes;
use crate::thread_state::{
    render_thread_lines, BuildThreadStateRenderer, TestThreadStateRenderer,
};
use crate::timeline::{pairs_between, running_time, total_completed_time, EventPair};
use std::sync::atomic::Ordering;

/// Produces the ordered list of lines for one frame. Block order is fixed;
/// each block is elided when its gating condition is false.
pub(crate) fn compose_lines(inner: &DashboardInner, now_ms: u64) -> Vec<String> {
    let state = &inner.state;
    let locale = &inner.locale;
    let estimator = inner.estimator.lock().expect("estimator lock").clone();
    let mut lines = Vec::new();

    let build_started = state
        .build_started
        .lock()
        .expect("build started lock")
        .clone();
    let build_finished = state
        .build_finished
        .lock()
        .expect("build finished lock")
        .clone();
    let distributed = build_started
        .as_ref()
        .map(|b| b.distributed)
        .unwrap_or(false);

    if distributed {
        dist_build_debug_block(inner, &mut lines);
    }

    let processing_progress = estimator.as_ref().and_then(|e| e.processing_progress());
    // Until a regular parse span exists, the intro parse stands in for it.
    if !state.any_parse_event.load(Ordering::SeqCst) {
        let _ = phase_line(
            "PARSING BUILD FILES",
            None,
            now_ms,
            0,
            &[state.intro_parse.pair()],
            processing_progress,
            locale,
            &mut lines,
        );
    }
    let parse_time = phase_line(
        "PROCESSING BUILD FILES",
        None,
        now_ms,
        0,
        &state.processing.snapshot(),
        processing_progress,
        locale,
        &mut lines,
    );
    let _ = phase_line(
        "GENERATING PROJECT",
        None,
        now_ms,
        0,
        &[state.project_generation.pair()],
        estimator.as_ref().and_then(|e| e.project_generation_progress()),
        locale,
        &mut lines,
    );

    // No rule information is worth printing until processing has finished.
    if parse_time.is_none() {
        return lines;
    }

    lines.push(network_stats_line(state, locale, build_finished.is_some(), now_ms));
    if distributed {
        lines.push(dist_build_status_line(state, locale));
    }

    let jobs = jobs_summary(state, locale);
    let trace_port = *inner.trace_port.lock().expect("trace port lock");
    let trace = build_finished.as_ref().and_then(|finish| {
        trace_port.map(|port| format!("Details: http://localhost:{port}/trace/{}", finish.build_id))
    });

    // Everything past this point requires a build.
    let Some(build_start) = build_started else {
        return lines;
    };

    let suffix = match (jobs, trace) {
        (Some(jobs), Some(trace)) => Some(format!("{jobs} {trace}")),
        (Some(jobs), None) => Some(jobs),
        (None, Some(trace)) => Some(trace),
        (None, None) => None,
    };

    // The build window overlaps parse/action-graph work; subtract the
    // overlapping portion so the BUILDING time reads as build work alone.
    let build_end = build_finished
        .as_ref()
        .map(|f| f.timestamp_ms)
        .unwrap_or(now_ms);
    let overlap = pairs_between(build_start.timestamp_ms, build_end, &state.processing.snapshot());
    let offset_ms = total_completed_time(&overlap);
    let build_pair = EventPair {
        start_ms: Some(build_start.timestamp_ms),
        end_ms: build_finished.as_ref().map(|f| f.timestamp_ms),
    };
    let build_progress = if distributed {
        Some(state.dist_progress.get())
    } else {
        estimator.as_ref().and_then(|e| e.build_progress())
    };
    let build_time = phase_line(
        "BUILDING",
        suffix,
        now_ms,
        offset_ms,
        &[build_pair],
        build_progress,
        locale,
        &mut lines,
    );

    let max_thread_lines = thread_line_cap(inner);
    if build_time.is_none() {
        let renderer = BuildThreadStateRenderer::new(
            now_ms,
            locale.clone(),
            &state.activities.steps,
            &state.times,
        );
        render_thread_lines(
            &renderer,
            &mut lines,
            max_thread_lines,
            inner.cfg.render.always_sort_threads_by_time,
        );
    }

    let test_span = state.tests.run_span();
    let test_time = phase_line(
        "TESTING",
        test_suffix(&state.counters),
        now_ms,
        0,
        &[test_span],
        None,
        locale,
        &mut lines,
    );
    if test_time.is_none() && test_span.is_ongoing() {
        let renderer = TestThreadStateRenderer::new(
            now_ms,
            locale.clone(),
            &state.activities.test_summaries,
            &state.activities.test_status_messages,
            &state.activities.steps,
            &state.times,
        );
        render_thread_lines(
            &renderer,
            &mut lines,
            max_thread_lines,
            inner.cfg.render.always_sort_threads_by_time,
        );
    }

    let _ = phase_line(
        "INSTALLING",
        None,
        now_ms,
        0,
        &[state.install.pair()],
        None,
        locale,
        &mut lines,
    );

    let upload_pair = EventPair {
        start_ms: *state
            .first_upload_scheduled_ms
            .lock()
            .expect("upload slot lock"),
        end_ms: *state.http_shutdown_ms.lock().expect("http shutdown lock"),
    };
    let _ = phase_line(
        "HTTP CACHE UPLOAD",
        http_upload_suffix(&state.counters),
        now_ms,
        0,
        &[upload_pair],
        None,
        locale,
        &mut lines,
    );

    lines
}

/// Appends one `[+]/[-] PREFIX...<elapsed> [pct] <suffix>` line summarizing
/// `pairs`, unless the collection has seen no events at all. Returns the
/// elapsed time once every span is finished, `None` while any is running.
#[allow(clippy::too_many_arguments)]
fn phase_line(
    prefix: &str,
    suffix: Option<String>,
    now_ms: u64,
    offset_ms: u64,
    pairs: &[EventPair],
    progress: Option<f64>,
    locale: &Locale,
    lines: &mut Vec<String>,
) -> Option<u64> {
    let relevant: Vec<EventPair> = pairs.iter().filter(|p| !p.is_empty()).copied().collect();
    if relevant.is_empty() {
        return None;
    }
    let completed_ms = total_completed_time(&relevant);
    let running = running_time(&relevant, now_ms);

    let mut line = if running.is_some() { "[+] " } else { "[-] " }.to_string();
    line.push_str(prefix);
    line.push_str("...");
    let mut elapsed_ms = completed_ms.saturating_sub(offset_ms);
    let mut progress = progress;
    match running {
        Some(running_ms) => elapsed_ms += running_ms,
        None => {
            line.push_str("FINISHED ");
            if progress.is_some() {
                progress = Some(1.0);
            }
        }
    }
    line.push_str(&format_elapsed(locale, elapsed_ms));
    if let Some(fraction) = progress {
        line.push_str(&format!(" [{}%]", (fraction * 100.0).round() as i64));
    }
    if let Some(suffix) = suffix {
        line.push(' ');
        line.push_str(&suffix);
    }
    lines.push(line);
    if running.is_some() {
        None
    } else {
        Some(elapsed_ms)
    }
}

fn thread_line_cap(inner: &DashboardInner) -> usize {
    let render_cfg = &inner.cfg.render;
    let mut cap = render_cfg.thread_line_limit;
    if inner.state.log_queue.any_warnings_printed() {
        cap = cap.min(render_cfg.thread_line_limit_on_warning);
    }
    if inner.state.log_queue.any_errors_printed() {
        cap = cap.min(render_cfg.thread_line_limit_on_error);
    }
    cap
}

fn jobs_summary(state: &DashboardState, locale: &Locale) -> Option<String> {
    let rule_count = (*state.rule_count.lock().expect("rule count lock"))?;
    let counters = &state.counters;
    let mut columns = vec![
        format!("{}/{} JOBS", counters.rules_completed(), rule_count),
        format!("{} UPDATED", counters.rules_updated()),
    ];
    if rule_count > 0 {
        // Miss rate is measured against the full rule count, not completed
        // rules: one hit short-circuits its whole dependency subtree, so a
        // completed-rules denominator overweights misses.
        let misses = counters.cache_misses();
        columns.push(format!(
            "{} [{}%] CACHE MISS",
            misses,
            format_decimal_1(locale, 100.0 * f64::from(misses) / f64::from(rule_count))
        ));
        let errors = counters.cache_errors();
        if errors > 0 {
            let updated = counters.rules_updated().max(1);
            columns.push(format!(
                "{} [{}%] CACHE ERRORS",
                errors,
                format_decimal_1(locale, 100.0 * f64::from(errors) / f64::from(updated))
            ));
        }
    }
    Some(format!("({})", columns.join(", ")))
}

fn network_stats_line(
    state: &DashboardState,
    locale: &Locale,
    build_finished: bool,
    now_ms: u64,
) -> String {
    let mut columns = Vec::new();
    if build_finished {
        let (value, unit) = human_readable_bytes(state.network.average_download_speed(now_ms));
        columns.push(format!(
            "{} {}/S AVG",
            format_decimal_2(locale, value),
            unit.abbreviation()
        ));
    } else {
        let (value, unit) = human_readable_bytes(state.network.download_speed(now_ms));
        columns.push(format!(
            "{} {}/S",
            format_decimal_2(locale, value),
            unit.abbreviation()
        ));
    }
    let (total, unit) = human_readable_bytes(state.network.bytes_downloaded() as f64);
    columns.push(format!(
        "TOTAL: {} {}",
        format_decimal_2(locale, total),
        unit.abbreviation()
    ));
    columns.push(format!("{} Artifacts", state.network.artifact_count()));
    format!(
        "{}DOWNLOADING... ({})",
        if build_finished { "[-] " } else { "[+] " },
        columns.join(", ")
    )
}

fn dist_build_status_line(state: &DashboardState, locale: &Locale) -> String {
    let status = state.dist_status.lock().expect("dist status lock").clone();
    let finished = status
        .as_ref()
        .map(|s| s.state.is_terminal())
        .unwrap_or(false);
    let mut line = if finished { "[-] " } else { "[+] " }.to_string();
    line.push_str("DISTBUILD STATUS: ");
    let Some(status) = status else {
        line.push_str(DistBuildState::Init.as_str());
        line.push_str("...");
        return line;
    };
    line.push_str(status.state.as_str());
    line.push_str("...");
    if !finished {
        line.push_str(&format!(" ETA: {}", format_elapsed(locale, status.eta_ms)));
    }
    if let Some(message) = &status.message {
        line.push_str(&format!(" ({message})"));
    }
    line
}

/// Warning-colored dump of the coordinator's log book. Emitting it counts as
/// printing warnings, which shrinks the thread-line cap.
fn dist_build_debug_block(inner: &DashboardInner, lines: &mut Vec<String>) {
    let status = inner
        .state
        .dist_status
        .lock()
        .expect("dist status lock")
        .clone();
    let Some(log_book) = status.and_then(|s| s.log_book) else {
        return;
    };
    lines.push(as_warning("Distributed build debug info:"));
    for record in &log_book {
        let stamp = format_timestamp_ms(inner.cfg.format.utc_offset_minutes, record.timestamp_ms);
        lines.push(as_warning(&format!("{stamp} {}", record.name)));
    }
    inner.state.log_queue.mark_warnings_printed();
}

fn test_suffix(counters: &BuildCounters) -> Option<String> {
    let passes = counters.test_passes();
    let failures = counters.test_failures();
    let skips = counters.test_skips();
    if skips > 0 {
        Some(format!("({passes} PASS/{skips} SKIP/{failures} FAIL)"))
    } else if passes > 0 || failures > 0 {
        Some(format!("({passes} PASS/{failures} FAIL)"))
    } else {
        None
    }
}

fn http_upload_suffix(counters: &BuildCounters) -> Option<String> {
    let snapshot = counters.upload_snapshot();
    if snapshot.scheduled == 0 {
        return None;
    }
    Some(format!(
        "({} COMPLETE/{} FAILED/{} UPLOADING/{} PENDING)",
        snapshot.complete, snapshot.failed, snapshot.uploading, snapshot.pending
    ))
}
