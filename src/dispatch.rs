use crate::activity::LeafActivity;
use crate::dashboard::{BuildFinishInfo, BuildStartInfo, Dashboard};
use crate::driver;
use crate::events::{Event, EventKind, RuleStatus, TestResultKind};
use crate::logging::append_run_log;
use crate::logqueue::ConsoleMessage;
use crate::progress::dist_build_progress;
use crate::test_report::TestRunInfo;
use serde_json::json;
use std::sync::atomic::Ordering;

impl Dashboard {
    /// The single receive surface. Safe to call from any ingestion thread;
    /// each arm is short and delegates to the component that owns the field.
    /// Events arriving after `close` are dropped silently.
    pub fn handle_event(&self, event: Event) {
        if self.inner.render.is_closed() {
            return;
        }
        let inner = &self.inner;
        let state = &inner.state;
        let estimator = inner.estimator.lock().expect("estimator lock").clone();
        let Event {
            timestamp_ms,
            worker_id,
            event_key,
            kind,
        } = event;

        match kind {
            EventKind::CommandStarted { name, args } => {
                if let Some(estimator) = &estimator {
                    estimator.did_start_command(&name, &args);
                }
            }
            EventKind::BuildFileParseStarted => state.intro_parse.record_start(timestamp_ms),
            EventKind::BuildFileParseFinished => state.intro_parse.record_finish(timestamp_ms),
            EventKind::ParseStarted => {
                state.any_parse_event.store(true, Ordering::SeqCst);
                state.processing.record_start(event_key, timestamp_ms);
            }
            EventKind::ParseFinished => {
                state.any_parse_event.store(true, Ordering::SeqCst);
                if let Some(estimator) = &estimator {
                    estimator.did_finish_parsing();
                }
                state.processing.record_finish(event_key, timestamp_ms);
            }
            EventKind::ActionGraphStarted => state.processing.record_start(event_key, timestamp_ms),
            EventKind::ActionGraphFinished => {
                state.processing.record_finish(event_key, timestamp_ms)
            }
            EventKind::ProjectGenerationStarted => {
                state.project_generation.record_start(timestamp_ms)
            }
            EventKind::ProjectGenerationProcessed => {
                if let Some(estimator) = &estimator {
                    estimator.did_generate_project_target();
                }
            }
            EventKind::ProjectGenerationFinished => {
                state.project_generation.record_finish(timestamp_ms);
                if let Some(estimator) = &estimator {
                    estimator.did_finish_project_generation();
                }
            }
            EventKind::BuildStarted { distributed } => {
                *state.build_started.lock().expect("build started lock") = Some(BuildStartInfo {
                    timestamp_ms,
                    distributed,
                });
                if let Some(estimator) = &estimator {
                    estimator.did_start_build();
                }
            }
            EventKind::RuleCountCalculated { rule_count } => {
                *state.rule_count.lock().expect("rule count lock") = Some(rule_count);
                if let Some(estimator) = &estimator {
                    estimator.set_rule_count(rule_count);
                }
            }
            EventKind::RuleCountUpdated { rule_count } => {
                *state.rule_count.lock().expect("rule count lock") = Some(rule_count);
            }
            EventKind::BuildFinished { build_id } => {
                *state.build_finished.lock().expect("build finished lock") =
                    Some(BuildFinishInfo {
                        timestamp_ms,
                        build_id,
                    });
                if let Some(estimator) = &estimator {
                    estimator.did_finish_build();
                }
            }
            EventKind::RuleStarted { .. } => {
                if let Some(estimator) = &estimator {
                    estimator.did_start_rule();
                }
                state.times.rule_started(worker_id, timestamp_ms);
            }
            EventKind::RuleSuspended { .. } => {
                if let Some(estimator) = &estimator {
                    estimator.did_suspend_rule();
                }
                state.times.rule_suspended(worker_id, timestamp_ms);
            }
            EventKind::RuleResumed { .. } => {
                if let Some(estimator) = &estimator {
                    estimator.did_resume_rule();
                }
                state.times.rule_resumed(worker_id, timestamp_ms);
            }
            EventKind::RuleFinished { status, cache, .. } => {
                if status != RuleStatus::Canceled {
                    if let Some(estimator) = &estimator {
                        estimator.did_finish_rule();
                    }
                }
                state.counters.record_rule_finished(status, cache);
                state.times.rule_finished(worker_id, timestamp_ms);
            }
            EventKind::StepStarted {
                description,
                short_name,
            } => state
                .activities
                .steps
                .set(worker_id, LeafActivity::new(description, short_name, timestamp_ms)),
            EventKind::StepFinished => state.activities.steps.clear(worker_id),
            EventKind::CacheOpStarted {
                description,
                short_name,
                synchronous,
            } => {
                if synchronous {
                    state.activities.steps.set(
                        worker_id,
                        LeafActivity::new(description, short_name, timestamp_ms),
                    );
                }
            }
            EventKind::CacheOpFinished { synchronous } => {
                if synchronous {
                    state.activities.steps.clear(worker_id);
                }
            }
            EventKind::CompressionStarted {
                description,
                short_name,
            } => state
                .activities
                .steps
                .set(worker_id, LeafActivity::new(description, short_name, timestamp_ms)),
            EventKind::CompressionFinished => state.activities.steps.clear(worker_id),
            EventKind::InstallStarted => state.install.record_start(timestamp_ms),
            EventKind::InstallFinished => state.install.record_finish(timestamp_ms),
            EventKind::HttpUploadScheduled => {
                let mut slot = state
                    .first_upload_scheduled_ms
                    .lock()
                    .expect("upload slot lock");
                if slot.is_none() {
                    *slot = Some(timestamp_ms);
                }
                state.counters.record_upload_scheduled();
            }
            EventKind::HttpUploadStarted => state.counters.record_upload_started(),
            EventKind::HttpUploadFinished { success } => {
                state.counters.record_upload_finished(success)
            }
            EventKind::HttpFetchStarted => {}
            EventKind::HttpFetchFinished => state.network.artifact_download_finished(),
            EventKind::HttpCacheShutdown => {
                *state.http_shutdown_ms.lock().expect("http shutdown lock") = Some(timestamp_ms);
                state.network.stop(timestamp_ms);
            }
            EventKind::BytesReceived { bytes } => state.network.bytes_received(timestamp_ms, bytes),
            EventKind::TestRunStarted {
                run_all,
                target_names,
            } => state.tests.record_run_started(
                &inner.test_formatter,
                TestRunInfo {
                    started_ms: timestamp_ms,
                    run_all,
                    target_names,
                },
            ),
            EventKind::TestRunFinished { results } => {
                let report =
                    state
                        .tests
                        .record_run_finished(&inner.test_formatter, timestamp_ms, &results);
                // Render the final frame before the report lands on stdout so
                // the two never interleave.
                if let Err(err) = driver::render(inner) {
                    append_run_log("error", "render.failed", json!({ "error": err.to_string() }));
                }
                if let Err(err) = inner.output.stdout.println(&report) {
                    append_run_log(
                        "error",
                        "test_report.write_failed",
                        json!({ "error": err.to_string() }),
                    );
                }
            }
            EventKind::TestSummaryStarted {
                test_case,
                test_name,
            } => {
                let description = format!("{test_case} {test_name}");
                state
                    .activities
                    .test_summaries
                    .set(worker_id, LeafActivity::new(description, test_name, timestamp_ms));
            }
            EventKind::TestSummaryFinished { summary } => {
                state.activities.test_summaries.clear(worker_id);
                state.counters.record_test_result(summary.kind);
                if summary.kind == TestResultKind::Failure {
                    state.log_queue.enqueue(ConsoleMessage::error(format!(
                        "{} {} {}: {}",
                        summary.kind.as_str(),
                        summary.test_case,
                        summary.test_name,
                        summary.message.as_deref().unwrap_or("")
                    )));
                }
            }
            EventKind::TestStatusMessageStarted { message } => {
                state.activities.test_status_messages.set(
                    worker_id,
                    LeafActivity::new(message.message.clone(), "status", timestamp_ms),
                );
                state.tests.add_status_message(message);
            }
            EventKind::TestStatusMessageFinished { message } => {
                state.activities.test_status_messages.clear(worker_id);
                state.tests.add_status_message(message);
            }
            EventKind::ConsoleLog { level, message } => {
                state.log_queue.enqueue(ConsoleMessage { level, message })
            }
            EventKind::DistBuildStatusUpdate { status } => {
                let build_start_ms = state
                    .build_started
                    .lock()
                    .expect("build started lock")
                    .as_ref()
                    .map(|b| b.timestamp_ms);
                if let Some(start_ms) = build_start_ms {
                    let elapsed = inner.clock.now_ms().saturating_sub(start_ms);
                    state
                        .dist_progress
                        .set(dist_build_progress(elapsed, status.eta_ms));
                }
                *state.dist_status.lock().expect("dist status lock") = Some(status);
            }
        }
    }
}
