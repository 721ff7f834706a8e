use crate::activity::{AccumulatedTimeTracker, WorkerActivities};
use crate::clock::{Clock, Locale};
use crate::config::DashboardConfig;
use crate::console::ConsoleOutput;
use crate::counters::BuildCounters;
use crate::driver::{self, RenderControl};
use crate::errors::MarqueeError;
use crate::events::DistBuildStatus;
use crate::frame;
use crate::logqueue::LogEventQueue;
use crate::network::NetworkStatsKeeper;
use crate::progress::{ProgressCell, ProgressEstimator};
use crate::test_report::{TestAggregator, TestReportFormatter};
use crate::timeline::{PhaseTracker, SpanSlot};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub(crate) struct BuildStartInfo {
    pub(crate) timestamp_ms: u64,
    pub(crate) distributed: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct BuildFinishInfo {
    pub(crate) timestamp_ms: u64,
    pub(crate) build_id: String,
}

/// Aggregate state shared between the ingestion threads and the render
/// worker. Scalars are atomics, span maps take short coarse locks, and the
/// log queue is MPSC; no field is written while a frame is mid-emit.
#[derive(Default)]
pub(crate) struct DashboardState {
    pub(crate) intro_parse: SpanSlot,
    pub(crate) any_parse_event: AtomicBool,
    pub(crate) processing: PhaseTracker,
    pub(crate) project_generation: SpanSlot,
    pub(crate) build_started: Mutex<Option<BuildStartInfo>>,
    pub(crate) build_finished: Mutex<Option<BuildFinishInfo>>,
    pub(crate) rule_count: Mutex<Option<u32>>,
    pub(crate) install: SpanSlot,
    pub(crate) first_upload_scheduled_ms: Mutex<Option<u64>>,
    pub(crate) http_shutdown_ms: Mutex<Option<u64>>,
    pub(crate) counters: BuildCounters,
    pub(crate) network: NetworkStatsKeeper,
    pub(crate) activities: WorkerActivities,
    pub(crate) times: AccumulatedTimeTracker,
    pub(crate) tests: TestAggregator,
    pub(crate) log_queue: LogEventQueue,
    pub(crate) dist_status: Mutex<Option<DistBuildStatus>>,
    pub(crate) dist_progress: ProgressCell,
}

pub(crate) struct DashboardInner {
    pub(crate) cfg: DashboardConfig,
    pub(crate) locale: Locale,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) output: ConsoleOutput,
    pub(crate) state: DashboardState,
    pub(crate) render: RenderControl,
    pub(crate) estimator: Mutex<Option<Arc<dyn ProgressEstimator>>>,
    pub(crate) trace_port: Mutex<Option<u16>>,
    pub(crate) test_formatter: TestReportFormatter,
}

/// The dashboard engine. Construct, start the render scheduler, feed it
/// events from any thread, and close it once the build is over. Cloning
/// shares the same engine.
#[derive(Clone)]
pub struct Dashboard {
    pub(crate) inner: Arc<DashboardInner>,
}

impl Dashboard {
    pub fn new(cfg: DashboardConfig, clock: Arc<dyn Clock>, output: ConsoleOutput) -> Self {
        let locale = cfg.locale();
        let test_formatter = TestReportFormatter::new(
            cfg.tests.result_verbosity,
            cfg.tests.log_path.clone(),
            locale.clone(),
            cfg.format.utc_offset_minutes,
        );
        Self {
            inner: Arc::new(DashboardInner {
                locale,
                test_formatter,
                cfg,
                clock,
                output,
                state: DashboardState::default(),
                render: RenderControl::default(),
                estimator: Mutex::new(None),
                trace_port: Mutex::new(None),
            }),
        }
    }

    /// The tracked stdout wrapper. Anything else in the process that writes
    /// to stdout should go through here so the frame driver can detect it.
    pub fn stdout(&self) -> &crate::console::TrackedStream {
        &self.inner.output.stdout
    }

    /// The tracked stderr wrapper, shared with the frame driver.
    pub fn stderr(&self) -> &crate::console::TrackedStream {
        &self.inner.output.stderr
    }

    pub fn set_progress_estimator(&self, estimator: Arc<dyn ProgressEstimator>) {
        *self.inner.estimator.lock().expect("estimator lock") = Some(estimator);
    }

    /// Port of the trace server, if one is running; composed into the
    /// BUILDING line's Details suffix once the build finishes.
    pub fn set_trace_server_port(&self, port: u16) {
        *self.inner.trace_port.lock().expect("trace port lock") = Some(port);
    }

    pub fn start_render_scheduler(&self) {
        driver::start_scheduler(&self.inner);
    }

    /// Renders one frame immediately, outside the scheduler cadence.
    pub fn render_now(&self) -> Result<(), MarqueeError> {
        driver::render(&self.inner)
    }

    /// The frame lines that would be emitted at `now_ms`, without writing
    /// anything. Log lines are not drained.
    pub fn render_lines_at(&self, now_ms: u64) -> Vec<String> {
        frame::compose_lines(&self.inner, now_ms)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.render.is_closed()
    }

    /// Idempotent. Cancels the scheduler, stops the network stats, and
    /// renders the final frame exactly once.
    pub fn close(&self) -> Result<(), MarqueeError> {
        driver::close(&self.inner)
    }
}
