use crate::console;
use crate::dashboard::DashboardInner;
use crate::errors::MarqueeError;
use crate::frame;
use crate::logging::append_run_log;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct RenderState {
    last_num_lines: usize,
}

/// Owns the render loop: the cancellable tick schedule, the serialized
/// render pass, and the line-count bookkeeping that makes each frame erase
/// the previous one.
#[derive(Default)]
pub(crate) struct RenderControl {
    cancel: Mutex<bool>,
    signal: Condvar,
    render_state: Mutex<RenderState>,
    thread: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl RenderControl {
    /// Permanently cancels the tick schedule. Renders stay possible; only
    /// the scheduler is gone.
    pub(crate) fn stop_scheduler(&self) {
        *self.cancel.lock().expect("cancel lock") = true;
        self.signal.notify_all();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *self.cancel.lock().expect("cancel lock")
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sleeps for `timeout` unless cancelled first; returns true once
    /// cancelled.
    fn wait_for_cancel(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.cancel.lock().expect("cancel lock");
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .signal
                .wait_timeout(cancelled, deadline - now)
                .expect("cancel wait");
            cancelled = guard;
        }
        true
    }
}

pub(crate) fn start_scheduler(inner: &Arc<DashboardInner>) {
    let mut thread = inner.render.thread.lock().expect("render thread lock");
    if thread.is_some() || inner.render.is_cancelled() {
        return;
    }
    let interval = Duration::from_millis(inner.cfg.render.interval_ms);
    append_run_log(
        "debug",
        "render.scheduler_started",
        json!({ "interval_ms": inner.cfg.render.interval_ms }),
    );
    let worker = Arc::clone(inner);
    *thread = Some(std::thread::spawn(move || loop {
        if worker.render.wait_for_cancel(interval) {
            break;
        }
        if let Err(err) = render(&worker) {
            // Log before giving up so the failure is diagnosable; the
            // scheduler then suppresses all further ticks.
            append_run_log("error", "render.failed", json!({ "error": err.to_string() }));
            worker.render.stop_scheduler();
            break;
        }
    }));
}

/// One tick. Serialized by the render-state lock; acquires the stdout
/// monitor before the stderr monitor; stands the scheduler down permanently
/// when a foreign writer has touched either stream.
pub(crate) fn render(inner: &DashboardInner) -> Result<(), MarqueeError> {
    let mut render_state = inner.render.render_state.lock().expect("render state lock");
    let now_ms = inner.clock.now_ms();

    let mut clear = String::new();
    for _ in 0..render_state.last_num_lines {
        clear.push_str(&console::cursor_previous_line(1));
        clear.push_str(&console::clear_line());
    }
    let lines = frame::compose_lines(inner, now_ms);
    let log_lines = inner.state.log_queue.drain_render_lines();
    // Log lines scroll above the frame and push it out of the way on their
    // own; only the frame lines are erased next tick.
    render_state.last_num_lines = lines.len();

    let stdout_guard = inner.output.stdout.lock();
    let mut stderr_guard = inner.output.stderr.lock();
    if stdout_guard.is_dirty() || stderr_guard.is_dirty() {
        inner.render.stop_scheduler();
        append_run_log(
            "debug",
            "render.stand_down",
            json!({
                "stdout_dirty": stdout_guard.is_dirty(),
                "stderr_dirty": stderr_guard.is_dirty()
            }),
        );
        return Ok(());
    }

    if clear.is_empty() && lines.is_empty() && log_lines.is_empty() {
        return Ok(());
    }

    let mut full_frame = clear;
    for line in &log_lines {
        full_frame.push_str(line);
        full_frame.push('\n');
    }
    if !lines.is_empty() {
        let mut body = String::new();
        for line in &lines {
            body.push_str(line);
            body.push('\n');
        }
        full_frame.push_str(&console::as_no_wrap(&body));
    }
    stderr_guard.write_frame(&full_frame)
}

/// Idempotent shutdown: cancel the scheduler, stop the network stats, then
/// render the terminating frame so the display reflects the build's end
/// state.
pub(crate) fn close(inner: &DashboardInner) -> Result<(), MarqueeError> {
    if inner.render.closed.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    inner.render.stop_scheduler();
    let handle = inner.render.thread.lock().expect("render thread lock").take();
    if let Some(handle) = handle {
        let _ = handle.join();
    }
    inner.state.network.stop(inner.clock.now_ms());
    append_run_log("debug", "dashboard.closed", json!({}));
    render(inner)
}
