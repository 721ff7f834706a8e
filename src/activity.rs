use crate::events::WorkerId;
use std::collections::HashMap;
use std::sync::Mutex;

/// The innermost thing a worker is doing right now: a step, a synchronous
/// cache op, a compression pass, a test summary, or a test status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafActivity {
    pub description: String,
    pub short_name: String,
    pub started_at_ms: u64,
}

impl LeafActivity {
    pub fn new(description: impl Into<String>, short_name: impl Into<String>, started_at_ms: u64) -> Self {
        Self {
            description: description.into(),
            short_name: short_name.into(),
            started_at_ms,
        }
    }
}

/// `worker_id -> Option<LeafActivity>`: start events set the slot, finish
/// events clear it. Readers may observe a slightly stale snapshot; the next
/// frame corrects it.
#[derive(Debug, Default)]
pub struct ActivityMap {
    inner: Mutex<HashMap<WorkerId, Option<LeafActivity>>>,
}

impl ActivityMap {
    pub fn with_capacity_hint(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn set(&self, worker_id: WorkerId, activity: LeafActivity) {
        self.inner
            .lock()
            .expect("activity map lock")
            .insert(worker_id, Some(activity));
    }

    pub fn clear(&self, worker_id: WorkerId) {
        self.inner
            .lock()
            .expect("activity map lock")
            .insert(worker_id, None);
    }

    pub fn snapshot(&self) -> HashMap<WorkerId, Option<LeafActivity>> {
        self.inner.lock().expect("activity map lock").clone()
    }
}

/// The three per-worker activity slots a worker may hold at once.
#[derive(Debug)]
pub struct WorkerActivities {
    pub steps: ActivityMap,
    pub test_summaries: ActivityMap,
    pub test_status_messages: ActivityMap,
}

impl Default for WorkerActivities {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            steps: ActivityMap::with_capacity_hint(cores),
            test_summaries: ActivityMap::with_capacity_hint(cores),
            test_status_messages: ActivityMap::with_capacity_hint(cores),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct AccumulatedTime {
    total_ms: u64,
    current_start_ms: Option<u64>,
}

/// Accumulated rule time per worker, fed by rule start/suspend/resume/finish
/// events and read by the thread-state renderers.
#[derive(Debug, Default)]
pub struct AccumulatedTimeTracker {
    inner: Mutex<HashMap<WorkerId, AccumulatedTime>>,
}

impl AccumulatedTimeTracker {
    pub fn rule_started(&self, worker_id: WorkerId, timestamp_ms: u64) {
        let mut times = self.inner.lock().expect("time tracker lock");
        times.entry(worker_id).or_default().current_start_ms = Some(timestamp_ms);
    }

    pub fn rule_resumed(&self, worker_id: WorkerId, timestamp_ms: u64) {
        self.rule_started(worker_id, timestamp_ms);
    }

    pub fn rule_suspended(&self, worker_id: WorkerId, timestamp_ms: u64) {
        self.accumulate(worker_id, timestamp_ms);
    }

    pub fn rule_finished(&self, worker_id: WorkerId, timestamp_ms: u64) {
        self.accumulate(worker_id, timestamp_ms);
    }

    fn accumulate(&self, worker_id: WorkerId, timestamp_ms: u64) {
        let mut times = self.inner.lock().expect("time tracker lock");
        let entry = times.entry(worker_id).or_default();
        if let Some(start) = entry.current_start_ms.take() {
            entry.total_ms += timestamp_ms.saturating_sub(start);
        }
    }

    pub fn elapsed_for(&self, worker_id: WorkerId, now_ms: u64) -> u64 {
        let times = self.inner.lock().expect("time tracker lock");
        match times.get(&worker_id) {
            Some(entry) => {
                entry.total_ms
                    + entry
                        .current_start_ms
                        .map(|start| now_ms.saturating_sub(start))
                        .unwrap_or(0)
            }
            None => 0,
        }
    }
}
