use crate::activity::{AccumulatedTimeTracker, ActivityMap, LeafActivity};
use crate::clock::{format_elapsed, Locale};
use crate::events::WorkerId;
use std::collections::HashMap;

/// Renders one status line per busy worker plus a compressed overflow line.
pub trait ThreadStateRenderer {
    fn thread_count(&self) -> usize;
    fn sorted_worker_ids(&self, sort_by_time: bool) -> Vec<WorkerId>;
    fn render_status_line(&self, worker_id: WorkerId) -> String;
    fn render_short_status(&self, worker_id: WorkerId) -> String;
}

#[derive(Debug, Clone)]
struct ThreadRow {
    activity: LeafActivity,
    elapsed_ms: u64,
}

#[derive(Debug)]
struct ThreadRows {
    rows: HashMap<WorkerId, ThreadRow>,
    locale: Locale,
}

impl ThreadRows {
    fn sorted_ids(&self, sort_by_time: bool) -> Vec<WorkerId> {
        let mut ids: Vec<WorkerId> = self.rows.keys().copied().collect();
        if sort_by_time {
            ids.sort_by(|a, b| {
                let ta = self.rows[a].elapsed_ms;
                let tb = self.rows[b].elapsed_ms;
                tb.cmp(&ta).then(a.cmp(b))
            });
        } else {
            ids.sort_unstable();
        }
        ids
    }

    fn status_line(&self, worker_id: WorkerId) -> String {
        match self.rows.get(&worker_id) {
            Some(row) => format!(
                " |=> {} {}",
                format_elapsed(&self.locale, row.elapsed_ms),
                row.activity.description
            ),
            None => " |=> IDLE".to_string(),
        }
    }

    fn short_status(&self, worker_id: WorkerId) -> String {
        match self.rows.get(&worker_id) {
            Some(row) => format!("[{}]", row.activity.short_name),
            None => "[:]".to_string(),
        }
    }
}

/// Status lines for build workers: the running step, timed by accumulated
/// rule time.
pub struct BuildThreadStateRenderer {
    rows: ThreadRows,
}

impl BuildThreadStateRenderer {
    pub fn new(
        now_ms: u64,
        locale: Locale,
        steps: &ActivityMap,
        times: &AccumulatedTimeTracker,
    ) -> Self {
        let mut rows = HashMap::new();
        for (worker_id, activity) in steps.snapshot() {
            if let Some(activity) = activity {
                rows.insert(
                    worker_id,
                    ThreadRow {
                        elapsed_ms: times.elapsed_for(worker_id, now_ms),
                        activity,
                    },
                );
            }
        }
        Self {
            rows: ThreadRows { rows, locale },
        }
    }
}

impl ThreadStateRenderer for BuildThreadStateRenderer {
    fn thread_count(&self) -> usize {
        self.rows.rows.len()
    }

    fn sorted_worker_ids(&self, sort_by_time: bool) -> Vec<WorkerId> {
        self.rows.sorted_ids(sort_by_time)
    }

    fn render_status_line(&self, worker_id: WorkerId) -> String {
        self.rows.status_line(worker_id)
    }

    fn render_short_status(&self, worker_id: WorkerId) -> String {
        self.rows.short_status(worker_id)
    }
}

/// Status lines for test workers, composed from the three activity slots:
/// a running test summary wins, then a test status message, then the step.
pub struct TestThreadStateRenderer {
    rows: ThreadRows,
}

impl TestThreadStateRenderer {
    pub fn new(
        now_ms: u64,
        locale: Locale,
        test_summaries: &ActivityMap,
        test_status_messages: &ActivityMap,
        steps: &ActivityMap,
        times: &AccumulatedTimeTracker,
    ) -> Self {
        let summaries = test_summaries.snapshot();
        let messages = test_status_messages.snapshot();
        let steps = steps.snapshot();

        let mut worker_ids: Vec<WorkerId> = summaries
            .keys()
            .chain(messages.keys())
            .chain(steps.keys())
            .copied()
            .collect();
        worker_ids.sort_unstable();
        worker_ids.dedup();

        let mut rows = HashMap::new();
        for worker_id in worker_ids {
            let activity = summaries
                .get(&worker_id)
                .and_then(|a| a.clone())
                .or_else(|| messages.get(&worker_id).and_then(|a| a.clone()))
                .or_else(|| steps.get(&worker_id).and_then(|a| a.clone()));
            if let Some(activity) = activity {
                rows.insert(
                    worker_id,
                    ThreadRow {
                        elapsed_ms: times.elapsed_for(worker_id, now_ms),
                        activity,
                    },
                );
            }
        }
        Self {
            rows: ThreadRows { rows, locale },
        }
    }
}

impl ThreadStateRenderer for TestThreadStateRenderer {
    fn thread_count(&self) -> usize {
        self.rows.rows.len()
    }

    fn sorted_worker_ids(&self, sort_by_time: bool) -> Vec<WorkerId> {
        self.rows.sorted_ids(sort_by_time)
    }

    fn render_status_line(&self, worker_id: WorkerId) -> String {
        self.rows.status_line(worker_id)
    }

    fn render_short_status(&self, worker_id: WorkerId) -> String {
        self.rows.short_status(worker_id)
    }
}

/// Appends up to `max_lines` worker lines. When more workers are busy than
/// lines allowed, the tail collapses into one ` |=> N MORE THREADS: …` line
/// of short tokens, and ordering switches to descending accumulated time so
/// the longest-running work keeps its full line.
pub fn render_thread_lines(
    renderer: &dyn ThreadStateRenderer,
    lines: &mut Vec<String>,
    max_lines: usize,
    always_sort_by_time: bool,
) {
    let thread_count = renderer.thread_count();
    let mut full_lines = thread_count;
    let mut compressed = false;
    if thread_count > max_lines {
        full_lines = max_lines.saturating_sub(1);
        compressed = true;
    }
    let short_count = thread_count - full_lines;
    let sort_by_time = always_sort_by_time || compressed;
    let ids = renderer.sorted_worker_ids(sort_by_time);
    for worker_id in ids.iter().take(full_lines) {
        lines.push(renderer.render_status_line(*worker_id));
    }
    if compressed {
        let mut line = format!(" |=> {short_count}");
        line.push_str(if full_lines == 0 {
            " THREADS:"
        } else {
            " MORE THREADS:"
        });
        for worker_id in &ids[full_lines..] {
            line.push(' ');
            line.push_str(&renderer.render_short_status(*worker_id));
        }
        lines.push(line);
    }
}
