use crate::events::EventKey;
use std::collections::HashMap;
use std::sync::Mutex;

/// A start/finish pair for one timed span. Ongoing while only the start is
/// known; complete once both are. A pair holding only a finish is kept in the
/// map so a late start can still complete it, but contributes nothing to any
/// aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventPair {
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
}

impl EventPair {
    pub fn started_at(start_ms: u64) -> Self {
        Self {
            start_ms: Some(start_ms),
            end_ms: None,
        }
    }

    pub fn finished_at(end_ms: u64) -> Self {
        Self {
            start_ms: None,
            end_ms: Some(end_ms),
        }
    }

    pub fn proxy(start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
        }
    }

    pub fn with_start(self, start_ms: u64) -> Self {
        Self {
            start_ms: Some(start_ms),
            ..self
        }
    }

    pub fn with_finish(self, end_ms: u64) -> Self {
        Self {
            end_ms: Some(end_ms),
            ..self
        }
    }

    pub fn is_complete(&self) -> bool {
        self.start_ms.is_some() && self.end_ms.is_some()
    }

    pub fn is_ongoing(&self) -> bool {
        self.start_ms.is_some() && self.end_ms.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.start_ms.is_none() && self.end_ms.is_none()
    }

    pub fn elapsed_ms(&self) -> u64 {
        match (self.start_ms, self.end_ms) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }
}

/// Single-phase slot for spans that occur at most once per build
/// (intro parse, project generation, install).
#[derive(Debug, Default)]
pub struct SpanSlot {
    inner: Mutex<EventPair>,
}

impl SpanSlot {
    pub fn record_start(&self, timestamp_ms: u64) {
        let mut pair = self.inner.lock().expect("span slot lock");
        *pair = pair.with_start(timestamp_ms);
    }

    pub fn record_finish(&self, timestamp_ms: u64) {
        let mut pair = self.inner.lock().expect("span slot lock");
        *pair = pair.with_finish(timestamp_ms);
    }

    pub fn pair(&self) -> EventPair {
        *self.inner.lock().expect("span slot lock")
    }
}

/// Correlation-keyed span map for phases that may run as several concurrent
/// spans (parse, action graph). Start and finish tolerate either arrival
/// order.
#[derive(Debug, Default)]
pub struct PhaseTracker {
    pairs: Mutex<HashMap<EventKey, EventPair>>,
}

impl PhaseTracker {
    pub fn record_start(&self, key: EventKey, timestamp_ms: u64) {
        let mut pairs = self.pairs.lock().expect("phase tracker lock");
        let pair = pairs.entry(key).or_default();
        *pair = pair.with_start(timestamp_ms);
    }

    pub fn record_finish(&self, key: EventKey, timestamp_ms: u64) {
        let mut pairs = self.pairs.lock().expect("phase tracker lock");
        let pair = pairs.entry(key).or_default();
        *pair = pair.with_finish(timestamp_ms);
    }

    pub fn snapshot(&self) -> Vec<EventPair> {
        self.pairs
            .lock()
            .expect("phase tracker lock")
            .values()
            .copied()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.lock().expect("phase tracker lock").is_empty()
    }
}

/// Sum of completed time across `pairs`, measured on the flattened timeline:
/// overlapping complete intervals are merged first so parallel spans are not
/// double-counted. Zero-length pairs contribute nothing.
pub fn total_completed_time(pairs: &[EventPair]) -> u64 {
    let mut intervals: Vec<(u64, u64)> = pairs
        .iter()
        .filter(|p| p.elapsed_ms() > 0)
        .filter_map(|p| Some((p.start_ms?, p.end_ms?)))
        .collect();
    intervals.sort_unstable();

    let mut total = 0u64;
    let mut current: Option<(u64, u64)> = None;
    for (start, end) in intervals {
        match current {
            Some((cur_start, cur_end)) if start <= cur_end => {
                current = Some((cur_start, cur_end.max(end)));
            }
            Some((cur_start, cur_end)) => {
                total += cur_end - cur_start;
                current = Some((start, end));
            }
            None => current = Some((start, end)),
        }
    }
    if let Some((cur_start, cur_end)) = current {
        total += cur_end - cur_start;
    }
    total
}

/// Time the collection has been running, measured from the earliest ongoing
/// start to `now_ms`. `None` when nothing is ongoing.
pub fn running_time(pairs: &[EventPair], now_ms: u64) -> Option<u64> {
    pairs
        .iter()
        .filter(|p| p.is_ongoing())
        .filter_map(|p| p.start_ms)
        .min()
        .map(|earliest| now_ms.saturating_sub(earliest))
}

/// The sub-collection of `pairs` bounded by `[window_start, window_end]`.
/// Pairs straddling either boundary are replaced by proxies clamped to
/// `(max(start, window_start), min(end, window_end))`; ongoing pairs are
/// proxied with `window_end` as their finish. Pairs entirely outside the
/// window, and pairs holding only a finish, are dropped.
pub fn pairs_between(window_start: u64, window_end: u64, pairs: &[EventPair]) -> Vec<EventPair> {
    let mut out = Vec::new();
    for pair in pairs {
        let Some(start) = pair.start_ms else {
            continue;
        };
        let start = start.max(window_start);
        let end = pair.end_ms.unwrap_or(window_end).min(window_end);
        if start <= end {
            out.push(EventPair::proxy(start, end));
        }
    }
    out
}
