use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub const SPEED_WINDOW_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
}

impl SizeUnit {
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::Bytes => "B",
            Self::Kilobytes => "KB",
            Self::Megabytes => "MB",
            Self::Gigabytes => "GB",
            Self::Terabytes => "TB",
        }
    }
}

/// Scales a byte quantity into the largest unit that keeps the value below
/// 1024.
pub fn human_readable_bytes(bytes: f64) -> (f64, SizeUnit) {
    const LADDER: [SizeUnit; 5] = [
        SizeUnit::Bytes,
        SizeUnit::Kilobytes,
        SizeUnit::Megabytes,
        SizeUnit::Gigabytes,
        SizeUnit::Terabytes,
    ];
    let mut value = bytes;
    let mut unit = LADDER[0];
    for candidate in LADDER.iter().skip(1) {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = *candidate;
    }
    (value, unit)
}

#[derive(Debug, Default)]
struct SpeedWindow {
    window_bytes: u64,
    window_started_ms: u64,
    last_speed_bytes_per_sec: f64,
}

/// Rolling download statistics. The instantaneous speed is measured over a
/// one-second window that rotates lazily on read; the average speed divides
/// total bytes by total active time. `stop` freezes the average denominator.
#[derive(Debug, Default)]
pub struct NetworkStatsKeeper {
    bytes_total: AtomicU64,
    artifacts_downloaded: AtomicU64,
    first_activity_ms: AtomicU64,
    stopped_at_ms: AtomicU64,
    window: Mutex<SpeedWindow>,
}

impl NetworkStatsKeeper {
    pub fn bytes_received(&self, now_ms: u64, bytes: u64) {
        if self.stopped_at_ms.load(Ordering::Relaxed) != 0 {
            return;
        }
        self.bytes_total.fetch_add(bytes, Ordering::Relaxed);
        let _ = self
            .first_activity_ms
            .compare_exchange(0, now_ms.max(1), Ordering::Relaxed, Ordering::Relaxed);
        let mut window = self.window.lock().expect("speed window lock");
        if window.window_started_ms == 0 {
            window.window_started_ms = now_ms.max(1);
        }
        self.rotate_if_stale(&mut window, now_ms);
        window.window_bytes += bytes;
    }

    pub fn artifact_download_finished(&self) {
        self.artifacts_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Bytes over the most recent window, in bytes per second.
    pub fn download_speed(&self, now_ms: u64) -> f64 {
        let mut window = self.window.lock().expect("speed window lock");
        if window.window_started_ms == 0 {
            return 0.0;
        }
        self.rotate_if_stale(&mut window, now_ms);
        let age_ms = now_ms.saturating_sub(window.window_started_ms);
        if window.window_bytes > 0 && age_ms > 0 {
            window.window_bytes as f64 * 1_000.0 / age_ms as f64
        } else {
            window.last_speed_bytes_per_sec
        }
    }

    /// Total bytes over total active time, in bytes per second.
    pub fn average_download_speed(&self, now_ms: u64) -> f64 {
        let first = self.first_activity_ms.load(Ordering::Relaxed);
        if first == 0 {
            return 0.0;
        }
        let stopped = self.stopped_at_ms.load(Ordering::Relaxed);
        let end = if stopped != 0 { stopped } else { now_ms };
        let elapsed_ms = end.saturating_sub(first);
        if elapsed_ms == 0 {
            return 0.0;
        }
        self.bytes_total.load(Ordering::Relaxed) as f64 * 1_000.0 / elapsed_ms as f64
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_total.load(Ordering::Relaxed)
    }

    pub fn artifact_count(&self) -> u64 {
        self.artifacts_downloaded.load(Ordering::Relaxed)
    }

    /// Idempotent; later byte events are dropped.
    pub fn stop(&self, now_ms: u64) {
        let _ = self
            .stopped_at_ms
            .compare_exchange(0, now_ms.max(1), Ordering::Relaxed, Ordering::Relaxed);
    }

    fn rotate_if_stale(&self, window: &mut SpeedWindow, now_ms: u64) {
        let age_ms = now_ms.saturating_sub(window.window_started_ms);
        if age_ms >= SPEED_WINDOW_MS {
            window.last_speed_bytes_per_sec = window.window_bytes as f64 * 1_000.0 / age_ms as f64;
            window.window_bytes = 0;
            window.window_started_ms = now_ms;
        }
    }
}
