use chrono::{DateTime, FixedOffset};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Clone, Default)]
pub struct FakeClock {
    now_ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub decimal_separator: char,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
        }
    }
}

/// Renders an elapsed duration with one decimal, e.g. "12.3s".
pub fn format_elapsed(locale: &Locale, elapsed_ms: u64) -> String {
    let tenths = (elapsed_ms + 50) / 100;
    format!(
        "{}{}{}s",
        tenths / 10,
        locale.decimal_separator,
        tenths % 10
    )
}

pub fn format_decimal_1(locale: &Locale, value: f64) -> String {
    localize(format!("{value:.1}"), locale)
}

pub fn format_decimal_2(locale: &Locale, value: f64) -> String {
    localize(format!("{value:.2}"), locale)
}

fn localize(rendered: String, locale: &Locale) -> String {
    if locale.decimal_separator == '.' {
        rendered
    } else {
        rendered.replace('.', &locale.decimal_separator.to_string())
    }
}

/// Formats a wall-clock timestamp as "[yyyy-MM-dd HH:mm:ss.SSS]" in the
/// configured fixed offset from UTC.
pub fn format_timestamp_ms(utc_offset_minutes: i32, timestamp_ms: i64) -> String {
    let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset"));
    match DateTime::from_timestamp_millis(timestamp_ms) {
        Some(utc) => utc
            .with_timezone(&offset)
            .format("[%Y-%m-%d %H:%M:%S%.3f]")
            .to_string(),
        None => format!("[{timestamp_ms}]"),
    }
}
