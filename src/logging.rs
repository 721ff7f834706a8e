use crate::errors::MarqueeError;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_PAYLOAD_BYTES: usize = 4096;

/// Append-only JSONL diagnostics log. Optional: until `init_run_logger` runs,
/// `append_run_log` is a no-op.
#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
struct RunLogContext {
    run_id: String,
}

static RUN_LOGGER: OnceLock<Mutex<Option<(JsonlLogger, RunLogContext)>>> = OnceLock::new();
static RUN_LOG_NONCE: AtomicU64 = AtomicU64::new(1);

fn run_logger_slot() -> &'static Mutex<Option<(JsonlLogger, RunLogContext)>> {
    RUN_LOGGER.get_or_init(|| Mutex::new(None))
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append_json(&self, payload: &Value) -> Result<(), MarqueeError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MarqueeError::Io(e.to_string()))?;
        }
        let mut line =
            serde_json::to_string(payload).map_err(|e| MarqueeError::Io(e.to_string()))?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MarqueeError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| MarqueeError::Io(e.to_string()))
    }
}

pub fn init_run_logger(path: impl AsRef<Path>) -> String {
    let run_id = random_hex(16);
    let mut slot = run_logger_slot().lock().expect("run logger lock");
    *slot = Some((
        JsonlLogger::new(path),
        RunLogContext {
            run_id: run_id.clone(),
        },
    ));
    run_id
}

pub fn clear_run_logger() {
    let mut slot = run_logger_slot().lock().expect("run logger lock");
    *slot = None;
}

pub fn current_run_id() -> Option<String> {
    let slot = run_logger_slot().lock().expect("run logger lock");
    slot.as_ref().map(|(_, context)| context.run_id.clone())
}

pub fn append_run_log(level: &str, event_type: &str, payload: Value) {
    let entry = {
        let slot = run_logger_slot().lock().expect("run logger lock");
        slot.clone()
    };
    let Some((logger, context)) = entry else {
        return;
    };

    let line = json!({
        "ts_ns": now_unix_nanos(),
        "severity": normalize_severity(level),
        "event_type": event_type,
        "run_id": context.run_id,
        "payload": truncate_json(payload, MAX_PAYLOAD_BYTES),
    });
    let _ = logger.append_json(&line);
}

fn normalize_severity(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "TRACE",
        "debug" => "DEBUG",
        "warn" | "warning" => "WARN",
        "error" => "ERROR",
        _ => "INFO",
    }
}

fn now_unix_nanos() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
        .to_string()
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    Value::String(truncate_utf8(&rendered, max_bytes))
}

fn truncate_utf8(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut cutoff = max_bytes.saturating_sub(3);
    while !value.is_char_boundary(cutoff) {
        cutoff = cutoff.saturating_sub(1);
    }
    format!("{}...", &value[..cutoff])
}

fn random_hex(bytes: usize) -> String {
    use std::fmt::Write as _;
    let mut hasher = Sha256::new();
    let nonce = RUN_LOG_NONCE.fetch_add(1, Ordering::Relaxed);
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    hasher.update(nonce.to_le_bytes());
    hasher.update(now_ns.to_le_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(bytes * 2);
    for byte in digest.iter().take(bytes) {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{append_run_log, clear_run_logger, current_run_id, init_run_logger, JsonlLogger};
    use serde_json::json;

    #[test]
    fn logger_appends_one_json_object_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.jsonl");
        let logger = JsonlLogger::new(&path);
        logger
            .append_json(&json!({"event_type": "render.tick"}))
            .expect("append");
        logger
            .append_json(&json!({"event_type": "render.stand_down"}))
            .expect("append");
        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("\"render.tick\""));
    }

    #[test]
    fn run_log_records_severity_and_run_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("marquee.jsonl");
        let run_id = init_run_logger(&path);
        assert_eq!(current_run_id().as_deref(), Some(run_id.as_str()));
        append_run_log("warn", "render.failed", json!({"reason": "io"}));
        clear_run_logger();
        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"WARN\""));
        assert!(text.contains(&run_id));
        assert!(current_run_id().is_none());
    }

    #[test]
    fn oversized_payloads_are_truncated() {
        let rendered = super::truncate_json(
            json!({"text": "x".repeat(10_000)}),
            64,
        );
        let as_string = rendered.as_str().expect("truncated to string");
        assert!(as_string.ends_with("..."));
        assert!(as_string.len() <= 64);
    }
}
