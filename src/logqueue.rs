use crate::console::{as_error, as_warning};
use crate::events::LogLevel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

/// A log line deferred until the next frame. Messages carrying their own ANSI
/// escapes are emitted verbatim.
#[derive(Debug, Clone)]
pub struct ConsoleMessage {
    pub level: LogLevel,
    pub message: String,
}

impl ConsoleMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Warn,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            message: message.into(),
        }
    }

    fn contains_ansi(&self) -> bool {
        self.message.contains('\u{1b}')
    }
}

/// Unbounded MPSC queue of deferred log lines, drained only by the renderer.
/// Draining latches the warning/error flags that shrink the thread-line cap.
pub struct LogEventQueue {
    sender: Sender<ConsoleMessage>,
    receiver: Mutex<Receiver<ConsoleMessage>>,
    warnings_printed: AtomicBool,
    errors_printed: AtomicBool,
}

impl Default for LogEventQueue {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            warnings_printed: AtomicBool::new(false),
            errors_printed: AtomicBool::new(false),
        }
    }
}

impl LogEventQueue {
    pub fn enqueue(&self, message: ConsoleMessage) {
        let _ = self.sender.send(message);
    }

    /// Drains every queued message into render-ready lines. Multi-line
    /// messages are split so the emitted line count matches the rendered
    /// line count exactly.
    pub fn drain_render_lines(&self) -> Vec<String> {
        let receiver = self.receiver.lock().expect("log queue lock");
        let mut lines = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            match message.level {
                LogLevel::Warn => {
                    self.warnings_printed.store(true, Ordering::SeqCst);
                }
                LogLevel::Error => {
                    self.errors_printed.store(true, Ordering::SeqCst);
                }
                LogLevel::Info => {}
            }
            let formatted = if message.contains_ansi() {
                message.message.clone()
            } else {
                match message.level {
                    LogLevel::Info => message.message.clone(),
                    LogLevel::Warn => as_warning(&message.message),
                    LogLevel::Error => as_error(&message.message),
                }
            };
            for line in formatted.split('\n') {
                lines.push(line.to_string());
            }
        }
        lines
    }

    pub fn mark_warnings_printed(&self) {
        self.warnings_printed.store(true, Ordering::SeqCst);
    }

    pub fn any_warnings_printed(&self) -> bool {
        self.warnings_printed.load(Ordering::SeqCst)
    }

    pub fn any_errors_printed(&self) -> bool {
        self.errors_printed.load(Ordering::SeqCst)
    }
}
