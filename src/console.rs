use crate::errors::MarqueeError;
use crossterm::cursor::MoveToPreviousLine;
use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap};
use crossterm::Command;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn render_command(command: impl Command) -> String {
    let mut out = String::new();
    let _ = command.write_ansi(&mut out);
    out
}

pub fn cursor_previous_line(lines: u16) -> String {
    render_command(MoveToPreviousLine(lines))
}

pub fn clear_line() -> String {
    render_command(Clear(ClearType::CurrentLine))
}

pub fn as_warning(text: &str) -> String {
    format!(
        "{}{}{}",
        render_command(SetForegroundColor(Color::Yellow)),
        text,
        render_command(SetAttribute(Attribute::Reset))
    )
}

pub fn as_error(text: &str) -> String {
    format!(
        "{}{}{}{}",
        render_command(SetAttribute(Attribute::Bold)),
        render_command(SetForegroundColor(Color::Red)),
        text,
        render_command(SetAttribute(Attribute::Reset))
    )
}

/// Disables terminal auto-wrap around `text` so an over-long frame line cannot
/// push the cursor onto an extra row and break the clear-sequence accounting.
pub fn as_no_wrap(text: &str) -> String {
    format!(
        "{}{}{}",
        render_command(DisableLineWrap),
        text,
        render_command(EnableLineWrap)
    )
}

/// An output stream shared between the frame driver and foreign writers.
///
/// Writes through `print`/`println` latch the dirty flag; the driver writes
/// through a `StreamGuard` which leaves the flag untouched. Once dirty, a
/// stream stays dirty for the life of the process.
pub struct TrackedStream {
    inner: Mutex<Box<dyn Write + Send>>,
    dirty: AtomicBool,
}

impl TrackedStream {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(sink),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn print(&self, text: &str) -> Result<(), MarqueeError> {
        self.dirty.store(true, Ordering::SeqCst);
        let mut sink = self.inner.lock().expect("stream lock");
        sink.write_all(text.as_bytes())
            .and_then(|()| sink.flush())
            .map_err(|e| MarqueeError::Io(e.to_string()))
    }

    pub fn println(&self, line: &str) -> Result<(), MarqueeError> {
        self.print(&format!("{line}\n"))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn lock(&self) -> StreamGuard<'_> {
        StreamGuard {
            sink: self.inner.lock().expect("stream lock"),
            dirty: &self.dirty,
        }
    }
}

pub struct StreamGuard<'a> {
    sink: MutexGuard<'a, Box<dyn Write + Send>>,
    dirty: &'a AtomicBool,
}

impl StreamGuard<'_> {
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Frame-driver write: does not latch the dirty flag.
    pub fn write_frame(&mut self, text: &str) -> Result<(), MarqueeError> {
        self.sink
            .write_all(text.as_bytes())
            .and_then(|()| self.sink.flush())
            .map_err(|e| MarqueeError::Io(e.to_string()))
    }
}

pub struct ConsoleOutput {
    pub stdout: TrackedStream,
    pub stderr: TrackedStream,
}

impl ConsoleOutput {
    pub fn stdio() -> Self {
        Self {
            stdout: TrackedStream::new(Box::new(std::io::stdout())),
            stderr: TrackedStream::new(Box::new(std::io::stderr())),
        }
    }

    /// Buffer-backed console for tests; returns handles to the captured
    /// stdout and stderr bytes.
    pub fn capture() -> (Self, CaptureHandle, CaptureHandle) {
        let stdout = CaptureHandle::default();
        let stderr = CaptureHandle::default();
        let output = Self {
            stdout: TrackedStream::new(Box::new(CaptureSink(stdout.0.clone()))),
            stderr: TrackedStream::new(Box::new(CaptureSink(stderr.0.clone()))),
        };
        (output, stdout, stderr)
    }
}

#[derive(Clone, Default)]
pub struct CaptureHandle(Arc<Mutex<Vec<u8>>>);

impl CaptureHandle {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("capture lock")).to_string()
    }

    pub fn clear(&self) {
        self.0.lock().expect("capture lock").clear();
    }
}

struct CaptureSink(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("capture lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{as_error, as_no_wrap, as_warning, clear_line, cursor_previous_line, ConsoleOutput};

    #[test]
    fn ansi_helpers_emit_expected_sequences() {
        assert_eq!(cursor_previous_line(1), "\x1b[1F");
        assert_eq!(clear_line(), "\x1b[2K");
        assert!(as_warning("careful").contains("careful"));
        assert!(as_error("boom").contains("boom"));
        let wrapped = as_no_wrap("line");
        assert!(wrapped.starts_with("\x1b[?7l"));
        assert!(wrapped.ends_with("\x1b[?7h"));
    }

    #[test]
    fn foreign_writes_latch_dirty_but_frame_writes_do_not() {
        let (output, _stdout, stderr) = ConsoleOutput::capture();
        {
            let mut guard = output.stderr.lock();
            guard.write_frame("frame one\n").expect("write frame");
            assert!(!guard.is_dirty());
        }
        assert!(!output.stderr.is_dirty());

        output.stderr.println("foreign line").expect("println");
        assert!(output.stderr.is_dirty());
        assert!(stderr.contents().contains("foreign line"));
        assert!(stderr.contents().contains("frame one"));
    }

    #[test]
    fn stdout_and_stderr_track_dirty_independently() {
        let (output, stdout, _stderr) = ConsoleOutput::capture();
        output.stdout.print("report").expect("print");
        assert!(output.stdout.is_dirty());
        assert!(!output.stderr.is_dirty());
        assert_eq!(stdout.contents(), "report");
    }
}
