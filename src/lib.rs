//! Live, self-overwriting terminal dashboard for a parallel build/test
//! orchestrator. Events stream in from many worker threads; a dedicated
//! render worker periodically folds the aggregate state into a multi-line
//! ANSI frame on stderr that erases its predecessor in place, with deferred
//! warning/error log lines scrolling above it.

pub mod activity;
pub mod clock;
pub mod config;
pub mod console;
pub mod counters;
pub mod dashboard;
mod dispatch;
pub mod driver;
pub mod errors;
pub mod events;
pub mod frame;
pub mod logging;
pub mod logqueue;
pub mod network;
pub mod progress;
pub mod test_report;
pub mod thread_state;
pub mod timeline;

pub use config::{load_config, DashboardConfig, TestResultVerbosity};
pub use dashboard::Dashboard;
pub use errors::MarqueeError;
pub use events::{Event, EventKind};
