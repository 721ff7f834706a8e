use crate::clock::Locale;
use crate::errors::MarqueeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DashboardConfig {
    pub render: RenderConfig,
    pub tests: TestConfig,
    pub format: FormatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderConfig {
    pub interval_ms: u64,
    pub thread_line_limit: usize,
    pub thread_line_limit_on_warning: usize,
    pub thread_line_limit_on_error: usize,
    pub always_sort_threads_by_time: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestConfig {
    pub result_verbosity: TestResultVerbosity,
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestResultVerbosity {
    Brief,
    Standard,
    Verbose,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormatConfig {
    pub decimal_separator: String,
    pub utc_offset_minutes: i32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            thread_line_limit: 10,
            thread_line_limit_on_warning: 10,
            thread_line_limit_on_error: 10,
            always_sort_threads_by_time: false,
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            result_verbosity: TestResultVerbosity::Standard,
            log_path: None,
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            decimal_separator: ".".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

impl DashboardConfig {
    pub fn locale(&self) -> Locale {
        Locale {
            decimal_separator: self.format.decimal_separator.chars().next().unwrap_or('.'),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDashboardConfig {
    render: Option<PartialRenderConfig>,
    tests: Option<PartialTestConfig>,
    format: Option<PartialFormatConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialRenderConfig {
    interval_ms: Option<u64>,
    thread_line_limit: Option<usize>,
    thread_line_limit_on_warning: Option<usize>,
    thread_line_limit_on_error: Option<usize>,
    always_sort_threads_by_time: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialTestConfig {
    result_verbosity: Option<TestResultVerbosity>,
    log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialFormatConfig {
    decimal_separator: Option<String>,
    utc_offset_minutes: Option<i32>,
}

pub fn load_config(path: Option<&Path>) -> Result<DashboardConfig, MarqueeError> {
    let mut cfg = DashboardConfig::default();
    if let Some(path) = path {
        let contents =
            std::fs::read_to_string(path).map_err(|e| MarqueeError::Io(e.to_string()))?;
        let partial: PartialDashboardConfig =
            toml::from_str(&contents).map_err(|e| MarqueeError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut DashboardConfig, partial: PartialDashboardConfig) {
    if let Some(render) = partial.render {
        if let Some(value) = render.interval_ms {
            cfg.render.interval_ms = value;
        }
        if let Some(value) = render.thread_line_limit {
            cfg.render.thread_line_limit = value;
        }
        if let Some(value) = render.thread_line_limit_on_warning {
            cfg.render.thread_line_limit_on_warning = value;
        }
        if let Some(value) = render.thread_line_limit_on_error {
            cfg.render.thread_line_limit_on_error = value;
        }
        if let Some(value) = render.always_sort_threads_by_time {
            cfg.render.always_sort_threads_by_time = value;
        }
    }

    if let Some(tests) = partial.tests {
        if let Some(value) = tests.result_verbosity {
            cfg.tests.result_verbosity = value;
        }
        if let Some(value) = tests.log_path {
            cfg.tests.log_path = Some(value);
        }
    }

    if let Some(format) = partial.format {
        if let Some(value) = format.decimal_separator {
            cfg.format.decimal_separator = value;
        }
        if let Some(value) = format.utc_offset_minutes {
            cfg.format.utc_offset_minutes = value;
        }
    }
}

fn validate_config(cfg: &DashboardConfig) -> Result<(), MarqueeError> {
    if cfg.render.interval_ms == 0 {
        return Err(MarqueeError::InvalidConfig(
            "render.interval_ms must be greater than zero".to_string(),
        ));
    }
    if cfg.render.thread_line_limit == 0
        || cfg.render.thread_line_limit_on_warning == 0
        || cfg.render.thread_line_limit_on_error == 0
    {
        return Err(MarqueeError::InvalidConfig(
            "thread line limits must be greater than zero".to_string(),
        ));
    }
    if cfg.format.decimal_separator.chars().count() != 1 {
        return Err(MarqueeError::InvalidConfig(
            "format.decimal_separator must be a single character".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_config, DashboardConfig, TestResultVerbosity};
    use std::path::PathBuf;

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("marquee.toml");
        std::fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn missing_file_argument_yields_defaults() {
        let cfg = load_config(None).expect("load defaults");
        assert_eq!(cfg, DashboardConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(
            &dir,
            r#"
[render]
interval_ms = 100
thread_line_limit_on_error = 3

[tests]
result_verbosity = "verbose"
"#,
        );
        let cfg = load_config(Some(&path)).expect("load config");
        assert_eq!(cfg.render.interval_ms, 100);
        assert_eq!(cfg.render.thread_line_limit_on_error, 3);
        // untouched keys keep their defaults
        assert_eq!(cfg.render.thread_line_limit, 10);
        assert_eq!(cfg.tests.result_verbosity, TestResultVerbosity::Verbose);
        assert_eq!(cfg.format.decimal_separator, ".");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, "[render]\ninterval_ms = 0\n");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn multi_character_separator_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, "[format]\ndecimal_separator = \"ab\"\n");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn locale_uses_configured_separator() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, "[format]\ndecimal_separator = \",\"\n");
        let cfg = load_config(Some(&path)).expect("load config");
        assert_eq!(cfg.locale().decimal_separator, ',');
    }
}
