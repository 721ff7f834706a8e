use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarqueeError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("render error: {0}")]
    Render(String),
}
