use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolyglotError {
    /// The config file or environment could not be read, or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PolyglotError {
    /// Short error code string used in log lines and exit messages.
    pub fn code(&self) -> &'static str {
        match self {
            PolyglotError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PolyglotError>;
