use thiserror::Error;

/// Common error type for PrintSight components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias using PrintSight's Error.
pub type Result<T> = std::result::Result<T, Error>;
