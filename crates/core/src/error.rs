use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Already connected to Mini Program. Use disconnect first.")]
    AlreadyConnected,

    #[error("Not connected to Mini Program. Use launch or connect first.")]
    NotConnected,

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Failure reported by the automation backend. The collaborator's own
    /// diagnostic text is carried verbatim so operators keep root-cause detail.
    #[error("{0}")]
    Backend(String),

    /// Failure from an external DevTools CLI invocation (exit code, stderr, stdout).
    #[error("{0}")]
    Process(String),

    /// Missing or malformed operation argument, detected before any backend call.
    #[error("{0}")]
    Validation(String),

    #[error("WeChat DevTools CLI not found. Pass toolPath or set WEAPP_DEVTOOLS_CLI.")]
    ToolNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
