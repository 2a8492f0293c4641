use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserAgentError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Page is not initialized, use startBrowser before any page action")]
    PageNotInitialized,

    #[error("Page creation failed: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Failed to capture page snapshot: {0}")]
    SnapshotFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Input failed: {0}")]
    InputFailed(String),

    #[error("Model request failed: {0}")]
    Model(String),

    #[error("Agent stopped after reaching the iteration limit of {limit}")]
    IterationLimitExceeded { limit: usize },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chrome error: {0}")]
    ChromeError(String),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, BrowserAgentError>;

// Convert anyhow::Error to BrowserAgentError
impl From<anyhow::Error> for BrowserAgentError {
    fn from(err: anyhow::Error) -> Self {
        BrowserAgentError::AnyhowError(err.to_string())
    }
}

impl BrowserAgentError {
    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        BrowserAgentError::ChromeError(err.to_string())
    }
}
