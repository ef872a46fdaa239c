//! Error types for hlscache-av.

use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running external media tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// The process could not be started at all.
    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool ran but exited unsuccessfully.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// The tool exceeded its time budget and was killed.
    #[error("{tool} timed out after {}s", timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a launch error.
    pub fn launch(tool: impl Into<String>, source: std::io::Error) -> Self {
        Self::ToolLaunch {
            tool: tool.into(),
            source,
        }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable name of the failure class, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ToolNotFound { .. } => "not_found",
            Error::ToolLaunch { .. } => "launch",
            Error::ToolFailed { .. } => "failed",
            Error::Timeout { .. } => "timeout",
            Error::ParseError { .. } => "parse",
            Error::Io(_) => "io",
        }
    }
}

impl From<Error> for hlscache_common::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::ToolNotFound { ref tool }
            | Error::ToolLaunch { ref tool, .. }
            | Error::ToolFailed { ref tool, .. }
            | Error::Timeout { ref tool, .. } => {
                hlscache_common::Error::tool(tool.clone(), err.to_string())
            }
            Error::ParseError { .. } => hlscache_common::Error::Probe(err.to_string()),
            Error::Io(e) => hlscache_common::Error::Io(e),
        }
    }
}
