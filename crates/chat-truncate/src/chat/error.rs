use std::path::PathBuf;
use thiserror::Error;

/// Per-request failures surfaced by [`crate::maybe_truncate`].
#[derive(Error, Debug)]
pub enum TruncateError {
    /// The rendered conversation overflows the prompt budget and truncation is disabled.
    #[error("the request exceeds the available context size ({n_prompt_tokens} prompt tokens > {n_ctx} available), try increasing it or enable chat truncation")]
    ContextExceeded { n_prompt_tokens: u32, n_ctx: u32 },

    #[error("Failed to render chat prompt: {0}")]
    Render(String),
}

impl TruncateError {
    /// Machine-readable error kind reported to clients.
    pub fn error_type(&self) -> &'static str {
        match self {
            TruncateError::ContextExceeded { .. } => "exceed_context_size_error",
            TruncateError::Render(_) => "invalid_request_error",
        }
    }

    pub fn is_context_exceeded(&self) -> bool {
        matches!(self, TruncateError::ContextExceeded { .. })
    }
}

/// Startup configuration errors. These abort the process before any request is served.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("chat truncation fraction must be within (0, 1) exclusive, got {0}")]
    InvalidFraction(f64),

    #[error("number of parallel slots must be at least 1")]
    NoSlots,

    #[error("context size must be at least 1 token")]
    EmptyContext,

    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
