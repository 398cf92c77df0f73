//! Server-wide capacity parameters.
//!
//! Loaded once at startup (CLI flags or a JSON file) and turned into a
//! per-request [`SlotCapacity`] and the process-wide [`TruncationConfig`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::budget::types::{SlotCapacity, TruncationConfig};
use crate::chat::ConfigError;

pub const DEFAULT_CTX_SIZE: u32 = 4096;
pub const DEFAULT_PARALLEL: u32 = 1;
/// Unbounded generation.
pub const DEFAULT_N_PREDICT: i32 = -1;

/// Startup capacity and truncation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerParams {
    /// Total context size shared by all slots
    #[serde(default = "default_ctx_size")]
    pub n_ctx: u32,
    /// Number of concurrent request slots
    #[serde(default = "default_parallel")]
    pub n_parallel: u32,
    /// Default generation length (`<= 0` = unbounded)
    #[serde(default = "default_n_predict")]
    pub n_predict: i32,
    /// Truncation target fraction; `None` disables chat truncation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_truncate: Option<f64>,
}

fn default_ctx_size() -> u32 {
    DEFAULT_CTX_SIZE
}

fn default_parallel() -> u32 {
    DEFAULT_PARALLEL
}

fn default_n_predict() -> i32 {
    DEFAULT_N_PREDICT
}

impl Default for ServerParams {
    fn default() -> Self {
        Self {
            n_ctx: DEFAULT_CTX_SIZE,
            n_parallel: DEFAULT_PARALLEL,
            n_predict: DEFAULT_N_PREDICT,
            chat_truncate: None,
        }
    }
}

impl ServerParams {
    /// Load parameters from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let params: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Loaded server params from {:?}", path);
        Ok(params)
    }

    /// Reject configurations that cannot serve any request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_ctx == 0 {
            return Err(ConfigError::EmptyContext);
        }
        if self.n_parallel == 0 {
            return Err(ConfigError::NoSlots);
        }
        self.truncation_config().map(|_| ())
    }

    pub fn truncation_config(&self) -> Result<TruncationConfig, ConfigError> {
        TruncationConfig::from_option(self.chat_truncate)
    }

    /// Context tokens owned by one slot.
    pub fn n_ctx_slot(&self) -> u32 {
        self.n_ctx / self.n_parallel.max(1)
    }

    /// Generation length for a request: the request's own `max_tokens` when
    /// given, the server default otherwise.
    pub fn resolve_n_predict(&self, requested: Option<i32>) -> i32 {
        requested.unwrap_or(self.n_predict)
    }

    pub fn slot_capacity(&self, requested_n_predict: Option<i32>) -> SlotCapacity {
        SlotCapacity::new(self.n_ctx_slot(), self.resolve_n_predict(requested_n_predict))
    }
}
