//! Core types for chat truncation budgeting.

use serde::{Deserialize, Serialize};

use crate::chat::{ConfigError, Message};

/// Fraction used when truncation is disabled. It is never read in that case.
pub const DEFAULT_TRUNCATION_FRACTION: f64 = 0.8;

/// Process-wide truncation policy, validated once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncationConfig {
    enabled: bool,
    fraction: f64,
}

impl TruncationConfig {
    /// Build a config, rejecting fractions outside the open interval (0, 1).
    pub fn new(enabled: bool, fraction: f64) -> Result<Self, ConfigError> {
        // NaN fails both comparisons and is rejected too.
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::InvalidFraction(fraction));
        }
        Ok(Self { enabled, fraction })
    }

    /// Truncation enabled with the given target fraction.
    pub fn enabled(fraction: f64) -> Result<Self, ConfigError> {
        Self::new(true, fraction)
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            fraction: DEFAULT_TRUNCATION_FRACTION,
        }
    }

    /// Map the optional `--chat-truncate` value: absent means disabled.
    pub fn from_option(fraction: Option<f64>) -> Result<Self, ConfigError> {
        match fraction {
            Some(fraction) => Self::enabled(fraction),
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

impl Default for TruncationConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Capacity of the slot serving one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCapacity {
    /// Context tokens owned by the slot (total context / parallel slots)
    pub n_ctx_slot: u32,
    /// Requested generation length; `<= 0` means unbounded
    pub n_predict: i32,
}

impl SlotCapacity {
    pub fn new(n_ctx_slot: u32, n_predict: i32) -> Self {
        Self {
            n_ctx_slot,
            n_predict,
        }
    }

    /// Tokens reserved for generation. Unbounded generation reserves nothing.
    pub fn reserved_for_generation(&self) -> u32 {
        if self.n_predict > 0 {
            self.n_predict as u32
        } else {
            0
        }
    }
}

/// Per-request prompt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Slot context minus the generation reservation; the truncation trigger
    pub available_for_prompt: u32,
    /// Ceiling the truncation loop drives the prompt under
    pub target: u32,
}

impl Budget {
    pub fn compute(capacity: &SlotCapacity, fraction: f64) -> Self {
        let available_for_prompt = capacity
            .n_ctx_slot
            .saturating_sub(capacity.reserved_for_generation());
        let fraction_target = (fraction * capacity.n_ctx_slot as f64).floor() as u32;
        Self {
            available_for_prompt,
            target: fraction_target.min(available_for_prompt),
        }
    }

    pub fn needs_truncation(&self, n_prompt_tokens: u32) -> bool {
        n_prompt_tokens > self.available_for_prompt
    }
}

/// Result of running a request through [`crate::maybe_truncate`].
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    /// Surviving messages in original relative order
    pub messages: Vec<Message>,
    /// Rendered prompt for `messages`
    pub prompt: String,
    /// Token count of `prompt`
    pub prompt_tokens: u32,
    pub budget: Budget,
    pub truncation_occurred: bool,
    /// Number of whole turns removed
    pub turns_removed: usize,
    /// Every droppable turn was removed and the prompt still did not reach the target
    pub exhausted: bool,
}
