pub mod error;
pub mod types;

pub use error::{ConfigError, TruncateError};
pub use types::{Message, Role};
