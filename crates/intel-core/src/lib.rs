pub mod config;
pub mod error;
pub mod types;

pub use config::{IntelConfig, ResolvedSecrets, Secret};
pub use error::{IntelError, Result};
pub use types::*;
