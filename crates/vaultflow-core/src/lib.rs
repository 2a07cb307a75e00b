pub mod config;
pub mod error;
pub mod types;

pub use config::VaultflowConfig;
pub use error::{Result, VaultflowError};
pub use types::*;
