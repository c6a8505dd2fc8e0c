//! Files Core Domain Logic
//!
//! This crate contains:
//! - Application state and batch operations
//! - Configuration
//! - Error types
//! - Pinned folders

pub mod state;
pub mod config;
pub mod error;
pub mod pinned;

pub use state::{AppState, OperationResult};
pub use config::{AppConfig, FilerConfig};
pub use error::AppError;
pub use pinned::PinnedFolders;
