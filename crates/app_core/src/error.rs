//! Application error types

use app_fs::VfsError;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Recoverable Errors (notify user, continue) =====
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error(transparent)]
    Vfs(VfsError),

    // ===== Fatal Errors (application termination) =====
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Init(String),
}

impl AppError {
    /// Is this error recoverable?
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Io(_) | AppError::FileNotFound(_) | AppError::AccessDenied(_) | AppError::Vfs(_)
        )
    }

    /// Is this a fatal error?
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Get a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::FileNotFound(path) => format!("File not found: {}", path),
            AppError::AccessDenied(path) => format!("Access denied: {}", path),
            AppError::Vfs(e) => vfs_message(e),
            _ => self.to_string(),
        }
    }
}

fn vfs_message(e: &VfsError) -> String {
    match e {
        VfsError::TypeMismatch(path) => {
            format!("Cannot replace a file with a folder or a folder with a file: {}", path)
        }
        VfsError::AmbiguousEntry(path) => {
            format!("The archive contains an entry that is both a file and a folder: {}", path)
        }
        VfsError::UnsupportedOperation(what) => format!("This operation is not supported: {}", what),
        VfsError::AlreadyExists(path) => format!("An item with this name already exists: {}", path),
        VfsError::InvalidName(name) => format!("Invalid name: \"{}\"", name),
        VfsError::NotAnArchive(path) => format!("Not a supported archive: {}", path),
        VfsError::Archive(msg) => format!("Cannot read or write the archive: {}", msg),
        _ => e.to_string(),
    }
}

impl From<VfsError> for AppError {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::PathNotFound(p) => AppError::FileNotFound(p),
            VfsError::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                AppError::AccessDenied(io.to_string())
            }
            VfsError::Io(io) => AppError::Io(io),
            other => AppError::Vfs(other),
        }
    }
}
