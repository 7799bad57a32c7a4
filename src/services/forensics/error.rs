// Forensics Errors
// Missing evidence and reasoning failures stay inside the scorers; only unreadable
// or unsupported media reaches the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForensicsError {
    /// Source media cannot be opened or decoded.
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },
    /// File type outside what the modality understands.
    #[error("unsupported {modality} format: {detail}")]
    UnsupportedFormat { modality: String, detail: String },
}

pub type ForensicsResult<T> = Result<T, ForensicsError>;

impl ForensicsError {
    pub fn unreadable(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        ForensicsError::Unreadable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
