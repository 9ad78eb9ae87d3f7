//! Error types for Runway

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// Rejected input, raised before anything is persisted
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Referenced record does not exist or belongs to another owner
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write would break a uniqueness invariant (e.g. a second realization
    /// of the same rule in the same month)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Opaque failure reported by a store implementation
    #[error("Store error: {0}")]
    Store(String),
}

impl Error {
    /// Errors that callers should surface to the user as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(Error::Validation("amount".into()).is_user_facing());
        assert!(Error::NotFound("rule 1".into()).is_user_facing());
        assert!(Error::Conflict("dup".into()).is_user_facing());
        assert!(!Error::Store("timeout".into()).is_user_facing());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::Validation("amount must be positive".into());
        assert_eq!(err.to_string(), "Invalid input: amount must be positive");
    }
}
