//! Outcomes of failed transfers.
//!
//! A failed download is data as much as an error: it is written to the
//! tracking file and re-surfaced by later update checks, so it is cloneable
//! and serializable. Not-found and other transfer failures are cached under
//! separate session flags.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransferError {
    /// The repository does not have the item.
    #[error("{item} was not found in {repository}")]
    #[diagnostic(help("Check the coordinates, or whether the repository should host this item"))]
    NotFound { item: String, repository: String },

    /// The item could not be transferred.
    #[error("Could not transfer {item} from {repository}: {message}")]
    Transfer {
        item: String,
        repository: String,
        message: String,
    },
}

impl TransferError {
    pub fn not_found(item: impl ToString, repository: &str) -> Self {
        Self::NotFound {
            item: item.to_string(),
            repository: repository.to_string(),
        }
    }

    pub fn transfer(item: impl ToString, repository: &str, message: impl Into<String>) -> Self {
        Self::Transfer {
            item: item.to_string(),
            repository: repository.to_string(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
