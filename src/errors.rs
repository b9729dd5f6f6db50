//! Unified error type and result alias for the engine.
//!
//! Every fallible operation returns [`Result`]. Validation failures are
//! raised before any mutation; ownership-scope misses get their own
//! not-found variants so callers can distinguish "you sent garbage" from
//! "that row is not yours".

use crate::money::Money;
use thiserror::Error;

/// All errors the engine can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file or environment problem.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of what is wrong.
        message: String,
    },

    /// Malformed payload or refused state transition. Always raised before
    /// any row is written.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description naming the offending field or state.
        message: String,
    },

    /// A pay-event approval whose parts do not reconstruct the transaction
    /// amount within one cent.
    #[error(
        "Allocation mismatch: allocations plus surplus total {actual} \
         but the transaction amount is {expected} (off by {})",
        *.expected - *.actual
    )]
    AllocationMismatch {
        /// The transaction amount the parts must sum to.
        expected: Money,
        /// What the submitted allocations plus surplus actually total.
        actual: Money,
    },

    /// A numeric input that is not finite or outside its domain.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The offending value.
        amount: f64,
    },

    /// Account lookup missed within the caller's ownership scope.
    #[error("Account not found: {id}")]
    AccountNotFound {
        /// The requested account id.
        id: i64,
    },

    /// Envelope lookup missed within the caller's ownership scope.
    #[error("Envelope not found: {id}")]
    EnvelopeNotFound {
        /// The requested envelope id.
        id: i64,
    },

    /// Income source lookup missed within the caller's ownership scope.
    #[error("Income source not found: {id}")]
    IncomeSourceNotFound {
        /// The requested income source id.
        id: i64,
    },

    /// Transaction lookup missed within the caller's ownership scope.
    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// The requested transaction id.
        id: i64,
    },

    /// A pay-event approval re-run against an already reconciled
    /// transaction.
    #[error("Transaction {transaction_id} has already been reconciled")]
    AlreadyReconciled {
        /// The transaction whose allocation was already approved.
        transaction_id: i64,
    },

    /// A link request lost the compare-and-swap race: the transaction is
    /// already half of another transfer pair.
    #[error("Transaction {transaction_id} is already linked to a transfer")]
    AlreadyLinked {
        /// The transaction that is already linked.
        transaction_id: i64,
    },

    /// Database error from the storage layer.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error (config files, .env).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_mismatch_names_the_off_by_amount() {
        let err = Error::AllocationMismatch {
            expected: Money::from_cents(200_000),
            actual: Money::from_cents(199_950),
        };
        let message = err.to_string();
        assert!(message.contains("$1999.50"));
        assert!(message.contains("$2000.00"));
        assert!(message.contains("off by $0.50"));
    }

    #[test]
    fn test_not_found_variants_are_distinct_from_validation() {
        let not_found = Error::EnvelopeNotFound { id: 7 };
        assert!(not_found.to_string().contains("not found"));

        let validation = Error::Validation {
            message: "amount must be non-negative".to_string(),
        };
        assert!(validation.to_string().starts_with("Validation error"));
    }
}
