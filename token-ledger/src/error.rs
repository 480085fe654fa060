//! Error types for the token ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every error aborts the operation that raised it; none of its buffered
/// writes reach the store.
#[derive(Error, Debug)]
pub enum Error {
    /// Wrong number of positional arguments
    #[error("Incorrect number of arguments. Expecting {expected}")]
    InvalidArgumentCount {
        /// Human readable list of the expected arguments
        expected: &'static str,
    },

    /// Blank positional argument (1-based position)
    #[error("Argument at position {0} must be a non-empty string")]
    EmptyArgument(usize),

    /// Non-numeric or non-positive token amount
    #[error("Expecting positive integer as number of tokens: {0}")]
    InvalidAmount(String),

    /// Malformed argument (e.g. the purchase flag)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Sender and recipient are the same account
    #[error("From account and to account cannot be the same.")]
    InvalidTransfer,

    /// Account record missing
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account id already taken
    #[error("This account already exists: {0}")]
    AlreadyExists(String),

    /// Safe transfer rejected by the balance check
    #[error("Not enough tokens on the sender's account")]
    InsufficientFunds {
        /// Sender account
        account: String,
        /// Replayed balance
        balance: i64,
        /// Requested amount
        requested: i64,
    },

    /// Fast transfer above the configured ceiling
    #[error("Exceeded max number of tokens for fast transaction. Use safe token transfer instead.")]
    TransferLimitExceeded {
        /// Requested amount
        amount: i64,
        /// Configured ceiling
        limit: i64,
    },

    /// Account deletion blocked by a non-zero balance
    #[error("Account cannot be deleted. Amount of tokens is not 0: {account} holds {balance}")]
    NonZeroBalance {
        /// Account
        account: String,
        /// Replayed balance
        balance: i64,
    },

    /// Account deletion blocked by open escrow
    #[error("Account cannot be deleted. {count} pending transaction(s) reference {account}")]
    PendingTransfers {
        /// Account
        account: String,
        /// Number of pending participant records
        count: usize,
    },

    /// Transaction id in neither namespace
    #[error("Transaction was not found: {0}")]
    TransactionNotFound(String),

    /// Settlement requested for a txId with no pending record
    #[error("Transaction is not pending (already settled or missing): {0}")]
    AlreadySettledOrMissing(String),

    /// Marketplace reports the txId as not consumed yet
    #[error("Transaction has not been used for a data purchase yet: {0}")]
    NotYetConsumed(String),

    /// Ledger store failure
    #[error("State access error: {0}")]
    StateAccess(String),

    /// Cross-contract call failed or returned a non-success status
    #[error("Collaborator invocation failed: {0}")]
    CollaboratorInvocation(String),

    /// Unknown public operation
    #[error("Received unknown function invocation: {0}")]
    UnknownFunction(String),

    /// Internal consistency violation
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Key field contains the reserved separator
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Binary serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::StateAccess(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_public_wording() {
        assert_eq!(
            Error::EmptyArgument(3).to_string(),
            "Argument at position 3 must be a non-empty string"
        );
        assert_eq!(
            Error::TransferLimitExceeded { amount: 11, limit: 10 }.to_string(),
            "Exceeded max number of tokens for fast transaction. Use safe token transfer instead."
        );
        assert_eq!(
            Error::AlreadyExists("2".into()).to_string(),
            "This account already exists: 2"
        );
    }
}
