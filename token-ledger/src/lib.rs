//! Token Ledger
//!
//! Token accounting for a data marketplace, with escrowed payment for data.
//!
//! # Architecture
//!
//! - **Event Sourcing**: Balances are replayed from immutable settled deltas
//! - **Dual Transfer Paths**: Fast (ceiling-bounded, unchecked) and safe (balance-checked)
//! - **Escrow**: Purchase payments stay pending until the marketplace confirms consumption
//! - **Compaction**: An account's deltas collapse into one aggregate, keeping replay bounded
//! - **Single Writer**: One actor task serializes every operation
//!
//! # Invariants
//!
//! - Conservation: every settled transaction debits exactly what it credits
//! - A transaction id lives in at most one of the settled and pending namespaces
//! - Pending transactions never contribute to a balance
//! - All-or-nothing: a failed operation leaves no writes behind

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accounts;
pub mod actor;
pub mod compaction;
pub mod config;
pub mod context;
pub mod delta;
pub mod error;
pub mod escrow;
pub mod index;
pub mod invoke;
pub mod keys;
pub mod ledger;
pub mod marketplace;
pub mod metrics;
pub mod storage;
pub mod transfer;
pub mod types;

// Re-exports
pub use actor::{spawn_ledger_actor, LedgerHandle};
pub use config::Config;
pub use error::{Error, Result};
pub use invoke::Function;
pub use ledger::TokenLedger;
pub use marketplace::{ContractAddress, DataMarketplace, InMemoryMarketplace};
pub use transfer::{TransferMode, TransferRequest};
pub use types::{Account, AccountId, ConsumptionStatus, TxDetails, TxId, TxStatus};
