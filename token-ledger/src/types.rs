//! Core types for the token ledger
//!
//! Balances are never stored authoritatively. An account's balance is the
//! replay of its settled [`BalanceDelta`]s; [`Account::tokens`] is only a
//! snapshot refreshed on request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Record type tag stored in every account record
pub const ACCOUNT_RECORD_TYPE: &str = "ACCOUNT";

/// Display name given to bulk-initialized accounts
pub const INIT_ACCOUNT_NAME: &str = "Init_Account";

/// Synthetic sender of compaction records
pub const PRUNE_SENDER: &str = "pruneTx";

/// Synthetic sender of seeding records
pub const INIT_SENDER: &str = "initTx";

/// Account identifier (externally assigned)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction identifier, unique per logical operation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh time-ordered id (UUIDv7, simple hex form)
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Child id for the n-th record written by one operation
    pub fn derive(&self, n: u32) -> Self {
        Self(format!("{}.{}", self.0, n))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account record
///
/// Serialized as a flat JSON object with fields in the order
/// `RecordType, AccountID, Name, Tokens`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Always [`ACCOUNT_RECORD_TYPE`]
    #[serde(rename = "RecordType")]
    pub record_type: String,

    /// Unique account id
    #[serde(rename = "AccountID")]
    pub account_id: AccountId,

    /// Display name of the account holder
    #[serde(rename = "Name")]
    pub name: String,

    /// Cached balance snapshot (advisory)
    #[serde(rename = "Tokens")]
    pub tokens: i64,
}

impl Account {
    /// New account record with the given cached balance
    pub fn new(account_id: AccountId, name: impl Into<String>, tokens: i64) -> Self {
        Self {
            record_type: ACCOUNT_RECORD_TYPE.to_string(),
            account_id,
            name: name.into(),
            tokens,
        }
    }
}

/// Direction of a balance delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Adds to the balance
    Credit,
    /// Subtracts from the balance
    Debit,
}

impl Operation {
    /// Key symbol (`+` / `-`)
    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Credit => "+",
            Operation::Debit => "-",
        }
    }

    /// Parse a key symbol
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Operation::Credit),
            "-" => Some(Operation::Debit),
            _ => None,
        }
    }
}

/// Immutable balance change attributable to one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Account the delta applies to
    pub account_id: AccountId,
    /// Credit or debit
    pub operation: Operation,
    /// Magnitude, never negative
    pub amount: i64,
    /// Originating transaction
    pub tx_id: TxId,
}

impl BalanceDelta {
    /// Credit delta
    pub fn credit(account_id: AccountId, amount: i64, tx_id: TxId) -> Self {
        Self {
            account_id,
            operation: Operation::Credit,
            amount,
            tx_id,
        }
    }

    /// Debit delta
    pub fn debit(account_id: AccountId, amount: i64, tx_id: TxId) -> Self {
        Self {
            account_id,
            operation: Operation::Debit,
            amount,
            tx_id,
        }
    }

    /// Contribution to the balance, `None` when a debit cannot be negated
    pub fn signed_amount(&self) -> Option<i64> {
        match self.operation {
            Operation::Credit => Some(self.amount),
            Operation::Debit => self.amount.checked_neg(),
        }
    }
}

/// Namespace a participant record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxNamespace {
    /// Fully reflected in balance replay
    Settled,
    /// Debit taken, credit withheld until the marketplace confirms
    Pending,
}

/// What a transaction did: who paid whom and how much
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    /// Transaction id
    pub tx_id: TxId,
    /// Paying account (or a synthetic sender)
    pub sender: String,
    /// Receiving account
    pub recipient: AccountId,
    /// Amount moved (signed only for compaction records)
    pub amount: i64,
}

/// Settlement state reported by `getTxDetails`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Settled namespace
    Valid,
    /// Pending namespace
    Pending,
}

impl TxStatus {
    /// Wire label
    pub fn label(&self) -> &'static str {
        match self {
            TxStatus::Valid => "ValidTx",
            TxStatus::Pending => "PendingTx",
        }
    }
}

/// Transaction lookup result, rendered as `sender->recipient->amount->Status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxDetails {
    /// Participant record
    pub record: ParticipantRecord,
    /// Namespace it was found in
    pub status: TxStatus,
}

impl fmt::Display for TxDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}->{}->{}",
            self.record.sender,
            self.record.recipient,
            self.record.amount,
            self.status.label()
        )
    }
}

/// Escrowed amounts touching one account, rendered as `incoming:outgoing`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSummary {
    /// Withheld credits awaiting settlement
    pub incoming: i64,
    /// Debits already taken for unsettled purchases
    pub outgoing: i64,
}

impl fmt::Display for PendingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.incoming, self.outgoing)
    }
}

/// One historic version of an account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Operation that wrote this version
    #[serde(rename = "TxId")]
    pub tx_id: TxId,

    /// Record value, `None` for a deletion
    #[serde(rename = "Value")]
    pub value: Option<Account>,

    /// Commit time
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Whether this version deleted the record
    #[serde(rename = "IsDelete")]
    pub is_delete: bool,
}

/// Answer of the data marketplace for a transaction id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumptionStatus {
    /// Consumed for a completed purchase
    Used,
    /// Not consumed (yet)
    Unused,
}

impl fmt::Display for ConsumptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumptionStatus::Used => write!(f, "Used"),
            ConsumptionStatus::Unused => write!(f, "Unused"),
        }
    }
}
