//! Token ledger facade
//!
//! Every public operation runs as one unit of work: a [`TxContext`] is
//! opened, the operation reads and buffers writes through it, and the
//! buffer is committed in a single batch only if the operation succeeds.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use token_ledger::{AccountId, Config, InMemoryMarketplace, TokenLedger};
//!
//! fn main() -> token_ledger::Result<()> {
//!     let ledger = TokenLedger::open(Config::default(), Arc::new(InMemoryMarketplace::new()))?;
//!
//!     ledger.init_accounts(1, 10000)?;
//!     ledger.create_account(AccountId::new("2"), "acc")?;
//!     let tx_id = ledger.send_tokens_fast(AccountId::new("1"), AccountId::new("2"), 1, false)?;
//!     println!("{}", ledger.tx_details(&tx_id)?);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    accounts,
    compaction::{self, PruneSummary},
    context::TxContext,
    delta, escrow,
    marketplace::{ContractAddress, DataMarketplace},
    metrics::Metrics,
    storage::Storage,
    transfer::{TransferEngine, TransferMode, TransferRequest},
    types::{Account, AccountId, HistoryEntry, ParticipantRecord, PendingSummary, TxDetails, TxId},
    Config, Result,
};
use std::sync::Arc;

/// Main ledger interface
pub struct TokenLedger {
    /// Ledger store
    storage: Arc<Storage>,

    /// Fast/safe transfer admission
    transfers: TransferEngine,

    /// Settlement collaborator
    marketplace: Arc<dyn DataMarketplace>,

    /// Prometheus collectors
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl std::fmt::Debug for TokenLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLedger")
            .field("storage", &self.storage)
            .field("transfers", &self.transfers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenLedger {
    /// Open ledger with configuration
    pub fn open(config: Config, marketplace: Arc<dyn DataMarketplace>) -> Result<Self> {
        config.validate()?;
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()?;
        let transfers = TransferEngine::new(config.limit_tokens);

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            limit_tokens = transfers.limit_tokens(),
            "Token ledger opened"
        );

        Ok(Self {
            storage,
            transfers,
            marketplace,
            metrics,
            config,
        })
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Prometheus collectors
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Whether the store holds no state yet
    pub fn is_empty(&self) -> Result<bool> {
        self.storage.is_empty()
    }

    fn read<T>(&self, op: impl FnOnce(&TxContext<'_>) -> Result<T>) -> Result<T> {
        let ctx = TxContext::begin(&self.storage);
        op(&ctx)
    }

    fn write<T>(&self, op: impl FnOnce(&mut TxContext<'_>) -> Result<T>) -> Result<(T, TxId)> {
        let mut ctx = TxContext::begin(&self.storage);
        let value = op(&mut ctx)?;
        let tx_id = ctx.commit()?;
        Ok((value, tx_id))
    }

    /// Bulk-create accounts `"1"..="count"` holding `tokens` each
    pub fn init_accounts(&self, count: u32, tokens: i64) -> Result<Vec<Account>> {
        let (created, tx_id) = self.write(|ctx| accounts::init_accounts(ctx, count, tokens))?;
        tracing::info!(tx_id = %tx_id, count, tokens, "Accounts initialized");
        Ok(created)
    }

    /// Create an empty account
    pub fn create_account(&self, account_id: AccountId, name: &str) -> Result<Account> {
        let (account, tx_id) = self.write(|ctx| accounts::create(ctx, account_id, name))?;
        tracing::info!(tx_id = %tx_id, account_id = %account.account_id, "Account created");
        Ok(account)
    }

    /// Delete an account with zero balance and no open escrow
    pub fn delete_account(&self, account_id: &AccountId) -> Result<Account> {
        match self.write(|ctx| accounts::delete(ctx, account_id)) {
            Ok((account, tx_id)) => {
                tracing::info!(tx_id = %tx_id, account_id = %account_id, "Account deleted");
                Ok(account)
            }
            Err(e) => {
                tracing::warn!(account_id = %account_id, error = %e, "Account deletion refused");
                Err(e)
            }
        }
    }

    /// Account record
    pub fn get_account(&self, account_id: &AccountId) -> Result<Account> {
        self.read(|ctx| accounts::load(ctx, account_id))
    }

    /// Accounts held under a display name
    pub fn query_accounts_by_name(&self, name: &str) -> Result<Vec<Account>> {
        self.read(|ctx| accounts::query_by_name(ctx, name))
    }

    /// Move tokens under the given admission policy
    pub fn send_tokens(&self, mode: TransferMode, request: &TransferRequest) -> Result<TxId> {
        let (tx_id, _) = self.write(|ctx| self.transfers.send(ctx, mode, request))?;
        self.metrics.record_transfer(mode, request.data_purchase);
        tracing::info!(
            tx_id = %tx_id,
            mode = %mode,
            from = %request.from,
            to = %request.to,
            amount = request.amount,
            data_purchase = request.data_purchase,
            "Tokens sent"
        );
        Ok(tx_id)
    }

    /// Unchecked transfer bounded by the configured ceiling
    pub fn send_tokens_fast(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        data_purchase: bool,
    ) -> Result<TxId> {
        self.send_tokens(
            TransferMode::Fast,
            &TransferRequest {
                from,
                to,
                amount,
                data_purchase,
            },
        )
    }

    /// Balance-checked transfer
    pub fn send_tokens_safe(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        data_purchase: bool,
    ) -> Result<TxId> {
        self.send_tokens(
            TransferMode::Safe,
            &TransferRequest {
                from,
                to,
                amount,
                data_purchase,
            },
        )
    }

    /// Refresh the cached balance in the account record
    pub fn update_account_tokens(&self, account_id: &AccountId) -> Result<Account> {
        let (account, tx_id) = self.write(|ctx| delta::update_account_tokens(ctx, account_id))?;
        tracing::info!(tx_id = %tx_id, account_id = %account_id, tokens = account.tokens, "Cached balance refreshed");
        Ok(account)
    }

    /// Current balance (replayed)
    pub fn account_tokens(&self, account_id: &AccountId) -> Result<i64> {
        let replay = self.read(|ctx| delta::replay(ctx, account_id))?;
        self.metrics.record_replay(replay.deltas);
        Ok(replay.balance)
    }

    /// Versions of an account record, oldest first
    pub fn account_history(&self, account_id: &AccountId) -> Result<Vec<HistoryEntry>> {
        self.read(|ctx| accounts::history(ctx, account_id))
    }

    /// Settled or pending participants of a transaction
    pub fn tx_details(&self, tx_id: &TxId) -> Result<TxDetails> {
        self.read(|ctx| escrow::tx_details(ctx, tx_id))
    }

    /// Settle a pending purchase once the marketplace confirms it
    pub async fn change_pending_tx(
        &self,
        address: &ContractAddress,
        tx_id: &TxId,
    ) -> Result<ParticipantRecord> {
        let mut ctx = TxContext::begin(&self.storage);
        let settled = escrow::settle(&mut ctx, self.marketplace.as_ref(), address, tx_id).await;

        let record = match settled {
            Ok(record) => record,
            Err(e) => {
                self.metrics.record_settlement(false);
                return Err(e);
            }
        };
        ctx.commit()?;
        self.metrics.record_settlement(true);
        Ok(record)
    }

    /// Compact the settled deltas of an account
    pub fn prune_account_tx(&self, account_id: &AccountId) -> Result<PruneSummary> {
        let (summary, _) = self.write(|ctx| compaction::prune_account(ctx, account_id))?;
        self.metrics.record_prune(summary.pruned);
        Ok(summary)
    }

    /// Escrowed amounts touching an account
    pub fn pending_tokens(&self, account_id: &AccountId) -> Result<PendingSummary> {
        self.read(|ctx| escrow::pending_summary(ctx, account_id))
    }
}
