//! Transfer Engine
//!
//! Both transfer paths write the same records; they differ only in the
//! admission check. The fast path is bounded by a per-transfer ceiling
//! and never replays the sender, the safe path replays the sender and has
//! no ceiling.

use crate::{
    accounts,
    context::TxContext,
    delta, index,
    types::{AccountId, BalanceDelta, ParticipantRecord, TxId, TxNamespace},
    Error, Result,
};
use std::fmt;

/// Admission policy of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Unchecked, bounded by the configured ceiling
    Fast,
    /// Balance-checked, unbounded
    Safe,
}

impl TransferMode {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Fast => "fast",
            TransferMode::Safe => "safe",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested movement of tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Paying account
    pub from: AccountId,
    /// Receiving account
    pub to: AccountId,
    /// Amount, must be positive
    pub amount: i64,
    /// Payment for data: the credit is withheld until settlement
    pub data_purchase: bool,
}

/// Writes transfers into the delta ledger
#[derive(Debug, Clone)]
pub struct TransferEngine {
    limit_tokens: i64,
}

impl TransferEngine {
    /// Engine with the given fast-transfer ceiling
    pub fn new(limit_tokens: i64) -> Self {
        Self { limit_tokens }
    }

    /// Fast-transfer ceiling
    pub fn limit_tokens(&self) -> i64 {
        self.limit_tokens
    }

    /// Admit and write a transfer under the unit of work's transaction id
    pub fn send(
        &self,
        ctx: &mut TxContext<'_>,
        mode: TransferMode,
        request: &TransferRequest,
    ) -> Result<TxId> {
        self.admit(ctx, mode, request)?;

        let tx_id = ctx.tx_id().clone();
        index::put_delta(
            ctx,
            &BalanceDelta::debit(request.from.clone(), request.amount, tx_id.clone()),
        )?;

        let record = ParticipantRecord {
            tx_id: tx_id.clone(),
            sender: request.from.as_str().to_string(),
            recipient: request.to.clone(),
            amount: request.amount,
        };

        if request.data_purchase {
            index::put_participants(ctx, TxNamespace::Pending, &record)?;
        } else {
            index::put_delta(
                ctx,
                &BalanceDelta::credit(request.to.clone(), request.amount, tx_id.clone()),
            )?;
            index::put_participants(ctx, TxNamespace::Settled, &record)?;
        }

        tracing::debug!(
            tx_id = %tx_id,
            mode = %mode,
            from = %request.from,
            to = %request.to,
            amount = request.amount,
            data_purchase = request.data_purchase,
            "Transfer written"
        );
        Ok(tx_id)
    }

    fn admit(&self, ctx: &TxContext<'_>, mode: TransferMode, request: &TransferRequest) -> Result<()> {
        if request.from == request.to {
            return Err(Error::InvalidTransfer);
        }
        if request.amount <= 0 {
            return Err(Error::InvalidAmount(request.amount.to_string()));
        }
        if mode == TransferMode::Fast && request.amount > self.limit_tokens {
            return Err(Error::TransferLimitExceeded {
                amount: request.amount,
                limit: self.limit_tokens,
            });
        }
        for account_id in [&request.from, &request.to] {
            if !accounts::exists(ctx, account_id)? {
                return Err(Error::AccountNotFound(account_id.to_string()));
            }
        }
        if mode == TransferMode::Safe {
            let balance = delta::account_tokens(ctx, &request.from)?;
            if balance < request.amount {
                return Err(Error::InsufficientFunds {
                    account: request.from.to_string(),
                    balance,
                    requested: request.amount,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::Storage, Config};
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn seeded(storage: &Storage) {
        let mut ctx = TxContext::begin(storage);
        accounts::init_accounts(&mut ctx, 1, 10000).unwrap();
        accounts::create(&mut ctx, AccountId::new("2"), "acc").unwrap();
        ctx.commit().unwrap();
    }

    fn request(amount: i64, data_purchase: bool) -> TransferRequest {
        TransferRequest {
            from: AccountId::new("1"),
            to: AccountId::new("2"),
            amount,
            data_purchase,
        }
    }

    fn balance(storage: &Storage, id: &str) -> i64 {
        delta::account_tokens(&TxContext::begin(storage), &AccountId::new(id)).unwrap()
    }

    #[test]
    fn test_fast_transfer_moves_tokens() {
        let (storage, _temp) = test_storage();
        seeded(&storage);
        let engine = TransferEngine::new(10);

        let mut ctx = TxContext::begin(&storage);
        let tx_id = engine.send(&mut ctx, TransferMode::Fast, &request(1, false)).unwrap();
        ctx.commit().unwrap();

        assert_eq!(balance(&storage, "1"), 9999);
        assert_eq!(balance(&storage, "2"), 1);
        let ctx = TxContext::begin(&storage);
        assert!(index::participants(&ctx, TxNamespace::Settled, &tx_id).unwrap().is_some());
    }

    #[test]
    fn test_fast_ceiling() {
        let (storage, _temp) = test_storage();
        seeded(&storage);
        let engine = TransferEngine::new(10);
        let mut ctx = TxContext::begin(&storage);
        engine
            .send(&mut ctx, TransferMode::Fast, &request(engine.limit_tokens(), false))
            .unwrap();
        let err = engine
            .send(&mut ctx, TransferMode::Fast, &request(11, false))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Exceeded max number of tokens for fast transaction. Use safe token transfer instead."
        );
        assert_eq!(balance(&storage, "1"), 10000);
    }

    #[test]
    fn test_fast_path_allows_overdraft() {
        let (storage, _temp) = test_storage();
        let mut ctx = TxContext::begin(&storage);
        accounts::create(&mut ctx, AccountId::new("1"), "a").unwrap();
        accounts::create(&mut ctx, AccountId::new("2"), "b").unwrap();
        let engine = TransferEngine::new(10);
        engine.send(&mut ctx, TransferMode::Fast, &request(10, false)).unwrap();
        assert_eq!(delta::account_tokens(&ctx, &AccountId::new("1")).unwrap(), -10);
    }

    #[test]
    fn test_safe_transfer_checks_balance() {
        let (storage, _temp) = test_storage();
        seeded(&storage);
        let engine = TransferEngine::new(10);

        let mut ctx = TxContext::begin(&storage);
        engine.send(&mut ctx, TransferMode::Safe, &request(100, false)).unwrap();
        ctx.commit().unwrap();
        assert_eq!(balance(&storage, "1"), 9900);

        let mut ctx = TxContext::begin(&storage);
        let err = engine
            .send(&mut ctx, TransferMode::Safe, &request(9901, false))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFunds { balance: 9900, requested: 9901, .. }
        ));
    }

    #[test]
    fn test_purchase_withholds_credit() {
        let (storage, _temp) = test_storage();
        seeded(&storage);
        let engine = TransferEngine::new(10);

        let mut ctx = TxContext::begin(&storage);
        let tx_id = engine.send(&mut ctx, TransferMode::Fast, &request(7, true)).unwrap();
        ctx.commit().unwrap();

        assert_eq!(balance(&storage, "1"), 9993);
        assert_eq!(balance(&storage, "2"), 0);
        let ctx = TxContext::begin(&storage);
        assert!(index::participants(&ctx, TxNamespace::Pending, &tx_id).unwrap().is_some());
        assert!(index::participants(&ctx, TxNamespace::Settled, &tx_id).unwrap().is_none());
    }

    #[test]
    fn test_validation_failures() {
        let (storage, _temp) = test_storage();
        seeded(&storage);
        let engine = TransferEngine::new(10);
        let mut ctx = TxContext::begin(&storage);

        let same = TransferRequest {
            to: AccountId::new("1"),
            ..request(1, false)
        };
        assert!(matches!(
            engine.send(&mut ctx, TransferMode::Safe, &same),
            Err(Error::InvalidTransfer)
        ));
        assert!(matches!(
            engine.send(&mut ctx, TransferMode::Safe, &request(0, false)),
            Err(Error::InvalidAmount(_))
        ));
        let missing = TransferRequest {
            to: AccountId::new("9"),
            ..request(1, false)
        };
        assert!(matches!(
            engine.send(&mut ctx, TransferMode::Fast, &missing),
            Err(Error::AccountNotFound(id)) if id == "9"
        ));
    }
}
