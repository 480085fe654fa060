//! Balance replay over the delta ledger
//!
//! `balance(account) = Σ settled credits - Σ settled debits`. The cost is
//! linear in the number of deltas the account holds, which compaction keeps
//! bounded.

use crate::{
    accounts,
    context::TxContext,
    index,
    types::{Account, AccountId},
    Error, Result,
};

/// Outcome of replaying one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replay {
    /// Replayed balance
    pub balance: i64,
    /// Number of deltas scanned
    pub deltas: usize,
}

/// Replay every settled delta of an account
///
/// An account without deltas (including an unknown one) has balance 0.
pub fn replay(ctx: &TxContext<'_>, account_id: &AccountId) -> Result<Replay> {
    let deltas = index::deltas_for_account(ctx, account_id)?;

    let balance = deltas.iter().try_fold(0i64, |acc, delta| {
        delta.signed_amount().and_then(|amount| acc.checked_add(amount)).ok_or_else(|| {
            Error::InvariantViolation(format!("Balance of {} overflows i64", account_id))
        })
    })?;

    tracing::debug!(account_id = %account_id, balance, deltas = deltas.len(), "Replayed balance");
    Ok(Replay {
        balance,
        deltas: deltas.len(),
    })
}

/// Current balance of an account
pub fn account_tokens(ctx: &TxContext<'_>, account_id: &AccountId) -> Result<i64> {
    Ok(replay(ctx, account_id)?.balance)
}

/// Refresh the cached snapshot in the account record
pub fn update_account_tokens(ctx: &mut TxContext<'_>, account_id: &AccountId) -> Result<Account> {
    let mut account = accounts::load(ctx, account_id)?;
    account.tokens = account_tokens(ctx, account_id)?;
    accounts::store(ctx, &account)?;
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::Storage,
        types::{BalanceDelta, TxId},
        Config,
    };
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    #[test]
    fn test_unknown_account_is_zero() {
        let (storage, _temp) = test_storage();
        let ctx = TxContext::begin(&storage);
        let replay = replay(&ctx, &AccountId::new("nobody")).unwrap();
        assert_eq!(replay, Replay { balance: 0, deltas: 0 });
    }

    #[test]
    fn test_replay_sums_credits_and_debits() {
        let (storage, _temp) = test_storage();
        let mut ctx = TxContext::begin(&storage);
        let account = AccountId::new("1");
        index::put_delta(&mut ctx, &BalanceDelta::credit(account.clone(), 100, TxId::generate()))
            .unwrap();
        index::put_delta(&mut ctx, &BalanceDelta::debit(account.clone(), 30, TxId::generate()))
            .unwrap();
        index::put_delta(&mut ctx, &BalanceDelta::debit(account.clone(), 80, TxId::generate()))
            .unwrap();

        assert_eq!(account_tokens(&ctx, &account).unwrap(), -10);
        assert_eq!(replay(&ctx, &account).unwrap().deltas, 3);
    }

    #[test]
    fn test_overflow_is_reported() {
        let (storage, _temp) = test_storage();
        let mut ctx = TxContext::begin(&storage);
        let account = AccountId::new("1");
        index::put_delta(&mut ctx, &BalanceDelta::credit(account.clone(), i64::MAX, TxId::generate()))
            .unwrap();
        index::put_delta(&mut ctx, &BalanceDelta::credit(account.clone(), 1, TxId::generate()))
            .unwrap();
        assert!(matches!(
            account_tokens(&ctx, &account),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_update_refreshes_snapshot() {
        let (storage, _temp) = test_storage();
        let mut ctx = TxContext::begin(&storage);
        let account = AccountId::new("1");
        accounts::store(&mut ctx, &Account::new(account.clone(), "acc", 0)).unwrap();
        index::put_delta(&mut ctx, &BalanceDelta::credit(account.clone(), 42, TxId::generate()))
            .unwrap();

        let updated = update_account_tokens(&mut ctx, &account).unwrap();
        assert_eq!(updated.tokens, 42);
        assert_eq!(accounts::load(&ctx, &account).unwrap().tokens, 42);
    }

    #[test]
    fn test_update_missing_account_fails() {
        let (storage, _temp) = test_storage();
        let mut ctx = TxContext::begin(&storage);
        assert!(matches!(
            update_account_tokens(&mut ctx, &AccountId::new("x")),
            Err(Error::AccountNotFound(_))
        ));
    }
}
