//! Account Directory
//!
//! Account records live under their id as a simple key, serialized as a
//! flat JSON object. Every write goes through the unit of work, so the
//! store keeps a version history per account.

use crate::{
    compaction,
    context::TxContext,
    delta, index, keys,
    types::{
        Account, AccountId, BalanceDelta, HistoryEntry, ParticipantRecord, TxNamespace,
        INIT_ACCOUNT_NAME, INIT_SENDER, PRUNE_SENDER,
    },
    Error, Result,
};

fn validate_id(account_id: &AccountId) -> Result<()> {
    if account_id.as_str().is_empty() {
        return Err(Error::InvalidKey("account id must not be empty".to_string()));
    }
    keys::validate_field(account_id.as_str())
}

/// Load an account record, if present
pub fn find(ctx: &TxContext<'_>, account_id: &AccountId) -> Result<Option<Account>> {
    validate_id(account_id)?;
    match ctx.get_state(account_id.as_str())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Load an account record
pub fn load(ctx: &TxContext<'_>, account_id: &AccountId) -> Result<Account> {
    find(ctx, account_id)?.ok_or_else(|| Error::AccountNotFound(account_id.to_string()))
}

/// Whether an account record exists
pub fn exists(ctx: &TxContext<'_>, account_id: &AccountId) -> Result<bool> {
    Ok(find(ctx, account_id)?.is_some())
}

/// Write an account record
pub fn store(ctx: &mut TxContext<'_>, account: &Account) -> Result<()> {
    validate_id(&account.account_id)?;
    keys::validate_field(&account.name)?;
    let bytes = serde_json::to_vec(account)?;
    ctx.put_state(account.account_id.as_str().to_string(), bytes);
    Ok(())
}

/// Create an empty account and index its name
pub fn create(ctx: &mut TxContext<'_>, account_id: AccountId, name: &str) -> Result<Account> {
    if exists(ctx, &account_id)? {
        return Err(Error::AlreadyExists(account_id.to_string()));
    }

    let account = Account::new(account_id, name, 0);
    store(ctx, &account)?;
    index::put_name(ctx, &account.name, &account.account_id)?;
    Ok(account)
}

/// Delete an account with zero balance and no open escrow
///
/// The account is compacted first; afterwards every settled delta it still
/// holds sums to zero and is removed together with the compaction records.
pub fn delete(ctx: &mut TxContext<'_>, account_id: &AccountId) -> Result<Account> {
    let account = load(ctx, account_id)?;

    let balance = delta::account_tokens(ctx, account_id)?;
    if balance != 0 {
        return Err(Error::NonZeroBalance {
            account: account_id.to_string(),
            balance,
        });
    }

    let pending = index::pending_for_account(ctx, account_id)?;
    if !pending.is_empty() {
        return Err(Error::PendingTransfers {
            account: account_id.to_string(),
            count: pending.len(),
        });
    }

    compaction::prune_account(ctx, account_id)?;
    delta::update_account_tokens(ctx, account_id)?;

    for remaining in index::deltas_for_account(ctx, account_id)? {
        if let Some(record) = index::participants(ctx, TxNamespace::Settled, &remaining.tx_id)? {
            if record.sender == PRUNE_SENDER && &record.recipient == account_id {
                index::delete_participants(ctx, TxNamespace::Settled, &record)?;
            }
        }
        index::delete_delta(ctx, &remaining)?;
    }

    index::delete_name(ctx, &account.name, account_id)?;
    ctx.del_state(account_id.as_str().to_string());
    Ok(account)
}

/// Accounts whose display name is exactly `name`, in account id order
pub fn query_by_name(ctx: &TxContext<'_>, name: &str) -> Result<Vec<Account>> {
    index::accounts_by_name(ctx, name)?
        .iter()
        .map(|id| load(ctx, id))
        .collect()
}

/// Every committed version of an account record, oldest first
pub fn history(ctx: &TxContext<'_>, account_id: &AccountId) -> Result<Vec<HistoryEntry>> {
    validate_id(account_id)?;
    ctx.history_for_key(account_id.as_str())?
        .into_iter()
        .map(|modification| -> Result<HistoryEntry> {
            let value = match &modification.value {
                Some(bytes) => Some(serde_json::from_slice(bytes)?),
                None => None,
            };
            Ok(HistoryEntry {
                is_delete: modification.is_delete(),
                timestamp: modification.timestamp(),
                tx_id: modification.tx_id,
                value,
            })
        })
        .collect()
}

/// Bulk-create accounts `"1"..="count"` holding `tokens` each
///
/// Each seeded balance is a settled credit from [`INIT_SENDER`] under its
/// own derived transaction id, so it can be compacted like any transfer.
pub fn init_accounts(ctx: &mut TxContext<'_>, count: u32, tokens: i64) -> Result<Vec<Account>> {
    if tokens < 0 {
        return Err(Error::InvalidAmount(tokens.to_string()));
    }

    let root = ctx.tx_id().clone();
    let mut created = Vec::with_capacity(count as usize);
    for n in 1..=count {
        let account_id = AccountId::new(n.to_string());
        if exists(ctx, &account_id)? {
            return Err(Error::AlreadyExists(account_id.to_string()));
        }

        let account = Account::new(account_id.clone(), INIT_ACCOUNT_NAME, tokens);
        store(ctx, &account)?;
        index::put_name(ctx, INIT_ACCOUNT_NAME, &account_id)?;

        if tokens > 0 {
            let tx_id = root.derive(n);
            index::put_delta(ctx, &BalanceDelta::credit(account_id.clone(), tokens, tx_id.clone()))?;
            index::put_participants(
                ctx,
                TxNamespace::Settled,
                &ParticipantRecord {
                    tx_id,
                    sender: INIT_SENDER.to_string(),
                    recipient: account_id,
                    amount: tokens,
                },
            )?;
        }
        created.push(account);
    }
    Ok(created)
}
