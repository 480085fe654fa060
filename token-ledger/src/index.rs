//! Secondary indices
//!
//! Index entries carry their payload in the key; the stored value is a
//! single `0x00` byte. Lookups return entries in key order.

use crate::{
    context::TxContext,
    keys::{self, DELTA_INDEX, NAME_INDEX, PENDING_TX_INDEX, SETTLED_TX_INDEX},
    types::{AccountId, BalanceDelta, Operation, ParticipantRecord, TxId, TxNamespace},
    Error, Result,
};

const INDEX_VALUE: u8 = 0x00;

fn tx_index(namespace: TxNamespace) -> &'static str {
    match namespace {
        TxNamespace::Settled => SETTLED_TX_INDEX,
        TxNamespace::Pending => PENDING_TX_INDEX,
    }
}

fn parse_amount(raw: &str, key: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| Error::InvariantViolation(format!("Corrupt amount in index key {:?}", key)))
}

fn parse_magnitude(raw: &str, key: &str) -> Result<i64> {
    match parse_amount(raw, key)? {
        amount if amount >= 0 => Ok(amount),
        _ => Err(Error::InvariantViolation(format!("Negative delta amount in index key {:?}", key))),
    }
}

fn expect_parts<'p>(key: &str, parts: &'p [String], n: usize) -> Result<&'p [String]> {
    if parts.len() != n {
        return Err(Error::InvariantViolation(format!(
            "Index key {:?} has {} attributes, expected {}",
            key,
            parts.len(),
            n
        )));
    }
    Ok(parts)
}

// Name index

fn name_key(name: &str, account_id: &AccountId) -> Result<String> {
    keys::composite_key(NAME_INDEX, &[name, account_id.as_str()])
}

/// Index an account under its display name
pub fn put_name(ctx: &mut TxContext<'_>, name: &str, account_id: &AccountId) -> Result<()> {
    let key = name_key(name, account_id)?;
    ctx.put_state(key, vec![INDEX_VALUE]);
    Ok(())
}

/// Remove a name index entry
pub fn delete_name(ctx: &mut TxContext<'_>, name: &str, account_id: &AccountId) -> Result<()> {
    let key = name_key(name, account_id)?;
    ctx.del_state(key);
    Ok(())
}

/// Account ids indexed under `name`
pub fn accounts_by_name(ctx: &TxContext<'_>, name: &str) -> Result<Vec<AccountId>> {
    let prefix = keys::composite_key(NAME_INDEX, &[name])?;
    ctx.scan_prefix(&prefix)?
        .into_iter()
        .map(|(key, _)| -> Result<AccountId> {
            let (_, parts) = keys::split_composite_key(&key)?;
            let parts = expect_parts(&key, &parts, 2)?;
            Ok(AccountId::new(parts[1].clone()))
        })
        .collect()
}

// Delta index

fn delta_key(delta: &BalanceDelta) -> Result<String> {
    if delta.amount < 0 {
        return Err(Error::InvariantViolation(format!(
            "Delta {} of {} has negative amount {}",
            delta.tx_id, delta.account_id, delta.amount
        )));
    }
    keys::composite_key(
        DELTA_INDEX,
        &[
            delta.account_id.as_str(),
            delta.tx_id.as_str(),
            delta.operation.symbol(),
            &delta.amount.to_string(),
        ],
    )
}

/// Append a settled delta
pub fn put_delta(ctx: &mut TxContext<'_>, delta: &BalanceDelta) -> Result<()> {
    let key = delta_key(delta)?;
    ctx.put_state(key, vec![INDEX_VALUE]);
    Ok(())
}

/// Remove a settled delta (compaction only)
pub fn delete_delta(ctx: &mut TxContext<'_>, delta: &BalanceDelta) -> Result<()> {
    let key = delta_key(delta)?;
    ctx.del_state(key);
    Ok(())
}

/// Every settled delta of an account, in append order
pub fn deltas_for_account(ctx: &TxContext<'_>, account_id: &AccountId) -> Result<Vec<BalanceDelta>> {
    let prefix = keys::composite_key(DELTA_INDEX, &[account_id.as_str()])?;
    ctx.scan_prefix(&prefix)?
        .into_iter()
        .map(|(key, _)| -> Result<BalanceDelta> {
            let (_, parts) = keys::split_composite_key(&key)?;
            let parts = expect_parts(&key, &parts, 4)?;
            let operation = Operation::from_symbol(&parts[2]).ok_or_else(|| {
                Error::InvariantViolation(format!("Unrecognized operation {}", parts[2]))
            })?;
            Ok(BalanceDelta {
                account_id: AccountId::new(parts[0].clone()),
                operation,
                amount: parse_magnitude(&parts[3], &key)?,
                tx_id: TxId::new(parts[1].clone()),
            })
        })
        .collect()
}

// Participant indices

fn participant_key(namespace: TxNamespace, record: &ParticipantRecord) -> Result<String> {
    keys::composite_key(
        tx_index(namespace),
        &[
            record.tx_id.as_str(),
            &record.sender,
            record.recipient.as_str(),
            &record.amount.to_string(),
        ],
    )
}

fn parse_participants(ctx: &TxContext<'_>, prefix: &str) -> Result<Vec<ParticipantRecord>> {
    ctx.scan_prefix(prefix)?
        .into_iter()
        .map(|(key, _)| -> Result<ParticipantRecord> {
            let (_, parts) = keys::split_composite_key(&key)?;
            let parts = expect_parts(&key, &parts, 4)?;
            Ok(ParticipantRecord {
                tx_id: TxId::new(parts[0].clone()),
                sender: parts[1].clone(),
                recipient: AccountId::new(parts[2].clone()),
                amount: parse_amount(&parts[3], &key)?,
            })
        })
        .collect()
}

/// Record who took part in a transaction
pub fn put_participants(
    ctx: &mut TxContext<'_>,
    namespace: TxNamespace,
    record: &ParticipantRecord,
) -> Result<()> {
    let key = participant_key(namespace, record)?;
    ctx.put_state(key, vec![INDEX_VALUE]);
    Ok(())
}

/// Remove a participant record
pub fn delete_participants(
    ctx: &mut TxContext<'_>,
    namespace: TxNamespace,
    record: &ParticipantRecord,
) -> Result<()> {
    let key = participant_key(namespace, record)?;
    ctx.del_state(key);
    Ok(())
}

/// The participant record of `tx_id` in one namespace
///
/// Transaction ids are unique per operation, so more than one match is an
/// invariant violation.
pub fn participants(
    ctx: &TxContext<'_>,
    namespace: TxNamespace,
    tx_id: &TxId,
) -> Result<Option<ParticipantRecord>> {
    let prefix = keys::composite_key(tx_index(namespace), &[tx_id.as_str()])?;
    let mut records = parse_participants(ctx, &prefix)?;
    if records.len() > 1 {
        return Err(Error::InvariantViolation(format!(
            "Transaction {} has {} participant records",
            tx_id,
            records.len()
        )));
    }
    Ok(records.pop())
}

/// Pending records where the account is sender or recipient
pub fn pending_for_account(
    ctx: &TxContext<'_>,
    account_id: &AccountId,
) -> Result<Vec<ParticipantRecord>> {
    let prefix = keys::composite_key(PENDING_TX_INDEX, &[])?;
    Ok(parse_participants(ctx, &prefix)?
        .into_iter()
        .filter(|r| r.sender == account_id.as_str() || &r.recipient == account_id)
        .collect())
}
