//! Compaction Engine
//!
//! Collapses the settled deltas of one account into a single aggregate
//! delta so that replay cost stays bounded. A delta is only aggregated if
//! its transaction still has a settled participant record naming the
//! account; the record is consumed together with the delta, which keeps a
//! delta from being counted twice.

use crate::{
    context::TxContext,
    index,
    types::{AccountId, BalanceDelta, ParticipantRecord, TxId, TxNamespace, PRUNE_SENDER},
    Error, Result,
};

/// What one compaction run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneSummary {
    /// Transaction id of the aggregate, `None` when nothing was aggregated
    pub tx_id: Option<TxId>,
    /// Deltas folded into the aggregate
    pub pruned: usize,
    /// Deltas left in place because their participant record is gone
    pub skipped: usize,
    /// Net amount of the aggregate
    pub net: i64,
}

fn involves(record: &ParticipantRecord, account_id: &AccountId) -> bool {
    record.sender == account_id.as_str() || &record.recipient == account_id
}

/// Compact the settled deltas of `account_id`
///
/// The aggregate is written under the unit of work's transaction id with
/// [`PRUNE_SENDER`] as sender. Its participant record carries the signed
/// net amount; the delta is a credit for a non-negative net and a debit
/// otherwise.
pub fn prune_account(ctx: &mut TxContext<'_>, account_id: &AccountId) -> Result<PruneSummary> {
    let deltas = index::deltas_for_account(ctx, account_id)?;

    let mut verified = Vec::new();
    let mut skipped = 0;
    for delta in deltas {
        match index::participants(ctx, TxNamespace::Settled, &delta.tx_id)? {
            Some(record) if involves(&record, account_id) => verified.push((delta, record)),
            _ => skipped += 1,
        }
    }

    if verified.is_empty() {
        tracing::debug!(account_id = %account_id, skipped, "Nothing to compact");
        return Ok(PruneSummary {
            tx_id: None,
            pruned: 0,
            skipped,
            net: 0,
        });
    }

    let net = verified.iter().try_fold(0i64, |acc, (delta, _)| {
        delta
            .signed_amount()
            .and_then(|amount| acc.checked_add(amount))
            .ok_or_else(|| {
                Error::InvariantViolation(format!("Net amount of {} overflows i64", account_id))
            })
    })?;

    let tx_id = ctx.tx_id().clone();
    let aggregate = if net >= 0 {
        BalanceDelta::credit(account_id.clone(), net, tx_id.clone())
    } else {
        let magnitude = net.checked_neg().ok_or_else(|| {
            Error::InvariantViolation(format!(
                "Net amount {} of {} has no debit representation",
                net, account_id
            ))
        })?;
        BalanceDelta::debit(account_id.clone(), magnitude, tx_id.clone())
    };

    for (delta, record) in &verified {
        index::delete_delta(ctx, delta)?;
        index::delete_participants(ctx, TxNamespace::Settled, record)?;
    }
    index::put_delta(ctx, &aggregate)?;
    index::put_participants(
        ctx,
        TxNamespace::Settled,
        &ParticipantRecord {
            tx_id: tx_id.clone(),
            sender: PRUNE_SENDER.to_string(),
            recipient: account_id.clone(),
            amount: net,
        },
    )?;

    tracing::info!(
        account_id = %account_id,
        tx_id = %tx_id,
        pruned = verified.len(),
        skipped,
        net,
        "Compacted account deltas"
    );

    Ok(PruneSummary {
        tx_id: Some(tx_id),
        pruned: verified.len(),
        skipped,
        net,
    })
}
