//! Escrow Settlement Protocol
//!
//! A data purchase debits the buyer at once and parks its participant
//! record in the pending namespace. Settlement asks the marketplace whether
//! the transaction id paid for a delivered purchase and, if so, moves the
//! record to the settled namespace and credits the seller.
//!
//! ```text
//!   open ──► Pending ──(marketplace: Used)──► Settled
//!               │
//!               └──(Unused)──► stays Pending
//! ```

use crate::{
    context::TxContext,
    index,
    marketplace::{ContractAddress, DataMarketplace},
    types::{
        AccountId, BalanceDelta, ConsumptionStatus, ParticipantRecord, PendingSummary, TxDetails,
        TxId, TxNamespace, TxStatus,
    },
    Error, Result,
};

/// Look a transaction up, settled namespace first
pub fn tx_details(ctx: &TxContext<'_>, tx_id: &TxId) -> Result<TxDetails> {
    let settled = index::participants(ctx, TxNamespace::Settled, tx_id)?;
    let pending = index::participants(ctx, TxNamespace::Pending, tx_id)?;

    match (settled, pending) {
        (Some(_), Some(_)) => Err(Error::InvariantViolation(format!(
            "Transaction {} is both settled and pending",
            tx_id
        ))),
        (Some(record), None) => Ok(TxDetails {
            record,
            status: TxStatus::Valid,
        }),
        (None, Some(record)) => Ok(TxDetails {
            record,
            status: TxStatus::Pending,
        }),
        (None, None) => Err(Error::TransactionNotFound(tx_id.to_string())),
    }
}

/// Promote a pending purchase once the marketplace confirms it
///
/// The recipient's credit is written under the purchase's own transaction
/// id, next to the settled participant record, so it replays and compacts
/// like an ordinary transfer.
pub async fn settle(
    ctx: &mut TxContext<'_>,
    marketplace: &dyn DataMarketplace,
    address: &ContractAddress,
    tx_id: &TxId,
) -> Result<ParticipantRecord> {
    let record = index::participants(ctx, TxNamespace::Pending, tx_id)?
        .ok_or_else(|| Error::AlreadySettledOrMissing(tx_id.to_string()))?;

    let status = marketplace
        .check_tx_consumed(address, tx_id)
        .await
        .map_err(|e| match e {
            Error::CollaboratorInvocation(_) => e,
            other => Error::CollaboratorInvocation(other.to_string()),
        })?;

    if status == ConsumptionStatus::Unused {
        tracing::warn!(tx_id = %tx_id, address = %address, "Settlement rejected, purchase not consumed");
        return Err(Error::NotYetConsumed(tx_id.to_string()));
    }

    index::delete_participants(ctx, TxNamespace::Pending, &record)?;
    index::put_participants(ctx, TxNamespace::Settled, &record)?;
    index::put_delta(
        ctx,
        &BalanceDelta::credit(record.recipient.clone(), record.amount, record.tx_id.clone()),
    )?;

    tracing::info!(
        tx_id = %tx_id,
        recipient = %record.recipient,
        amount = record.amount,
        "Pending transaction settled"
    );
    Ok(record)
}

/// Escrowed amounts touching an account
pub fn pending_summary(ctx: &TxContext<'_>, account_id: &AccountId) -> Result<PendingSummary> {
    let overflow = || {
        Error::InvariantViolation(format!("Escrow total of {} overflows i64", account_id))
    };

    let mut summary = PendingSummary::default();
    for record in index::pending_for_account(ctx, account_id)? {
        if &record.recipient == account_id {
            summary.incoming = summary.incoming.checked_add(record.amount).ok_or_else(overflow)?;
        }
        if record.sender == account_id.as_str() {
            summary.outgoing = summary.outgoing.checked_add(record.amount).ok_or_else(overflow)?;
        }
    }
    Ok(summary)
}
