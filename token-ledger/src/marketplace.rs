//! Data marketplace collaborator
//!
//! Settlement needs exactly one answer from the marketplace contract: was
//! this transaction id consumed for a completed purchase? The transport
//! (channel, contract name) is carried as a [`ContractAddress`] and left to
//! the implementation.

use crate::{
    types::{ConsumptionStatus, TxId},
    Error, Result,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Where the marketplace contract lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractAddress {
    /// Channel the contract is deployed on
    pub channel: String,
    /// Contract name
    pub contract: String,
}

impl ContractAddress {
    /// New address
    pub fn new(channel: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            contract: contract.into(),
        }
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.contract)
    }
}

/// Cross-contract view of the data marketplace
#[async_trait]
pub trait DataMarketplace: Send + Sync {
    /// Whether `tx_id` was consumed for a completed data purchase
    async fn check_tx_consumed(
        &self,
        address: &ContractAddress,
        tx_id: &TxId,
    ) -> Result<ConsumptionStatus>;
}

/// In-process marketplace keyed by contract address
///
/// Unknown addresses fail the call, like invoking a contract that is not
/// deployed on the channel.
#[derive(Debug, Default)]
pub struct InMemoryMarketplace {
    contracts: RwLock<HashMap<ContractAddress, HashSet<TxId>>>,
}

impl InMemoryMarketplace {
    /// Empty marketplace with no deployed contracts
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a contract at `address`
    pub fn deploy(&self, address: ContractAddress) {
        self.contracts.write().entry(address).or_default();
    }

    /// Mark `tx_id` as used for a purchase
    ///
    /// A transaction id can pay for one purchase only.
    pub fn mark_consumed(&self, address: &ContractAddress, tx_id: TxId) -> Result<()> {
        let mut contracts = self.contracts.write();
        let used = contracts.get_mut(address).ok_or_else(|| {
            Error::CollaboratorInvocation(format!("Contract {} is not deployed", address))
        })?;
        if !used.insert(tx_id.clone()) {
            return Err(Error::CollaboratorInvocation(format!(
                "Transaction was already used for a data purchase: {}",
                tx_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DataMarketplace for InMemoryMarketplace {
    async fn check_tx_consumed(
        &self,
        address: &ContractAddress,
        tx_id: &TxId,
    ) -> Result<ConsumptionStatus> {
        let contracts = self.contracts.read();
        let used = contracts.get(address).ok_or_else(|| {
            Error::CollaboratorInvocation(format!("Contract {} is not deployed", address))
        })?;
        let status = if used.contains(tx_id) {
            ConsumptionStatus::Used
        } else {
            ConsumptionStatus::Unused
        };
        tracing::debug!(address = %address, tx_id = %tx_id, status = %status, "Marketplace consumption check");
        Ok(status)
    }
}
