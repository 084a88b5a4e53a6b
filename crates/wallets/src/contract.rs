//! Bindings of the deployed BlueCarbon registry contract.

use crate::{
    error::{contract_error, pending_error, rpc_error},
    provider::RpcSigner,
};
use alloy_network::{Ethereum, ReceiptResponse};
use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::{DynProvider, PendingTransactionBuilder, Provider};
use alloy_sol_types::sol;
use async_trait::async_trait;
use bluecarbon_session::{
    ContractConnector, ContractProxy, Receipt, SessionError, SignerHandle, TransactionHandle,
};

sol! {
    #[sol(rpc)]
    contract BlueCarbon {
        function owner() external view returns (address);
        function withdraw() external;
        function purchaseCredits(uint256 projectId, uint256 amount) external payable;
    }
}

/// Binds the registry contract to a [`RpcSigner`].
#[derive(Clone, Copy, Debug)]
pub struct AlloyConnector {
    confirmations: u64,
}

impl AlloyConnector {
    /// `confirmations` is the number of blocks a transaction waits for before it is confirmed.
    pub fn new(confirmations: u64) -> Self {
        Self { confirmations: confirmations.max(1) }
    }
}

impl Default for AlloyConnector {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ContractConnector<RpcSigner> for AlloyConnector {
    type Contract = AlloyContract;

    fn connect(&self, address: Address, signer: &RpcSigner) -> AlloyContract {
        let from = signer.address();
        debug!(%address, %from, "binding registry contract");
        AlloyContract {
            instance: BlueCarbon::new(address, signer.provider().clone()),
            from,
            confirmations: self.confirmations,
        }
    }
}

/// The registry contract as seen by one account.
pub struct AlloyContract {
    instance: BlueCarbon::BlueCarbonInstance<DynProvider>,
    from: Address,
    confirmations: u64,
}

impl AlloyContract {
    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    fn pending(&self, pending: PendingTransactionBuilder<Ethereum>) -> AlloyTransaction {
        trace!(tx_hash = %pending.tx_hash(), "transaction submitted");
        AlloyTransaction { pending: pending.with_required_confirmations(self.confirmations) }
    }
}

#[async_trait]
impl ContractProxy for AlloyContract {
    type Transaction = AlloyTransaction;

    async fn balance(&self) -> Result<U256, SessionError> {
        self.instance.provider().get_balance(self.address()).await.map_err(rpc_error)
    }

    async fn owner(&self) -> Result<Address, SessionError> {
        self.instance.owner().call().await.map_err(contract_error)
    }

    async fn withdraw(&self) -> Result<AlloyTransaction, SessionError> {
        let pending =
            self.instance.withdraw().from(self.from).send().await.map_err(contract_error)?;
        Ok(self.pending(pending))
    }

    async fn purchase_credits(
        &self,
        project_id: U256,
        amount: U256,
        value: U256,
    ) -> Result<AlloyTransaction, SessionError> {
        let pending = self
            .instance
            .purchaseCredits(project_id, amount)
            .value(value)
            .from(self.from)
            .send()
            .await
            .map_err(contract_error)?;
        Ok(self.pending(pending))
    }
}

/// A submitted registry transaction.
pub struct AlloyTransaction {
    pending: PendingTransactionBuilder<Ethereum>,
}

#[async_trait]
impl TransactionHandle for AlloyTransaction {
    fn tx_hash(&self) -> TxHash {
        *self.pending.tx_hash()
    }

    async fn wait(self) -> Result<Receipt, SessionError> {
        let receipt = self.pending.get_receipt().await.map_err(pending_error)?;
        let tx_hash = receipt.transaction_hash();
        if !receipt.status() {
            return Err(SessionError::call(format!("transaction {tx_hash} reverted")));
        }
        Ok(Receipt { tx_hash, block_number: receipt.block_number(), gas_used: receipt.gas_used() })
    }
}
