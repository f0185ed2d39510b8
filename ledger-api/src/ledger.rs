use crate::calls::{ContractCall, CounterKind};
use crate::types::{Address, Artist, Concert, TxHash, Venue};
use async_trait::async_trait;
use std::sync::Arc;

/// Finality report for a write that the ledger accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("wallet provider unavailable: {0}")]
    Unavailable(String),
    #[error("user rejected the request")]
    UserRejected,
    #[error("execution reverted: {}", reason.as_deref().unwrap_or("no reason given"))]
    Reverted { reason: Option<String> },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode ledger response: {0}")]
    Decode(String),
}

/// Read and write access to the deployed ticketing contract.
///
/// Reads return whatever the ledger currently holds, which may lag behind
/// writes that are still pending. Records for ids that were never created
/// come back zeroed, the way contract storage behaves.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn counter(&self, kind: CounterKind) -> Result<u64, LedgerError>;

    async fn artist(&self, id: u64) -> Result<Artist, LedgerError>;

    async fn venue(&self, id: u64) -> Result<Venue, LedgerError>;

    async fn concert(&self, id: u64) -> Result<Concert, LedgerError>;

    /// Hands `call` to the signing capability of `from`.
    /// Returns as soon as the ledger has assigned a write identifier.
    async fn send_transaction(&self, from: Address, call: &ContractCall) -> Result<TxHash, LedgerError>;

    /// Waits without bound until `tx` is final.
    /// A write that executed but was rejected yields `LedgerError::Reverted`.
    async fn wait_for_receipt(&self, tx: TxHash) -> Result<Receipt, LedgerError>;
}

/// The ambient wallet that grants signing capabilities.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Asks the user to expose their accounts. The first one becomes the session identity.
    async fn request_accounts(&self) -> Result<Vec<Address>, LedgerError>;

    /// Ledger handle that signs through this provider.
    fn ledger(&self) -> Arc<dyn Ledger>;
}
