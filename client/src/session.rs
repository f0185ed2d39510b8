use crate::errors::TicketingError;
use crate::submit_commands::TxTracker;
use ledger_api::{Address, Ledger, LedgerError, WalletProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// The account that signs every write of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    address: Address,
}

impl Identity {
    pub fn address(&self) -> Address {
        self.address
    }
}

/// A bound identity together with the ledger handle that signs for it.
///
/// A `Session` only exists in the connected state: `connect` either returns
/// a complete one or fails, and `disconnect` consumes it. Every component
/// takes it by reference.
pub struct Session {
    identity: Identity,
    ledger: Arc<dyn Ledger>,
    tracker: TxTracker,
}

impl Session {
    /// Requests a signing capability from the ambient wallet provider.
    pub async fn connect(
        provider: Option<&dyn WalletProvider>,
        explorer_url: Option<String>,
    ) -> Result<Session, TicketingError> {
        let Some(provider) = provider else {
            warn!("No wallet provider configured");
            return Err(TicketingError::NoProvider { detail: None });
        };

        let accounts = provider.request_accounts().await.map_err(|e| match e {
            LedgerError::UserRejected => TicketingError::UserRejected,
            other => TicketingError::NoProvider {
                detail: Some(other.to_string()),
            },
        })?;

        // An empty grant means the user did not expose any account.
        let Some(address) = accounts.first().copied() else {
            warn!("Wallet provider returned no accounts");
            return Err(TicketingError::UserRejected);
        };

        info!("Wallet connected: {}", address.short());
        Ok(Session {
            identity: Identity { address },
            ledger: provider.ledger(),
            tracker: TxTracker::new(explorer_url),
        })
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn tracker(&self) -> &TxTracker {
        &self.tracker
    }

    pub fn disconnect(self) {
        info!("Wallet disconnected: {}", self.identity.address.short());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox::{InMemoryLedger, SandboxWallet};

    #[tokio::test]
    async fn test_connect_without_provider() {
        let err = Session::connect(None, None).await.err();
        assert_eq!(err, Some(TicketingError::NoProvider { detail: None }));
    }

    #[tokio::test]
    async fn test_connect_rejected_by_user() {
        let ledger = Arc::new(InMemoryLedger::new());
        let wallet = SandboxWallet::new(ledger, "alice").refusing_connection();
        let err = Session::connect(Some(&wallet), None).await.err();
        assert_eq!(err, Some(TicketingError::UserRejected));
    }

    #[tokio::test]
    async fn test_connect_binds_first_account() {
        let ledger = Arc::new(InMemoryLedger::new());
        let wallet = SandboxWallet::new(ledger, "alice");
        let session = Session::connect(Some(&wallet), None).await.unwrap();
        assert_eq!(session.identity().address(), Address::from_seed("alice"));
        session.disconnect();
    }
}
