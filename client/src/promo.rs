//! Promo codes as commit-reveal: the organizer commits the hash of a secret
//! code, an attendee later reveals the plaintext to claim a ticket.

use crate::errors::TicketingError;
use crate::session::Session;
use crate::submit_commands::submit_write;
use ledger_api::{ContractCall, Receipt, SecretHash};
use tracing::{info, warn};

/// `H(UTF8(plaintext))`, computed locally.
pub fn hash_code(plaintext: &str) -> SecretHash {
    SecretHash::of(plaintext)
}

fn require_code(plaintext: &str) -> Result<(), TicketingError> {
    if plaintext.is_empty() {
        return Err(TicketingError::InvalidArgument("promo code is empty".to_string()));
    }
    Ok(())
}

/// Commits the hash of `plaintext` for `concert_id`. Only the hash is sent.
pub async fn register_code(session: &Session, concert_id: u64, plaintext: &str) -> Result<Receipt, TicketingError> {
    require_code(plaintext)?;
    let secret_hash = hash_code(plaintext);
    info!("Registering promo code hash {} for concert {}", secret_hash, concert_id);
    let call = ContractCall::CreateRedeemableTicket {
        concert_id,
        secret_hash,
    };
    let receipt = submit_write(session, call).await?.confirmed().await?;
    info!("Promo code linked to concert {}", concert_id);
    Ok(receipt)
}

/// Reveals `plaintext` to the ledger, which matches it against an unredeemed
/// commitment and issues the ticket in the same write.
///
/// The ledger does not say whether a rejected code was wrong or already used.
pub async fn redeem_code(session: &Session, plaintext: &str) -> Result<Receipt, TicketingError> {
    require_code(plaintext)?;
    let call = ContractCall::RedeemTicket {
        plaintext: plaintext.to_string(),
    };
    let pending = submit_write(session, call).await?;
    let tx = pending.hash();
    match pending.confirmed().await {
        Ok(receipt) => {
            info!("Promo code redeemed");
            Ok(receipt)
        }
        Err(TicketingError::LedgerRejected { .. }) => {
            warn!("Promo code rejected");
            Err(TicketingError::InvalidOrUsedCode { tx: Some(tx) })
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{create_artist, create_concert, create_venue};
    use sandbox::{InMemoryLedger, SandboxWallet};
    use std::sync::Arc;

    #[test]
    fn test_hash_code_is_deterministic() {
        assert_eq!(hash_code("VIP2025"), hash_code("VIP2025"));
        assert_ne!(hash_code("VIP2025"), hash_code("vip2025"));
    }

    #[tokio::test]
    async fn test_empty_code_is_rejected_locally() {
        let ledger = Arc::new(InMemoryLedger::new());
        let wallet = SandboxWallet::new(Arc::clone(&ledger), "organizer");
        let session = Session::connect(Some(&wallet), None).await.unwrap();

        assert!(matches!(
            register_code(&session, 1, "").await,
            Err(TicketingError::InvalidArgument(_))
        ));
        assert!(matches!(
            redeem_code(&session, "").await,
            Err(TicketingError::InvalidArgument(_))
        ));
        assert_eq!(ledger.submitted_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_code_is_invalid_or_used() {
        let ledger = Arc::new(InMemoryLedger::new());
        let wallet = SandboxWallet::new(Arc::clone(&ledger), "fan");
        let session = Session::connect(Some(&wallet), None).await.unwrap();

        match redeem_code(&session, "NOPE").await {
            Err(TicketingError::InvalidOrUsedCode { tx }) => assert!(tx.is_some()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lost_receipt_poll_is_not_reported_as_used_code() {
        let ledger = Arc::new(InMemoryLedger::new());
        let artist_wallet = SandboxWallet::new(Arc::clone(&ledger), "artist");
        let venue_wallet = SandboxWallet::new(Arc::clone(&ledger), "venue");
        let fan_wallet = SandboxWallet::new(Arc::clone(&ledger), "fan");
        let artist = Session::connect(Some(&artist_wallet), None).await.unwrap();
        let venue = Session::connect(Some(&venue_wallet), None).await.unwrap();
        let fan = Session::connect(Some(&fan_wallet), None).await.unwrap();
        let date = (chrono::Utc::now() + chrono::Duration::days(7))
            .format("%Y-%m-%dT%H:%M")
            .to_string();
        let artist_id = create_artist(&artist, "Justice", 1).await.unwrap().id;
        let venue_id = create_venue(&venue, "Zenith", 500, 10).await.unwrap().id;
        let concert_id = create_concert(&venue, artist_id, venue_id, &date, "0.1").await.unwrap().id;
        register_code(&venue, concert_id, "SUMMER").await.unwrap();

        ledger.drop_receipt_polls(1);
        let err = redeem_code(&fan, "SUMMER").await.err();
        assert!(matches!(err, Some(TicketingError::WriteFailed { .. })), "{:?}", err);
        assert!(ledger.promo_code(&hash_code("SUMMER")).unwrap().redeemed);
        assert_eq!(ledger.tickets_of(fan.identity().address()).len(), 1);
    }
}
