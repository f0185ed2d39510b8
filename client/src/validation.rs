//! Dual attestation of concerts and the purchase gate that depends on it.

use crate::errors::TicketingError;
use crate::registry::get_concert;
use crate::session::Session;
use crate::submit_commands::{submit_and_confirm, submit_write};
use ledger_api::{ContractCall, Receipt};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidatorRole {
    Artist,
    Venue,
}

impl fmt::Display for ValidatorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorRole::Artist => f.write_str("Artist"),
            ValidatorRole::Venue => f.write_str("Venue"),
        }
    }
}

/// Submits the attestation for `role`.
///
/// Ownership is only checked by the ledger, so a wrong identity shows up as
/// `NotAuthorized` after the write was rejected.
pub async fn validate_as(session: &Session, concert_id: u64, role: ValidatorRole) -> Result<Receipt, TicketingError> {
    info!("Validating concert {} as {}", concert_id, role);
    let call = match role {
        ValidatorRole::Artist => ContractCall::ValidateConcertArtist { concert_id },
        ValidatorRole::Venue => ContractCall::ValidateConcertVenue { concert_id },
    };
    let pending = submit_write(session, call).await?;
    let tx = pending.hash();
    match pending.confirmed().await {
        Ok(receipt) => {
            info!("Concert {} validated by {}", concert_id, role);
            Ok(receipt)
        }
        Err(TicketingError::LedgerRejected { reason, .. }) => {
            warn!(
                "Validation of concert {} as {} rejected: {}",
                concert_id,
                role,
                reason.as_deref().unwrap_or("no reason given")
            );
            Err(TicketingError::NotAuthorized { concert_id, role, tx })
        }
        Err(other) => Err(other),
    }
}

/// Buys one ticket at the concert's current price.
///
/// The concert is read fresh right before submitting; if either attestation
/// is missing, nothing is written.
pub async fn buy_ticket(session: &Session, concert_id: u64) -> Result<Receipt, TicketingError> {
    let concert = get_concert(session, concert_id).await?;
    if !concert.validated_by_artist {
        warn!("Concert {} is waiting for Artist validation", concert_id);
        return Err(TicketingError::ValidationPending {
            concert_id,
            missing: ValidatorRole::Artist,
        });
    }
    if !concert.validated_by_venue {
        warn!("Concert {} is waiting for Venue validation", concert_id);
        return Err(TicketingError::ValidationPending {
            concert_id,
            missing: ValidatorRole::Venue,
        });
    }

    let call = ContractCall::BuyTicket {
        concert_id,
        value: concert.ticket_price,
    };
    let receipt = submit_and_confirm(session, call).await?;
    info!("Ticket for concert {} purchased for {}", concert_id, concert.ticket_price);
    Ok(receipt)
}
