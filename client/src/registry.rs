//! Typed create/read operations for artists, venues and concerts.
//!
//! A create call does not return the id it assigned. After confirmation the
//! matching counter is re-read and the id is the value just before it.

use crate::errors::TicketingError;
use crate::session::Session;
use crate::submit_commands::submit_and_confirm;
use crate::utils::{encode_name, parse_concert_date, parse_ether};
use chrono::Utc;
use ledger_api::{Artist, Concert, ContractCall, CounterKind, Receipt, Venue};
use tracing::{debug, info};

/// A confirmed create call and the id the ledger assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub id: u64,
    pub receipt: Receipt,
}

pub async fn create_artist(session: &Session, name: &str, royalty_rate: u64) -> Result<Registered, TicketingError> {
    let call = ContractCall::CreateArtist {
        name: encode_name(name)?,
        royalty_rate,
    };
    let registered = create_and_discover(session, call, CounterKind::Artist).await?;
    info!("Artist profile {:?} created with id {}", name, registered.id);
    Ok(registered)
}

pub async fn create_venue(
    session: &Session,
    name: &str,
    capacity: u64,
    commission_percent: u8,
) -> Result<Registered, TicketingError> {
    let name_word = encode_name(name)?;
    if capacity == 0 {
        return Err(TicketingError::InvalidArgument("capacity must be positive".to_string()));
    }
    if commission_percent > 100 {
        return Err(TicketingError::InvalidArgument(format!(
            "commission {}% is outside 0..=100",
            commission_percent
        )));
    }
    let call = ContractCall::CreateVenue {
        name: name_word,
        capacity,
        commission_percent,
    };
    let registered = create_and_discover(session, call, CounterKind::Venue).await?;
    info!("Venue profile {:?} created with id {}", name, registered.id);
    Ok(registered)
}

/// Schedules a concert from raw form input.
///
/// `date` is validated before `ticket_price`. Whether the artist and venue
/// ids exist is left to the ledger.
pub async fn create_concert(
    session: &Session,
    artist_id: u64,
    venue_id: u64,
    date: &str,
    ticket_price: &str,
) -> Result<Registered, TicketingError> {
    let timestamp = parse_concert_date(date, Utc::now())?;
    let ticket_price = parse_ether(ticket_price)?;
    let call = ContractCall::CreateConcert {
        artist_id,
        venue_id,
        timestamp,
        ticket_price,
    };
    let registered = create_and_discover(session, call, CounterKind::Concert).await?;
    info!(
        "Concert {} created: artist {} at venue {} on {} for {}",
        registered.id, artist_id, venue_id, timestamp, ticket_price
    );
    Ok(registered)
}

async fn create_and_discover(
    session: &Session,
    call: ContractCall,
    counter: CounterKind,
) -> Result<Registered, TicketingError> {
    let receipt = submit_and_confirm(session, call).await?;
    // Only trustworthy now that the write is final.
    let next = next_id(session, counter).await?;
    Ok(Registered {
        id: next.saturating_sub(1),
        receipt,
    })
}

pub async fn next_id(session: &Session, counter: CounterKind) -> Result<u64, TicketingError> {
    let value = session
        .ledger()
        .counter(counter)
        .await
        .map_err(TicketingError::Read)?;
    debug!("{} = {}", counter.function_name(), value);
    Ok(value)
}

pub async fn get_artist(session: &Session, id: u64) -> Result<Artist, TicketingError> {
    session.ledger().artist(id).await.map_err(TicketingError::Read)
}

pub async fn get_venue(session: &Session, id: u64) -> Result<Venue, TicketingError> {
    session.ledger().venue(id).await.map_err(TicketingError::Read)
}

pub async fn get_concert(session: &Session, id: u64) -> Result<Concert, TicketingError> {
    let concert = session.ledger().concert(id).await.map_err(TicketingError::Read)?;
    debug!("Read concert {}: {:?}", id, concert);
    Ok(concert)
}
