use crate::types::{Bytes32, SecretHash, Wei};
use serde::Serialize;
use std::fmt;

/// The write operations the ticketing contract exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    CreateArtist {
        name: Bytes32,
        royalty_rate: u64,
    },
    CreateVenue {
        name: Bytes32,
        capacity: u64,
        commission_percent: u8,
    },
    CreateConcert {
        artist_id: u64,
        venue_id: u64,
        timestamp: u64,
        ticket_price: Wei,
    },
    ValidateConcertArtist {
        concert_id: u64,
    },
    ValidateConcertVenue {
        concert_id: u64,
    },
    /// Payable: `value` must equal the concert's ticket price.
    BuyTicket {
        concert_id: u64,
        value: Wei,
    },
    CreateRedeemableTicket {
        concert_id: u64,
        secret_hash: SecretHash,
    },
    RedeemTicket {
        plaintext: String,
    },
}

impl ContractCall {
    pub fn kind(&self) -> WriteKind {
        match self {
            ContractCall::CreateArtist { .. } => WriteKind::CreateArtist,
            ContractCall::CreateVenue { .. } => WriteKind::CreateVenue,
            ContractCall::CreateConcert { .. } => WriteKind::CreateConcert,
            ContractCall::ValidateConcertArtist { .. } => WriteKind::ValidateConcertArtist,
            ContractCall::ValidateConcertVenue { .. } => WriteKind::ValidateConcertVenue,
            ContractCall::BuyTicket { .. } => WriteKind::BuyTicket,
            ContractCall::CreateRedeemableTicket { .. } => WriteKind::CreateRedeemableTicket,
            ContractCall::RedeemTicket { .. } => WriteKind::RedeemTicket,
        }
    }

    /// Amount attached to the call.
    pub fn value(&self) -> Wei {
        match self {
            ContractCall::BuyTicket { value, .. } => *value,
            _ => Wei(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WriteKind {
    CreateArtist,
    CreateVenue,
    CreateConcert,
    ValidateConcertArtist,
    ValidateConcertVenue,
    BuyTicket,
    CreateRedeemableTicket,
    RedeemTicket,
}

impl WriteKind {
    /// Contract function name.
    pub fn function_name(&self) -> &'static str {
        match self {
            WriteKind::CreateArtist => "createArtist",
            WriteKind::CreateVenue => "createVenue",
            WriteKind::CreateConcert => "createConcert",
            WriteKind::ValidateConcertArtist => "validateConcertArtist",
            WriteKind::ValidateConcertVenue => "validateConcertVenue",
            WriteKind::BuyTicket => "buyTicket",
            WriteKind::CreateRedeemableTicket => "createRedeemableTicket",
            WriteKind::RedeemTicket => "redeemTicket",
        }
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Running id counters. Each holds the id the next created entity will receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CounterKind {
    Artist,
    Venue,
    Concert,
}

impl CounterKind {
    pub fn function_name(&self) -> &'static str {
        match self {
            CounterKind::Artist => "nextArtistId",
            CounterKind::Venue => "nextVenueId",
            CounterKind::Concert => "nextConcertId",
        }
    }
}
