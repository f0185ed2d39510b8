//! Contract ABI encoding for the ticketing contract.
//!
//! Every argument the contract takes is a single 32-byte word except the
//! `redeemTicket(string)` plaintext, which is the only dynamic value.

use crate::calls::{ContractCall, CounterKind};
use crate::ledger::LedgerError;
use crate::types::{Address, Artist, Bytes32, Concert, Venue, Wei, keccak256};

const WORD: usize = 32;

/// Selector of the standard `Error(string)` revert payload.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// First four bytes of the Keccak-256 hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn with_selector(signature: &str, words: &[[u8; WORD]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + words.len() * WORD);
    out.extend_from_slice(&selector(signature));
    for word in words {
        out.extend_from_slice(word);
    }
    out
}

/// Calldata for a write call.
pub fn encode_call(call: &ContractCall) -> Vec<u8> {
    match call {
        ContractCall::CreateArtist { name, royalty_rate } => with_selector(
            "createArtist(bytes32,uint256)",
            &[name.0, uint_word(*royalty_rate as u128)],
        ),
        ContractCall::CreateVenue {
            name,
            capacity,
            commission_percent,
        } => with_selector(
            "createVenue(bytes32,uint256,uint256)",
            &[
                name.0,
                uint_word(*capacity as u128),
                uint_word(*commission_percent as u128),
            ],
        ),
        ContractCall::CreateConcert {
            artist_id,
            venue_id,
            timestamp,
            ticket_price,
        } => with_selector(
            "createConcert(uint256,uint256,uint256,uint256)",
            &[
                uint_word(*artist_id as u128),
                uint_word(*venue_id as u128),
                uint_word(*timestamp as u128),
                uint_word(ticket_price.value()),
            ],
        ),
        ContractCall::ValidateConcertArtist { concert_id } => {
            with_selector("validateConcertArtist(uint256)", &[uint_word(*concert_id as u128)])
        }
        ContractCall::ValidateConcertVenue { concert_id } => {
            with_selector("validateConcertVenue(uint256)", &[uint_word(*concert_id as u128)])
        }
        ContractCall::BuyTicket { concert_id, .. } => {
            with_selector("buyTicket(uint256)", &[uint_word(*concert_id as u128)])
        }
        ContractCall::CreateRedeemableTicket {
            concert_id,
            secret_hash,
        } => with_selector(
            "createRedeemableTicket(uint256,bytes32)",
            &[uint_word(*concert_id as u128), secret_hash.0],
        ),
        ContractCall::RedeemTicket { plaintext } => {
            let mut out = with_selector("redeemTicket(string)", &[uint_word(WORD as u128)]);
            out.extend_from_slice(&encode_string_tail(plaintext));
            out
        }
    }
}

/// Length word followed by the zero-padded bytes.
fn encode_string_tail(text: &str) -> Vec<u8> {
    let raw = text.as_bytes();
    let padded = raw.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&uint_word(raw.len() as u128));
    out.extend_from_slice(raw);
    out.resize(WORD + padded, 0);
    out
}

pub fn encode_counter_read(kind: CounterKind) -> Vec<u8> {
    with_selector(&format!("{}()", kind.function_name()), &[])
}

pub fn encode_artist_read(id: u64) -> Vec<u8> {
    with_selector("artists(uint256)", &[uint_word(id as u128)])
}

pub fn encode_venue_read(id: u64) -> Vec<u8> {
    with_selector("venues(uint256)", &[uint_word(id as u128)])
}

pub fn encode_concert_read(id: u64) -> Vec<u8> {
    with_selector("concerts(uint256)", &[uint_word(id as u128)])
}

/// Cursor over the 32-byte words of a return payload.
struct Words<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> Words<'a> {
    fn new(data: &'a [u8], expected: usize) -> Result<Self, LedgerError> {
        if data.len() < expected * WORD {
            return Err(LedgerError::Decode(format!(
                "expected {} words, got {} bytes",
                expected,
                data.len()
            )));
        }
        Ok(Words { data, index: 0 })
    }

    fn next(&mut self) -> &'a [u8] {
        let word = &self.data[self.index * WORD..(self.index + 1) * WORD];
        self.index += 1;
        word
    }

    fn uint(&mut self) -> Result<u128, LedgerError> {
        let word = self.next();
        if word[..16].iter().any(|b| *b != 0) {
            return Err(LedgerError::Decode(format!(
                "uint256 does not fit in 128 bits: 0x{}",
                hex::encode(word)
            )));
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&word[16..]);
        Ok(u128::from_be_bytes(low))
    }

    fn u64(&mut self) -> Result<u64, LedgerError> {
        let value = self.uint()?;
        u64::try_from(value).map_err(|_| LedgerError::Decode(format!("value {} exceeds u64", value)))
    }

    fn bool(&mut self) -> Result<bool, LedgerError> {
        match self.uint()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(LedgerError::Decode(format!("invalid bool word {}", other))),
        }
    }

    fn address(&mut self) -> Result<Address, LedgerError> {
        let word = self.next();
        if word[..12].iter().any(|b| *b != 0) {
            return Err(LedgerError::Decode("address word has dirty high bytes".to_string()));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&word[12..]);
        Ok(Address(out))
    }

    fn bytes32(&mut self) -> Bytes32 {
        let mut out = [0u8; WORD];
        out.copy_from_slice(self.next());
        Bytes32(out)
    }
}

pub fn decode_counter(data: &[u8]) -> Result<u64, LedgerError> {
    Words::new(data, 1)?.u64()
}

/// `artists(id)` returns `(id, name, owner, royaltyRate)`.
pub fn decode_artist(data: &[u8]) -> Result<Artist, LedgerError> {
    let mut words = Words::new(data, 4)?;
    Ok(Artist {
        id: words.u64()?,
        name: words.bytes32(),
        owner: words.address()?,
        royalty_rate: words.u64()?,
    })
}

/// `venues(id)` returns `(id, name, owner, capacity, commissionPercent)`.
pub fn decode_venue(data: &[u8]) -> Result<Venue, LedgerError> {
    let mut words = Words::new(data, 5)?;
    let id = words.u64()?;
    let name = words.bytes32();
    let owner = words.address()?;
    let capacity = words.u64()?;
    let commission = words.u64()?;
    let commission_percent = u8::try_from(commission)
        .map_err(|_| LedgerError::Decode(format!("commission {} out of range", commission)))?;
    Ok(Venue {
        id,
        name,
        owner,
        capacity,
        commission_percent,
    })
}

/// `concerts(id)` returns
/// `(id, artistId, venueId, date, ticketPrice, validatedByArtist, validatedByVenue)`.
pub fn decode_concert(data: &[u8]) -> Result<Concert, LedgerError> {
    let mut words = Words::new(data, 7)?;
    Ok(Concert {
        id: words.u64()?,
        artist_id: words.u64()?,
        venue_id: words.u64()?,
        timestamp: words.u64()?,
        ticket_price: Wei(words.uint()?),
        validated_by_artist: words.bool()?,
        validated_by_venue: words.bool()?,
    })
}

/// Extracts the message of an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    let mut words = Words::new(body, 2).ok()?;
    let offset = usize::try_from(words.uint().ok()?).ok()?;
    let len_word = body.get(offset..offset + WORD)?;
    let len = usize::try_from(Words::new(len_word, 1).ok()?.uint().ok()?).ok()?;
    let start = offset + WORD;
    let raw = body.get(start..start + len)?;
    Some(String::from_utf8_lossy(raw).into_owned())
}

/// Builds an `Error(string)` revert payload. The sandbox uses this to
/// report reasons in the same shape a deployed contract does.
pub fn encode_revert_reason(reason: &str) -> Vec<u8> {
    let mut out = ERROR_STRING_SELECTOR.to_vec();
    out.extend_from_slice(&uint_word(WORD as u128));
    out.extend_from_slice(&encode_string_tail(reason));
    out
}
