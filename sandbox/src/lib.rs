//! In-memory stand-in for the deployed ticketing contract.
//!
//! Writes are queued when sent and executed in submission order when a block
//! is mined. With automine (the default) waiting for a receipt mines the
//! queue first; with manual mining receipts only appear after [`InMemoryLedger::mine`].

use async_trait::async_trait;
use chrono::Utc;
use ledger_api::abi::{decode_revert_reason, encode_revert_reason};
use ledger_api::{
    Address, Artist, Concert, ContractCall, CounterKind, Ledger, LedgerError, PromoCode, Receipt, SecretHash, TxHash,
    Venue, WalletProvider, Wei, keccak256,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info};

/// A ticket issued by `buyTicket` or `redeemTicket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub concert_id: u64,
    pub owner: Address,
    pub paid: Wei,
}

struct QueuedTx {
    hash: TxHash,
    from: Address,
    call: ContractCall,
}

/// Receipt or `Error(string)` revert payload.
type Outcome = Result<Receipt, Vec<u8>>;

struct ContractState {
    next_artist_id: u64,
    next_venue_id: u64,
    next_concert_id: u64,
    artists: HashMap<u64, Artist>,
    venues: HashMap<u64, Venue>,
    concerts: HashMap<u64, Concert>,
    promo_codes: HashMap<SecretHash, PromoCode>,
    tickets: Vec<Ticket>,
    sold: HashMap<u64, u64>,
}

impl ContractState {
    fn new() -> Self {
        ContractState {
            next_artist_id: 1,
            next_venue_id: 1,
            next_concert_id: 1,
            artists: HashMap::new(),
            venues: HashMap::new(),
            concerts: HashMap::new(),
            promo_codes: HashMap::new(),
            tickets: Vec::new(),
            sold: HashMap::new(),
        }
    }

    fn issue_ticket(&mut self, concert_id: u64, owner: Address, paid: Wei) -> Result<(), String> {
        let concert = self.concerts.get(&concert_id).ok_or("Concert does not exist")?;
        let capacity = self.venues.get(&concert.venue_id).map(|v| v.capacity).unwrap_or(0);
        let sold = self.sold.entry(concert_id).or_insert(0);
        if *sold >= capacity {
            return Err("Sold out".to_string());
        }
        *sold += 1;
        self.tickets.push(Ticket {
            concert_id,
            owner,
            paid,
        });
        Ok(())
    }

    /// Runs one call with contract semantics. State is only touched on success.
    fn execute(&mut self, from: Address, call: &ContractCall, now: u64) -> Result<(), String> {
        match call {
            ContractCall::CreateArtist { name, royalty_rate } => {
                let id = self.next_artist_id;
                self.artists.insert(
                    id,
                    Artist {
                        id,
                        name: *name,
                        owner: from,
                        royalty_rate: *royalty_rate,
                    },
                );
                self.next_artist_id += 1;
            }
            ContractCall::CreateVenue {
                name,
                capacity,
                commission_percent,
            } => {
                if *capacity == 0 {
                    return Err("Capacity must be positive".to_string());
                }
                if *commission_percent > 100 {
                    return Err("Invalid commission".to_string());
                }
                let id = self.next_venue_id;
                self.venues.insert(
                    id,
                    Venue {
                        id,
                        name: *name,
                        owner: from,
                        capacity: *capacity,
                        commission_percent: *commission_percent,
                    },
                );
                self.next_venue_id += 1;
            }
            ContractCall::CreateConcert {
                artist_id,
                venue_id,
                timestamp,
                ticket_price,
            } => {
                if !self.artists.contains_key(artist_id) {
                    return Err("Artist does not exist".to_string());
                }
                if !self.venues.contains_key(venue_id) {
                    return Err("Venue does not exist".to_string());
                }
                if *timestamp <= now {
                    return Err("Date must be in the future".to_string());
                }
                let id = self.next_concert_id;
                self.concerts.insert(
                    id,
                    Concert {
                        id,
                        artist_id: *artist_id,
                        venue_id: *venue_id,
                        timestamp: *timestamp,
                        ticket_price: *ticket_price,
                        validated_by_artist: false,
                        validated_by_venue: false,
                    },
                );
                self.next_concert_id += 1;
            }
            ContractCall::ValidateConcertArtist { concert_id } => {
                let concert = self.concerts.get(concert_id).ok_or("Concert does not exist")?;
                let owner = self.artists.get(&concert.artist_id).map(|a| a.owner);
                if owner != Some(from) {
                    return Err("Not the artist".to_string());
                }
                if concert.validated_by_artist {
                    return Err("Already validated".to_string());
                }
                if let Some(concert) = self.concerts.get_mut(concert_id) {
                    concert.validated_by_artist = true;
                }
            }
            ContractCall::ValidateConcertVenue { concert_id } => {
                let concert = self.concerts.get(concert_id).ok_or("Concert does not exist")?;
                let owner = self.venues.get(&concert.venue_id).map(|v| v.owner);
                if owner != Some(from) {
                    return Err("Not the venue".to_string());
                }
                if concert.validated_by_venue {
                    return Err("Already validated".to_string());
                }
                if let Some(concert) = self.concerts.get_mut(concert_id) {
                    concert.validated_by_venue = true;
                }
            }
            ContractCall::BuyTicket { concert_id, value } => {
                let concert = self.concerts.get(concert_id).ok_or("Concert does not exist")?;
                if !concert.is_purchasable() {
                    return Err("Concert not validated".to_string());
                }
                if *value != concert.ticket_price {
                    return Err("Incorrect price".to_string());
                }
                self.issue_ticket(*concert_id, from, *value)?;
            }
            ContractCall::CreateRedeemableTicket {
                concert_id,
                secret_hash,
            } => {
                if !self.concerts.contains_key(concert_id) {
                    return Err("Concert does not exist".to_string());
                }
                if self.promo_codes.contains_key(secret_hash) {
                    return Err("Code already exists".to_string());
                }
                self.promo_codes.insert(
                    *secret_hash,
                    PromoCode {
                        concert_id: *concert_id,
                        secret_hash: *secret_hash,
                        redeemed: false,
                    },
                );
            }
            ContractCall::RedeemTicket { plaintext } => {
                let hash = SecretHash::of(plaintext);
                let concert_id = match self.promo_codes.get(&hash) {
                    Some(code) if !code.redeemed => code.concert_id,
                    _ => return Err("Invalid or used code".to_string()),
                };
                self.issue_ticket(concert_id, from, Wei(0))?;
                if let Some(code) = self.promo_codes.get_mut(&hash) {
                    code.redeemed = true;
                }
            }
        }
        Ok(())
    }
}

struct Chain {
    contract: ContractState,
    queue: VecDeque<QueuedTx>,
    outcomes: HashMap<TxHash, Outcome>,
    block_number: u64,
    nonce: u64,
}

pub struct InMemoryLedger {
    chain: Mutex<Chain>,
    height: watch::Sender<u64>,
    automine: bool,
    dropped_polls: AtomicU32,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        let (height, _) = watch::channel(0);
        InMemoryLedger {
            chain: Mutex::new(Chain {
                contract: ContractState::new(),
                queue: VecDeque::new(),
                outcomes: HashMap::new(),
                block_number: 0,
                nonce: 0,
            }),
            height,
            automine: true,
            dropped_polls: AtomicU32::new(0),
        }
    }

    /// Receipts only appear after an explicit [`InMemoryLedger::mine`].
    pub fn with_manual_mining(mut self) -> Self {
        self.automine = false;
        self
    }

    /// The next `count` receipt waits fail with a transport error after the
    /// write has been mined, like a node connection dropping mid-poll.
    pub fn drop_receipt_polls(&self, count: u32) {
        self.dropped_polls.store(count, Ordering::SeqCst);
    }

    fn chain(&self) -> MutexGuard<'_, Chain> {
        // A poisoned lock only means a test thread panicked mid-update.
        self.chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Executes every queued write in submission order as one block.
    /// Returns the new block number.
    pub fn mine(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        let mut chain = self.chain();
        chain.block_number += 1;
        let block_number = chain.block_number;
        let mut executed = 0;
        while let Some(tx) = chain.queue.pop_front() {
            let outcome = match chain.contract.execute(tx.from, &tx.call, now) {
                Ok(()) => {
                    debug!("{} {} succeeded", tx.call.kind(), tx.hash);
                    Ok(Receipt {
                        tx_hash: tx.hash,
                        block_number,
                    })
                }
                Err(reason) => {
                    debug!("{} {} reverted: {}", tx.call.kind(), tx.hash, reason);
                    Err(encode_revert_reason(&reason))
                }
            };
            chain.outcomes.insert(tx.hash, outcome);
            executed += 1;
        }
        drop(chain);
        info!("Mined block {} with {} transactions", block_number, executed);
        self.height.send_replace(block_number);
        block_number
    }

    /// Number of writes ever handed to this ledger, including reverted ones.
    pub fn submitted_count(&self) -> u64 {
        self.chain().nonce
    }

    pub fn promo_code(&self, secret_hash: &SecretHash) -> Option<PromoCode> {
        self.chain().contract.promo_codes.get(secret_hash).cloned()
    }

    pub fn tickets_of(&self, owner: Address) -> Vec<Ticket> {
        self.chain()
            .contract
            .tickets
            .iter()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn counter(&self, kind: CounterKind) -> Result<u64, LedgerError> {
        let chain = self.chain();
        Ok(match kind {
            CounterKind::Artist => chain.contract.next_artist_id,
            CounterKind::Venue => chain.contract.next_venue_id,
            CounterKind::Concert => chain.contract.next_concert_id,
        })
    }

    async fn artist(&self, id: u64) -> Result<Artist, LedgerError> {
        let chain = self.chain();
        Ok(chain.contract.artists.get(&id).cloned().unwrap_or(Artist {
            id: 0,
            name: ledger_api::Bytes32([0; 32]),
            owner: Address([0; 20]),
            royalty_rate: 0,
        }))
    }

    async fn venue(&self, id: u64) -> Result<Venue, LedgerError> {
        let chain = self.chain();
        Ok(chain.contract.venues.get(&id).cloned().unwrap_or(Venue {
            id: 0,
            name: ledger_api::Bytes32([0; 32]),
            owner: Address([0; 20]),
            capacity: 0,
            commission_percent: 0,
        }))
    }

    async fn concert(&self, id: u64) -> Result<Concert, LedgerError> {
        let chain = self.chain();
        Ok(chain.contract.concerts.get(&id).cloned().unwrap_or(Concert {
            id: 0,
            artist_id: 0,
            venue_id: 0,
            timestamp: 0,
            ticket_price: Wei(0),
            validated_by_artist: false,
            validated_by_venue: false,
        }))
    }

    async fn send_transaction(&self, from: Address, call: &ContractCall) -> Result<TxHash, LedgerError> {
        let mut chain = self.chain();
        chain.nonce += 1;
        let hash = TxHash(keccak256(format!("sandbox-tx-{}", chain.nonce).as_bytes()));
        chain.queue.push_back(QueuedTx {
            hash,
            from,
            call: call.clone(),
        });
        debug!("Queued {} {} from {}", call.kind(), hash, from);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx: TxHash) -> Result<Receipt, LedgerError> {
        let dropped = self
            .dropped_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if dropped {
            if self.automine {
                self.mine();
            }
            debug!("Dropping receipt poll for {}", tx);
            return Err(LedgerError::Transport("connection reset".to_string()));
        }
        let mut height = self.height.subscribe();
        loop {
            let queued = {
                let chain = self.chain();
                if let Some(outcome) = chain.outcomes.get(&tx) {
                    return outcome.clone().map_err(|payload| LedgerError::Reverted {
                        reason: decode_revert_reason(&payload),
                    });
                }
                chain.queue.iter().any(|q| q.hash == tx)
            };
            if !queued {
                return Err(LedgerError::Transport(format!("unknown transaction {}", tx)));
            }
            if self.automine {
                self.mine();
                continue;
            }
            height
                .changed()
                .await
                .map_err(|_| LedgerError::Transport("sandbox stopped".to_string()))?;
        }
    }
}

/// Wallet holding a single sandbox account.
pub struct SandboxWallet {
    ledger: Arc<InMemoryLedger>,
    account: Address,
    refuse_connection: bool,
    refuse_signatures: bool,
    stall_signatures: bool,
}

impl SandboxWallet {
    /// Account address is derived from `label`, so the same label always
    /// names the same account.
    pub fn new(ledger: Arc<InMemoryLedger>, label: &str) -> Self {
        SandboxWallet {
            ledger,
            account: Address::from_seed(label),
            refuse_connection: false,
            refuse_signatures: false,
            stall_signatures: false,
        }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// The user declines to expose their account.
    pub fn refusing_connection(mut self) -> Self {
        self.refuse_connection = true;
        self
    }

    /// The user declines every signature request.
    pub fn refusing_signatures(mut self) -> Self {
        self.refuse_signatures = true;
        self
    }

    /// Signature requests are never answered.
    pub fn stalling_signatures(mut self) -> Self {
        self.stall_signatures = true;
        self
    }
}

#[async_trait]
impl WalletProvider for SandboxWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, LedgerError> {
        if self.refuse_connection {
            return Err(LedgerError::UserRejected);
        }
        Ok(vec![self.account])
    }

    fn ledger(&self) -> Arc<dyn Ledger> {
        Arc::new(SandboxSigner {
            ledger: Arc::clone(&self.ledger),
            account: self.account,
            refuse_signatures: self.refuse_signatures,
            stall_signatures: self.stall_signatures,
        })
    }
}

/// Ledger handle that signs as the wallet's account.
struct SandboxSigner {
    ledger: Arc<InMemoryLedger>,
    account: Address,
    refuse_signatures: bool,
    stall_signatures: bool,
}

#[async_trait]
impl Ledger for SandboxSigner {
    async fn counter(&self, kind: CounterKind) -> Result<u64, LedgerError> {
        self.ledger.counter(kind).await
    }

    async fn artist(&self, id: u64) -> Result<Artist, LedgerError> {
        self.ledger.artist(id).await
    }

    async fn venue(&self, id: u64) -> Result<Venue, LedgerError> {
        self.ledger.venue(id).await
    }

    async fn concert(&self, id: u64) -> Result<Concert, LedgerError> {
        self.ledger.concert(id).await
    }

    async fn send_transaction(&self, from: Address, call: &ContractCall) -> Result<TxHash, LedgerError> {
        if self.refuse_signatures {
            debug!("Signature for {} declined", call.kind());
            return Err(LedgerError::UserRejected);
        }
        if self.stall_signatures {
            std::future::pending::<()>().await;
        }
        if from != self.account {
            return Err(LedgerError::Unavailable(format!("no key for {}", from)));
        }
        self.ledger.send_transaction(from, call).await
    }

    async fn wait_for_receipt(&self, tx: TxHash) -> Result<Receipt, LedgerError> {
        self.ledger.wait_for_receipt(tx).await
    }
}
