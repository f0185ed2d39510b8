use crate::errors::TicketingError;
use crate::session::Session;
use crate::utils::explorer_link;
use ledger_api::{ContractCall, Receipt, TxHash, WriteKind};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info};

const EVENT_CAPACITY: usize = 64;

/// Lifecycle stage of a write.
///
/// `Submitted -> Pending -> Confirmed | Failed`, or `Submitted -> Failed`
/// when the signing step itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    Submitted,
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }
}

/// Snapshot of one tracked write, published on every status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// Session-local sequence number, stable before a hash exists.
    pub id: u64,
    pub kind: WriteKind,
    pub hash: Option<TxHash>,
    pub status: TxStatus,
    pub error_detail: Option<String>,
    pub explorer_link: Option<String>,
}

/// Fans status changes of every write in a session out to observers.
pub struct TxTracker {
    explorer_url: Option<String>,
    events: broadcast::Sender<Transaction>,
    next_id: AtomicU64,
}

impl TxTracker {
    pub fn new(explorer_url: Option<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        TxTracker {
            explorer_url,
            events,
            next_id: AtomicU64::new(1),
        }
    }

    /// Receives every status change published after this call.
    ///
    /// The channel buffers `EVENT_CAPACITY` snapshots. A receiver that falls
    /// further behind gets `RecvError::Lagged` and the skipped snapshots are
    /// gone; the write itself is unaffected and `PendingWrite` still reports
    /// its outcome.
    pub fn subscribe(&self) -> broadcast::Receiver<Transaction> {
        self.events.subscribe()
    }

    fn link(&self, hash: TxHash) -> Option<String> {
        self.explorer_url.as_deref().map(|base| explorer_link(base, &hash))
    }

    fn begin(&self, kind: WriteKind) -> Transaction {
        let tx = Transaction {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            hash: None,
            status: TxStatus::Submitted,
            error_detail: None,
            explorer_link: None,
        };
        publish(&self.events, &tx);
        tx
    }
}

fn publish(events: &broadcast::Sender<Transaction>, tx: &Transaction) {
    match tx.status {
        TxStatus::Failed => error!(
            "{} #{} failed: {}",
            tx.kind,
            tx.id,
            tx.error_detail.as_deref().unwrap_or("unknown error")
        ),
        _ => info!(
            "{} #{} {:?}{}",
            tx.kind,
            tx.id,
            tx.status,
            tx.hash.map(|h| format!(" ({})", h)).unwrap_or_default()
        ),
    }
    // No subscribers is fine; the snapshot is only an observability aid.
    let _ = events.send(tx.clone());
}

/// Publishes `Failed` for a write whose submission future is dropped before
/// the ledger assigned it a hash.
struct SigningGuard<'a> {
    events: &'a broadcast::Sender<Transaction>,
    tx: Transaction,
    armed: bool,
}

impl SigningGuard<'_> {
    fn settle(mut self) -> Transaction {
        self.armed = false;
        self.tx.clone()
    }
}

impl Drop for SigningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.tx.status = TxStatus::Failed;
            self.tx.error_detail = Some(ABANDONED.to_string());
            publish(self.events, &self.tx);
        }
    }
}

const ABANDONED: &str = "abandoned before pending";

/// A write that reached `Pending`. It runs to `Confirmed` or `Failed` even
/// if this handle is dropped.
pub struct PendingWrite {
    hash: TxHash,
    kind: WriteKind,
    outcome: oneshot::Receiver<Result<Receipt, TicketingError>>,
    settled: Option<Result<Receipt, TicketingError>>,
}

impl PendingWrite {
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    pub fn kind(&self) -> WriteKind {
        self.kind
    }

    /// Waits without bound for finality.
    pub async fn confirmed(self) -> Result<Receipt, TicketingError> {
        if let Some(settled) = self.settled {
            return settled;
        }
        let (hash, kind) = (self.hash, self.kind);
        flatten(kind, hash, self.outcome.await)
    }

    /// Waits at most `patience` for finality. Returns `Unconfirmed` if the
    /// write is still pending; it can be awaited again afterwards.
    pub async fn confirmed_within(&mut self, patience: Duration) -> Result<Receipt, TicketingError> {
        if let Some(settled) = &self.settled {
            return settled.clone();
        }
        match tokio::time::timeout(patience, &mut self.outcome).await {
            Ok(received) => {
                let result = flatten(self.kind, self.hash, received);
                self.settled = Some(result.clone());
                result
            }
            Err(_) => {
                debug!("{} {} still pending after {:?}", self.kind, self.hash, patience);
                Err(TicketingError::Unconfirmed { tx: self.hash })
            }
        }
    }
}

fn flatten(
    kind: WriteKind,
    hash: TxHash,
    received: Result<Result<Receipt, TicketingError>, oneshot::error::RecvError>,
) -> Result<Receipt, TicketingError> {
    received.unwrap_or_else(|_| {
        Err(TicketingError::WriteFailed {
            kind,
            detail: "confirmation task ended before finality".to_string(),
            tx: Some(hash),
        })
    })
}

/// Hands `call` to the session's signing capability and returns once the
/// ledger has assigned a write identifier.
///
/// Dropping the returned future before it resolves abandons the write before
/// it reaches `Pending`. Once `Pending`, finality is awaited on a spawned task.
pub async fn submit_write(session: &Session, call: ContractCall) -> Result<PendingWrite, TicketingError> {
    let tracker = session.tracker();
    let kind = call.kind();
    let guard = SigningGuard {
        events: &tracker.events,
        tx: tracker.begin(kind),
        armed: true,
    };
    debug!("Submitting {:?} from {}", call, session.identity().address());

    let sent = session
        .ledger()
        .send_transaction(session.identity().address(), &call)
        .await;
    let mut tx = guard.settle();
    let hash = match sent {
        Ok(hash) => hash,
        Err(e) => {
            let err = TicketingError::from_write(kind, None, e);
            tx.status = TxStatus::Failed;
            tx.error_detail = Some(err.to_string());
            publish(&tracker.events, &tx);
            return Err(err);
        }
    };

    tx.hash = Some(hash);
    tx.explorer_link = tracker.link(hash);
    tx.status = TxStatus::Pending;
    publish(&tracker.events, &tx);

    let (sender, outcome) = oneshot::channel();
    let ledger = Arc::clone(session.ledger());
    let events = tracker.events.clone();
    tokio::spawn(async move {
        let result = ledger
            .wait_for_receipt(hash)
            .await
            .map_err(|e| TicketingError::from_write(kind, Some(hash), e));
        match &result {
            Ok(receipt) => {
                debug!("{} included in block {}", hash, receipt.block_number);
                tx.status = TxStatus::Confirmed;
            }
            Err(err) => {
                tx.status = TxStatus::Failed;
                tx.error_detail = Some(err.to_string());
            }
        }
        publish(&events, &tx);
        let _ = sender.send(result);
    });

    Ok(PendingWrite {
        hash,
        kind,
        outcome,
        settled: None,
    })
}

/// Submits `call` and waits for finality.
pub async fn submit_and_confirm(session: &Session, call: ContractCall) -> Result<Receipt, TicketingError> {
    submit_write(session, call).await?.confirmed().await
}
