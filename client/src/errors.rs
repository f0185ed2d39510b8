use crate::validation::ValidatorRole;
use ledger_api::{LedgerError, TxHash, WriteKind};

/// Every failure the ticketing client reports.
///
/// Variants raised after a write reached the ledger carry its hash so the
/// caller can trace it on an explorer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketingError {
    #[error("no wallet provider available{}", detail.as_deref().map(|d| format!(": {}", d)).unwrap_or_default())]
    NoProvider { detail: Option<String> },

    #[error("request rejected by the user")]
    UserRejected,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("not authorized to validate concert {concert_id} as {role} (tx {tx})")]
    NotAuthorized {
        concert_id: u64,
        role: ValidatorRole,
        tx: TxHash,
    },

    #[error("concert {concert_id} is waiting for {missing} validation")]
    ValidationPending {
        concert_id: u64,
        missing: ValidatorRole,
    },

    #[error("invalid or used code{}", tx.map(|t| format!(" (tx {})", t)).unwrap_or_default())]
    InvalidOrUsedCode { tx: Option<TxHash> },

    #[error(
        "ledger rejected {kind}: {}{}",
        reason.as_deref().unwrap_or("no reason given"),
        tx.map(|t| format!(" (tx {})", t)).unwrap_or_default()
    )]
    LedgerRejected {
        kind: WriteKind,
        reason: Option<String>,
        tx: Option<TxHash>,
    },

    /// The write failed without the ledger deciding on it, e.g. the endpoint
    /// went away. It may still have been executed.
    #[error(
        "{kind} failed without a ledger verdict: {detail}{}",
        tx.map(|t| format!(" (tx {})", t)).unwrap_or_default()
    )]
    WriteFailed {
        kind: WriteKind,
        detail: String,
        tx: Option<TxHash>,
    },

    #[error("transaction {tx} is still pending")]
    Unconfirmed { tx: TxHash },

    #[error("ledger read failed: {0}")]
    Read(#[source] LedgerError),
}

impl TicketingError {
    /// Hash of the write this failure belongs to, when one was submitted.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            TicketingError::NotAuthorized { tx, .. } | TicketingError::Unconfirmed { tx } => Some(*tx),
            TicketingError::InvalidOrUsedCode { tx }
            | TicketingError::LedgerRejected { tx, .. }
            | TicketingError::WriteFailed { tx, .. } => *tx,
            _ => None,
        }
    }

    /// Maps a ledger failure that happened while submitting or confirming a write.
    /// Only a revert counts as a ledger rejection.
    pub(crate) fn from_write(kind: WriteKind, tx: Option<TxHash>, err: LedgerError) -> Self {
        match err {
            LedgerError::UserRejected => TicketingError::UserRejected,
            LedgerError::Reverted { reason } => TicketingError::LedgerRejected { kind, reason, tx },
            other => TicketingError::WriteFailed {
                kind,
                detail: other.to_string(),
                tx,
            },
        }
    }
}
