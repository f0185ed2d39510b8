//! Ledger-facing surface of the ticketing contract: record types, the closed
//! set of contract calls, the ABI codec, and the traits a ledger backend
//! implements.

pub mod abi;
pub mod calls;
pub mod ledger;
pub mod types;

pub use calls::{ContractCall, CounterKind, WriteKind};
pub use ledger::{Ledger, LedgerError, Receipt, WalletProvider};
pub use types::{Address, Artist, Bytes32, Concert, PromoCode, SecretHash, TxHash, Venue, Wei, keccak256};
