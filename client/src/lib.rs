pub mod config;
pub mod errors;
pub mod promo;
pub mod registry;
pub mod rpc;
pub mod session;
pub mod submit_commands;
pub mod utils;
pub mod validation;

pub use errors::TicketingError;
pub use session::{Identity, Session};
pub use submit_commands::{PendingWrite, Transaction, TxStatus, TxTracker};
pub use validation::ValidatorRole;
