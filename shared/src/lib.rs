pub mod error;
pub mod models;
pub mod validation;
pub mod envelope;
pub mod ledger;

pub use error::{Error, ErrorCode, Result};
pub use models::*;
pub use validation::*;
pub use envelope::{Action, Command, ErrorReply, Request, Response};
pub use ledger::{MemoryStore, Store, StoreError, VoteLedger};
