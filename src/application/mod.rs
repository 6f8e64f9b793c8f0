// Application layer - use cases and orchestration.
// Every balance mutation goes through LedgerService, which owns the
// transaction boundary for deposits and transfers.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
