mod account;
mod ledger;
mod money;
mod transfer;

pub use account::*;
pub use ledger::*;
pub use money::*;
pub use transfer::*;
