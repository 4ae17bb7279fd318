//! Domain models for the blood bank.

mod blood_type;
mod donation;
mod inventory;
mod ledger;
mod request;

pub use blood_type::*;
pub use donation::*;
pub use inventory::*;
pub use ledger::*;
pub use request::*;
