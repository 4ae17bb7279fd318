//! JSON exports for operators and auditors.

mod audit;
mod inventory;

pub use audit::*;
pub use inventory::*;
