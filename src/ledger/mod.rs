//! Ledger module containing branch balances, title settlement and the engine facade

pub mod core;
pub mod settlement;
pub mod wallet;

pub use core::*;
pub use settlement::*;
pub use wallet::*;
