//! # Branch Ledger
//!
//! Financial back-office core for a multi-branch transport company: per-branch
//! cash balances, accounts payable/receivable settlement and monthly payroll
//! generation.
//!
//! ## Features
//!
//! - **Branch wallets**: lazily created balances with audited admin adjustments
//! - **Settlement**: paying or receiving a title writes the ledger entry, the status
//!   change and the balance movement atomically
//! - **Payroll**: idempotent monthly HR payables priced from salary plus benefits
//! - **Employer costs**: progressive INSS, employer INSS, FGTS and working-day benefit pricing
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use branch_ledger::{utils::MemoryStorage, FinanceEngine, TaxCalculator};
//! use bigdecimal::BigDecimal;
//! use std::sync::Arc;
//!
//! let storage = MemoryStorage::new();
//! let engine = FinanceEngine::new(storage.clone(), Arc::new(storage));
//!
//! let tax = TaxCalculator::new();
//! assert_eq!(tax.employee_inss(&BigDecimal::from(5000)), "700.00".parse::<BigDecimal>().unwrap());
//! # let _ = engine;
//! ```

pub mod config;
pub mod ledger;
pub mod payroll;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use ledger::*;
pub use payroll::*;
pub use tax::inss::*;
pub use traits::*;
pub use types::*;
