//! Brazilian payroll contribution calculations

pub mod inss;

pub use inss::*;
