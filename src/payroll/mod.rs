//! Employee cost aggregation and monthly payroll generation

pub mod cost;
pub mod generator;

pub use cost::*;
pub use generator::*;
