//! Database queries

pub mod driver;
pub mod pricing;
pub mod ride;
pub mod rider;
