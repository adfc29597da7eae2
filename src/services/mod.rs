//! Dispatch services

pub mod eligibility;
pub mod fare;
pub mod geo;
pub mod lifecycle;
pub mod matcher;
pub mod pass_history;
pub mod rates;
pub mod scheduler;
pub mod simulation;
pub mod store;
pub mod summary;
