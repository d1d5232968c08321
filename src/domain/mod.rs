//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod history;
pub mod ledger;
pub mod market_data;
pub mod money;
pub mod portfolio;
pub mod prediction;
pub mod price;
pub mod returns;
pub mod statistic;
pub mod statistics;
pub mod valuation;
