//! Shared domain types and rules for the construction-site warehouse
//!
//! This crate holds every pure business rule of the back office: the
//! permission evaluator, stock ledger arithmetic, the request state machine
//! and the category registry rules. The backend loads rows, calls into these
//! rules, and persists the outcome.

pub mod badges;
pub mod categories;
pub mod error;
pub mod models;
pub mod permissions;
pub mod stock;
pub mod types;
pub mod validation;
pub mod workflow;

pub use error::*;
pub use models::*;
pub use permissions::Role;
pub use types::*;
