//! Storage access for the attendance engine
//!
//! - `people`: identity store
//! - `sessions`: session registry
//! - `attendance`: general ledger, per-type progress and repeat visits
//! - `stats`: daily statistics and per-person reports
//!
//! Functions that take an `Executor` run either on the pool or inside an
//! engine transaction.

pub mod attendance;
pub mod people;
pub mod sessions;
pub mod stats;

pub use shivir_common::db::{init_database, Candidate, Person, Session};
