//! # Shivir Common Library
//!
//! Shared code for the shivir attendance workspace:
//! - Database initialization and schema
//! - Data model (people, sessions, ledgers, curriculum)
//! - Outcome vocabulary and EventBus notifier
//! - Configuration loading
//! - Calendar/time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod model;
pub mod outcome;
pub mod time;

pub use error::{Error, Result};
pub use model::{Embedding, SessionType};
pub use outcome::Outcome;
