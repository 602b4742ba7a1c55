//! services/notifier/src/lib.rs
//!
//! The runnable side of the reminder engine: configuration, the concrete
//! adapters behind the core ports, and the background loops.

pub mod adapters;
pub mod config;
pub mod error;
pub mod worker;
