//! # Tempo Common Library
//!
//! Shared code for all tempo execution contexts including:
//! - Speed arithmetic and display formatting
//! - Message contract (request/response/notification types)
//! - In-process message bus
//! - Preference store (per-site speed overrides)
//! - Configuration loading

pub mod api;
pub mod bus;
pub mod config;
pub mod db;
pub mod error;
pub mod speed;

pub use bus::{MessageBus, PageId};
pub use error::{Error, Result};
