//! Core domain + application logic for the Dev-Deck backend.
//!
//! The HTTP surface (axum) and the Telegram bot (teloxide) live in adapter
//! crates and only talk to the document store, the domain operations and the
//! notifier defined here.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod notify;
pub mod ops;
pub mod security;
pub mod store;

pub use errors::{Error, Result};
