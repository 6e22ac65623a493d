//! # SnapShelf Common Library
//!
//! Shared code for the SnapShelf services:
//! - Error type and result alias
//! - Configuration loading (TOML + folder resolution)
//! - Event types and the broadcast EventBus
//! - Server-Sent Events helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
