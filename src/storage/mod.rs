//! Storage layer for Flow Guardian

pub mod models;
pub mod search;
pub mod store;

pub use models::*;
pub use store::{atomic_write, default_config, safe_read, Store, StoreError};
