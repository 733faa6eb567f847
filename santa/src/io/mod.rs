//! I/O helpers: configuration, persistence and mail transport.

pub mod config;
pub mod inbox;
pub mod mailer;
pub mod paths;
pub mod process;
pub mod state_store;
pub mod templates;
