//! Configuration types for database adapters.
//!
//! # Security
//! Passwords are zeroized on drop and never appear in `Debug`/`Display`.

mod connection;

pub use connection::{DatabaseConfig, EXTERNAL_BROWSER_AUTHENTICATOR, non_blank};
