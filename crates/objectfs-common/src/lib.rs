//! objectfs Common - Shared types and utilities
//!
//! This crate provides the error taxonomy, striping and location types, and
//! client configuration used across all objectfs crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::ClientOptions;
pub use error::{Error, ErrorType, PosixErrno, Result, ServerError};
pub use types::*;
