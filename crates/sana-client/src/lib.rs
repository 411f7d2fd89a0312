//! sana-client: HTTP client for the symptom classification endpoint
//!
//! This crate owns the wire contract with the backend classifier: request
//! and response types, the POST client, and the error taxonomy that drives
//! retry decisions upstream.

pub mod client;
pub mod error;
pub mod types;

pub use client::SymptomClient;
pub use error::{Error, FailureKind, Result};
pub use types::*;
