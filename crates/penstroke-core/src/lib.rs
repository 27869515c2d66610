//! Core library for the penstroke notes client.
//!
//! This crate holds everything below the user interface:
//! - `store`: origin-scoped key/value credential persistence
//! - `api`: the authenticated request executor, transport, and endpoint client
//! - `auth`: the session context and route guards
//! - `models`: wire types for notes and auth envelopes
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{
    ApiClient, EvictionReason, Navigator, Outcome, RecordingNavigator, Redirect, RequestExecutor,
};
pub use auth::{SessionContext, SessionRecord, SessionState};
pub use config::{Config, StorageBackend};
pub use error::{ApiError, SessionError, TransportError};
pub use routes::Route;
pub use store::{CredentialStore, FileStore, KeyringStore, MemoryStore, SessionSlots};
