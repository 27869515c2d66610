//! Credential persistence.
//!
//! This module provides:
//! - `CredentialStore`: the origin-scoped key/value trait every component reads
//!   and writes session state through
//! - `MemoryStore`, `FileStore`, `KeyringStore`: storage backends
//! - `SessionSlots`: the typed view over the fixed set of credential keys
//!
//! Values are strings. Structured records are serialized by the caller.

pub mod file;
pub mod keychain;
pub mod memory;
pub mod slots;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;
pub use slots::{keys, SessionSlots};

/// Key/value persistence scoped to one origin.
///
/// Backends never report errors: absence is a normal result and write
/// failures are logged by the backend. There is no transaction across keys.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    fn remove(&self, key: &str);
}
