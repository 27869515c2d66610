use std::collections::HashMap;
use std::sync::Arc;

use keyring::Entry;
use parking_lot::Mutex;
use tracing::warn;

use super::CredentialStore;

/// Default keychain service name
pub const SERVICE_NAME: &str = "penstroke";

/// Store backed by the OS keychain.
///
/// Each key becomes one keychain entry under the service name. The service
/// name plays the role of the origin: two stores with different services
/// never see each other's keys.
///
/// Entries are created once per key and reused, so backends that key
/// credentials by entry object rather than by name still round-trip.
pub struct KeyringStore {
    service: String,
    entries: Mutex<HashMap<String, Arc<Entry>>>,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &str) -> Option<Arc<Entry>> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(key) {
            return Some(entry.clone());
        }
        match Entry::new(&self.service, key) {
            Ok(entry) => {
                let entry = Arc::new(entry);
                entries.insert(key.to_string(), entry.clone());
                Some(entry)
            }
            Err(e) => {
                warn!(error = %e, key, "Failed to create keyring entry");
                None
            }
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.entry(key)?.get_password() {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, key, "Failed to read from keychain");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Some(entry) = self.entry(key) {
            if let Err(e) = entry.set_password(value) {
                warn!(error = %e, key, "Failed to store value in keychain");
            }
        }
    }

    fn remove(&self, key: &str) {
        if let Some(entry) = self.entry(key) {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => warn!(error = %e, key, "Failed to delete keychain entry"),
            }
        }
    }
}
