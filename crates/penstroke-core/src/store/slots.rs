use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::auth::SessionRecord;
use crate::error::SessionError;
use crate::models::SignUpRequest;

use super::CredentialStore;

/// Names of the persisted credential slots.
pub mod keys {
    /// Full session record as JSON
    pub const SESSION: &str = "user";
    /// Scalar mirror of the session's access token
    pub const ACCESS_TOKEN: &str = "accessToken";
    /// Scalar mirror of the session's user id
    pub const USER_ID: &str = "userId";
    /// Sign-up payload awaiting email-code verification
    pub const PENDING_SIGNUP: &str = "signupData";
    /// Written by old clients only. Deleted on sight, never written.
    pub const LEGACY_REFRESH_TOKEN: &str = "refreshToken";

    /// Every slot that identifies an authenticated session
    pub const CREDENTIALS: [&str; 4] = [SESSION, ACCESS_TOKEN, USER_ID, LEGACY_REFRESH_TOKEN];
}

/// Typed access to the credential slots of a [`CredentialStore`].
///
/// Multi-key updates take an internal lock so two writers going through the
/// same `SessionSlots` never leave the record and its scalar mirrors
/// disagreeing. Writers that bypass it get no such guarantee.
pub struct SessionSlots {
    store: Arc<dyn CredentialStore>,
    write_lock: Mutex<()>,
}

impl SessionSlots {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    // ===== Session =====

    /// Load the persisted session record.
    ///
    /// Returns `Ok(None)` when nothing is stored and
    /// `Err(CorruptedLocalState)` when the stored value does not parse.
    pub fn load_session(&self) -> Result<Option<SessionRecord>, SessionError> {
        match self.store.get(keys::SESSION) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Persist a session record together with its scalar mirrors
    pub fn save_session(&self, record: &SessionRecord) {
        let _guard = self.write_lock.lock();
        self.write_record(record);
        self.store.set(keys::ACCESS_TOKEN, &record.access_token);
        self.store.set(keys::USER_ID, &record.user_id.to_string());
    }

    /// Persist a record whose only change is its token (record and scalar
    /// token, user id untouched)
    pub fn save_token(&self, record: &SessionRecord) {
        let _guard = self.write_lock.lock();
        self.write_record(record);
        self.store.set(keys::ACCESS_TOKEN, &record.access_token);
    }

    /// Replace the access token in both persisted forms.
    ///
    /// The scalar entry is always written. The embedded field is written only
    /// when a record exists; a record that no longer parses is left alone.
    pub fn rotate_token(&self, token: &str) {
        let _guard = self.write_lock.lock();
        self.store.set(keys::ACCESS_TOKEN, token);

        match self.load_session() {
            Ok(Some(record)) => self.write_record(&record.with_token(token)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not update stored session with new token"),
        }
    }

    fn write_record(&self, record: &SessionRecord) {
        match serde_json::to_string(record) {
            Ok(json) => self.store.set(keys::SESSION, &json),
            Err(e) => warn!(error = %e, "Failed to serialize session record"),
        }
    }

    // ===== Scalar mirrors =====

    pub fn access_token(&self) -> Option<String> {
        self.store.get(keys::ACCESS_TOKEN).filter(|t| !t.is_empty())
    }

    // ===== Eviction =====

    /// Remove every credential slot. Safe to call repeatedly.
    pub fn clear_credentials(&self) {
        let _guard = self.write_lock.lock();
        for key in keys::CREDENTIALS {
            self.store.remove(key);
        }
    }

    /// Drop an unreadable session record. Its scalar mirrors go with it so
    /// no request carries a token for a session nobody holds.
    pub fn discard_session(&self) {
        self.clear_credentials();
    }

    /// Delete a refresh token left behind by an older client.
    /// Returns whether one was found.
    pub fn purge_legacy_refresh_token(&self) -> bool {
        if self.store.get(keys::LEGACY_REFRESH_TOKEN).is_some() {
            self.store.remove(keys::LEGACY_REFRESH_TOKEN);
            debug!("Removed legacy refresh token from storage");
            true
        } else {
            false
        }
    }

    // ===== Pending sign-up =====

    pub fn pending_signup(&self) -> Option<SignUpRequest> {
        let raw = self.store.get(keys::PENDING_SIGNUP)?;
        match serde_json::from_str(&raw) {
            Ok(signup) => Some(signup),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable pending sign-up");
                self.store.remove(keys::PENDING_SIGNUP);
                None
            }
        }
    }

    pub fn save_pending_signup(&self, signup: &SignUpRequest) {
        match serde_json::to_string(signup) {
            Ok(json) => self.store.set(keys::PENDING_SIGNUP, &json),
            Err(e) => warn!(error = %e, "Failed to serialize pending sign-up"),
        }
    }

    pub fn clear_pending_signup(&self) {
        self.store.remove(keys::PENDING_SIGNUP);
    }
}
