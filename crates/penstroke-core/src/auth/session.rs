use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::executor::{EvictionReason, SessionObserver, TOKEN_COOKIE};
use crate::api::transport::{HttpRequest, Transport};
use crate::routes::Route;
use crate::store::SessionSlots;

use super::guard::Access;
use super::record::SessionRecord;

/// Snapshot of who is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub current: Option<SessionRecord>,
    pub initializing: bool,
}

impl SessionState {
    /// Signed in means a session record is held. Token age plays no part;
    /// a stale token is discovered when the server rejects it.
    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current: None,
            initializing: true,
        }
    }
}

struct LogoutEndpoint {
    transport: Arc<dyn Transport>,
    url: Url,
}

/// In-memory source of truth for the current session, kept in step with the
/// credential store.
///
/// State changes are published on a watch channel; `subscribe()` gives a
/// receiver that sees every login, logout, rotation, and eviction.
pub struct SessionContext {
    slots: Arc<SessionSlots>,
    state: watch::Sender<SessionState>,
    initialized: AtomicBool,
    logout_endpoint: Option<LogoutEndpoint>,
}

impl SessionContext {
    pub fn new(slots: Arc<SessionSlots>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            slots,
            state,
            initialized: AtomicBool::new(false),
            logout_endpoint: None,
        }
    }

    /// Notify `url` on logout, and expire the token cookie in `transport`'s jar
    pub fn with_logout_endpoint(mut self, transport: Arc<dyn Transport>, url: Url) -> Self {
        self.logout_endpoint = Some(LogoutEndpoint { transport, url });
        self
    }

    /// Restore the persisted session. Runs once; later calls do nothing.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        self.slots.purge_legacy_refresh_token();

        let current = match self.slots.load_session() {
            Ok(Some(record)) => {
                debug!(user_id = record.user_id, "Restored saved session");
                Some(record)
            }
            Ok(None) => {
                debug!("No saved session");
                None
            }
            Err(e) => {
                warn!(error = %e, "Discarding corrupted session");
                self.slots.discard_session();
                None
            }
        };

        self.state.send_modify(|state| {
            state.current = current;
            state.initializing = false;
        });
    }

    /// Adopt `record` as the current session, replacing any previous one
    pub fn login(&self, record: SessionRecord) {
        info!(user_id = record.user_id, "Logged in");
        self.slots.save_session(&record);
        self.state.send_modify(|state| state.current = Some(record));
    }

    /// Sign out locally. Never fails and never waits on the network.
    ///
    /// The server is told in a background task. The handle is returned so a
    /// caller about to shut the runtime down can give it a moment to finish;
    /// `None` when there is no endpoint or no runtime to run it on.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        self.state.send_modify(|state| state.current = None);
        self.slots.clear_credentials();
        info!("Logged out");

        let endpoint = self.logout_endpoint.as_ref()?;
        endpoint.transport.set_cookie(
            &endpoint.url,
            &format!("{}=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/", TOKEN_COOKIE),
        );
        Self::notify_remote(endpoint)
    }

    fn notify_remote(endpoint: &LogoutEndpoint) -> Option<JoinHandle<()>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime, skipping remote logout");
            return None;
        };

        let transport = endpoint.transport.clone();
        let request = HttpRequest {
            method: Method::POST,
            url: endpoint.url.clone(),
            headers: HeaderMap::new(),
            body: None,
        };
        Some(handle.spawn(async move {
            match transport.send(request).await {
                Ok(response) => debug!(status = %response.status, "Remote logout sent"),
                Err(e) => debug!(error = %e, "Remote logout failed"),
            }
        }))
    }

    /// Replace only the access token. No-op when signed out.
    pub fn update_token(&self, token: &str) {
        let mut updated = None;
        self.state.send_if_modified(|state| match state.current.as_mut() {
            Some(record) => {
                record.access_token = token.to_string();
                updated = Some(record.clone());
                true
            }
            None => false,
        });

        match updated {
            Some(record) => self.slots.save_token(&record),
            None => debug!("No session, ignoring token update"),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Option<SessionRecord> {
        self.state.borrow().current.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_initializing(&self) -> bool {
        self.state.borrow().initializing
    }

    /// Wait for `initialize()` to finish, then return the resolved state
    pub async fn wait_until_initialized(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let resolved = rx.wait_for(|state| !state.initializing).await.map(|s| s.clone());
        // The sender lives in self, so the channel cannot close here
        resolved.unwrap_or_else(|_| self.snapshot())
    }

    /// Evaluate `route`'s guard against the current state
    pub fn access(&self, route: Route) -> Access {
        match route.guard() {
            Some(guard) => guard.check(&self.state.borrow()),
            None => Access::Render,
        }
    }
}

impl SessionObserver for SessionContext {
    fn token_rotated(&self, token: &str) {
        // Store already holds the token; only memory needs to follow
        self.state.send_if_modified(|state| match state.current.as_mut() {
            Some(record) if record.access_token != token => {
                record.access_token = token.to_string();
                true
            }
            _ => false,
        });
    }

    fn session_evicted(&self, reason: EvictionReason) {
        let had_session = self.state.send_if_modified(|state| state.current.take().is_some());
        if had_session {
            info!(reason = ?reason, "Session evicted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{keys, CredentialStore, MemoryStore};
    use crate::testing::{base_url, record, FakeTransport};
    use crate::error::TransportError;
    use serde_json::json;

    fn context() -> (Arc<MemoryStore>, SessionContext) {
        let store = Arc::new(MemoryStore::new());
        let slots = Arc::new(SessionSlots::new(store.clone()));
        (store, SessionContext::new(slots))
    }

    fn context_with_logout() -> (Arc<MemoryStore>, Arc<FakeTransport>, SessionContext) {
        let (store, ctx) = context();
        let transport = FakeTransport::new();
        let ctx = ctx.with_logout_endpoint(transport.clone(), base_url().join("/auth/logout").unwrap());
        (store, transport, ctx)
    }

    fn assert_no_credentials(store: &MemoryStore) {
        for key in keys::CREDENTIALS {
            assert_eq!(store.get(key), None, "{} should be cleared", key);
        }
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_starts_initializing() {
        let (_, ctx) = context();
        assert!(ctx.is_initializing());
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn test_initialize_restores_saved_session() {
        let (store, ctx) = context();
        let saved = record(7, "t1");
        SessionSlots::new(store.clone()).save_session(&saved);

        ctx.initialize();
        assert!(!ctx.is_initializing());
        assert_eq!(ctx.current(), Some(saved));
    }

    #[test]
    fn test_initialize_without_session() {
        let (_, ctx) = context();
        ctx.initialize();
        assert!(!ctx.is_initializing());
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn test_initialize_discards_corrupted_session() {
        let (store, ctx) = context();
        store.set(keys::SESSION, "{\"userId\": ");
        store.set(keys::ACCESS_TOKEN, "t1");
        store.set(keys::USER_ID, "7");

        ctx.initialize();
        assert!(!ctx.is_initializing());
        assert!(!ctx.is_authenticated());
        assert_no_credentials(&store);
    }

    #[test]
    fn test_initialize_purges_legacy_refresh_token() {
        let (store, ctx) = context();
        store.set(keys::LEGACY_REFRESH_TOKEN, "r1");
        ctx.initialize();
        assert_eq!(store.get(keys::LEGACY_REFRESH_TOKEN), None);
    }

    #[test]
    fn test_initialize_runs_once() {
        let (store, ctx) = context();
        ctx.initialize();

        SessionSlots::new(store.clone()).save_session(&record(1, "t1"));
        ctx.initialize();
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn test_reload_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let first = SessionContext::new(Arc::new(SessionSlots::new(store.clone())));
        first.initialize();
        first.login(record(7, "t1"));

        // Fresh context over the same store stands in for a page reload
        let second = SessionContext::new(Arc::new(SessionSlots::new(store)));
        second.initialize();
        assert_eq!(second.current(), Some(record(7, "t1")));
    }

    #[test]
    fn test_login_replaces_previous_session() {
        let (store, ctx) = context();
        ctx.initialize();
        ctx.login(record(1, "a-token"));
        ctx.login(record(2, "b-token"));

        assert_eq!(ctx.current(), Some(record(2, "b-token")));
        let slots = SessionSlots::new(store.clone());
        assert_eq!(slots.load_session().unwrap(), Some(record(2, "b-token")));
        assert_eq!(store.get(keys::ACCESS_TOKEN).as_deref(), Some("b-token"));
        assert_eq!(store.get(keys::USER_ID).as_deref(), Some("2"));
    }

    #[test]
    fn test_logout_without_runtime_still_clears() {
        let (store, transport, ctx) = context_with_logout();
        ctx.initialize();
        ctx.login(record(1, "t1"));
        store.set(keys::LEGACY_REFRESH_TOKEN, "r1");

        assert!(ctx.logout().is_none());
        assert!(!ctx.is_authenticated());
        assert_no_credentials(&store);
        assert!(transport.requests().is_empty());
        assert_eq!(
            transport.cookies(),
            vec!["token=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/"]
        );
    }

    #[tokio::test]
    async fn test_logout_notifies_server() {
        let (store, transport, ctx) = context_with_logout();
        transport.push_json(200, json!({"success": true}));
        ctx.initialize();
        ctx.login(record(1, "t1"));

        ctx.logout();
        assert_no_credentials(&store);

        settle().await;
        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].url.path(), "/auth/logout");
    }

    #[test]
    fn test_logout_delivered_before_runtime_shutdown() {
        let (store, transport, ctx) = context_with_logout();
        transport.push_json(200, json!({"success": true}));
        ctx.initialize();
        ctx.login(record(1, "t1"));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let task = ctx.logout().expect("logout task should be spawned");
            tokio::time::timeout(std::time::Duration::from_secs(2), task)
                .await
                .unwrap()
                .unwrap();
        });
        drop(runtime);

        assert_no_credentials(&store);
        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url.path(), "/auth/logout");
    }

    #[tokio::test]
    async fn test_logout_succeeds_when_server_unreachable() {
        let (store, transport, ctx) = context_with_logout();
        transport.push_error(TransportError::Connect("connection refused".to_string()));
        ctx.initialize();
        ctx.login(record(1, "t1"));

        ctx.logout();
        settle().await;
        assert!(!ctx.is_authenticated());
        assert_no_credentials(&store);
    }

    #[test]
    fn test_update_token_only_changes_token() {
        let (store, ctx) = context();
        ctx.initialize();
        ctx.login(record(4, "t1"));

        ctx.update_token("t2");
        assert_eq!(ctx.current(), Some(record(4, "t2")));
        assert_eq!(store.get(keys::ACCESS_TOKEN).as_deref(), Some("t2"));
        assert_eq!(store.get(keys::USER_ID).as_deref(), Some("4"));
        let slots = SessionSlots::new(store);
        assert_eq!(slots.load_session().unwrap(), Some(record(4, "t2")));
    }

    #[test]
    fn test_update_token_without_session_is_noop() {
        let (store, ctx) = context();
        ctx.initialize();
        ctx.update_token("t2");
        assert!(!ctx.is_authenticated());
        assert!(store.is_empty());
    }

    #[test]
    fn test_observer_follows_executor() {
        let (_, ctx) = context();
        ctx.initialize();
        ctx.login(record(4, "t1"));

        ctx.token_rotated("t2");
        assert_eq!(ctx.current().unwrap().access_token, "t2");

        ctx.session_evicted(EvictionReason::Unauthorized);
        assert!(!ctx.is_authenticated());
        // Second eviction is harmless
        ctx.session_evicted(EvictionReason::RefreshExpired);
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn test_subscribers_see_changes() {
        let (_, ctx) = context();
        let mut rx = ctx.subscribe();
        ctx.initialize();
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().initializing);

        ctx.login(record(1, "t1"));
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn test_wait_until_initialized() {
        let (_, ctx) = context();
        let ctx = Arc::new(ctx);
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.wait_until_initialized().await })
        };
        settle().await;
        ctx.initialize();
        let state = waiter.await.unwrap();
        assert!(!state.initializing);
    }

    #[test]
    fn test_access_reflects_state() {
        let (_, ctx) = context();
        assert_eq!(ctx.access(Route::Notes), Access::Waiting);
        ctx.initialize();
        assert_eq!(ctx.access(Route::Notes), Access::Redirect(Route::Login));
        ctx.login(record(1, "t1"));
        assert_eq!(ctx.access(Route::Notes), Access::Render);
        assert_eq!(ctx.access(Route::Login), Access::Redirect(Route::Notes));
        assert_eq!(ctx.access(Route::NotFound), Access::Render);
    }
}
