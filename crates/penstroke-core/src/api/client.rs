//! API client for the remote auth and notes service.
//!
//! Auth endpoints return a `{success, message, data}` envelope; note
//! endpoints return bare resources. Every call goes through the
//! [`RequestExecutor`], so token rotation and session expiry are handled the
//! same way no matter which call observes them.

use std::sync::Arc;

use anyhow::Context;
use reqwest::Url;
use tracing::{debug, info};

use crate::auth::SessionContext;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{ApiResponse, LoginRequest, LoginResponse, Note, SignUpRequest};
use crate::store::{CredentialStore, SessionSlots};

use super::executor::{Outcome, Request, RequestExecutor};
use super::navigator::Navigator;
use super::transport::{ReqwestTransport, Transport};

pub type ApiResult<T> = Result<Outcome<T>, ApiError>;

pub struct ApiClient {
    base_url: Url,
    executor: RequestExecutor,
    session: Arc<SessionContext>,
    slots: Arc<SessionSlots>,
}

impl ApiClient {
    /// Client talking to the configured service over the network
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        let transport =
            ReqwestTransport::new(config.request_timeout()).context("Failed to build HTTP client")?;
        let client = Self::with_transport(config.base_url()?, Arc::new(transport), store, navigator);
        Ok(Self {
            executor: client.executor.with_timeout(config.request_timeout()),
            ..client
        })
    }

    /// Client over an arbitrary transport
    pub fn with_transport(
        base_url: Url,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let slots = Arc::new(SessionSlots::new(store));
        let logout_url = Self::join(&base_url, &["auth", "logout"]);
        let session = Arc::new(
            SessionContext::new(slots.clone()).with_logout_endpoint(transport.clone(), logout_url),
        );
        let executor =
            RequestExecutor::new(transport, slots.clone(), navigator).with_observer(session.clone());

        Self {
            base_url,
            executor,
            session,
            slots,
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn join(base: &Url, segments: &[&str]) -> Url {
        let mut url = base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        Self::join(&self.base_url, segments)
    }

    /// User id of the signed-in user
    fn current_user_id(&self) -> Result<String, ApiError> {
        self.session
            .current()
            .map(|s| s.user_id.to_string())
            .ok_or(ApiError::NotSignedIn)
    }

    // ===== Auth =====

    /// Start account creation. On success the payload is kept as the
    /// pending sign-up until the emailed code is verified.
    pub async fn signup(&self, request: &SignUpRequest) -> ApiResult<ApiResponse<String>> {
        let req = Request::post(self.endpoint(&["auth", "signup"]))
            .json(request)?
            .without_session_eviction();
        let outcome: Outcome<ApiResponse<String>> = self.executor.execute_json(req).await?;

        if let Outcome::Completed(ref resp) = outcome {
            if resp.success {
                debug!(email = %request.email, "Sign-up accepted, awaiting verification");
                self.slots.save_pending_signup(request);
            }
        }
        Ok(outcome)
    }

    /// Email of the pending sign-up, if any
    pub fn pending_signup_email(&self) -> Option<String> {
        self.slots.pending_signup().map(|s| s.email)
    }

    /// Confirm the pending sign-up with the emailed code
    pub async fn verify_otp(&self, otp: &str) -> ApiResult<ApiResponse<String>> {
        let signup = self.slots.pending_signup().ok_or(ApiError::NoPendingSignup)?;

        let mut url = self.endpoint(&["auth", "verify-otp"]);
        url.query_pairs_mut()
            .append_pair("email", &signup.email)
            .append_pair("otp", otp);
        let req = Request::post(url).json(&signup)?.without_session_eviction();
        let outcome: Outcome<ApiResponse<String>> = self.executor.execute_json(req).await?;

        if let Outcome::Completed(ref resp) = outcome {
            if resp.success {
                info!(email = %signup.email, "Account verified");
                self.slots.clear_pending_signup();
            }
        }
        Ok(outcome)
    }

    /// Ask the server to email a fresh code for the pending sign-up
    pub async fn resend_otp(&self) -> ApiResult<ApiResponse<String>> {
        let signup = self.slots.pending_signup().ok_or(ApiError::NoPendingSignup)?;
        let req = Request::post(self.endpoint(&["auth", "signup"]))
            .json(&signup)?
            .without_session_eviction();
        self.executor.execute_json(req).await
    }

    /// Sign in. A successful response becomes the current session.
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<ApiResponse<LoginResponse>> {
        let req = Request::post(self.endpoint(&["auth", "login"]))
            .json(request)?
            .without_session_eviction();
        let outcome: Outcome<ApiResponse<LoginResponse>> = self.executor.execute_json(req).await?;

        if let Outcome::Completed(ref resp) = outcome {
            match (resp.success, resp.data.as_ref()) {
                (true, Some(record)) => self.session.login(record.clone()),
                _ => debug!(message = %resp.message, "Login not accepted"),
            }
        }
        Ok(outcome)
    }

    /// Sign out. See [`SessionContext::logout`] for the returned task.
    pub fn logout(&self) -> Option<tokio::task::JoinHandle<()>> {
        self.session.logout()
    }

    // ===== Notes =====

    pub async fn create_note(&self, note: &Note) -> ApiResult<Note> {
        let req = Request::post(self.endpoint(&["api", "notes"])).json(note)?;
        self.executor.execute_json(req).await
    }

    pub async fn notes_for_user(&self, user_id: &str) -> ApiResult<Vec<Note>> {
        let req = Request::get(self.endpoint(&["api", "notes", "user", user_id]));
        self.executor.execute_json(req).await
    }

    pub async fn update_note(&self, id: &str, note: &Note) -> ApiResult<Note> {
        let req = Request::put(self.endpoint(&["api", "notes", id])).json(note)?;
        self.executor.execute_json(req).await
    }

    pub async fn delete_note(&self, id: &str) -> ApiResult<()> {
        let req = Request::delete(self.endpoint(&["api", "notes", id]));
        Ok(self.executor.execute(req).await?.map(|_| ()))
    }

    pub async fn search_notes(&self, user_id: &str, query: &str) -> ApiResult<Vec<Note>> {
        let mut url = self.endpoint(&["api", "notes", "user", user_id, "search"]);
        url.query_pairs_mut().append_pair("q", query);
        self.executor.execute_json(Request::get(url)).await
    }

    /// Notes of the signed-in user
    pub async fn my_notes(&self) -> ApiResult<Vec<Note>> {
        let user_id = self.current_user_id()?;
        self.notes_for_user(&user_id).await
    }

    /// Search the signed-in user's notes
    pub async fn search_my_notes(&self, query: &str) -> ApiResult<Vec<Note>> {
        let user_id = self.current_user_id()?;
        self.search_notes(&user_id, query).await
    }
}
