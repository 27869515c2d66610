//! Authenticated request execution.
//!
//! Every call to the notes service goes through [`RequestExecutor::execute`],
//! which attaches the stored bearer token and reacts to the server's session
//! signals:
//!
//! - `X-New-Access-Token`: the server rotated the token. The new value
//!   replaces the stored one so the next request uses it.
//! - `X-Refresh-Expired: true`: the server-side refresh cookie is dead. All
//!   credentials are cleared and the client is sent to the sign-in page.
//! - a bare `401`: treated the same as an expired refresh.
//!
//! The server alone decides when a token rotates or expires. The client keeps
//! no expiry clock.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ApiError, TransportError};
use crate::routes::Route;
use crate::store::SessionSlots;

use super::navigator::Navigator;
use super::transport::{HttpRequest, HttpResponse, Transport};

/// Response header carrying a rotated access token
pub const NEW_ACCESS_TOKEN_HEADER: &str = "x-new-access-token";

/// Response header asserting that the refresh credential expired
pub const REFRESH_EXPIRED_HEADER: &str = "x-refresh-expired";

/// Client-visible cookie mirroring the access token
pub const TOKEN_COOKIE: &str = "token";

/// Upper bound on a single exchange.
/// 30s allows for slow responses while failing fast enough for good UX.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Body substituted when a JSON response fails to parse
const PARSE_FAILURE_MESSAGE: &str = "Failed to parse response";

/// Why local session state was evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Server asserted the refresh-expired header
    RefreshExpired,
    /// Plain 401 without the expiry header
    Unauthorized,
}

/// A full navigation the executor already performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub reason: EvictionReason,
}

/// Result of an exchange that did not fail.
///
/// `Redirected` is terminal: credentials are gone and the navigator has been
/// sent to the sign-in page. The caller gets no body and should stop.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Redirected(Redirect),
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Redirected(redirect) => Outcome::Redirected(redirect),
        }
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Redirected(_) => None,
        }
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Redirected(redirect) => Some(redirect),
        }
    }

    pub fn is_redirected(&self) -> bool {
        matches!(self, Outcome::Redirected(_))
    }
}

/// Told about session changes the executor makes on its own, so an
/// in-memory session holder can follow the store.
pub trait SessionObserver: Send + Sync {
    fn token_rotated(&self, token: &str);

    fn session_evicted(&self, reason: EvictionReason);
}

/// One outbound request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<String>,
    evict_on_unauthorized: bool,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            evict_on_unauthorized: true,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: Url) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Serialize `body` as the JSON request body
    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_string(body).map_err(ApiError::Encode)?);
        Ok(self)
    }

    /// Raw body, sent as-is
    pub fn body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Do not treat a 401 as a dead session.
    ///
    /// For credential-checking endpoints (login, sign-up) where 401 means
    /// "wrong password" rather than "token no longer valid".
    pub fn without_session_eviction(mut self) -> Self {
        self.evict_on_unauthorized = false;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Performs requests with credential attachment and session maintenance.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    slots: Arc<SessionSlots>,
    navigator: Arc<dyn Navigator>,
    observer: Option<Arc<dyn SessionObserver>>,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        slots: Arc<SessionSlots>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            transport,
            slots,
            navigator,
            observer: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Perform one exchange and return the parsed body.
    ///
    /// Errors are the recoverable conditions only: `NetworkFailure` when no
    /// response arrived (including the timeout) and `RequestFailed` for a
    /// non-success status. Session expiry is `Ok(Outcome::Redirected)`.
    pub async fn execute(&self, request: Request) -> Result<Outcome<Value>, ApiError> {
        let Request {
            method,
            url,
            mut headers,
            body,
            evict_on_unauthorized,
        } = request;

        if let Some(token) = self.slots.access_token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored access token is not a valid header value, sending without it"),
            }
        }
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        debug!(%method, %url, "Sending request");
        let http_request = HttpRequest {
            method,
            url: url.clone(),
            headers,
            body,
        };
        let response = match tokio::time::timeout(self.timeout, self.transport.send(http_request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(%url, timeout_secs = self.timeout.as_secs(), "Request timed out");
                return Err(TransportError::Timeout(self.timeout).into());
            }
        };
        debug!(%url, status = %response.status, "Response received");

        if let Some(token) = response.header(NEW_ACCESS_TOKEN_HEADER).filter(|t| !t.is_empty()) {
            self.rotate(&url, token);
        }

        let refresh_expired = Self::refresh_expired(&response);
        if refresh_expired {
            return Ok(Outcome::Redirected(self.evict(EvictionReason::RefreshExpired)));
        }

        let body = Self::parse_body(&response);

        if response.status == StatusCode::UNAUTHORIZED && evict_on_unauthorized {
            return Ok(Outcome::Redirected(self.evict(EvictionReason::Unauthorized)));
        }

        if !response.status.is_success() {
            return Err(ApiError::from_body(response.status, &body));
        }

        Ok(Outcome::Completed(body))
    }

    /// `execute`, then decode a completed body into `T`
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: Request,
    ) -> Result<Outcome<T>, ApiError> {
        match self.execute(request).await? {
            Outcome::Completed(body) => serde_json::from_value(body)
                .map(Outcome::Completed)
                .map_err(|e| ApiError::InvalidResponse(e.to_string())),
            Outcome::Redirected(redirect) => Ok(Outcome::Redirected(redirect)),
        }
    }

    fn rotate(&self, url: &Url, token: &str) {
        debug!("Server rotated access token");
        self.slots.rotate_token(token);
        self.transport
            .set_cookie(url, &format!("{}={}; Path=/; SameSite=Lax", TOKEN_COOKIE, token));
        if let Some(ref observer) = self.observer {
            observer.token_rotated(token);
        }
    }

    fn refresh_expired(response: &HttpResponse) -> bool {
        response
            .header(REFRESH_EXPIRED_HEADER)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn evict(&self, reason: EvictionReason) -> Redirect {
        match reason {
            EvictionReason::RefreshExpired => {
                warn!(reason = ?reason, "Refresh credential expired, clearing session")
            }
            EvictionReason::Unauthorized => {
                warn!(reason = ?reason, "Token rejected with 401, clearing session")
            }
        }

        self.slots.clear_credentials();
        if let Some(ref observer) = self.observer {
            observer.session_evicted(reason);
        }

        let location = Route::Login.path().to_string();
        self.navigator.assign(&location);
        Redirect { location, reason }
    }

    /// JSON bodies parse as JSON; anything else becomes `{"message": text}`
    /// (`{}` when empty). Never fails.
    fn parse_body(response: &HttpResponse) -> Value {
        let is_json = response
            .header(CONTENT_TYPE.as_str())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);

        if is_json {
            serde_json::from_str(&response.body).unwrap_or_else(|e| {
                warn!(error = %e, status = %response.status, "Failed to parse response");
                json!({ "message": PARSE_FAILURE_MESSAGE })
            })
        } else if response.body.is_empty() {
            json!({})
        } else {
            json!({ "message": response.body })
        }
    }
}
