//! Shared helpers for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use reqwest::{StatusCode, Url};
use serde_json::Value;

use crate::api::transport::{HttpRequest, HttpResponse, Transport};
use crate::auth::SessionRecord;
use crate::error::TransportError;

/// Transport that replays scripted responses and records what was sent.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    cookies: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every response is held back for `delay` before being returned
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    pub fn push_json(&self, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).unwrap();
        self.push(HttpResponse::json(status, &body));
    }

    pub fn push_error(&self, err: TransportError) {
        self.responses.lock().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests.lock().last().cloned().expect("no request was sent")
    }

    pub fn cookies(&self) -> Vec<String> {
        self.cookies.lock().clone()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        self.requests.lock().push(request);
        let next = self.responses.lock().pop_front();
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            next.unwrap_or_else(|| Err(TransportError::Other("no scripted response".to_string())))
        }
        .boxed()
    }

    fn set_cookie(&self, _url: &Url, cookie: &str) {
        self.cookies.lock().push(cookie.to_string());
    }
}

/// Bearer token carried by a recorded request
pub fn bearer(request: &HttpRequest) -> Option<String> {
    request
        .headers
        .get(reqwest::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

pub fn base_url() -> Url {
    Url::parse("http://notes.test").unwrap()
}

pub fn record(user_id: i64, token: &str) -> SessionRecord {
    SessionRecord {
        user_id,
        username: format!("user{}", user_id),
        email: format!("user{}@example.com", user_id),
        access_token: token.to_string(),
    }
}
