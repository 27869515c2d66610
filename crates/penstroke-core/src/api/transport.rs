//! HTTP transport used by the request executor.
//!
//! The executor only needs "send this request, give me status, headers, and
//! body". `ReqwestTransport` does that over the network with a cookie jar so
//! the server's cookie-based refresh flow keeps working alongside the bearer
//! header.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use tracing::warn;

use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.to_string(),
        }
    }

    /// A response with a JSON content type
    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::new(status, &body.to_string()).with_header(CONTENT_TYPE.as_str(), "application/json")
    }

    /// Add a header. Invalid names or values are dropped with a warning.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(name, "Ignoring invalid response header"),
        }
        self
    }

    /// Header value as text, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Something that can perform one HTTP exchange.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;

    /// Store a client-visible cookie (a `Set-Cookie` style string) for `url`.
    fn set_cookie(&self, url: &Url, cookie: &str);
}

/// Network transport backed by `reqwest`.
/// Clone is cheap - the client and jar are shared.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    jar: Arc<Jar>,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(timeout)
            .cookie_provider(jar.clone())
            .build()?;
        Ok(Self {
            client,
            jar,
            timeout,
        })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        async move {
            let mut builder = self
                .client
                .request(request.method, request.url)
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let to_transport = |e: reqwest::Error| TransportError::from_reqwest(e, self.timeout);
            let response = builder.send().await.map_err(to_transport)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await.map_err(to_transport)?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
        .boxed()
    }

    fn set_cookie(&self, url: &Url, cookie: &str) {
        self.jar.add_cookie_str(cookie, url);
    }
}
