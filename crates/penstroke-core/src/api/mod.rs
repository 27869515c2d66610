//! REST API access for the penstroke notes service.
//!
//! This module provides the `RequestExecutor`, which performs every HTTP
//! exchange with bearer credentials and reacts to the server's token
//! rotation and session expiry headers, and the `ApiClient`, which exposes
//! the auth and note endpoints on top of it.

pub mod client;
pub mod executor;
pub mod navigator;
pub mod transport;

pub use client::{ApiClient, ApiResult};
pub use executor::{EvictionReason, Outcome, Redirect, Request, RequestExecutor, SessionObserver};
pub use navigator::{Navigator, RecordingNavigator};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
