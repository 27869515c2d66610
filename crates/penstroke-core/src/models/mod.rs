//! Wire types for the remote notes service.
//!
//! - `ApiResponse`: the `{success, message, data}` envelope of auth endpoints
//! - `SignUpRequest`, `LoginRequest`, `LoginResponse`: auth payloads
//! - `Note`: a user's note as returned by the notes endpoints

pub mod auth;
pub mod note;

pub use auth::{ApiResponse, LoginRequest, LoginResponse, SignUpRequest};
pub use note::Note;
