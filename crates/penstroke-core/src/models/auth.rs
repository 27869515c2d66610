use serde::{Deserialize, Serialize};

use crate::auth::SessionRecord;

/// Envelope returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Sign-up payload. Also kept locally as the pending sign-up until the
/// emailed code is verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login payload; identical to the session record that gets persisted.
pub type LoginResponse = SessionRecord;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_envelope() {
        let json = r#"{
            "success": true,
            "message": "Login successful",
            "data": {"userId": 5, "username": "ada", "email": "ada@example.com", "accessToken": "t1"}
        }"#;
        let resp: ApiResponse<LoginResponse> = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        assert_eq!(resp.data.unwrap().user_id, 5);
    }

    #[test]
    fn test_parse_envelope_with_missing_fields() {
        // Text error pages degrade to {"message": ...}
        let resp: ApiResponse<String> =
            serde_json::from_str(r#"{"message": "Bad Gateway"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.message, "Bad Gateway");
        assert!(resp.data.is_none());
    }
}
