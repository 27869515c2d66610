use serde::{Deserialize, Serialize};

/// The authenticated identity on this device plus its current bearer token.
///
/// Same JSON shape as the login response payload, so a successful login can
/// be adopted and persisted without conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub access_token: String,
}

impl SessionRecord {
    /// Copy of this record carrying a different access token
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            access_token: token.to_string(),
            ..self.clone()
        }
    }
}
