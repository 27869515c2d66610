use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A note owned by one user.
///
/// The server assigns `id` and the timestamps; a note being created carries
/// only title, content, owner, and optional category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

impl Note {
    /// A new, unsaved note for `user_id`
    pub fn draft(user_id: i64, title: &str, content: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            content: content.to_string(),
            user_id: user_id.to_string(),
            created_at: None,
            updated_at: None,
            category: None,
            is_archived: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    /// Most recent timestamp for display, falling back to creation time
    pub fn last_modified(&self) -> Option<NaiveDateTime> {
        self.updated_at.or(self.created_at)
    }

    pub fn is_archived(&self) -> bool {
        self.is_archived.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_note() {
        let json = r#"{
            "id": "65f0c1",
            "title": "Groceries",
            "content": "milk, eggs",
            "userId": "7",
            "createdAt": "2024-03-01T09:15:00",
            "updatedAt": "2024-03-02T18:40:12.345",
            "category": "home",
            "isArchived": false
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.id.as_deref(), Some("65f0c1"));
        assert_eq!(note.user_id, "7");
        assert_eq!(note.category.as_deref(), Some("home"));
        assert!(!note.is_archived());
        assert_eq!(note.last_modified(), note.updated_at);
    }

    #[test]
    fn test_draft_serializes_without_server_fields() {
        let note = Note::draft(7, "Title", "Body").with_category("work");
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["userId"], "7");
        assert_eq!(value["category"], "work");
        assert!(value.get("id").is_none());
        assert!(value.get("createdAt").is_none());
    }
}
