//! Text formatting for terminal output.

use chrono::NaiveDateTime;
use penstroke_core::models::Note;

/// Width of the title column in note listings
const TITLE_WIDTH: usize = 32;

/// Width of the content preview in note listings
const PREVIEW_WIDTH: usize = 48;

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a note timestamp for display
pub fn format_timestamp(ts: Option<NaiveDateTime>) -> String {
    match ts {
        Some(ts) => ts.format("%b %d, %Y %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// One line per note: id, title, last change, content preview
pub fn format_note_line(note: &Note) -> String {
    let preview = note.content.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut line = format!(
        "{:<26} {:<width$} {:<18} {}",
        note.id.as_deref().unwrap_or("-"),
        truncate_string(&note.title, TITLE_WIDTH),
        format_timestamp(note.last_modified()),
        truncate_string(&preview, PREVIEW_WIDTH),
        width = TITLE_WIDTH,
    );
    if let Some(ref category) = note.category {
        line.push_str(&format!(" [{}]", category));
    }
    if note.is_archived() {
        line.push_str(" (archived)");
    }
    line.trim_end().to_string()
}
