//! One page of the conversations collection, and the seam that produces pages.

use crate::fetch::error::FetchError;
use crate::models::Conversation;
use async_trait::async_trait;
use serde_json::Value;

/// A decoded page: its records and the cursor for the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub conversations: Vec<Conversation>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// Decode a response body shaped as
    /// `{"conversations": [...], "pagination": {"next_cursor": ...}}` or a bare array.
    ///
    /// Non-object entries are skipped. A `null`, empty or missing cursor means
    /// there are no further pages; numeric cursors are carried as strings.
    pub fn from_body(body: Value) -> Self {
        let next_cursor = body
            .get("pagination")
            .and_then(|p| p.get("next_cursor"))
            .and_then(|c| match c {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        let records = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("conversations") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        let conversations = records
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(Conversation::from(map)),
                _ => None,
            })
            .collect();

        Self {
            conversations,
            next_cursor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

/// Something that can hand out pages of conversations, one cursor at a time.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page at `cursor` (`None` for the first page).
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_body() {
        let page = Page::from_body(json!({
            "conversations": [{"id": 1}, {"id": 2}, "junk"],
            "pagination": {"next_cursor": "abc"}
        }));
        assert_eq!(page.conversations.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_bare_array_body() {
        let page = Page::from_body(json!([{"id": 1}]));
        assert_eq!(page.conversations.len(), 1);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_cursor_absent_or_empty() {
        let page = Page::from_body(json!({"conversations": [], "pagination": {"next_cursor": ""}}));
        assert!(page.is_empty());
        assert!(page.next_cursor.is_none());

        let page = Page::from_body(json!({"conversations": [{"id": 1}], "pagination": {"next_cursor": null}}));
        assert!(page.next_cursor.is_none());

        let page = Page::from_body(json!({"conversations": [{"id": 1}], "pagination": {"next_cursor": 42}}));
        assert_eq!(page.next_cursor.as_deref(), Some("42"));
    }

    #[test]
    fn test_unexpected_shapes() {
        assert!(Page::from_body(json!({"data": [{"id": 1}]})).is_empty());
        assert!(Page::from_body(json!("nope")).is_empty());
        assert!(Page::from_body(json!({"conversations": {"id": 1}})).is_empty());
    }
}
