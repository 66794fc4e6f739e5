//! In-memory shape of summary and data page items

use crate::schema::{
    page_key, summary_key, ATTR_CURRENT_PAGE, ATTR_DATA_LIST, ATTR_METADATA, ATTR_SCHEMA_VERSION,
    ATTR_SUBMITTED_AT, SCHEMA_VERSION,
};
use crate::store::Item;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current epoch time in milliseconds.
fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The single metadata item of a list
///
/// Holds the `currentPage` counter naming the tail page. The counter is
/// advanced only by the conditional increment primitive and never decreases
/// over the lifetime of the list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListSummary {
    /// Item key, `<list_id>_summary`
    pub id: String,

    /// Index of the page new items should be appended to (the "tail")
    #[serde(rename = "currentPage")]
    pub current_page: u64,

    /// Opaque caller-supplied blob, set at creation and never rewritten
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    /// Creation timestamp (Unix epoch milliseconds)
    #[serde(rename = "submittedAt")]
    pub submitted_at: u64,

    /// Schema version
    pub v: u64,
}

impl ListSummary {
    /// Fresh summary for a new list: counter at 0, caller metadata attached
    pub fn new(list_id: &str, metadata: Option<Value>) -> Self {
        Self {
            id: summary_key(list_id),
            current_page: 0,
            metadata,
            submitted_at: now_epoch_ms(),
            v: SCHEMA_VERSION,
        }
    }

    /// Encode to a KV item
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(crate::schema::ATTR_ID.to_string(), Value::from(self.id.clone()));
        item.insert(ATTR_SCHEMA_VERSION.to_string(), Value::from(self.v));
        item.insert(ATTR_CURRENT_PAGE.to_string(), Value::from(self.current_page));
        if let Some(ref metadata) = self.metadata {
            item.insert(ATTR_METADATA.to_string(), metadata.clone());
        }
        item.insert(ATTR_SUBMITTED_AT.to_string(), Value::from(self.submitted_at));
        item
    }

    /// Decode from a KV item, defaulting absent fields
    pub fn from_item(key: &str, item: &Item) -> Self {
        Self {
            id: key.to_string(),
            current_page: item
                .get(ATTR_CURRENT_PAGE)
                .and_then(Value::as_u64)
                .unwrap_or(0),
            metadata: item.get(ATTR_METADATA).cloned(),
            submitted_at: item
                .get(ATTR_SUBMITTED_AT)
                .and_then(Value::as_u64)
                .unwrap_or(0),
            v: item
                .get(ATTR_SCHEMA_VERSION)
                .and_then(Value::as_u64)
                .unwrap_or(SCHEMA_VERSION),
        }
    }
}

/// One numbered data page of a list
///
/// `data_list` preserves insertion order within the page; the store's atomic
/// list-append serializes concurrent writers. The page named by the summary
/// counter may transiently exceed the configured capacity, and a page index
/// at or below the counter may have no item at all (a "blank page") when an
/// appender bumped the counter but lost the race to materialize the page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    /// Item key, `<list_id>_<page_no>`
    pub id: String,

    /// Ordered opaque values
    pub data_list: Vec<Value>,

    /// Creation timestamp (Unix epoch milliseconds)
    #[serde(rename = "submittedAt")]
    pub submitted_at: u64,

    /// Schema version
    pub v: u64,
}

impl ListPage {
    /// Fresh empty page
    pub fn new(list_id: &str, page_no: u64) -> Self {
        Self {
            id: page_key(list_id, page_no),
            data_list: Vec::new(),
            submitted_at: now_epoch_ms(),
            v: SCHEMA_VERSION,
        }
    }

    /// Encode to a KV item
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(crate::schema::ATTR_ID.to_string(), Value::from(self.id.clone()));
        item.insert(ATTR_SCHEMA_VERSION.to_string(), Value::from(self.v));
        item.insert(ATTR_DATA_LIST.to_string(), Value::from(self.data_list.clone()));
        item.insert(ATTR_SUBMITTED_AT.to_string(), Value::from(self.submitted_at));
        item
    }

    /// Decode from a KV item, defaulting absent fields
    pub fn from_item(key: &str, item: &Item) -> Self {
        Self {
            id: key.to_string(),
            data_list: item
                .get(ATTR_DATA_LIST)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            submitted_at: item
                .get(ATTR_SUBMITTED_AT)
                .and_then(Value::as_u64)
                .unwrap_or(0),
            v: item
                .get(ATTR_SCHEMA_VERSION)
                .and_then(Value::as_u64)
                .unwrap_or(SCHEMA_VERSION),
        }
    }

    /// Number of values currently on the page
    pub fn len(&self) -> usize {
        self.data_list.len()
    }

    /// Whether the page holds no values
    pub fn is_empty(&self) -> bool {
        self.data_list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_round_trip() {
        let summary = ListSummary::new("orders", Some(json!({"owner": "billing"})));
        assert_eq!(summary.id, "orders_summary");
        assert_eq!(summary.current_page, 0);
        assert_eq!(summary.v, SCHEMA_VERSION);

        let item = summary.to_item();
        let decoded = ListSummary::from_item(&summary.id, &item);
        assert_eq!(decoded, summary);
    }

    #[test]
    fn test_summary_from_sparse_item() {
        // Fields absent from the stored item decode to defaults.
        let decoded = ListSummary::from_item("orders_summary", &Item::new());
        assert_eq!(decoded.current_page, 0);
        assert_eq!(decoded.metadata, None);
        assert_eq!(decoded.submitted_at, 0);
        assert_eq!(decoded.v, SCHEMA_VERSION);
    }

    #[test]
    fn test_page_round_trip() {
        let mut page = ListPage::new("orders", 3);
        assert_eq!(page.id, "orders_3");
        assert!(page.is_empty());

        page.data_list.push(json!({"val": "a"}));
        page.data_list.push(json!({"val": "b"}));

        let decoded = ListPage::from_item(&page.id, &page.to_item());
        assert_eq!(decoded, page);
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn test_now_epoch_ms_is_current() {
        // Must be after 2024-01-01 in milliseconds
        assert!(now_epoch_ms() > 1_704_067_200_000);
    }
}
