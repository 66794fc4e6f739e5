//! The retrieval engine: reverse multi-page walks and the cursor model
//!
//! Retrieval walks pages downward from the tail, newest first: items from a
//! later page precede items from an earlier page, and within one page the
//! item at a higher offset precedes the item at a lower one. Absent pages
//! read as empty, so a walk glides over the blank pages the append races can
//! leave behind.

use crate::client::ListClient;
use crate::error::{ListError, Result};
use scroll_core::schema::{page_key, summary_key, ATTR_DATA_LIST, ATTR_ID};
use scroll_core::{ListPage, ListSummary, MAX_BULK_GET_KEYS};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One retrieved value, decorated with its position
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Id of the list this value belongs to
    #[serde(rename = "resource_id_parent")]
    pub parent_id: String,

    /// Page the value was read from
    pub page_id: u64,

    /// Zero-based offset within the page *at read time*
    ///
    /// A snapshot-local position, not a stable identifier: on a page that
    /// went over capacity under concurrent writers, two reads taken at
    /// different moments can disagree about offsets.
    pub sequence_id: u64,

    /// The stored value
    pub value: Value,
}

/// Position in a list for resuming a backward walk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Page of the last item already delivered
    pub page_id: u64,
    /// In-page offset of the last item already delivered
    pub sequence_id: u64,
}

impl From<&ListEntry> for Cursor {
    fn from(entry: &ListEntry) -> Self {
        Self {
            page_id: entry.page_id,
            sequence_id: entry.sequence_id,
        }
    }
}

impl Cursor {
    /// Parse a cursor from a JSON value
    ///
    /// Rejects a value lacking a numeric `page_id` or `sequence_id` with
    /// [`ListError::InvalidCursor`]; clients resuming from serialized state
    /// go through here.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ListError::invalid_cursor("cursor must be an object"))?;
        let page_id = obj
            .get("page_id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ListError::invalid_cursor("missing page_id"))?;
        let sequence_id = obj
            .get("sequence_id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ListError::invalid_cursor("missing sequence_id"))?;
        Ok(Self {
            page_id,
            sequence_id,
        })
    }
}

impl ListClient {
    /// Index of the tail page of a list
    ///
    /// Fails with [`ListError::ListNotFound`] if the list was never created.
    pub async fn current_page(&self, list_id: &str) -> Result<u64> {
        self.read_current_page(list_id).await
    }

    /// Read the summary item of a list
    pub async fn get_summary(&self, list_id: &str) -> Result<ListSummary> {
        let key = summary_key(list_id);
        let item = self
            .store()
            .get(&key, None)
            .await?
            .ok_or_else(|| ListError::list_not_found(list_id))?;
        Ok(ListSummary::from_item(&key, &item))
    }

    /// Read one data page of a list, raw
    ///
    /// An absent page of an existing list reads as an empty page; an absent
    /// list is [`ListError::ListNotFound`].
    pub async fn get_page(&self, list_id: &str, page_no: u64) -> Result<ListPage> {
        let key = page_key(list_id, page_no);
        match self.store().get(&key, None).await? {
            Some(item) => Ok(ListPage::from_item(&key, &item)),
            None => {
                let summary = summary_key(list_id);
                if self.store().get(&summary, Some(&[ATTR_ID])).await?.is_none() {
                    return Err(ListError::list_not_found(list_id));
                }
                Ok(ListPage::new(list_id, page_no))
            }
        }
    }

    /// Read one data page as decorated entries, in page order
    ///
    /// Fetches only the value list. A missing page yields an empty result,
    /// silently; retrieval never fails over the blank pages a lost
    /// page-creation race leaves behind.
    pub async fn retrieve(&self, list_id: &str, page_no: u64) -> Result<Vec<ListEntry>> {
        let key = page_key(list_id, page_no);
        let values = match self.store().get(&key, Some(&[ATTR_DATA_LIST])).await? {
            Some(item) => item
                .get(ATTR_DATA_LIST)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(values
            .into_iter()
            .enumerate()
            .map(|(offset, value)| ListEntry {
                parent_id: list_id.to_string(),
                page_id: page_no,
                sequence_id: offset as u64,
                value,
            })
            .collect())
    }

    /// The most recent `n` items of a list, newest first
    pub async fn retrieve_last_most_recent(
        &self,
        list_id: &str,
        n: usize,
    ) -> Result<Vec<ListEntry>> {
        let tail = self.read_current_page(list_id).await?;
        self.retrieve_n_elements(list_id, tail, None, n).await
    }

    /// Up to `n` items strictly older than `cursor`, newest first
    ///
    /// A cursor at offset 0 resumes on the previous page; a cursor already at
    /// the head of the list yields an empty result.
    pub async fn retrieve_next_most_recent(
        &self,
        list_id: &str,
        cursor: &Cursor,
        n: usize,
    ) -> Result<Vec<ListEntry>> {
        let (from_page, cut) = if cursor.sequence_id == 0 {
            match cursor.page_id.checked_sub(1) {
                Some(prev) => (prev, None),
                None => return Ok(Vec::new()),
            }
        } else {
            (cursor.page_id, Some(cursor.sequence_id))
        };
        self.retrieve_n_elements(list_id, from_page, cut, n).await
    }

    /// Core backward walk
    ///
    /// Accumulates reversed page contents from `from_page` downward until `n`
    /// items are gathered or the head of the list is passed. `cut`, applied
    /// only to the first page, keeps the prefix of elements strictly older
    /// than a resume cursor. Pages are fetched through the bulk primitive in
    /// descending windows sized to the smallest page count that could satisfy
    /// what remains; keys absent from a batch are blank pages and contribute
    /// nothing.
    async fn retrieve_n_elements(
        &self,
        list_id: &str,
        from_page: u64,
        mut cut: Option<u64>,
        n: usize,
    ) -> Result<Vec<ListEntry>> {
        let mut entries: Vec<ListEntry> = Vec::new();
        if n == 0 {
            return Ok(entries);
        }

        let page_capacity = self.config().max_elements_per_page();
        let mut page = from_page as i64;

        while page >= 0 && entries.len() < n {
            let remaining = n - entries.len();
            let window = remaining
                .div_ceil(page_capacity)
                .clamp(1, MAX_BULK_GET_KEYS)
                .min(page as usize + 1) as i64;
            let low = page - window + 1;

            let keys: Vec<String> = (low..=page)
                .rev()
                .map(|q| page_key(list_id, q as u64))
                .collect();
            let mut found = self
                .store()
                .bulk_get(&keys, Some(&[ATTR_DATA_LIST]))
                .await?;

            for q in (low..=page).rev() {
                if entries.len() >= n {
                    break;
                }
                let key = page_key(list_id, q as u64);
                let mut values = found
                    .remove(&key)
                    .and_then(|mut item| item.remove(ATTR_DATA_LIST))
                    .and_then(|value| match value {
                        Value::Array(values) => Some(values),
                        _ => None,
                    })
                    .unwrap_or_default();

                if let Some(cut_at) = cut.take() {
                    values.truncate(cut_at as usize);
                }

                for (offset, value) in values.into_iter().enumerate().rev() {
                    entries.push(ListEntry {
                        parent_id: list_id.to_string(),
                        page_id: q as u64,
                        sequence_id: offset as u64,
                        value,
                    });
                }
            }

            page = low - 1;
        }

        entries.truncate(n);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cursor_from_value() {
        let cursor = Cursor::from_value(&json!({"page_id": 2, "sequence_id": 0})).unwrap();
        assert_eq!(
            cursor,
            Cursor {
                page_id: 2,
                sequence_id: 0
            }
        );
    }

    #[test]
    fn test_cursor_missing_fields_rejected() {
        let err = Cursor::from_value(&json!({"page_id": 2})).unwrap_err();
        assert!(matches!(err, ListError::InvalidCursor(_)));

        let err = Cursor::from_value(&json!({"sequence_id": 0})).unwrap_err();
        assert!(matches!(err, ListError::InvalidCursor(_)));

        let err = Cursor::from_value(&json!("2:0")).unwrap_err();
        assert!(matches!(err, ListError::InvalidCursor(_)));
    }

    #[test]
    fn test_cursor_from_entry() {
        let entry = ListEntry {
            parent_id: "orders".to_string(),
            page_id: 7,
            sequence_id: 3,
            value: json!({"val": "x"}),
        };
        assert_eq!(
            Cursor::from(&entry),
            Cursor {
                page_id: 7,
                sequence_id: 3
            }
        );
    }

    #[test]
    fn test_entry_wire_names() {
        let entry = ListEntry {
            parent_id: "orders".to_string(),
            page_id: 1,
            sequence_id: 0,
            value: json!({"val": "x"}),
        };
        let encoded = serde_json::to_value(&entry).unwrap();
        assert_eq!(encoded["resource_id_parent"], json!("orders"));
        assert_eq!(encoded["page_id"], json!(1));
        assert_eq!(encoded["sequence_id"], json!(0));
    }
}
