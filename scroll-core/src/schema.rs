//! Key encoding and attribute-name constants
//!
//! One logical list is a family of items sharing the list id as a prefix:
//!
//! ```text
//! Table: scroll-lists (configurable)
//!
//! Primary Key:
//!   - id (String, Partition Key)
//!
//! Summary item (one per list), key `<list_id>_summary`:
//!   - id: String (PK)
//!   - v: Number - schema version
//!   - currentPage: Number - index of the tail page, monotonically non-decreasing
//!   - metadata: opaque caller-supplied blob (optional)
//!   - submittedAt: Number (Unix epoch milliseconds)
//!
//! Data page item (zero or more per list), key `<list_id>_<page_no>`:
//!   - id: String (PK)
//!   - v: Number - schema version
//!   - data_list: List - ordered opaque values
//!   - submittedAt: Number (Unix epoch milliseconds)
//! ```
//!
//! List ids may themselves contain `_`. The encoding is unambiguous in one
//! direction only: a key is always `<list_id>` + `_` + suffix, where the
//! suffix is the *terminal* segment after the last `_` (either the summary
//! label or a page number). [`key_suffix`] applies that rule when decoding.

/// Primary key attribute
pub const ATTR_ID: &str = "id";

/// Schema version attribute
pub const ATTR_SCHEMA_VERSION: &str = "v";

/// Tail page counter on the summary item (monotonically non-decreasing)
pub const ATTR_CURRENT_PAGE: &str = "currentPage";

/// Caller-supplied opaque metadata on the summary item
pub const ATTR_METADATA: &str = "metadata";

/// Creation timestamp (Unix epoch milliseconds)
pub const ATTR_SUBMITTED_AT: &str = "submittedAt";

/// Ordered value list on data page items
pub const ATTR_DATA_LIST: &str = "data_list";

/// Terminal key segment of the summary item
pub const SUMMARY_LABEL: &str = "summary";

/// Separator between the list id and the terminal key segment
pub const KEY_SEPARATOR: char = '_';

/// Current schema version written to new items
pub const SCHEMA_VERSION: u64 = 1;

/// Default table name
pub const DEFAULT_TABLE_NAME: &str = "scroll-lists";

/// Key of the summary item for a list
pub fn summary_key(list_id: &str) -> String {
    format!("{list_id}{KEY_SEPARATOR}{SUMMARY_LABEL}")
}

/// Key of a numbered data page for a list
pub fn page_key(list_id: &str, page_no: u64) -> String {
    format!("{list_id}{KEY_SEPARATOR}{page_no}")
}

/// Terminal segment of an item key (after the last `_`), if any
pub fn key_suffix(key: &str) -> Option<&str> {
    key.rsplit_once(KEY_SEPARATOR).map(|(_, suffix)| suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_key() {
        assert_eq!(summary_key("orders"), "orders_summary");
    }

    #[test]
    fn test_page_key() {
        assert_eq!(page_key("orders", 0), "orders_0");
        assert_eq!(page_key("orders", 42), "orders_42");
    }

    #[test]
    fn test_keys_with_underscored_list_id() {
        // The suffix is the terminal segment after the LAST separator.
        assert_eq!(summary_key("eu_west_orders"), "eu_west_orders_summary");
        assert_eq!(page_key("eu_west_orders", 3), "eu_west_orders_3");
        assert_eq!(key_suffix("eu_west_orders_summary"), Some("summary"));
        assert_eq!(key_suffix("eu_west_orders_3"), Some("3"));
    }

    #[test]
    fn test_key_suffix_no_separator() {
        assert_eq!(key_suffix("orders"), None);
    }
}
