//! The list client and its append engine
//!
//! The append hot path is one summary read plus one atomic list-append; the
//! summary is only ever written on the cold rollover path, which keeps it out
//! of the per-append critical section.

use crate::error::{ListError, Result};
use scroll_core::schema::{page_key, summary_key, ATTR_CURRENT_PAGE, ATTR_DATA_LIST};
use scroll_core::{KvError, KvStore, ListConfig, ListPage, ListSummary};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Where an appended value landed
///
/// `sequence_id` is the value's zero-based offset within the page at the time
/// the append returned. Under concurrent appends to the same page this offset
/// is a best-effort identifier, not a strict rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendReceipt {
    /// Page the value was appended to
    pub page_id: u64,
    /// Zero-based offset within the page at append time
    pub sequence_id: u64,
}

/// Client for one table's worth of scroll lists
///
/// Holds the gateway and the page-sizing configuration; every operation
/// addresses a list by its caller-chosen id. Cloning is cheap and clones
/// share the underlying store.
#[derive(Clone, Debug)]
pub struct ListClient {
    store: Arc<dyn KvStore>,
    config: ListConfig,
}

impl ListClient {
    /// Create a client over a KV gateway
    pub fn new(store: Arc<dyn KvStore>, config: ListConfig) -> Self {
        Self { store, config }
    }

    /// The page-sizing configuration this client was built with
    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    /// Create a list, idempotently
    ///
    /// Puts the summary item if absent. A summary that already exists is
    /// success: the stored counter and metadata are left untouched, and the
    /// returned view simply reflects a usable list. No data page is created
    /// here; page 0 materializes on the first append.
    pub async fn create(&self, list_id: &str, metadata: Option<Value>) -> Result<ListSummary> {
        let summary = ListSummary::new(list_id, metadata);
        match self.store.put_if_absent(&summary.id, summary.to_item()).await {
            Ok(()) => Ok(summary),
            Err(KvError::AlreadyExists(_)) => Ok(summary),
            Err(e) => Err(e.into()),
        }
    }

    /// Append one value to a list
    ///
    /// Reads the tail page index `p` from the summary, appends to page `p`,
    /// and if the page is at or past capacity, rolls the list over: a
    /// conditional bump of the summary counter (exactly one of N racing
    /// appenders wins) followed by creation of page `p + 1` by the winner.
    ///
    /// A missing page `p` is recovered once by creating it and retrying the
    /// append; a second miss means the store is misbehaving and surfaces as
    /// [`ListError::CreatePageFailed`]. Not idempotent: retrying a failed
    /// call after a partial success may duplicate the value.
    pub async fn append(&self, list_id: &str, value: Value) -> Result<AppendReceipt> {
        let p = self.read_current_page(list_id).await?;
        let key = page_key(list_id, p);

        let n = match self
            .store
            .append_to_list(&key, ATTR_DATA_LIST, value.clone())
            .await
        {
            Ok(n) => n,
            Err(KvError::ItemMissing(_)) => {
                // First append of the list, or a rollover winner has not
                // materialized this page yet. Create it and retry once.
                debug!(list_id, page = p, "append found page missing, creating it");
                self.create_page(list_id, p).await?;
                match self.store.append_to_list(&key, ATTR_DATA_LIST, value).await {
                    Ok(n) => n,
                    Err(KvError::ItemMissing(_)) => {
                        return Err(ListError::create_page_failed(list_id, p));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        if n >= self.config.max_elements_per_page() {
            self.rollover(list_id, p).await?;
        }

        Ok(AppendReceipt {
            page_id: p,
            sequence_id: (n - 1) as u64,
        })
    }

    /// Reserved bulk-append entry point
    pub async fn append_bulk(
        &self,
        _list_id: &str,
        _values: Vec<Value>,
    ) -> Result<Vec<AppendReceipt>> {
        Err(ListError::NotImplemented("append_bulk"))
    }

    /// Advance the tail counter past a full page `p` and materialize the new
    /// tail page
    ///
    /// The conditional increment admits exactly one winner per boundary; a
    /// lost precondition means a peer already rolled the list over and there
    /// is nothing left to do.
    async fn rollover(&self, list_id: &str, p: u64) -> Result<()> {
        match self
            .store
            .increment_if_equals(&summary_key(list_id), ATTR_CURRENT_PAGE, p)
            .await
        {
            Ok(next) => {
                debug!(list_id, page = next, "won rollover, materializing new tail page");
                self.create_page(list_id, next).await
            }
            Err(KvError::PreconditionFailed(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Put an empty page if absent; a page that already exists is success
    async fn create_page(&self, list_id: &str, page_no: u64) -> Result<()> {
        let page = ListPage::new(list_id, page_no);
        match self.store.put_if_absent(&page.id, page.to_item()).await {
            Ok(()) | Err(KvError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the tail page index from the summary
    pub(crate) async fn read_current_page(&self, list_id: &str) -> Result<u64> {
        let key = summary_key(list_id);
        let item = self
            .store
            .get(&key, Some(&[ATTR_CURRENT_PAGE]))
            .await?
            .ok_or_else(|| ListError::list_not_found(list_id))?;
        Ok(item
            .get(ATTR_CURRENT_PAGE)
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}
