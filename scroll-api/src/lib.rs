//! Append and retrieval engines for scroll lists
//!
//! A scroll list is an append-only logical sequence layered on a KV store
//! that offers strongly-consistent reads, conditional puts, and atomic
//! per-attribute operations. The list grows as numbered pages of bounded
//! capacity; a single summary item names the tail page.
//!
//! The engines here implement the concurrent append/page-rollover protocol
//! and the reverse multi-page retrieval walk on top of any
//! [`KvStore`](scroll_core::KvStore) binding, with no locks and no
//! transactions. The protocol tolerates the race artifacts that model
//! allows:
//!
//! - **Best-effort ordering**: an appender that stalls near a page boundary
//!   can land its value in an older page than a later appender's. Order is
//!   exact within one page, not across pages.
//! - **Blank pages**: a racing appender can bump the tail counter and lose
//!   the race to materialize the new page. Readers treat the absent page as
//!   empty; a later appender materializes it on demand.
//! - **Over-full pages**: two appenders can each observe a page below
//!   capacity and both land. The conditional counter bump still rolls the
//!   page over exactly once.
//! - **Duplicates on retry**: appends are not idempotent; a caller that
//!   retries a failed append after a partial success can insert the value
//!   twice. Callers needing uniqueness de-dupe at a higher layer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use scroll_api::{Cursor, ListClient};
//! use scroll_core::ListConfig;
//! use std::sync::Arc;
//!
//! let client = ListClient::new(Arc::new(store), ListConfig::default());
//!
//! client.create("orders", None).await?;
//! let receipt = client.append("orders", serde_json::json!({"val": "Hello0"})).await?;
//!
//! // Newest first, walking back across pages
//! let latest = client.retrieve_last_most_recent("orders", 10).await?;
//! let cursor = Cursor::from(latest.last().unwrap());
//! let older = client.retrieve_next_most_recent("orders", &cursor, 10).await?;
//! ```

mod client;
mod error;
mod retrieve;

pub use client::{AppendReceipt, ListClient};
pub use error::{ListError, Result};
pub use retrieve::{Cursor, ListEntry};

// Re-export what callers need to build a client
pub use scroll_core::{KvStore, ListConfig};
