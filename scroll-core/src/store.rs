//! The KV gateway trait
//!
//! Isolates the five store primitives the append/rollover protocol is built
//! on. Implementations bind a single table at construction time; all keys
//! passed here are full item keys (see [`crate::schema`]).
//!
//! The protocol never takes a lock: uniqueness at page boundaries comes
//! entirely from the conditional create and the conditional counter
//! increment, so implementations must provide genuine server-side atomicity
//! for every operation below.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;

/// A stored item: a flat map of attribute name to JSON value
pub type Item = serde_json::Map<String, Value>;

/// Largest number of keys a single [`KvStore::bulk_get`] call may request
///
/// Matches the DynamoDB BatchGetItem limit; implementations for other stores
/// must accept at least this many.
pub const MAX_BULK_GET_KEYS: usize = 100;

/// The five store primitives used by the append/rollover protocol
///
/// Contracts, per operation:
///
/// - [`put_if_absent`](Self::put_if_absent): atomic create;
///   [`KvError::AlreadyExists`](crate::KvError::AlreadyExists) if the key is
///   present, never an overwrite.
/// - [`get`](Self::get): strongly-consistent point read; `Ok(None)` when the
///   item does not exist.
/// - [`append_to_list`](Self::append_to_list): atomic server-side append to a
///   list-valued attribute, returning the new length;
///   [`KvError::ItemMissing`](crate::KvError::ItemMissing) if the item does
///   not exist.
/// - [`increment_if_equals`](Self::increment_if_equals): add 1 to a numeric
///   attribute conditional on it currently equaling `floor` ("only advance
///   from `floor` to `floor + 1`"). Of two racing callers that read the same
///   floor, exactly one succeeds; the other gets
///   [`KvError::PreconditionFailed`](crate::KvError::PreconditionFailed) and
///   must treat the advance as already performed by a peer.
/// - [`bulk_get`](Self::bulk_get): batched point reads; missing keys are
///   omitted from the result and partial success is success.
#[async_trait]
pub trait KvStore: Debug + Send + Sync {
    /// Create `item` under `key` iff no item with that key exists
    async fn put_if_absent(&self, key: &str, item: Item) -> Result<()>;

    /// Read the item at `key`, optionally projecting to the named attributes
    ///
    /// The key attribute always rides along in a projected result.
    async fn get(&self, key: &str, projection: Option<&[&str]>) -> Result<Option<Item>>;

    /// Atomically append `value` to the list attribute `field` of the item at
    /// `key`, returning the list's new length
    async fn append_to_list(&self, key: &str, field: &str, value: Value) -> Result<usize>;

    /// Atomically advance the numeric attribute `field` from `floor` to
    /// `floor + 1`, returning the new value
    async fn increment_if_equals(&self, key: &str, field: &str, floor: u64) -> Result<u64>;

    /// Read up to [`MAX_BULK_GET_KEYS`] items in one round-trip
    ///
    /// Returns a map from key to item; keys with no item are omitted. The key
    /// attribute always rides along in projected results.
    async fn bulk_get(
        &self,
        keys: &[String],
        projection: Option<&[&str]>,
    ) -> Result<HashMap<String, Item>>;
}
