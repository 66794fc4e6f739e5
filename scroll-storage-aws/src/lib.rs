//! DynamoDB storage backend for scroll lists
//!
//! Binds the five-primitive KV gateway (`scroll_core::KvStore`) to DynamoDB:
//!
//! - conditional create → `PutItem` with `attribute_not_exists`
//! - point get → `GetItem` (consistent read, optional projection)
//! - atomic list-append → `UpdateItem` with `list_append`, returning the new
//!   length from `UPDATED_NEW`
//! - conditional counter increment → `UpdateItem` with an equality condition
//!   on the current value
//! - bulk get → `BatchGetItem` with UnprocessedKeys retry
//!
//! ## Usage
//!
//! ```ignore
//! use scroll_storage_aws::{DynamoDbConfig, DynamoDbKvStore};
//!
//! // Load AWS SDK config
//! let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//!
//! let config = DynamoDbConfig {
//!     table_name: "scroll-lists".to_string(),
//!     region: Some("us-east-1".to_string()),
//!     ..Default::default()
//! };
//! let store = DynamoDbKvStore::new(&sdk_config, config)?;
//! store.ensure_table().await?;
//! ```

pub mod dynamodb;
pub mod error;

pub use dynamodb::{DynamoDbConfig, DynamoDbKvStore};
pub use error::{AwsStoreError, Result};

// Re-export the gateway trait for convenience
pub use scroll_core::KvStore;
