//! Error types for store construction and provisioning
//!
//! Gateway operations themselves return `scroll_core::KvError`; this type
//! covers what happens before a store is usable (configuration, table
//! provisioning).

use thiserror::Error;

/// Errors from DynamoDB store setup
#[derive(Debug, Error)]
pub enum AwsStoreError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// DynamoDB SDK error
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
}

impl AwsStoreError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn dynamodb(msg: impl Into<String>) -> Self {
        Self::DynamoDb(msg.into())
    }
}

/// Result type for store setup operations
pub type Result<T> = std::result::Result<T, AwsStoreError>;
