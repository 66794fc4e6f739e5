//! DynamoDB implementation of the KV gateway
//!
//! One list maps to a family of items in a single table with an `id` string
//! partition key (see `scroll_core::schema` for the authoritative attribute
//! constants). All conditional behavior the append protocol needs is pushed
//! to the server:
//!
//! - `put_if_absent` → `PutItem` conditioned on `attribute_not_exists(id)`
//! - `append_to_list` → `UpdateItem` with `list_append`, conditioned on
//!   `attribute_exists(id)`, new length read back from `UPDATED_NEW`
//! - `increment_if_equals` → `UpdateItem` `SET field = field + 1` conditioned
//!   on `field = floor`, so exactly one of N racing bumpers advances the
//!   counter past a page boundary
//! - `bulk_get` → `BatchGetItem` with UnprocessedKeys retry and backoff

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    KeysAndAttributes, ReturnValue, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use aws_smithy_types::timeout::TimeoutConfig;
use scroll_core::schema::{ATTR_ID, DEFAULT_TABLE_NAME};
use scroll_core::{Item, KvError, KvStore, MAX_BULK_GET_KEYS};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

type Attrs = HashMap<String, AttributeValue>;

/// DynamoDB store configuration
#[derive(Debug, Clone)]
pub struct DynamoDbConfig {
    /// DynamoDB table name
    pub table_name: String,
    /// AWS region (optional, uses SDK default if not specified)
    pub region: Option<String>,
    /// Optional endpoint override (e.g. DynamoDB Local, LocalStack)
    pub endpoint: Option<String>,
    /// Operation timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            region: None,
            endpoint: None,
            timeout_ms: None,
        }
    }
}

/// DynamoDB-backed KV store
#[derive(Clone)]
pub struct DynamoDbKvStore {
    client: Client,
    table_name: String,
}

impl std::fmt::Debug for DynamoDbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbKvStore")
            .field("table_name", &self.table_name)
            .finish()
    }
}

// ─── Constructors ───────────────────────────────────────────────────────────

impl DynamoDbKvStore {
    /// Create a new DynamoDB store from SDK config.
    pub fn new(sdk_config: &aws_config::SdkConfig, config: DynamoDbConfig) -> crate::Result<Self> {
        if config.table_name.is_empty() {
            return Err(crate::AwsStoreError::invalid_config("empty table name"));
        }

        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            table_name: config.table_name,
        })
    }

    /// Create from a pre-built client (for testing).
    pub fn from_client(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// The table this store is bound to.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

// ─── DynamoDB error classification ──────────────────────────────────────────

/// Error codes DynamoDB uses for rate limiting.
const THROTTLING_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
];

fn is_conditional_check_failed_put(err: &SdkError<PutItemError>) -> bool {
    match err {
        SdkError::ServiceError(se) => {
            matches!(se.err(), PutItemError::ConditionalCheckFailedException(_))
        }
        _ => false,
    }
}

fn is_conditional_check_failed_update(err: &SdkError<UpdateItemError>) -> bool {
    match err {
        SdkError::ServiceError(se) => {
            matches!(se.err(), UpdateItemError::ConditionalCheckFailedException(_))
        }
        _ => false,
    }
}

/// `list_append` against an item whose list attribute is absent surfaces as a
/// validation error rather than a conditional-check failure.
fn is_validation_error<E: ProvideErrorMetadata>(err: &SdkError<E>) -> bool {
    err.code() == Some("ValidationException")
}

/// Map an SDK failure to the gateway taxonomy: throttling stays
/// distinguishable so callers can back off; everything else is a transport
/// fault.
fn classify_failure<E: ProvideErrorMetadata>(op: &str, err: &SdkError<E>) -> KvError {
    let detail = match (err.code(), err.message()) {
        (Some(code), Some(msg)) => format!("{code}: {msg}"),
        (Some(code), None) => code.to_string(),
        _ => err.to_string(),
    };
    match err.code() {
        Some(code) if THROTTLING_CODES.contains(&code) => {
            KvError::throttled(format!("DynamoDB {op}: {detail}"))
        }
        _ => KvError::unavailable(format!("DynamoDB {op} failed: {detail}")),
    }
}

// ─── JSON ↔ DynamoDB conversion ─────────────────────────────────────────────

impl DynamoDbKvStore {
    fn json_to_attr(value: &Value) -> AttributeValue {
        match value {
            Value::Null => AttributeValue::Null(true),
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => AttributeValue::N(n.to_string()),
            Value::String(s) => AttributeValue::S(s.clone()),
            Value::Array(values) => {
                AttributeValue::L(values.iter().map(Self::json_to_attr).collect())
            }
            Value::Object(map) => AttributeValue::M(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::json_to_attr(v)))
                    .collect(),
            ),
        }
    }

    fn attr_to_json(attr: &AttributeValue) -> Option<Value> {
        match attr {
            AttributeValue::S(s) => Some(Value::String(s.clone())),
            AttributeValue::N(n) => {
                if let Ok(i) = n.parse::<i64>() {
                    Some(Value::Number(i.into()))
                } else if let Ok(f) = n.parse::<f64>() {
                    serde_json::Number::from_f64(f).map(Value::Number)
                } else {
                    None
                }
            }
            AttributeValue::Bool(b) => Some(Value::Bool(*b)),
            AttributeValue::Null(_) => Some(Value::Null),
            AttributeValue::L(list) => {
                Some(Value::Array(list.iter().filter_map(Self::attr_to_json).collect()))
            }
            AttributeValue::M(map) => Some(Value::Object(
                map.iter()
                    .filter_map(|(k, v)| Self::attr_to_json(v).map(|val| (k.clone(), val)))
                    .collect(),
            )),
            _ => None,
        }
    }

    fn item_to_attrs(item: &Item) -> Attrs {
        item.iter()
            .map(|(name, value)| (name.clone(), Self::json_to_attr(value)))
            .collect()
    }

    fn attrs_to_item(attrs: &Attrs) -> Item {
        attrs
            .iter()
            .filter_map(|(name, attr)| Self::attr_to_json(attr).map(|value| (name.clone(), value)))
            .collect()
    }

    /// Build a projection expression covering `fields` plus the key attribute,
    /// returning the expression and its attribute-name placeholders.
    fn projection_parts(fields: &[&str]) -> (String, Vec<(String, String)>) {
        let mut names = vec![("#id".to_string(), ATTR_ID.to_string())];
        for (i, field) in fields.iter().filter(|f| **f != ATTR_ID).enumerate() {
            names.push((format!("#p{i}"), field.to_string()));
        }
        let expr = names
            .iter()
            .map(|(placeholder, _)| placeholder.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        (expr, names)
    }
}

// ─── KvStore ────────────────────────────────────────────────────────────────

#[async_trait]
impl KvStore for DynamoDbKvStore {
    async fn put_if_absent(&self, key: &str, item: Item) -> scroll_core::Result<()> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::item_to_attrs(&item)))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", ATTR_ID)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_conditional_check_failed_put(&e) => Err(KvError::already_exists(key)),
            Err(e) => Err(classify_failure("PutItem", &e)),
        }
    }

    async fn get(&self, key: &str, projection: Option<&[&str]>) -> scroll_core::Result<Option<Item>> {
        let mut request = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(ATTR_ID, AttributeValue::S(key.to_string()))
            .consistent_read(true);

        if let Some(fields) = projection {
            let (expr, names) = Self::projection_parts(fields);
            request = request.projection_expression(expr);
            for (placeholder, name) in names {
                request = request.expression_attribute_names(placeholder, name);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_failure("GetItem", &e))?;

        Ok(response.item().map(Self::attrs_to_item))
    }

    async fn append_to_list(
        &self,
        key: &str,
        field: &str,
        value: Value,
    ) -> scroll_core::Result<usize> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(ATTR_ID, AttributeValue::S(key.to_string()))
            .update_expression("SET #f = list_append(#f, :v)")
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", ATTR_ID)
            .expression_attribute_names("#f", field)
            .expression_attribute_values(":v", AttributeValue::L(vec![Self::json_to_attr(&value)]))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await;

        match result {
            Ok(out) => out
                .attributes()
                .and_then(|attrs| attrs.get(field))
                .and_then(|attr| attr.as_l().ok())
                .map(|list| list.len())
                .ok_or_else(|| {
                    KvError::invalid_item(format!("UpdateItem on {key} returned no {field} list"))
                }),
            Err(e) if is_conditional_check_failed_update(&e) || is_validation_error(&e) => {
                Err(KvError::item_missing(key))
            }
            Err(e) => Err(classify_failure("UpdateItem", &e)),
        }
    }

    async fn increment_if_equals(
        &self,
        key: &str,
        field: &str,
        floor: u64,
    ) -> scroll_core::Result<u64> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(ATTR_ID, AttributeValue::S(key.to_string()))
            .update_expression("SET #f = #f + :one")
            .condition_expression("#f = :floor")
            .expression_attribute_names("#f", field)
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .expression_attribute_values(":floor", AttributeValue::N(floor.to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await;

        match result {
            Ok(out) => out
                .attributes()
                .and_then(|attrs| attrs.get(field))
                .and_then(|attr| attr.as_n().ok())
                .and_then(|n| n.parse::<u64>().ok())
                .ok_or_else(|| {
                    KvError::invalid_item(format!("UpdateItem on {key} returned no {field} counter"))
                }),
            Err(e) if is_conditional_check_failed_update(&e) => Err(KvError::precondition_failed(
                format!("{key}.{field} is not at {floor}"),
            )),
            Err(e) => Err(classify_failure("UpdateItem", &e)),
        }
    }

    async fn bulk_get(
        &self,
        keys: &[String],
        projection: Option<&[&str]>,
    ) -> scroll_core::Result<HashMap<String, Item>> {
        let mut found = HashMap::with_capacity(keys.len());

        for chunk in keys.chunks(MAX_BULK_GET_KEYS) {
            let key_maps: Vec<Attrs> = chunk
                .iter()
                .map(|key| {
                    HashMap::from([(ATTR_ID.to_string(), AttributeValue::S(key.clone()))])
                })
                .collect();

            let mut builder = KeysAndAttributes::builder()
                .set_keys(Some(key_maps))
                .consistent_read(true);
            if let Some(fields) = projection {
                let (expr, names) = Self::projection_parts(fields);
                builder = builder.projection_expression(expr);
                for (placeholder, name) in names {
                    builder = builder.expression_attribute_names(placeholder, name);
                }
            }
            let ka = builder.build().map_err(|e| {
                KvError::unavailable(format!("KeysAndAttributes build failed: {e}"))
            })?;

            // BatchGetItem with retry for UnprocessedKeys (throttling).
            let mut pending = Some(ka);
            let max_retries = 5;
            for retry in 0..=max_retries {
                let request_ka = pending.take().expect("pending keys");
                let response = self
                    .client
                    .batch_get_item()
                    .request_items(&self.table_name, request_ka)
                    .send()
                    .await
                    .map_err(|e| classify_failure("BatchGetItem", &e))?;

                if let Some(table_items) =
                    response.responses().and_then(|r| r.get(&self.table_name))
                {
                    for attrs in table_items {
                        if let Some(key) = attrs.get(ATTR_ID).and_then(|v| v.as_s().ok()) {
                            found.insert(key.clone(), Self::attrs_to_item(attrs));
                        }
                    }
                }

                // Retry unprocessed keys with exponential backoff.
                match response
                    .unprocessed_keys()
                    .and_then(|u| u.get(&self.table_name))
                {
                    Some(unprocessed) if !unprocessed.keys().is_empty() => {
                        if retry == max_retries {
                            return Err(KvError::throttled(
                                "BatchGetItem: max retries exhausted for UnprocessedKeys",
                            ));
                        }
                        let backoff_ms = 50 * (1 << retry.min(4)); // 50, 100, 200, 400, 800ms
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        pending = Some(unprocessed.clone());
                    }
                    _ => break,
                }
            }
        }

        Ok(found)
    }
}

// ─── Table provisioning ─────────────────────────────────────────────────────

impl DynamoDbKvStore {
    /// Create the table with its `id` hash key if it does not exist.
    ///
    /// Waits for the table to become ACTIVE before returning.
    pub async fn ensure_table(&self) -> crate::Result<()> {
        let result = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ATTR_ID)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .expect("valid attr def"),
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ATTR_ID)
                    .key_type(KeyType::Hash)
                    .build()
                    .expect("valid key schema"),
            )
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(table = %self.table_name, "created table");
            }
            Err(ref e) => {
                // Ignore ResourceInUseException (table already exists)
                let is_exists = matches!(
                    e,
                    SdkError::ServiceError(se)
                    if matches!(
                        se.err(),
                        aws_sdk_dynamodb::operation::create_table::CreateTableError::ResourceInUseException(_)
                    )
                );
                if !is_exists {
                    return Err(crate::AwsStoreError::dynamodb(format!(
                        "CreateTable failed: {e}"
                    )));
                }
            }
        }

        // Wait for ACTIVE
        for _ in 0..60 {
            let desc = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(|e| {
                    crate::AwsStoreError::dynamodb(format!("DescribeTable failed: {e}"))
                })?;

            if let Some(table) = desc.table() {
                if table.table_status() == Some(&aws_sdk_dynamodb::types::TableStatus::Active) {
                    return Ok(());
                }
            }

            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        Err(crate::AwsStoreError::dynamodb(
            "Table did not become ACTIVE within 30s",
        ))
    }
}

// ─── Unit tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_attr_scalars() {
        assert_eq!(
            DynamoDbKvStore::json_to_attr(&json!("hello")),
            AttributeValue::S("hello".to_string())
        );
        assert_eq!(
            DynamoDbKvStore::json_to_attr(&json!(42)),
            AttributeValue::N("42".to_string())
        );
        assert_eq!(
            DynamoDbKvStore::json_to_attr(&json!(true)),
            AttributeValue::Bool(true)
        );
        assert_eq!(
            DynamoDbKvStore::json_to_attr(&Value::Null),
            AttributeValue::Null(true)
        );
    }

    #[test]
    fn test_json_to_attr_nested() {
        let attr = DynamoDbKvStore::json_to_attr(&json!({"vals": ["a", 1]}));
        let AttributeValue::M(map) = attr else {
            panic!("expected a map attribute");
        };
        let AttributeValue::L(list) = &map["vals"] else {
            panic!("expected a list attribute");
        };
        assert_eq!(list[0], AttributeValue::S("a".to_string()));
        assert_eq!(list[1], AttributeValue::N("1".to_string()));
    }

    #[test]
    fn test_attr_json_round_trip() {
        let value = json!({
            "id": "orders_0",
            "v": 1,
            "data_list": [{"val": "Hello0"}, {"val": "Hello1"}],
            "submittedAt": 1_700_000_000_000u64,
        });
        let attr = DynamoDbKvStore::json_to_attr(&value);
        assert_eq!(DynamoDbKvStore::attr_to_json(&attr), Some(value));
    }

    #[test]
    fn test_attr_to_json_skips_binary() {
        use aws_smithy_types::Blob;
        let attr = AttributeValue::B(Blob::new(b"raw".to_vec()));
        assert_eq!(DynamoDbKvStore::attr_to_json(&attr), None);
    }

    #[test]
    fn test_item_round_trip() {
        let mut item = Item::new();
        item.insert("id".to_string(), json!("orders_summary"));
        item.insert("currentPage".to_string(), json!(3));
        item.insert("metadata".to_string(), json!({"owner": "billing"}));

        let attrs = DynamoDbKvStore::item_to_attrs(&item);
        assert_eq!(DynamoDbKvStore::attrs_to_item(&attrs), item);
    }

    #[test]
    fn test_projection_parts_include_key() {
        let (expr, names) = DynamoDbKvStore::projection_parts(&["data_list"]);
        assert_eq!(expr, "#id, #p0");
        assert_eq!(
            names,
            vec![
                ("#id".to_string(), "id".to_string()),
                ("#p0".to_string(), "data_list".to_string()),
            ]
        );
    }

    #[test]
    fn test_projection_parts_dedupes_key() {
        let (expr, names) = DynamoDbKvStore::projection_parts(&["id", "v"]);
        assert_eq!(expr, "#id, #p0");
        assert_eq!(names[1].1, "v");
    }
}
