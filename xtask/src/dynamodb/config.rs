//! Table configuration types (Functional Core - pure data).

use learnbyshorts_core::keyspace::keys;

/// Default table name used by every LearnByShorts environment.
pub const DEFAULT_TABLE_NAME: &str = "learnbyshorts-data";

/// Table schema configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub table_name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    pub gsis: Vec<GsiConfig>,
    pub billing_mode: BillingMode,
    /// Numeric epoch-seconds attribute DynamoDB expires items by.
    pub ttl_attribute: Option<String>,
    pub tags: Vec<Tag>,
}

/// A key attribute definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub attribute_type: AttributeType,
}

/// DynamoDB attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
}

/// Global Secondary Index configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsiConfig {
    pub name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    pub projection: ProjectionType,
}

/// GSI projection type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionType {
    All,
}

/// Billing mode for the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingMode {
    PayPerRequest,
}

/// A resource tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl TableConfig {
    /// Sets the table name.
    pub fn with_table_name(mut self, name: &str) -> Self {
        self.table_name = name.to_string();
        self
    }

    /// Sets the `Environment` tag, replacing any previous value.
    pub fn with_environment(mut self, environment: &str) -> Self {
        self.tags.retain(|tag| tag.key != "Environment");
        self.tags.push(Tag::new("Environment", environment));
        self
    }
}

fn string_key(name: &str) -> KeyAttribute {
    KeyAttribute {
        name: name.to_string(),
        attribute_type: AttributeType::String,
    }
}

/// Returns the canonical table configuration for the user-data table.
/// This is a pure function - no I/O.
pub fn learnbyshorts_table_config() -> TableConfig {
    TableConfig {
        table_name: DEFAULT_TABLE_NAME.to_string(),
        partition_key: string_key(keys::PK_ATTR),
        sort_key: Some(string_key(keys::SK_ATTR)),
        gsis: vec![GsiConfig {
            name: keys::IDENTITY_INDEX_NAME.to_string(),
            partition_key: string_key(keys::INDEX_PK_ATTR),
            sort_key: Some(string_key(keys::INDEX_SK_ATTR)),
            projection: ProjectionType::All,
        }],
        billing_mode: BillingMode::PayPerRequest,
        ttl_attribute: Some(keys::TTL_ATTR.to_string()),
        tags: vec![Tag::new("Project", "LearnByShorts")],
    }
}
