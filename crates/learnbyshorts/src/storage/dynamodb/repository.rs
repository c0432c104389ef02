//! DynamoDB repository implementation.
//!
//! Implements the repository traits from `learnbyshorts_core::storage` on the
//! single table. Keys always come from the keyspace codec.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};

use learnbyshorts_core::keyspace::{encode, keys, Entity, IdentityKey};
use learnbyshorts_core::learning::{Analytics, Profile, Progress, Session, SessionId};
use learnbyshorts_core::storage::{
    AnalyticsRepository, ProfileRepository, ProgressRepository, RepositoryError, Result,
    SessionRepository,
};

use super::conversions::{
    entity_to_item, index_item_user_id, item_to_analytics, item_to_profile, item_to_progress,
    item_to_session, progress_update, Item,
};
use super::error::{
    map_get_item_error, map_put_item_error, map_query_error, map_transact_write_error,
    map_update_item_error,
};
use crate::config::StoreConfig;
use crate::storage::single_user;

/// DynamoDB-based repository implementation.
///
/// Cloning is cheap; the SDK client is reference counted.
#[derive(Debug, Clone)]
pub struct DynamoDbRepository {
    client: Client,
    table_name: String,
    index_name: String,
}

impl DynamoDbRepository {
    /// Creates a new repository with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            index_name: keys::IDENTITY_INDEX_NAME.to_string(),
        }
    }

    /// Overrides the name of the identity index.
    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    /// Creates a repository from store configuration.
    ///
    /// Uses the AWS SDK default credential chain with the configured region
    /// and, when set, a custom endpoint (DynamoDB Local).
    pub async fn from_config(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        tracing::debug!(store = %config.target_display(), "dynamodb client configured");
        Self::new(Client::new(&sdk_config), &config.table_name).with_index_name(&config.index_name)
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn get_item(&self, pk: String, sk: String) -> Result<Option<Item>> {
        tracing::debug!(table = %self.table_name, %pk, %sk, "get_item");
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(keys::PK_ATTR, AttributeValue::S(pk))
            .key(keys::SK_ATTR, AttributeValue::S(sk))
            .send()
            .await
            .map_err(map_get_item_error)?;

        Ok(result.item)
    }

    /// All items of partition `pk` whose sort key starts with `sk_prefix`,
    /// following pagination to the end.
    async fn query_partition(
        &self,
        pk: String,
        sk_prefix: &str,
        consistent_read: bool,
    ) -> Result<Vec<Item>> {
        tracing::debug!(table = %self.table_name, %pk, sk_prefix, "query");
        let mut items = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#pk = :pk AND begins_with(#sk, :prefix)")
                .expression_attribute_names("#pk", keys::PK_ATTR)
                .expression_attribute_names("#sk", keys::SK_ATTR)
                .expression_attribute_values(":pk", AttributeValue::S(pk.clone()))
                .expression_attribute_values(":prefix", AttributeValue::S(sk_prefix.to_string()))
                .consistent_read(consistent_read)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(map_query_error)?;

            items.extend(result.items.unwrap_or_default());
            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Items carrying `index_key` as their identity-index partition key.
    async fn query_index(&self, index_key: String) -> Result<Vec<Item>> {
        tracing::debug!(index = %self.index_name, %index_key, "query index");
        let mut items = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(&self.index_name)
                .key_condition_expression("#ipk = :ipk")
                .expression_attribute_names("#ipk", keys::INDEX_PK_ATTR)
                .expression_attribute_values(":ipk", AttributeValue::S(index_key.clone()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(map_query_error)?;

            items.extend(result.items.unwrap_or_default());
            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn put_entity(&self, entity: &Entity, id: String) -> Result<()> {
        let item = entity_to_item(entity)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| map_put_item_error(e, entity.kind().name(), id))?;

        Ok(())
    }

    fn create_if_absent(&self, entity: &Entity) -> Result<TransactWriteItem> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(entity_to_item(entity)?))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", keys::PK_ATTR)
            .build()
            .map_err(|e| RepositoryError::QueryFailed(format!("Invalid transaction item: {e}")))?;

        Ok(TransactWriteItem::builder().put(put).build())
    }
}

// ============================================================================
// ProfileRepository implementation
// ============================================================================

#[async_trait]
impl ProfileRepository for DynamoDbRepository {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let item = self
            .get_item(keys::user_pk(user_id), keys::profile_sk().to_string())
            .await?;

        item.as_ref().map(item_to_profile).transpose()
    }

    async fn find_user_id(&self, identity: &IdentityKey) -> Result<Option<String>> {
        let items = self.query_index(identity.index_key()?).await?;

        let user_ids = items
            .iter()
            .map(index_item_user_id)
            .collect::<Result<Vec<_>>>()?;

        single_user(identity, user_ids)
    }

    async fn create_user(&self, profile: &Profile) -> Result<()> {
        let profile_entity = Entity::Profile(profile.clone());
        let index_entity = Entity::IdentityIndex(profile.identity_index());
        let index_keys = encode(&index_entity)?;

        // The identity-index key carries the new user id, so its condition
        // alone cannot see another user holding the same email or Google id.
        if !self
            .query_partition(index_keys.pk, keys::USER_PREFIX, true)
            .await?
            .is_empty()
        {
            return Err(RepositoryError::Conflict {
                entity_type: "IdentityIndex",
                id: profile.email.clone(),
            });
        }
        let google_index_key = keys::google_index_pk(&profile.google_id);
        if !self.query_index(google_index_key.clone()).await?.is_empty() {
            return Err(RepositoryError::Conflict {
                entity_type: "Identity",
                id: google_index_key,
            });
        }

        // Order matches `targets` so a cancellation reason names its record.
        let actions = vec![
            self.create_if_absent(&profile_entity)?,
            self.create_if_absent(&index_entity)?,
        ];
        let targets = [
            ("Profile", profile.user_id.clone()),
            ("IdentityIndex", profile.email.clone()),
        ];

        self.client
            .transact_write_items()
            .set_transact_items(Some(actions))
            .send()
            .await
            .map_err(|e| map_transact_write_error(e, &targets))?;

        tracing::info!(user_id = %profile.user_id, "user created");
        Ok(())
    }

    async fn touch_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(keys::PK_ATTR, AttributeValue::S(keys::user_pk(user_id)))
            .key(keys::SK_ATTR, AttributeValue::S(keys::profile_sk().to_string()))
            .update_expression("SET #login = :login")
            .condition_expression("attribute_exists(#pk)")
            .expression_attribute_names("#login", "last_login")
            .expression_attribute_names("#pk", keys::PK_ATTR)
            .expression_attribute_values(":login", AttributeValue::S(at.to_rfc3339()))
            .send()
            .await
            .map_err(|e| map_update_item_error(e, "Profile", user_id))?;

        Ok(())
    }
}

// ============================================================================
// ProgressRepository implementation
// ============================================================================

#[async_trait]
impl ProgressRepository for DynamoDbRepository {
    async fn list_progress(&self, user_id: &str) -> Result<Vec<Progress>> {
        let items = self
            .query_partition(keys::user_pk(user_id), keys::progress_sk_prefix(), false)
            .await?;

        let mut progress = items
            .iter()
            .map(item_to_progress)
            .collect::<Result<Vec<_>>>()?;

        // First-save order; the table itself returns sort-key order.
        progress.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.course_id.cmp(&b.course_id))
        });
        Ok(progress)
    }

    async fn save_progress(&self, progress: &Progress) -> Result<()> {
        // Validates the identifiers before anything is sent.
        let encoded = encode(&Entity::Progress(progress.clone()))?;
        let update = progress_update(progress);

        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(keys::PK_ATTR, AttributeValue::S(encoded.pk))
            .key(keys::SK_ATTR, AttributeValue::S(encoded.sk))
            .update_expression(update.expression)
            .set_expression_attribute_names(Some(update.names))
            .set_expression_attribute_values(Some(update.values))
            .send()
            .await
            .map_err(|e| {
                map_update_item_error(
                    e,
                    "Progress",
                    format!("{}/{}", progress.user_id, progress.course_id),
                )
            })?;

        tracing::debug!(
            user_id = %progress.user_id,
            course_id = %progress.course_id,
            "progress saved"
        );
        Ok(())
    }
}

// ============================================================================
// SessionRepository implementation
// ============================================================================

#[async_trait]
impl SessionRepository for DynamoDbRepository {
    async fn create_session(&self, session: &Session) -> Result<()> {
        self.put_entity(
            &Entity::Session(session.clone()),
            session.session_id.to_string(),
        )
        .await
    }

    async fn get_session(&self, user_id: &str, session_id: &SessionId) -> Result<Option<Session>> {
        let item = self
            .get_item(keys::user_pk(user_id), keys::session_sk(session_id.as_str()))
            .await?;

        item.as_ref().map(item_to_session).transpose()
    }
}

// ============================================================================
// AnalyticsRepository implementation
// ============================================================================

#[async_trait]
impl AnalyticsRepository for DynamoDbRepository {
    async fn list_course_analytics(&self, course_id: &str) -> Result<Vec<Analytics>> {
        let items = self
            .query_partition(keys::analytics_pk(course_id), keys::analytics_sk_prefix(), false)
            .await?;

        items.iter().map(item_to_analytics).collect()
    }

    async fn save_analytics(&self, analytics: &Analytics) -> Result<()> {
        self.put_entity(
            &Entity::Analytics(analytics.clone()),
            format!("{}/{}", analytics.course_id, analytics.user_id),
        )
        .await
    }
}
