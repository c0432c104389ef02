//! In-memory repository implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use learnbyshorts_core::clock::Clock;
use learnbyshorts_core::keyspace::{keys, encode, Entity, EntityKind, IdentityKey};
use learnbyshorts_core::learning::{Analytics, Profile, Progress, Session, SessionId};
use learnbyshorts_core::storage::{
    AnalyticsRepository, ProfileRepository, ProgressRepository, RepositoryError, Result,
    SessionRepository,
};

use super::table::Table;
use crate::storage::single_user;

/// In-memory storage backend.
///
/// Uses one ordered table wrapped in `Arc<RwLock<_>>` for thread-safe access.
/// Clones share the same table. Data is lost when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    table: Arc<RwLock<Table>>,
}

impl InMemoryRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every session whose expiry is at or before `now`.
    ///
    /// Emulates the store's TTL reclamation. Readers never rely on it.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let purged = self.table.write().await.purge_expired(now);
        if purged > 0 {
            tracing::debug!(purged, "reclaimed expired sessions");
        }
        purged
    }

    /// Spawns a task that calls [`purge_expired`](Self::purge_expired) every `every`.
    pub fn spawn_expiry_sweeper(&self, clock: Arc<dyn Clock>, every: Duration) -> JoinHandle<()> {
        let repo = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                repo.purge_expired(clock.now()).await;
            }
        })
    }

    /// Number of physical records, expired sessions included.
    pub async fn record_count(&self) -> usize {
        self.table.read().await.len()
    }
}

fn unexpected_record(pk: &str, sk: &str, expected: EntityKind) -> RepositoryError {
    RepositoryError::InvalidData(format!(
        "record ({pk}, {sk}) is not a {}",
        expected.name()
    ))
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let pk = keys::user_pk(user_id);
        let table = self.table.read().await;

        match table.get(&pk, keys::profile_sk()) {
            Some(record) => match &record.entity {
                Entity::Profile(profile) => Ok(Some(profile.clone())),
                _ => Err(unexpected_record(&pk, keys::PROFILE_SK, EntityKind::Profile)),
            },
            None => Ok(None),
        }
    }

    async fn find_user_id(&self, identity: &IdentityKey) -> Result<Option<String>> {
        let index_key = identity.index_key()?;
        let table = self.table.read().await;

        let user_ids = table
            .query_index(&index_key)?
            .into_iter()
            .map(|decoded| decoded.user_id().to_string())
            .collect();

        single_user(identity, user_ids)
    }

    async fn create_user(&self, profile: &Profile) -> Result<()> {
        let profile_entity = Entity::Profile(profile.clone());
        let index_entity = Entity::IdentityIndex(profile.identity_index());
        let profile_keys = encode(&profile_entity)?;
        let index_keys = encode(&index_entity)?;

        // All checks and both writes happen under one write lock.
        let mut table = self.table.write().await;
        let email_taken = table
            .query_prefix(&index_keys.pk, keys::USER_PREFIX)
            .next()
            .is_some();
        if email_taken {
            return Err(RepositoryError::Conflict {
                entity_type: "IdentityIndex",
                id: profile.email.clone(),
            });
        }
        let google_index_key = keys::google_index_pk(&profile.google_id);
        if !table.query_index(&google_index_key)?.is_empty() {
            return Err(RepositoryError::Conflict {
                entity_type: "Identity",
                id: google_index_key,
            });
        }
        if table.contains(&profile_keys) {
            return Err(RepositoryError::Conflict {
                entity_type: "Profile",
                id: profile.user_id.clone(),
            });
        }

        table.put(profile_entity)?;
        table.put(index_entity)?;
        Ok(())
    }

    async fn touch_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let pk = keys::user_pk(user_id);
        let mut table = self.table.write().await;

        match table.get_mut(&pk, keys::profile_sk()) {
            Some(record) => match &mut record.entity {
                Entity::Profile(profile) => {
                    profile.last_login = at;
                    Ok(())
                }
                _ => Err(unexpected_record(&pk, keys::PROFILE_SK, EntityKind::Profile)),
            },
            None => Err(RepositoryError::NotFound {
                entity_type: "Profile",
                id: user_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn list_progress(&self, user_id: &str) -> Result<Vec<Progress>> {
        let pk = keys::user_pk(user_id);
        let table = self.table.read().await;

        let mut records: Vec<_> = table
            .query_prefix(&pk, keys::progress_sk_prefix())
            .collect();
        records.sort_by_key(|record| record.seq);

        records
            .into_iter()
            .map(|record| match &record.entity {
                Entity::Progress(progress) => Ok(progress.clone()),
                _ => Err(unexpected_record(
                    &record.keys.pk,
                    &record.keys.sk,
                    EntityKind::Progress,
                )),
            })
            .collect()
    }

    async fn save_progress(&self, progress: &Progress) -> Result<()> {
        let mut progress = progress.clone();
        let pk = keys::user_pk(&progress.user_id);
        let sk = keys::progress_sk(&progress.course_id);

        let mut table = self.table.write().await;
        if let Some(Entity::Progress(existing)) = table.get(&pk, &sk).map(|r| &r.entity) {
            progress.created_at = existing.created_at;
        }
        table.put(Entity::Progress(progress))?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut table = self.table.write().await;
        table.put(Entity::Session(session.clone()))?;
        Ok(())
    }

    async fn get_session(&self, user_id: &str, session_id: &SessionId) -> Result<Option<Session>> {
        let pk = keys::user_pk(user_id);
        let sk = keys::session_sk(session_id.as_str());
        let table = self.table.read().await;

        match table.get(&pk, &sk) {
            Some(record) => match &record.entity {
                Entity::Session(session) => Ok(Some(session.clone())),
                _ => Err(unexpected_record(&pk, &sk, EntityKind::Session)),
            },
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AnalyticsRepository for InMemoryRepository {
    async fn list_course_analytics(&self, course_id: &str) -> Result<Vec<Analytics>> {
        let pk = keys::analytics_pk(course_id);
        let table = self.table.read().await;

        table
            .query_prefix(&pk, keys::analytics_sk_prefix())
            .map(|record| match &record.entity {
                Entity::Analytics(analytics) => Ok(analytics.clone()),
                _ => Err(unexpected_record(
                    &record.keys.pk,
                    &record.keys.sk,
                    EntityKind::Analytics,
                )),
            })
            .collect()
    }

    async fn save_analytics(&self, analytics: &Analytics) -> Result<()> {
        let mut table = self.table.write().await;
        table.put(Entity::Analytics(analytics.clone()))?;
        Ok(())
    }
}
