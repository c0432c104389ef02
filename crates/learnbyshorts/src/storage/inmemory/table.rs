//! Ordered single-table emulation.
//!
//! Records live under their encoded `(PK, SK)` pair exactly as they would in
//! DynamoDB, so prefix queries and index lookups go through the same keyspace
//! codec as the real backend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use learnbyshorts_core::keyspace::{decode, encode, DecodedKey, EncodedKeys, Entity, KeyspaceError};
use learnbyshorts_core::learning::is_session_expired;

/// A stored record and the bookkeeping the store keeps for it.
#[derive(Debug, Clone)]
pub(super) struct Record {
    pub entity: Entity,
    pub keys: EncodedKeys,
    /// Position of the first write of this key. Overwrites keep it.
    pub seq: u64,
}

#[derive(Debug, Default)]
pub(super) struct Table {
    records: BTreeMap<(String, String), Record>,
    next_seq: u64,
}

impl Table {
    pub fn get(&self, pk: &str, sk: &str) -> Option<&Record> {
        self.records.get(&(pk.to_string(), sk.to_string()))
    }

    pub fn get_mut(&mut self, pk: &str, sk: &str) -> Option<&mut Record> {
        self.records.get_mut(&(pk.to_string(), sk.to_string()))
    }

    pub fn contains(&self, keys: &EncodedKeys) -> bool {
        self.records.contains_key(&(keys.pk.clone(), keys.sk.clone()))
    }

    /// Create or overwrite the record under the entity's keys.
    pub fn put(&mut self, entity: Entity) -> Result<EncodedKeys, KeyspaceError> {
        let keys = encode(&entity)?;
        let slot = (keys.pk.clone(), keys.sk.clone());

        let seq = match self.records.get(&slot) {
            Some(existing) => existing.seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };

        self.records.insert(
            slot,
            Record {
                entity,
                keys: keys.clone(),
                seq,
            },
        );
        Ok(keys)
    }

    /// Records of partition `pk` whose sort key starts with `sk_prefix`, in sort-key order.
    pub fn query_prefix<'a>(
        &'a self,
        pk: &'a str,
        sk_prefix: &'a str,
    ) -> impl Iterator<Item = &'a Record> + 'a {
        self.records
            .range((pk.to_string(), sk_prefix.to_string())..)
            .take_while(move |((p, s), _)| p == pk && s.starts_with(sk_prefix))
            .map(|(_, record)| record)
    }

    /// Decoded keys of every record carrying `index_key` on the secondary index.
    pub fn query_index(&self, index_key: &str) -> Result<Vec<DecodedKey>, KeyspaceError> {
        let mut matches: Vec<(&str, DecodedKey)> = Vec::new();
        for record in self.records.values() {
            let Some(index) = &record.keys.index else {
                continue;
            };
            if index.index_key == index_key {
                let decoded = decode(&record.keys.pk, &record.keys.sk)?;
                matches.push((index.index_sort_key.as_str(), decoded));
            }
        }
        matches.sort_by(|a, b| a.0.cmp(b.0));
        Ok(matches.into_iter().map(|(_, decoded)| decoded).collect())
    }

    /// Remove every session whose expiry is at or before `now`.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| match &record.entity {
            Entity::Session(session) => !is_session_expired(session, now),
            _ => true,
        });
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use learnbyshorts_core::learning::{
        Analytics, Profile, Progress, ProgressUpdate, Session, SessionId,
    };

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn progress(course_id: &str, completed: usize) -> Entity {
        Entity::Progress(Progress::record(
            "u1",
            ProgressUpdate {
                course_id: course_id.to_string(),
                topic_index: 0,
                completed_topics: (0..completed).map(|i| format!("t{i}")).collect(),
                total_topics: Some(10),
            },
            now(),
        ))
    }

    #[test]
    fn test_put_overwrite_keeps_sequence() {
        let mut table = Table::default();
        table.put(progress("c2", 1)).unwrap();
        table.put(progress("c1", 1)).unwrap();
        table.put(progress("c2", 5)).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("USER#u1", "PROGRESS#c2").unwrap().seq, 1);
        assert_eq!(table.get("USER#u1", "PROGRESS#c1").unwrap().seq, 2);
    }

    #[test]
    fn test_put_rejects_invalid_entity() {
        let mut table = Table::default();
        assert!(table.put(progress("", 1)).is_err());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_query_prefix_stays_in_partition() {
        let mut table = Table::default();
        let profile = Profile::new("u1", "g1", "a@x.com", "Alice", "", now());
        table.put(Entity::Profile(profile)).unwrap();
        table.put(progress("c1", 1)).unwrap();
        table.put(progress("c2", 1)).unwrap();
        table
            .put(Entity::Analytics(Analytics::new("c1", "u1", now())))
            .unwrap();
        let other = Profile::new("u2", "g2", "b@x.com", "Bob", "", now());
        table.put(Entity::Profile(other)).unwrap();

        let sks: Vec<&str> = table
            .query_prefix("USER#u1", "PROGRESS#")
            .map(|r| r.keys.sk.as_str())
            .collect();
        assert_eq!(sks, vec!["PROGRESS#c1", "PROGRESS#c2"]);
    }

    #[test]
    fn test_query_index_finds_profile_and_email_pointer() {
        let mut table = Table::default();
        let profile = Profile::new("u1", "g1", "a@x.com", "Alice", "", now());
        table
            .put(Entity::IdentityIndex(profile.identity_index()))
            .unwrap();
        table.put(Entity::Profile(profile)).unwrap();

        let by_google = table.query_index("GOOGLE#g1").unwrap();
        assert_eq!(by_google.len(), 1);
        assert_eq!(by_google[0].user_id(), "u1");

        let by_email = table.query_index("EMAIL#a@x.com").unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].user_id(), "u1");

        assert!(table.query_index("GOOGLE#nobody").unwrap().is_empty());
    }

    #[test]
    fn test_purge_expired_removes_only_expired_sessions() {
        let mut table = Table::default();
        let live = Session::new("u1", SessionId::new("live"), "t", now(), Duration::days(7));
        let dead = Session::new(
            "u1",
            SessionId::new("dead"),
            "t",
            now() - Duration::days(8),
            Duration::days(7),
        );
        table.put(Entity::Session(live)).unwrap();
        table.put(Entity::Session(dead)).unwrap();
        table.put(progress("c1", 1)).unwrap();

        assert_eq!(table.purge_expired(now()), 1);
        assert!(table.get("USER#u1", "SESSION#live").is_some());
        assert!(table.get("USER#u1", "SESSION#dead").is_none());
        assert_eq!(table.len(), 2);
    }
}
