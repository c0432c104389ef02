//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and domain types.
//! These are testable in isolation without DynamoDB access.
//!
//! Items are decoded from their `PK`/`SK` pair first; identifiers come from the
//! keys, never from duplicated attributes. Legacy items (no `entityType`, naive
//! ISO timestamps, no `total_topics`) stay readable.

use std::collections::HashMap;
use std::str::FromStr;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, NaiveDateTime, Utc};
use learnbyshorts_core::keyspace::{decode, encode, keys, DecodedKey, Entity, EntityKind};
use learnbyshorts_core::learning::{
    clamp_percentage, Analytics, IdentityIndex, Preferences, Profile, Progress, Session,
    SessionId,
};
use learnbyshorts_core::storage::RepositoryError;

pub type Item = HashMap<String, AttributeValue>;

// ============================================================================
// Attribute names
// ============================================================================

const GOOGLE_ID: &str = "google_id";
const EMAIL: &str = "email";
const NAME: &str = "name";
const AVATAR: &str = "avatar";
const PREFERENCES: &str = "preferences";
const CREATED_AT: &str = "created_at";
const LAST_LOGIN: &str = "last_login";
const USER_ID: &str = "user_id";
const COURSE_ID: &str = "course_id";
const TOPIC_INDEX: &str = "topic_index";
const COMPLETED_TOPICS: &str = "completed_topics";
const TOTAL_TOPICS: &str = "total_topics";
const COMPLETION_PERCENTAGE: &str = "completion_percentage";
const LAST_ACCESSED: &str = "last_accessed";
const UPDATED_AT: &str = "updated_at";
const SESSION_ID: &str = "session_id";
const SESSION_TOKEN: &str = "session_token";
const EXPIRES_AT: &str = "expires_at";
const DEVICE_INFO: &str = "device_info";
const IP_ADDRESS: &str = "ip_address";
const TIME_SPENT: &str = "time_spent";
const COMPLETION_RATE: &str = "completion_rate";
const AUDIO_USAGE: &str = "audio_usage";
const LAST_TOPIC: &str = "last_topic";

const AUDIO_ENABLED: &str = "audio_enabled";
const THEME: &str = "theme";
const LANGUAGE: &str = "language";

// ============================================================================
// Entity -> item
// ============================================================================

/// Convert an entity to a full DynamoDB item, keys included.
pub fn entity_to_item(entity: &Entity) -> Result<Item, RepositoryError> {
    let encoded = encode(entity)?;
    let mut item = Item::new();

    // Keys
    item.insert(keys::PK_ATTR.to_string(), s(encoded.pk));
    item.insert(keys::SK_ATTR.to_string(), s(encoded.sk));
    if let Some(index) = encoded.index {
        item.insert(keys::INDEX_PK_ATTR.to_string(), s(index.index_key));
        item.insert(keys::INDEX_SK_ATTR.to_string(), s(index.index_sort_key));
    }

    // Entity type
    item.insert(
        keys::ENTITY_TYPE_ATTR.to_string(),
        s(entity.kind().as_str()),
    );

    // Data
    match entity {
        Entity::Profile(profile) => {
            item.insert(GOOGLE_ID.to_string(), s(&profile.google_id));
            item.insert(EMAIL.to_string(), s(&profile.email));
            item.insert(NAME.to_string(), s(&profile.name));
            item.insert(AVATAR.to_string(), s(&profile.avatar));
            item.insert(PREFERENCES.to_string(), preferences_to_map(&profile.preferences));
            item.insert(CREATED_AT.to_string(), timestamp(profile.created_at));
            item.insert(LAST_LOGIN.to_string(), timestamp(profile.last_login));
        }
        Entity::Progress(progress) => {
            for (name, value) in progress_attributes(progress) {
                item.insert(name.to_string(), value);
            }
            item.insert(CREATED_AT.to_string(), timestamp(progress.created_at));
        }
        Entity::Session(session) => {
            let expires_at = session.expires_at.timestamp();
            item.insert(SESSION_ID.to_string(), s(session.session_id.as_str()));
            item.insert(SESSION_TOKEN.to_string(), s(&session.session_token));
            item.insert(EXPIRES_AT.to_string(), n(expires_at));
            item.insert(CREATED_AT.to_string(), timestamp(session.created_at));
            if let Some(device_info) = &session.device_info {
                item.insert(DEVICE_INFO.to_string(), s(device_info));
            }
            if let Some(ip_address) = &session.ip_address {
                item.insert(IP_ADDRESS.to_string(), s(ip_address));
            }
            item.insert(keys::TTL_ATTR.to_string(), n(expires_at));
        }
        Entity::Analytics(analytics) => {
            item.insert(COURSE_ID.to_string(), s(&analytics.course_id));
            item.insert(USER_ID.to_string(), s(&analytics.user_id));
            item.insert(TIME_SPENT.to_string(), n(analytics.time_spent_seconds));
            item.insert(COMPLETION_RATE.to_string(), n(analytics.completion_rate));
            item.insert(AUDIO_USAGE.to_string(), n(analytics.audio_usage));
            if let Some(last_topic) = &analytics.last_topic {
                item.insert(LAST_TOPIC.to_string(), s(last_topic));
            }
            item.insert(UPDATED_AT.to_string(), timestamp(analytics.updated_at));
        }
        Entity::IdentityIndex(index) => {
            item.insert(EMAIL.to_string(), s(&index.email));
            item.insert(USER_ID.to_string(), s(&index.user_id));
        }
    }

    Ok(item)
}

/// Attributes a progress save overwrites. `created_at` is not among them.
pub fn progress_attributes(progress: &Progress) -> Vec<(&'static str, AttributeValue)> {
    vec![
        (
            keys::ENTITY_TYPE_ATTR,
            s(EntityKind::Progress.as_str()),
        ),
        (COURSE_ID, s(&progress.course_id)),
        (TOPIC_INDEX, n(progress.topic_index)),
        (
            COMPLETED_TOPICS,
            AttributeValue::L(progress.completed_topics.iter().map(s).collect()),
        ),
        (TOTAL_TOPICS, n(progress.total_topics)),
        (COMPLETION_PERCENTAGE, n(progress.completion_percentage())),
        (LAST_ACCESSED, timestamp(progress.last_accessed)),
        (UPDATED_AT, timestamp(progress.updated_at)),
    ]
}

/// UpdateItem expression for a progress save.
///
/// Every attribute is overwritten except `created_at`, which is only set on
/// the first save so listings can keep insertion order.
pub struct ProgressUpdateExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

pub fn progress_update(progress: &Progress) -> ProgressUpdateExpression {
    let mut assignments = Vec::new();
    let mut names = HashMap::new();
    let mut values = HashMap::new();

    for (i, (name, value)) in progress_attributes(progress).into_iter().enumerate() {
        assignments.push(format!("#a{i} = :v{i}"));
        names.insert(format!("#a{i}"), name.to_string());
        values.insert(format!(":v{i}"), value);
    }

    assignments.push("#created = if_not_exists(#created, :created)".to_string());
    names.insert("#created".to_string(), CREATED_AT.to_string());
    values.insert(":created".to_string(), timestamp(progress.created_at));

    ProgressUpdateExpression {
        expression: format!("SET {}", assignments.join(", ")),
        names,
        values,
    }
}

// ============================================================================
// Item -> entity
// ============================================================================

/// Convert a DynamoDB item to the entity its keys name.
pub fn item_to_entity(item: &Item) -> Result<Entity, RepositoryError> {
    let pk = get_string(item, keys::PK_ATTR)?;
    let sk = get_string(item, keys::SK_ATTR)?;

    match decode(&pk, &sk)? {
        DecodedKey::Profile { user_id } => Ok(Entity::Profile(Profile {
            user_id,
            google_id: get_string(item, GOOGLE_ID)?,
            email: get_string(item, EMAIL)?,
            name: get_string(item, NAME)?,
            avatar: get_optional_string(item, AVATAR).unwrap_or_default(),
            preferences: get_preferences(item),
            created_at: get_datetime(item, CREATED_AT)?,
            last_login: get_datetime(item, LAST_LOGIN)?,
        })),
        DecodedKey::Progress { user_id, course_id } => {
            let last_accessed = get_datetime(item, LAST_ACCESSED)?;
            let updated_at = get_optional_datetime(item, UPDATED_AT)?.unwrap_or(last_accessed);
            let created_at = get_optional_datetime(item, CREATED_AT)?.unwrap_or(updated_at);

            Ok(Entity::Progress(Progress::restore(
                user_id,
                course_id,
                get_optional_number(item, TOPIC_INDEX)?.unwrap_or(0),
                get_string_list(item, COMPLETED_TOPICS)?,
                get_optional_number(item, TOTAL_TOPICS)?,
                get_optional_number(item, COMPLETION_PERCENTAGE)?,
                last_accessed,
                updated_at,
                created_at,
            )))
        }
        DecodedKey::Session {
            user_id,
            session_id,
        } => Ok(Entity::Session(Session {
            user_id,
            session_id: SessionId::new(session_id),
            session_token: get_string(item, SESSION_TOKEN)?,
            created_at: get_datetime(item, CREATED_AT)?,
            expires_at: get_epoch(item, EXPIRES_AT)?,
            device_info: get_optional_string(item, DEVICE_INFO),
            ip_address: get_optional_string(item, IP_ADDRESS),
        })),
        DecodedKey::Analytics { course_id, user_id } => Ok(Entity::Analytics(Analytics {
            course_id,
            user_id,
            time_spent_seconds: get_optional_number(item, TIME_SPENT)?.unwrap_or(0),
            completion_rate: clamp_percentage(
                get_optional_number(item, COMPLETION_RATE)?.unwrap_or(0.0),
            ),
            audio_usage: get_optional_number(item, AUDIO_USAGE)?.unwrap_or(0),
            last_topic: get_optional_string(item, LAST_TOPIC),
            updated_at: get_datetime(item, UPDATED_AT)?,
        })),
        DecodedKey::IdentityIndex { email, user_id } => {
            Ok(Entity::IdentityIndex(IdentityIndex { email, user_id }))
        }
    }
}

/// Convert an item and require a specific entity kind.
pub fn item_to_profile(item: &Item) -> Result<Profile, RepositoryError> {
    match item_to_entity(item)? {
        Entity::Profile(profile) => Ok(profile),
        other => Err(wrong_kind(EntityKind::Profile, other.kind())),
    }
}

pub fn item_to_progress(item: &Item) -> Result<Progress, RepositoryError> {
    match item_to_entity(item)? {
        Entity::Progress(progress) => Ok(progress),
        other => Err(wrong_kind(EntityKind::Progress, other.kind())),
    }
}

pub fn item_to_session(item: &Item) -> Result<Session, RepositoryError> {
    match item_to_entity(item)? {
        Entity::Session(session) => Ok(session),
        other => Err(wrong_kind(EntityKind::Session, other.kind())),
    }
}

pub fn item_to_analytics(item: &Item) -> Result<Analytics, RepositoryError> {
    match item_to_entity(item)? {
        Entity::Analytics(analytics) => Ok(analytics),
        other => Err(wrong_kind(EntityKind::Analytics, other.kind())),
    }
}

/// Extract the user ID an index entry points at from its `GSI1SK`.
pub fn index_item_user_id(item: &Item) -> Result<String, RepositoryError> {
    let index_sk = get_string(item, keys::INDEX_SK_ATTR)?;
    keys::parse_user_key(&index_sk)
        .map(str::to_string)
        .ok_or_else(|| {
            RepositoryError::InvalidData(format!("Invalid index sort key: {index_sk}"))
        })
}

fn wrong_kind(expected: EntityKind, found: EntityKind) -> RepositoryError {
    RepositoryError::InvalidData(format!(
        "Expected a {} record, found {}",
        expected.name(),
        found.name()
    ))
}

// ============================================================================
// Preferences
// ============================================================================

fn preferences_to_map(preferences: &Preferences) -> AttributeValue {
    AttributeValue::M(HashMap::from([
        (
            AUDIO_ENABLED.to_string(),
            AttributeValue::Bool(preferences.audio_enabled),
        ),
        (THEME.to_string(), s(&preferences.theme)),
        (LANGUAGE.to_string(), s(&preferences.language)),
    ]))
}

/// Missing or partial preferences fall back to the defaults field by field.
fn get_preferences(item: &Item) -> Preferences {
    let defaults = Preferences::default();
    let Some(map) = item.get(PREFERENCES).and_then(|v| v.as_m().ok()) else {
        return defaults;
    };

    Preferences {
        audio_enabled: map
            .get(AUDIO_ENABLED)
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(defaults.audio_enabled),
        theme: map
            .get(THEME)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or(defaults.theme),
        language: map
            .get(LANGUAGE)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or(defaults.language),
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

fn timestamp(at: DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(at.to_rfc3339())
}

/// Get a required string attribute.
fn get_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

/// Get an optional string attribute.
fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

/// Get an optional numeric attribute. Present but unparsable is an error.
fn get_optional_number<T: FromStr>(item: &Item, key: &str) -> Result<Option<T>, RepositoryError> {
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::N(raw)) => parse_number(raw, key).map(Some),
        Some(_) => Err(RepositoryError::InvalidData(format!(
            "Field {} is not a number",
            key
        ))),
    }
}

fn parse_number<T: FromStr>(raw: &str, key: &str) -> Result<T, RepositoryError> {
    raw.parse::<T>()
        .map_err(|_| RepositoryError::InvalidData(format!("Invalid number {}: {}", key, raw)))
}

/// Get a list of topic IDs. Numeric entries are kept as their decimal text.
fn get_string_list(item: &Item, key: &str) -> Result<Vec<String>, RepositoryError> {
    let Some(value) = item.get(key) else {
        return Ok(Vec::new());
    };

    let entries = match value {
        AttributeValue::L(list) => list,
        AttributeValue::Ss(set) => return Ok(set.clone()),
        _ => {
            return Err(RepositoryError::InvalidData(format!(
                "Field {} is not a list",
                key
            )))
        }
    };

    entries
        .iter()
        .map(|entry| match entry {
            AttributeValue::S(s) | AttributeValue::N(s) => Ok(s.clone()),
            _ => Err(RepositoryError::InvalidData(format!(
                "Field {} holds a non-scalar entry",
                key
            ))),
        })
        .collect()
}

/// Get a required epoch-seconds attribute.
fn get_epoch(item: &Item, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let secs: i64 = get_optional_number(item, key)?
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| RepositoryError::InvalidData(format!("Epoch out of range {}: {}", key, secs)))
}

/// Get a required datetime attribute.
fn get_datetime(item: &Item, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let raw = get_string(item, key)?;
    parse_datetime(&raw, key)
}

fn get_optional_datetime(item: &Item, key: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    get_optional_string(item, key)
        .map(|raw| parse_datetime(&raw, key))
        .transpose()
}

/// RFC 3339, or a naive ISO 8601 timestamp taken as UTC.
fn parse_datetime(raw: &str, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| RepositoryError::InvalidData(format!("Invalid datetime {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use learnbyshorts_core::learning::ProgressUpdate;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    fn sample_profile() -> Profile {
        Profile::new("u1", "g1", "a@x.com", "Alice", "https://img/a.png", now())
    }

    fn sample_progress() -> Progress {
        Progress::record(
            "u1",
            ProgressUpdate {
                course_id: "c1".to_string(),
                topic_index: 2,
                completed_topics: vec!["t1".to_string(), "t2".to_string()],
                total_topics: Some(4),
            },
            now(),
        )
    }

    fn get_s<'a>(item: &'a Item, key: &str) -> &'a str {
        item.get(key).unwrap().as_s().unwrap()
    }

    #[test]
    fn test_profile_item_has_correct_keys() {
        let item = entity_to_item(&Entity::Profile(sample_profile())).unwrap();

        assert_eq!(get_s(&item, "PK"), "USER#u1");
        assert_eq!(get_s(&item, "SK"), "PROFILE");
        assert_eq!(get_s(&item, "GSI1PK"), "GOOGLE#g1");
        assert_eq!(get_s(&item, "GSI1SK"), "USER#u1");
        assert_eq!(get_s(&item, "entityType"), "PROFILE");
        assert!(item.get("preferences").unwrap().as_m().is_ok());
    }

    #[test]
    fn test_profile_round_trip() {
        let profile = sample_profile();
        let item = entity_to_item(&Entity::Profile(profile.clone())).unwrap();
        assert_eq!(item_to_profile(&item).unwrap(), profile);
    }

    #[test]
    fn test_identity_index_item() {
        let item = entity_to_item(&Entity::IdentityIndex(sample_profile().identity_index())).unwrap();

        assert_eq!(get_s(&item, "PK"), "EMAIL#a@x.com");
        assert_eq!(get_s(&item, "SK"), "USER#u1");
        assert_eq!(get_s(&item, "GSI1PK"), "EMAIL#a@x.com");
        assert_eq!(index_item_user_id(&item).unwrap(), "u1");
    }

    #[test]
    fn test_session_item_carries_ttl() {
        let session = Session::new("u1", SessionId::new("s1"), "tok", now(), Duration::days(7));
        let item = entity_to_item(&Entity::Session(session.clone())).unwrap();

        let expected = (now() + Duration::days(7)).timestamp().to_string();
        assert_eq!(item.get("TTL").unwrap().as_n().unwrap(), &expected);
        assert_eq!(item.get("expires_at").unwrap().as_n().unwrap(), &expected);
        assert!(!item.contains_key("GSI1PK"));
        assert_eq!(item_to_session(&item).unwrap(), session);
    }

    #[test]
    fn test_progress_round_trip() {
        let progress = sample_progress();
        let item = entity_to_item(&Entity::Progress(progress.clone())).unwrap();

        let restored = item_to_progress(&item).unwrap();
        assert_eq!(restored, progress);
        assert_eq!(restored.completion_percentage(), 50.0);
    }

    #[test]
    fn test_analytics_round_trip_uses_persisted_names() {
        let analytics = Analytics::new("c1", "u1", now())
            .with_time_spent(95)
            .with_completion_rate(40.0)
            .with_audio_usage(3)
            .with_last_topic("t4");
        let item = entity_to_item(&Entity::Analytics(analytics.clone())).unwrap();

        assert_eq!(get_s(&item, "PK"), "ANALYTICS#c1");
        assert_eq!(item.get("time_spent").unwrap().as_n().unwrap(), "95");
        assert_eq!(item_to_analytics(&item).unwrap(), analytics);
    }

    #[test]
    fn test_reads_legacy_progress_item() {
        let item: Item = HashMap::from([
            ("PK".to_string(), s("USER#u1")),
            ("SK".to_string(), s("PROGRESS#c1")),
            ("course_id".to_string(), s("c1")),
            ("topic_index".to_string(), n(3)),
            (
                "completed_topics".to_string(),
                AttributeValue::L(vec![n(0), n(1), n(2)]),
            ),
            ("completion_percentage".to_string(), n(120.5)),
            ("last_accessed".to_string(), s("2024-01-15T10:30:00.123456")),
            ("updated_at".to_string(), s("2024-01-15T10:30:00.123456")),
        ]);

        let progress = item_to_progress(&item).unwrap();
        assert_eq!(progress.completed_topics, vec!["0", "1", "2"]);
        assert_eq!(progress.total_topics, 3);
        assert_eq!(progress.completion_percentage(), 100.0);
        assert_eq!(progress.created_at, progress.updated_at);
    }

    #[test]
    fn test_profile_without_preferences_uses_defaults() {
        let mut item = entity_to_item(&Entity::Profile(sample_profile())).unwrap();
        item.remove("preferences");
        assert_eq!(
            item_to_profile(&item).unwrap().preferences,
            Preferences::default()
        );
    }

    #[test]
    fn test_unrecognized_keys_are_rejected() {
        let item: Item = HashMap::from([
            ("PK".to_string(), s("ORDER#1")),
            ("SK".to_string(), s("ITEM#1")),
        ]);
        assert!(matches!(
            item_to_entity(&item),
            Err(RepositoryError::UnrecognizedKeyPattern { .. })
        ));
    }

    #[test]
    fn test_wrong_kind_is_invalid_data() {
        let item = entity_to_item(&Entity::Profile(sample_profile())).unwrap();
        assert!(matches!(
            item_to_session(&item),
            Err(RepositoryError::InvalidData(_))
        ));
    }

    #[test]
    fn test_get_string_missing_field() {
        let mut item = entity_to_item(&Entity::Profile(sample_profile())).unwrap();
        item.remove("email");
        assert!(matches!(
            item_to_profile(&item),
            Err(RepositoryError::InvalidData(_))
        ));
    }

    #[test]
    fn test_progress_update_keeps_created_at() {
        let update = progress_update(&sample_progress());

        assert!(update.expression.starts_with("SET "));
        assert!(update
            .expression
            .contains("#created = if_not_exists(#created, :created)"));
        assert_eq!(update.names.get("#created").unwrap(), "created_at");
        assert_eq!(update.names.len(), update.values.len());
        assert!(update.names.values().any(|name| name == "total_topics"));
    }

    #[test]
    fn test_progress_update_overwrites_every_written_attribute() {
        let progress = sample_progress();
        let item = entity_to_item(&Entity::Progress(progress.clone())).unwrap();
        let update = progress_update(&progress);

        for (name, value) in &item {
            if name == keys::PK_ATTR || name == keys::SK_ATTR {
                continue;
            }
            let (placeholder, _) = update
                .names
                .iter()
                .find(|(_, attr)| *attr == name)
                .unwrap_or_else(|| panic!("{name} is not in the update"));
            let value_key = placeholder.replacen('#', ":", 1);
            let value_key = if name == CREATED_AT {
                ":created".to_string()
            } else {
                value_key.replacen(":a", ":v", 1)
            };
            assert_eq!(update.values.get(&value_key), Some(value), "{name}");
        }
    }
}
