//! Encode/decode boundary between typed entities and physical keys.
//!
//! Every record in the table goes through [`encode`] on the way in and
//! [`decode`] on the way out. Anything that does not match one of the five
//! known key shapes is rejected.

use crate::learning::{Analytics, IdentityIndex, Profile, Progress, Session};

use super::keys::{self, ANALYTICS_PREFIX, EMAIL_PREFIX, GOOGLE_PREFIX, USER_PREFIX};
use super::KeyspaceError;

/// A record of any entity type stored in the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Profile(Profile),
    Progress(Progress),
    Session(Session),
    Analytics(Analytics),
    IdentityIndex(IdentityIndex),
}

/// Discriminator of the five entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Profile,
    Progress,
    Session,
    Analytics,
    IdentityIndex,
}

impl EntityKind {
    /// Value of the `entityType` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "PROFILE",
            Self::Progress => "PROGRESS",
            Self::Session => "SESSION",
            Self::Analytics => "ANALYTICS",
            Self::IdentityIndex => "EMAIL_INDEX",
        }
    }

    /// Human readable name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Progress => "Progress",
            Self::Session => "Session",
            Self::Analytics => "Analytics",
            Self::IdentityIndex => "IdentityIndex",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Secondary index attributes of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKeys {
    pub index_key: String,
    pub index_sort_key: String,
}

/// Physical keys of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedKeys {
    pub pk: String,
    pub sk: String,
    pub index: Option<IndexKeys>,
}

/// Entity kind and identifiers recovered from a key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedKey {
    Profile { user_id: String },
    Progress { user_id: String, course_id: String },
    Session { user_id: String, session_id: String },
    Analytics { course_id: String, user_id: String },
    IdentityIndex { email: String, user_id: String },
}

impl DecodedKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Profile { .. } => EntityKind::Profile,
            Self::Progress { .. } => EntityKind::Progress,
            Self::Session { .. } => EntityKind::Session,
            Self::Analytics { .. } => EntityKind::Analytics,
            Self::IdentityIndex { .. } => EntityKind::IdentityIndex,
        }
    }

    /// The user every record kind belongs to.
    pub fn user_id(&self) -> &str {
        match self {
            Self::Profile { user_id }
            | Self::Progress { user_id, .. }
            | Self::Session { user_id, .. }
            | Self::Analytics { user_id, .. }
            | Self::IdentityIndex { user_id, .. } => user_id,
        }
    }
}

/// Alternate identity a user can be found by through the secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Google(String),
    Email(String),
}

impl IdentityKey {
    /// Value of `IndexKey` to query.
    pub fn index_key(&self) -> Result<String, KeyspaceError> {
        match self {
            Self::Google(google_id) => {
                require("IdentityKey", "google_id", google_id)?;
                Ok(keys::google_index_pk(google_id))
            }
            Self::Email(email) => {
                require("IdentityKey", "email", email)?;
                Ok(keys::email_index_pk(email))
            }
        }
    }

    /// Parse an `IndexKey` value back into the identity it names.
    pub fn from_index_key(index_key: &str) -> Result<Self, KeyspaceError> {
        let unrecognized = || KeyspaceError::UnrecognizedIndexKey(index_key.to_string());
        if let Some(google_id) = index_key.strip_prefix(GOOGLE_PREFIX) {
            non_empty(google_id)
                .map(|id| Self::Google(id.to_string()))
                .ok_or_else(unrecognized)
        } else if let Some(email) = index_key.strip_prefix(EMAIL_PREFIX) {
            non_empty(email)
                .map(|e| Self::Email(e.to_string()))
                .ok_or_else(unrecognized)
        } else {
            Err(unrecognized())
        }
    }
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Profile(_) => EntityKind::Profile,
            Self::Progress(_) => EntityKind::Progress,
            Self::Session(_) => EntityKind::Session,
            Self::Analytics(_) => EntityKind::Analytics,
            Self::IdentityIndex(_) => EntityKind::IdentityIndex,
        }
    }
}

/// Map an entity to its physical keys.
///
/// Deterministic: the same entity always yields the same keys. Fails with
/// [`KeyspaceError::InvalidEntity`] if an identifying field is blank.
pub fn encode(entity: &Entity) -> Result<EncodedKeys, KeyspaceError> {
    match entity {
        Entity::Profile(profile) => {
            require("Profile", "user_id", &profile.user_id)?;
            require("Profile", "google_id", &profile.google_id)?;
            require("Profile", "email", &profile.email)?;
            Ok(EncodedKeys {
                pk: keys::user_pk(&profile.user_id),
                sk: keys::profile_sk().to_string(),
                index: Some(IndexKeys {
                    index_key: keys::google_index_pk(&profile.google_id),
                    index_sort_key: keys::user_index_sk(&profile.user_id),
                }),
            })
        }
        Entity::Progress(progress) => {
            require("Progress", "user_id", &progress.user_id)?;
            require("Progress", "course_id", &progress.course_id)?;
            Ok(EncodedKeys {
                pk: keys::user_pk(&progress.user_id),
                sk: keys::progress_sk(&progress.course_id),
                index: None,
            })
        }
        Entity::Session(session) => {
            require("Session", "user_id", &session.user_id)?;
            require("Session", "session_id", session.session_id.as_str())?;
            Ok(EncodedKeys {
                pk: keys::user_pk(&session.user_id),
                sk: keys::session_sk(session.session_id.as_str()),
                index: None,
            })
        }
        Entity::Analytics(analytics) => {
            require("Analytics", "course_id", &analytics.course_id)?;
            require("Analytics", "user_id", &analytics.user_id)?;
            Ok(EncodedKeys {
                pk: keys::analytics_pk(&analytics.course_id),
                sk: keys::analytics_sk(&analytics.user_id),
                index: None,
            })
        }
        Entity::IdentityIndex(index) => {
            require("IdentityIndex", "email", &index.email)?;
            require("IdentityIndex", "user_id", &index.user_id)?;
            Ok(EncodedKeys {
                pk: keys::email_pk(&index.email),
                sk: keys::email_sk(&index.user_id),
                index: Some(IndexKeys {
                    index_key: keys::email_index_pk(&index.email),
                    index_sort_key: keys::user_index_sk(&index.user_id),
                }),
            })
        }
    }
}

/// Recover the entity kind and identifiers from a key pair.
///
/// Fails with [`KeyspaceError::UnrecognizedKeyPattern`] for any pair that is
/// not one of the five known shapes, including shapes with an empty id.
pub fn decode(pk: &str, sk: &str) -> Result<DecodedKey, KeyspaceError> {
    let unrecognized = || KeyspaceError::UnrecognizedKeyPattern {
        pk: pk.to_string(),
        sk: sk.to_string(),
    };

    if let Some(user_id) = pk.strip_prefix(USER_PREFIX) {
        let user_id = non_empty(user_id).ok_or_else(unrecognized)?.to_string();
        if sk == keys::PROFILE_SK {
            return Ok(DecodedKey::Profile { user_id });
        }
        if let Some(course_id) = sk.strip_prefix(keys::PROGRESS_PREFIX) {
            let course_id = non_empty(course_id).ok_or_else(unrecognized)?.to_string();
            return Ok(DecodedKey::Progress { user_id, course_id });
        }
        if let Some(session_id) = sk.strip_prefix(keys::SESSION_PREFIX) {
            let session_id = non_empty(session_id).ok_or_else(unrecognized)?.to_string();
            return Ok(DecodedKey::Session {
                user_id,
                session_id,
            });
        }
        return Err(unrecognized());
    }

    if let Some(course_id) = pk.strip_prefix(ANALYTICS_PREFIX) {
        let course_id = non_empty(course_id).ok_or_else(unrecognized)?.to_string();
        let user_id = keys::parse_user_key(sk).ok_or_else(unrecognized)?.to_string();
        return Ok(DecodedKey::Analytics { course_id, user_id });
    }

    if let Some(email) = pk.strip_prefix(EMAIL_PREFIX) {
        let email = non_empty(email).ok_or_else(unrecognized)?.to_string();
        let user_id = keys::parse_user_key(sk).ok_or_else(unrecognized)?.to_string();
        return Ok(DecodedKey::IdentityIndex { email, user_id });
    }

    Err(unrecognized())
}

fn require(
    entity_type: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), KeyspaceError> {
    if value.trim().is_empty() {
        return Err(KeyspaceError::InvalidEntity { entity_type, field });
    }
    Ok(())
}

fn non_empty(segment: &str) -> Option<&str> {
    (!segment.is_empty()).then_some(segment)
}
