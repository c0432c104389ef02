//! Key generation functions for the single-table layout.
//!
//! Pure functions for building partition, sort and index keys.
//! All functions are sync and have no side effects. The prefixes are part of
//! the persisted format: existing data depends on them, so they never change.

// ============================================================================
// Key prefixes
// ============================================================================

pub const USER_PREFIX: &str = "USER#";
pub const PROGRESS_PREFIX: &str = "PROGRESS#";
pub const SESSION_PREFIX: &str = "SESSION#";
pub const ANALYTICS_PREFIX: &str = "ANALYTICS#";
pub const EMAIL_PREFIX: &str = "EMAIL#";
pub const GOOGLE_PREFIX: &str = "GOOGLE#";

/// Literal sort key of the Profile record.
pub const PROFILE_SK: &str = "PROFILE";

// ============================================================================
// Attribute names
// ============================================================================

pub const PK_ATTR: &str = "PK";
pub const SK_ATTR: &str = "SK";
pub const INDEX_PK_ATTR: &str = "GSI1PK";
pub const INDEX_SK_ATTR: &str = "GSI1SK";
pub const TTL_ATTR: &str = "TTL";
pub const ENTITY_TYPE_ATTR: &str = "entityType";

/// Name of the identity lookup index.
pub const IDENTITY_INDEX_NAME: &str = "GSI1";

// ============================================================================
// User-partition keys
// ============================================================================

/// Generate the partition key shared by a user's Profile, Progress and Session records.
///
/// Pattern: `USER#<user_id>`
pub fn user_pk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Generate the sort key for a Profile.
///
/// Pattern: `PROFILE`
pub fn profile_sk() -> &'static str {
    PROFILE_SK
}

/// Generate the sort key for a Progress record.
///
/// Pattern: `PROGRESS#<course_id>`
pub fn progress_sk(course_id: &str) -> String {
    format!("{PROGRESS_PREFIX}{course_id}")
}

/// Generate the sort key for a Session.
///
/// Pattern: `SESSION#<session_id>`
pub fn session_sk(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

/// Sort key prefix for listing a user's progress.
pub fn progress_sk_prefix() -> &'static str {
    PROGRESS_PREFIX
}

/// Sort key prefix for listing a user's sessions.
pub fn session_sk_prefix() -> &'static str {
    SESSION_PREFIX
}

// ============================================================================
// Analytics keys
// ============================================================================

/// Generate the partition key for a course's analytics rows.
///
/// Pattern: `ANALYTICS#<course_id>`
pub fn analytics_pk(course_id: &str) -> String {
    format!("{ANALYTICS_PREFIX}{course_id}")
}

/// Generate the sort key for one user's analytics row.
///
/// Pattern: `USER#<user_id>`
pub fn analytics_sk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Sort key prefix for listing all users of a course.
pub fn analytics_sk_prefix() -> &'static str {
    USER_PREFIX
}

// ============================================================================
// Identity-index keys
// ============================================================================

/// Generate the partition key of the identity-index record.
///
/// Pattern: `EMAIL#<email>`
pub fn email_pk(email: &str) -> String {
    format!("{EMAIL_PREFIX}{email}")
}

/// Generate the sort key of the identity-index record.
///
/// Pattern: `USER#<user_id>`
pub fn email_sk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Generate the index partition key for lookup by Google account.
///
/// Pattern: `GOOGLE#<google_id>`
pub fn google_index_pk(google_id: &str) -> String {
    format!("{GOOGLE_PREFIX}{google_id}")
}

/// Generate the index partition key for lookup by email.
///
/// Pattern: `EMAIL#<email>`
pub fn email_index_pk(email: &str) -> String {
    format!("{EMAIL_PREFIX}{email}")
}

/// Generate the index sort key pointing back at a user.
///
/// Pattern: `USER#<user_id>`
pub fn user_index_sk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Extract the user id from a `USER#<user_id>` key.
///
/// Returns `None` when the prefix is missing or the id segment is empty.
pub fn parse_user_key(key: &str) -> Option<&str> {
    key.strip_prefix(USER_PREFIX).filter(|id| !id.is_empty())
}
