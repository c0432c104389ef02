use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::functions::{calculate_expiry, clamp_percentage, completion_percentage};

/// Per-user display and playback preferences stored on the Profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub audio_enabled: bool,
    pub theme: String,
    pub language: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            theme: "light".to_string(),
            language: "en".to_string(),
        }
    }
}

/// A user's profile. One per user, created at first login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub avatar: String,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl Profile {
    /// Creates a profile for a first login at `now` with default preferences.
    pub fn new(
        user_id: impl Into<String>,
        google_id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        avatar: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            google_id: google_id.into(),
            email: email.into(),
            name: name.into(),
            avatar: avatar.into(),
            preferences: Preferences::default(),
            created_at: now,
            last_login: now,
        }
    }

    /// The denormalized pointer record written alongside this profile.
    pub fn identity_index(&self) -> IdentityIndex {
        IdentityIndex {
            email: self.email.clone(),
            user_id: self.user_id.clone(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.user_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Public view of a user returned after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: String,
}

/// Pointer from an email address to the user who owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityIndex {
    pub email: String,
    pub user_id: String,
}

/// Input of a progress save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub course_id: String,
    pub topic_index: u32,
    pub completed_topics: Vec<String>,
    /// Defaults to the number of completed topics when absent.
    pub total_topics: Option<u32>,
}

/// Learning progress of one user in one course.
///
/// The completion percentage is derived from the topic counts and cannot be
/// set independently. Deserialized records go through [`Progress::restore`],
/// so a serialized percentage is recomputed rather than trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredProgress")]
pub struct Progress {
    pub user_id: String,
    pub course_id: String,
    pub topic_index: u32,
    pub completed_topics: Vec<String>,
    pub total_topics: u32,
    completion_percentage: f64,
    pub last_accessed: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Instant of the first save for this course. Overwrites keep it.
    pub created_at: DateTime<Utc>,
}

impl Progress {
    /// Builds the record written by a progress save at `now`.
    pub fn record(user_id: impl Into<String>, update: ProgressUpdate, now: DateTime<Utc>) -> Self {
        let total_topics = update
            .total_topics
            .unwrap_or(update.completed_topics.len() as u32);
        let completion_percentage =
            completion_percentage(update.completed_topics.len(), total_topics);

        Self {
            user_id: user_id.into(),
            course_id: update.course_id,
            topic_index: update.topic_index,
            completed_topics: update.completed_topics,
            total_topics,
            completion_percentage,
            last_accessed: now,
            updated_at: now,
            created_at: now,
        }
    }

    /// Rebuilds a stored record.
    ///
    /// When `total_topics` is missing (records written before it was persisted)
    /// the stored percentage is kept, clamped to `[0, 100]`, and the total is
    /// taken as the number of completed topics.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        user_id: String,
        course_id: String,
        topic_index: u32,
        completed_topics: Vec<String>,
        total_topics: Option<u32>,
        stored_percentage: Option<f64>,
        last_accessed: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (total_topics, completion_percentage) = match total_topics {
            Some(total) => (total, completion_percentage(completed_topics.len(), total)),
            None => (
                completed_topics.len() as u32,
                clamp_percentage(stored_percentage.unwrap_or(0.0)),
            ),
        };

        Self {
            user_id,
            course_id,
            topic_index,
            completed_topics,
            total_topics,
            completion_percentage,
            last_accessed,
            updated_at,
            created_at,
        }
    }

    pub fn completion_percentage(&self) -> f64 {
        self.completion_percentage
    }
}

#[derive(Deserialize)]
struct StoredProgress {
    user_id: String,
    course_id: String,
    #[serde(default)]
    topic_index: u32,
    #[serde(default)]
    completed_topics: Vec<String>,
    #[serde(default)]
    total_topics: Option<u32>,
    #[serde(default)]
    completion_percentage: Option<f64>,
    last_accessed: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<StoredProgress> for Progress {
    fn from(stored: StoredProgress) -> Self {
        Progress::restore(
            stored.user_id,
            stored.course_id,
            stored.topic_index,
            stored.completed_topics,
            stored.total_topics,
            stored.completion_percentage,
            stored.last_accessed,
            stored.updated_at,
            stored.created_at,
        )
    }
}

/// Cryptographically random session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A login session. Logically deleted once `expires_at` has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub session_id: SessionId,
    pub session_token: String,
    pub created_at: DateTime<Utc>,
    /// Whole seconds; this is also the store's TTL attribute.
    pub expires_at: DateTime<Utc>,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
}

impl Session {
    /// Creates a session that expires `ttl` after `now`.
    pub fn new(
        user_id: impl Into<String>,
        session_id: SessionId,
        session_token: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id,
            session_token: session_token.into(),
            created_at: now,
            expires_at: calculate_expiry(now, ttl),
            device_info: None,
            ip_address: None,
        }
    }

    pub fn with_device_info(mut self, device_info: impl Into<String>) -> Self {
        self.device_info = Some(device_info.into());
        self
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }
}

/// Per-user analytics row of one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub course_id: String,
    pub user_id: String,
    pub time_spent_seconds: u64,
    /// Percentage in `[0, 100]`.
    pub completion_rate: f64,
    /// Number of audio playbacks.
    pub audio_usage: u32,
    pub last_topic: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Analytics {
    pub fn new(
        course_id: impl Into<String>,
        user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            user_id: user_id.into(),
            time_spent_seconds: 0,
            completion_rate: 0.0,
            audio_usage: 0,
            last_topic: None,
            updated_at: now,
        }
    }

    pub fn with_time_spent(mut self, seconds: u64) -> Self {
        self.time_spent_seconds = seconds;
        self
    }

    pub fn with_completion_rate(mut self, rate: f64) -> Self {
        self.completion_rate = clamp_percentage(rate);
        self
    }

    pub fn with_audio_usage(mut self, plays: u32) -> Self {
        self.audio_usage = plays;
        self
    }

    pub fn with_last_topic(mut self, topic: impl Into<String>) -> Self {
        self.last_topic = Some(topic.into());
        self
    }
}
