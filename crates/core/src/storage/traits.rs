use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::keyspace::IdentityKey;
use crate::learning::{Analytics, Profile, Progress, Session, SessionId};

use super::Result;

/// Repository for profile and identity operations.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Gets a profile by its user ID.
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Resolves an alternate identity to a user ID through the secondary index.
    ///
    /// Returns `Conflict` if more than one user carries the identity.
    async fn find_user_id(&self, identity: &IdentityKey) -> Result<Option<String>>;

    /// Writes a profile and its identity-index record as one unit.
    ///
    /// Fails with `Conflict` and writes nothing if the user ID, the email or
    /// the Google id is already taken.
    async fn create_user(&self, profile: &Profile) -> Result<()>;

    /// Sets `last_login` without touching any other profile attribute.
    ///
    /// Fails with `NotFound` if the profile does not exist.
    async fn touch_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Repository for learning progress operations.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Gets all progress records of a user, oldest course first.
    async fn list_progress(&self, user_id: &str) -> Result<Vec<Progress>>;

    /// Overwrites the progress record of `(user, course)`.
    ///
    /// The first-save `created_at` of an existing record is kept.
    async fn save_progress(&self, progress: &Progress) -> Result<()>;
}

/// Repository for login sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Stores a new session.
    async fn create_session(&self, session: &Session) -> Result<()>;

    /// Gets a session as stored, expired or not.
    ///
    /// Expiry is applied by the caller against its clock.
    async fn get_session(&self, user_id: &str, session_id: &SessionId) -> Result<Option<Session>>;
}

/// Repository for per-course analytics.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// Gets the analytics rows of every user of a course.
    async fn list_course_analytics(&self, course_id: &str) -> Result<Vec<Analytics>>;

    /// Creates or overwrites the analytics row of `(course, user)`.
    async fn save_analytics(&self, analytics: &Analytics) -> Result<()>;
}
