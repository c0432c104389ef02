//! Access-pattern layer.
//!
//! Every read and write the application performs against the single table
//! goes through [`AccessLayer`]. It owns no state of its own: repositories,
//! identity verifier, credential issuer and clock are all injected, and every
//! store call runs under the configured retry policy.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use learnbyshorts_core::auth::{
    bearer_token, email_to_name, CredentialClaims, CredentialIssuer, IdentityVerifier,
};
use learnbyshorts_core::clock::{Clock, SystemClock};
use learnbyshorts_core::keyspace::IdentityKey;
use learnbyshorts_core::learning::{
    clamp_percentage, generate_session_id, generate_user_id, is_session_expired, Analytics,
    Profile, Progress, ProgressUpdate, Session, SessionId, UserSummary,
};
use learnbyshorts_core::storage::{
    AnalyticsRepository, ProfileRepository, ProgressRepository, RepositoryError,
    SessionRepository,
};

use crate::config::Config;
use crate::error::{AccessError, Result};
use crate::retry::{with_retry, RetryConfig};

const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

/// Where a session was opened from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginOutcome {
    /// Bearer credential for subsequent requests.
    pub token: String,
    pub session_id: SessionId,
    pub user: UserSummary,
    /// Whether this login created the user.
    pub created: bool,
}

/// Access-pattern layer over the single table.
#[derive(Clone)]
pub struct AccessLayer {
    profiles: Arc<dyn ProfileRepository>,
    progress: Arc<dyn ProgressRepository>,
    sessions: Arc<dyn SessionRepository>,
    analytics: Arc<dyn AnalyticsRepository>,
    verifier: Arc<dyn IdentityVerifier>,
    credentials: Arc<dyn CredentialIssuer>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    retry: RetryConfig,
}

impl AccessLayer {
    /// Creates an access layer over one store backing every repository.
    ///
    /// Uses the system clock, a 7 day session lifetime and the default retry
    /// policy; see the `with_*` methods to change them.
    pub fn new<S>(
        store: S,
        verifier: Arc<dyn IdentityVerifier>,
        credentials: Arc<dyn CredentialIssuer>,
    ) -> Self
    where
        S: ProfileRepository + ProgressRepository + SessionRepository + AnalyticsRepository + 'static,
    {
        let store = Arc::new(store);
        Self {
            profiles: store.clone(),
            progress: store.clone(),
            sessions: store.clone(),
            analytics: store,
            verifier,
            credentials,
            clock: Arc::new(SystemClock),
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
            retry: RetryConfig::default(),
        }
    }

    /// Creates an access layer using the session lifetime and retry policy of `config`.
    pub fn from_config<S>(
        store: S,
        verifier: Arc<dyn IdentityVerifier>,
        credentials: Arc<dyn CredentialIssuer>,
        config: &Config,
    ) -> Self
    where
        S: ProfileRepository + ProgressRepository + SessionRepository + AnalyticsRepository + 'static,
    {
        Self::new(store, verifier, credentials)
            .with_session_ttl(config.session_ttl())
            .with_retry(config.retry.clone())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Log in with an identity-provider assertion.
    ///
    /// Looks the user up by Google id and creates the user on first login.
    /// A creation lost to a concurrent login of the same identity is
    /// recovered by re-reading the winner through the email index. Issues a
    /// credential and opens a session carrying it.
    pub async fn login(&self, assertion: &str, context: ClientContext) -> Result<LoginOutcome> {
        let claims = self.verifier.verify(assertion).await?;
        require("external_id", &claims.external_id)?;
        require("email", &claims.email)?;
        let now = self.clock.now();

        let google = IdentityKey::Google(claims.external_id.clone());
        let existing = with_retry(&self.retry, || self.profiles.find_user_id(&google)).await?;

        let (profile, created) = match existing {
            Some(user_id) => (self.returning_user(&user_id).await?, false),
            None => {
                let profile = Profile::new(
                    generate_user_id(),
                    &claims.external_id,
                    &claims.email,
                    claims
                        .display_name
                        .clone()
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| email_to_name(&claims.email)),
                    claims.avatar_url.clone().unwrap_or_default(),
                    now,
                );

                match with_retry(&self.retry, || self.profiles.create_user(&profile)).await {
                    Ok(()) => {
                        tracing::info!(user_id = %profile.user_id, "new user created");
                        (profile, true)
                    }
                    Err(RepositoryError::Conflict { entity_type, id }) => {
                        tracing::warn!(entity_type, %id, "user creation lost a race, re-reading winner");
                        (self.recover_lost_creation(&claims.external_id, &claims.email).await?, false)
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        };

        let token = self
            .credentials
            .issue(&profile.user_id, &profile.email, now)?;
        let session = self
            .create_session(&profile.user_id, &token, context)
            .await?;

        tracing::info!(user_id = %profile.user_id, created, "login succeeded");
        Ok(LoginOutcome {
            token,
            session_id: session.session_id,
            user: profile.summary(),
            created,
        })
    }

    /// Validate a bearer credential and return the profile it names.
    pub async fn verify_credential(&self, token: &str) -> Result<Profile> {
        let claims = self.credentials.validate(token, self.clock.now())?;
        self.get_profile(&claims.user_id).await
    }

    /// Turn an `Authorization` header value into credential claims.
    ///
    /// A missing header, a malformed one and an expired credential stay
    /// distinct as `Unauthorized(MissingCredential)`, `Unauthorized(MalformedCredential)`
    /// and `Unauthorized(ExpiredCredential)`.
    pub fn authorize(&self, header: Option<&str>) -> Result<CredentialClaims> {
        let token = bearer_token(header)?;
        Ok(self.credentials.validate(token, self.clock.now())?)
    }

    async fn returning_user(&self, user_id: &str) -> Result<Profile> {
        self.update_last_login(user_id).await?;
        self.get_profile(user_id).await
    }

    async fn recover_lost_creation(&self, google_id: &str, email: &str) -> Result<Profile> {
        let google = IdentityKey::Google(google_id.to_string());
        if let Some(winner) = with_retry(&self.retry, || self.profiles.find_user_id(&google)).await? {
            return self.returning_user(&winner).await;
        }

        let by_email = IdentityKey::Email(email.to_string());
        let winner = with_retry(&self.retry, || self.profiles.find_user_id(&by_email))
            .await?
            .ok_or_else(|| AccessError::not_found("Identity", email))?;

        let profile = self.get_profile(&winner).await?;
        if profile.google_id != google_id {
            tracing::warn!(
                user_id = %profile.user_id,
                "email already belongs to another identity"
            );
            return Err(RepositoryError::Conflict {
                entity_type: "IdentityIndex",
                id: email.to_string(),
            }
            .into());
        }
        self.returning_user(&winner).await
    }

    // ========================================================================
    // Profiles and identities
    // ========================================================================

    /// Point lookup of a profile. `NotFound` if absent.
    pub async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        require("user_id", user_id)?;
        with_retry(&self.retry, || self.profiles.get_profile(user_id))
            .await?
            .ok_or_else(|| AccessError::not_found("Profile", user_id))
    }

    /// Resolve a Google id or email to the user ID it belongs to. `NotFound` if absent.
    pub async fn lookup_identity(&self, identity: &IdentityKey) -> Result<String> {
        let index_key = identity.index_key().map_err(RepositoryError::from)?;
        with_retry(&self.retry, || self.profiles.find_user_id(identity))
            .await?
            .ok_or_else(|| AccessError::not_found("Identity", index_key))
    }

    /// Set `last_login` to now. Leaves every other profile attribute alone.
    pub async fn update_last_login(&self, user_id: &str) -> Result<()> {
        require("user_id", user_id)?;
        let now = self.clock.now();
        with_retry(&self.retry, || self.profiles.touch_last_login(user_id, now)).await?;
        Ok(())
    }

    // ========================================================================
    // Progress
    // ========================================================================

    /// All progress records of a user, in the order the courses were first saved.
    pub async fn list_progress(&self, user_id: &str) -> Result<Vec<Progress>> {
        require("user_id", user_id)?;
        Ok(with_retry(&self.retry, || self.progress.list_progress(user_id)).await?)
    }

    /// Overwrite the progress of `(user, course)` and return the written record.
    pub async fn save_progress(&self, user_id: &str, update: ProgressUpdate) -> Result<Progress> {
        require("user_id", user_id)?;
        require("course_id", &update.course_id)?;

        let progress = Progress::record(user_id, update, self.clock.now());
        with_retry(&self.retry, || self.progress.save_progress(&progress)).await?;

        tracing::debug!(
            user_id,
            course_id = %progress.course_id,
            completion = progress.completion_percentage(),
            "progress saved"
        );
        Ok(progress)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Open a session carrying `session_token` that expires after the session lifetime.
    pub async fn create_session(
        &self,
        user_id: &str,
        session_token: &str,
        context: ClientContext,
    ) -> Result<Session> {
        require("user_id", user_id)?;

        let mut session = Session::new(
            user_id,
            generate_session_id(),
            session_token,
            self.clock.now(),
            self.session_ttl,
        );
        session.device_info = context.device_info;
        session.ip_address = context.ip_address;

        with_retry(&self.retry, || self.sessions.create_session(&session)).await?;
        Ok(session)
    }

    /// Fetch a session. Expired sessions are `NotFound` even if still stored.
    pub async fn get_session(&self, user_id: &str, session_id: &SessionId) -> Result<Session> {
        require("user_id", user_id)?;
        require("session_id", session_id.as_str())?;

        let stored = with_retry(&self.retry, || self.sessions.get_session(user_id, session_id))
            .await?;

        match stored {
            Some(session) if !is_session_expired(&session, self.clock.now()) => Ok(session),
            Some(_) => {
                tracing::debug!(user_id, %session_id, "session expired");
                Err(AccessError::not_found("Session", session_id.as_str()))
            }
            None => Err(AccessError::not_found("Session", session_id.as_str())),
        }
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    /// Per-user analytics rows of a course.
    pub async fn list_course_analytics(&self, course_id: &str) -> Result<Vec<Analytics>> {
        require("course_id", course_id)?;
        Ok(with_retry(&self.retry, || self.analytics.list_course_analytics(course_id)).await?)
    }

    /// Create or overwrite the `(course, user)` analytics row, stamped with now.
    ///
    /// The completion rate is clamped to `[0, 100]` before it is stored.
    pub async fn record_analytics(&self, mut analytics: Analytics) -> Result<Analytics> {
        require("course_id", &analytics.course_id)?;
        require("user_id", &analytics.user_id)?;

        analytics.completion_rate = clamp_percentage(analytics.completion_rate);
        analytics.updated_at = self.clock.now();
        with_retry(&self.retry, || self.analytics.save_analytics(&analytics)).await?;
        Ok(analytics)
    }
}

impl std::fmt::Debug for AccessLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessLayer")
            .field("clock", &self.clock)
            .field("session_ttl", &self.session_ttl)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AccessError::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use learnbyshorts_auth::{JwtIssuer, MockVerifier};
    use learnbyshorts_core::auth::AuthError;
    use learnbyshorts_core::clock::ManualClock;

    use super::*;
    use crate::storage::InMemoryRepository;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn layer() -> (AccessLayer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let layer = AccessLayer::new(
            InMemoryRepository::new(),
            Arc::new(MockVerifier),
            Arc::new(JwtIssuer::new(b"test-secret", Duration::days(7))),
        )
        .with_clock(clock.clone());
        (layer, clock)
    }

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("user_id", "u1").is_ok());
        assert!(matches!(
            require("user_id", "  "),
            Err(AccessError::Repository(RepositoryError::InvalidEntity(_)))
        ));
    }

    #[tokio::test]
    async fn test_login_creates_then_reuses_user() {
        let (layer, clock) = layer();
        let assertion = MockVerifier::assertion("g1", "alice@x.com", None, None);

        let first = layer.login(&assertion, ClientContext::default()).await.unwrap();
        assert!(first.created);
        assert_eq!(first.user.name, "alice");

        clock.advance(Duration::hours(1));
        let second = layer.login(&assertion, ClientContext::default()).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.user.id, first.user.id);
        assert_ne!(second.session_id, first.session_id);

        let profile = layer.get_profile(&first.user.id).await.unwrap();
        assert_eq!(profile.created_at, start());
        assert_eq!(profile.last_login, start() + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_login_rejects_invalid_assertion() {
        let (layer, _) = layer();
        let result = layer.login("not base64 json", ClientContext::default()).await;
        assert!(matches!(
            result,
            Err(AccessError::Unauthorized(AuthError::InvalidAssertion(_)))
        ));
    }

    #[tokio::test]
    async fn test_login_opens_session_with_context() {
        let (layer, _) = layer();
        let assertion = MockVerifier::assertion("g1", "a@x.com", Some("Alice"), None);
        let context = ClientContext {
            device_info: Some("iPhone".to_string()),
            ip_address: Some("10.0.0.1".to_string()),
        };

        let outcome = layer.login(&assertion, context).await.unwrap();
        let session = layer
            .get_session(&outcome.user.id, &outcome.session_id)
            .await
            .unwrap();

        assert_eq!(session.session_token, outcome.token);
        assert_eq!(session.device_info.as_deref(), Some("iPhone"));
        assert_eq!(session.expires_at, start() + Duration::days(7));
    }

    #[tokio::test]
    async fn test_login_for_email_owned_by_other_identity_is_conflict() {
        let (layer, _) = layer();
        layer
            .login(&MockVerifier::assertion("g1", "a@x.com", None, None), ClientContext::default())
            .await
            .unwrap();

        let result = layer
            .login(&MockVerifier::assertion("g2", "a@x.com", None, None), ClientContext::default())
            .await;

        assert!(matches!(
            result,
            Err(AccessError::Repository(RepositoryError::Conflict { .. }))
        ));
    }

    #[tokio::test]
    async fn test_session_expires_at_boundary() {
        let (layer, clock) = layer();
        let session = layer
            .create_session("u1", "tok", ClientContext::default())
            .await
            .unwrap();

        clock.advance(Duration::days(7) - Duration::seconds(1));
        assert!(layer.get_session("u1", &session.session_id).await.is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(
            layer.get_session("u1", &session.session_id).await,
            Err(AccessError::not_found("Session", session.session_id.as_str()))
        );
    }

    #[tokio::test]
    async fn test_session_ttl_is_configurable() {
        let (layer, clock) = layer();
        let layer = layer.with_session_ttl(Duration::hours(1));
        let session = layer
            .create_session("u1", "tok", ClientContext::default())
            .await
            .unwrap();

        clock.advance(Duration::hours(2));
        assert!(layer.get_session("u1", &session.session_id).await.is_err());
    }

    #[tokio::test]
    async fn test_save_progress_rejects_blank_course() {
        let (layer, _) = layer();
        let result = layer
            .save_progress(
                "u1",
                ProgressUpdate {
                    course_id: " ".to_string(),
                    topic_index: 0,
                    completed_topics: vec![],
                    total_topics: None,
                },
            )
            .await;

        assert_eq!(result.unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn test_update_last_login_missing_profile() {
        let (layer, _) = layer();
        assert_eq!(
            layer.update_last_login("ghost").await.unwrap_err().status_code(),
            404
        );
    }

    #[tokio::test]
    async fn test_record_analytics_stamps_now() {
        let (layer, clock) = layer();
        clock.advance(Duration::minutes(5));

        let recorded = layer
            .record_analytics(Analytics::new("c1", "u1", start()).with_time_spent(30))
            .await
            .unwrap();

        assert_eq!(recorded.updated_at, start() + Duration::minutes(5));
        assert_eq!(layer.list_course_analytics("c1").await.unwrap(), vec![recorded]);
    }
}
