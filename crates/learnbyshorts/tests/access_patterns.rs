//! Access-pattern tests against the in-memory backend.
//!
//! These go through the public `AccessLayer` with the mock identity verifier
//! and the JWT issuer, and inspect the table through a clone of the store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use learnbyshorts::storage::InMemoryRepository;
use learnbyshorts::{AccessError, AccessLayer, ClientContext};
use learnbyshorts_auth::{JwtIssuer, MockVerifier};
use learnbyshorts_core::auth::AuthError;
use learnbyshorts_core::clock::{Clock, ManualClock};
use learnbyshorts_core::keyspace::{decode, IdentityKey};
use learnbyshorts_core::learning::{
    Analytics, Profile, Progress, ProgressUpdate, Session, SessionId,
};
use learnbyshorts_core::storage::{
    AnalyticsRepository, ProfileRepository, ProgressRepository, RepositoryError, Result,
    SessionRepository,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

struct Harness {
    layer: AccessLayer,
    store: InMemoryRepository,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let store = InMemoryRepository::new();
    let clock = Arc::new(ManualClock::new(start()));
    let layer = AccessLayer::new(
        store.clone(),
        Arc::new(MockVerifier),
        Arc::new(JwtIssuer::new(b"integration-secret", Duration::days(7))),
    )
    .with_clock(clock.clone());

    Harness {
        layer,
        store,
        clock,
    }
}

fn update(course_id: &str, completed: &[&str], total: Option<u32>) -> ProgressUpdate {
    ProgressUpdate {
        course_id: course_id.to_string(),
        topic_index: completed.len() as u32,
        completed_topics: completed.iter().map(|t| t.to_string()).collect(),
        total_topics: total,
    }
}

async fn login(h: &Harness, google_id: &str, email: &str, name: Option<&str>) -> String {
    let assertion = MockVerifier::assertion(google_id, email, name, None);
    h.layer
        .login(&assertion, ClientContext::default())
        .await
        .unwrap()
        .user
        .id
}

#[tokio::test]
async fn test_first_login_scenario() {
    let h = harness();
    let user_id = login(&h, "g1", "a@x.com", Some("Alice")).await;

    // (USER#<id>, PROFILE) exists
    let profile = h.store.get_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(profile.name, "Alice");
    assert_eq!(profile.google_id, "g1");

    // (EMAIL#a@x.com, USER#<id>) exists
    assert_eq!(
        h.store
            .find_user_id(&IdentityKey::Email("a@x.com".to_string()))
            .await
            .unwrap(),
        Some(user_id.clone())
    );

    // Profile, identity-index record and the login session
    assert_eq!(h.store.record_count().await, 3);

    assert_eq!(
        h.layer
            .lookup_identity(&IdentityKey::Google("g1".to_string()))
            .await
            .unwrap(),
        user_id
    );

    h.layer
        .save_progress(&user_id, update("c1", &["t1", "t2"], Some(4)))
        .await
        .unwrap();

    let progress = h.layer.list_progress(&user_id).await.unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].course_id, "c1");
    assert_eq!(progress[0].completion_percentage(), 50.0);
}

#[tokio::test]
async fn test_save_then_list_returns_written_values() {
    let h = harness();
    h.layer
        .save_progress("u1", update("c1", &["t1"], Some(3)))
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(10));
    let written = h
        .layer
        .save_progress("u1", update("c1", &["t1", "t2", "t3"], Some(3)))
        .await
        .unwrap();

    let listed = h.layer.list_progress("u1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].completed_topics, written.completed_topics);
    assert_eq!(listed[0].topic_index, 3);
    assert_eq!(listed[0].completion_percentage(), 100.0);
    assert_eq!(listed[0].last_accessed, start() + Duration::minutes(10));
    // The overwrite keeps the first-save instant.
    assert_eq!(listed[0].created_at, start());
}

#[tokio::test]
async fn test_progress_is_listed_in_insertion_order() {
    let h = harness();
    for course in ["zeta", "alpha", "mid"] {
        h.layer
            .save_progress("u1", update(course, &["t1"], Some(2)))
            .await
            .unwrap();
    }
    h.layer
        .save_progress("u1", update("alpha", &["t1", "t2"], Some(2)))
        .await
        .unwrap();

    let courses: Vec<String> = h
        .layer
        .list_progress("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.course_id)
        .collect();
    assert_eq!(courses, vec!["zeta", "alpha", "mid"]);
}

#[tokio::test]
async fn test_list_progress_of_unknown_user_is_empty() {
    let h = harness();
    assert!(h.layer.list_progress("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_completion_percentage_bounds() {
    let h = harness();

    let none = h
        .layer
        .save_progress("u1", update("empty", &[], Some(0)))
        .await
        .unwrap();
    assert_eq!(none.completion_percentage(), 0.0);

    let over = h
        .layer
        .save_progress("u1", update("over", &["t1", "t2", "t3"], Some(2)))
        .await
        .unwrap();
    assert_eq!(over.completion_percentage(), 100.0);

    for progress in h.layer.list_progress("u1").await.unwrap() {
        let pct = progress.completion_percentage();
        assert!((0.0..=100.0).contains(&pct));
    }
}

#[tokio::test]
async fn test_identity_lookup_is_stable() {
    let h = harness();
    let user_id = login(&h, "g1", "a@x.com", None).await;
    let google = IdentityKey::Google("g1".to_string());

    for _ in 0..3 {
        assert_eq!(h.layer.lookup_identity(&google).await.unwrap(), user_id);
    }

    // A later login resolves to the same user.
    h.clock.advance(Duration::days(1));
    assert_eq!(login(&h, "g1", "a@x.com", None).await, user_id);
}

#[tokio::test]
async fn test_unknown_identity_is_not_found() {
    let h = harness();
    let result = h
        .layer
        .lookup_identity(&IdentityKey::Email("nobody@x.com".to_string()))
        .await;
    assert_eq!(result.unwrap_err().status_code(), 404);
}

#[tokio::test]
async fn test_expired_session_inserted_directly_is_never_valid() {
    let h = harness();
    let expired = Session::new(
        "u1",
        SessionId::new("old"),
        "tok",
        start() - Duration::days(8),
        Duration::days(7),
    );
    h.store.create_session(&expired).await.unwrap();

    // Physically present, logically absent.
    assert!(h
        .store
        .get_session("u1", &SessionId::new("old"))
        .await
        .unwrap()
        .is_some());
    assert!(matches!(
        h.layer.get_session("u1", &SessionId::new("old")).await,
        Err(AccessError::Repository(RepositoryError::NotFound { .. }))
    ));

    assert_eq!(h.store.purge_expired(h.clock.now()).await, 1);
}

#[tokio::test]
async fn test_concurrent_first_logins_create_one_user() {
    let h = harness();
    let assertion = MockVerifier::assertion("g1", "a@x.com", None, None);

    let (first, second) = tokio::join!(
        h.layer.login(&assertion, ClientContext::default()),
        h.layer.login(&assertion, ClientContext::default()),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.user.id, second.user.id);
    assert_eq!(
        [first.created, second.created].iter().filter(|c| **c).count(),
        1
    );
    // One profile, one identity-index record, two sessions
    assert_eq!(h.store.record_count().await, 4);
}

#[tokio::test]
async fn test_verify_credential_returns_profile() {
    let h = harness();
    let assertion = MockVerifier::assertion("g1", "a@x.com", Some("Alice"), None);
    let outcome = h
        .layer
        .login(&assertion, ClientContext::default())
        .await
        .unwrap();

    let profile = h.layer.verify_credential(&outcome.token).await.unwrap();
    assert_eq!(profile.user_id, outcome.user.id);
    assert_eq!(profile.email, "a@x.com");
}

#[tokio::test]
async fn test_authorize_keeps_failures_distinct() {
    let h = harness();
    let assertion = MockVerifier::assertion("g1", "a@x.com", None, None);
    let outcome = h
        .layer
        .login(&assertion, ClientContext::default())
        .await
        .unwrap();
    let header = format!("Bearer {}", outcome.token);

    let claims = h.layer.authorize(Some(&header)).unwrap();
    assert_eq!(claims.user_id, outcome.user.id);

    assert_eq!(
        h.layer.authorize(None),
        Err(AccessError::Unauthorized(AuthError::MissingCredential))
    );
    assert!(matches!(
        h.layer.authorize(Some("Token abc")),
        Err(AccessError::Unauthorized(AuthError::MalformedCredential(_)))
    ));
    assert!(matches!(
        h.layer.authorize(Some("Bearer not-a-jwt")),
        Err(AccessError::Unauthorized(AuthError::MalformedCredential(_)))
    ));

    h.clock.advance(Duration::days(7));
    assert_eq!(
        h.layer.authorize(Some(&header)),
        Err(AccessError::Unauthorized(AuthError::ExpiredCredential))
    );
    assert_eq!(h.layer.authorize(Some(&header)).unwrap_err().status_code(), 401);
}

#[tokio::test]
async fn test_course_analytics_cover_every_user() {
    let h = harness();
    for (user, seconds) in [("u1", 30), ("u2", 90)] {
        h.layer
            .record_analytics(Analytics::new("c1", user, start()).with_time_spent(seconds))
            .await
            .unwrap();
    }
    h.layer
        .record_analytics(Analytics::new("c2", "u1", start()))
        .await
        .unwrap();

    let rows = h.layer.list_course_analytics("c1").await.unwrap();
    let users: Vec<&str> = rows.iter().map(|a| a.user_id.as_str()).collect();
    assert_eq!(users, vec!["u1", "u2"]);
    assert_eq!(rows[1].time_spent_seconds, 90);
}

#[tokio::test]
async fn test_blank_identifiers_are_invalid() {
    let h = harness();
    assert_eq!(h.layer.get_profile("").await.unwrap_err().status_code(), 400);
    assert_eq!(
        h.layer
            .get_session("u1", &SessionId::new(" "))
            .await
            .unwrap_err()
            .status_code(),
        400
    );
}

#[test]
fn test_unrecognized_key_pair_is_rejected() {
    let error: RepositoryError = decode("ORDER#1", "ITEM#1").unwrap_err().into();
    assert!(matches!(error, RepositoryError::UnrecognizedKeyPattern { .. }));
}

#[tokio::test]
async fn test_progress_repository_is_usable_directly() {
    let h = harness();
    h.layer
        .save_progress("u1", update("c1", &["t1"], None))
        .await
        .unwrap();
    assert_eq!(h.store.list_progress("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_record_analytics_clamps_completion_rate() {
    let h = harness();
    let mut analytics = Analytics::new("c1", "u1", start());
    analytics.completion_rate = 250.0;

    let recorded = h.layer.record_analytics(analytics).await.unwrap();
    assert_eq!(recorded.completion_rate, 100.0);

    let listed = h.layer.list_course_analytics("c1").await.unwrap();
    assert_eq!(listed[0].completion_rate, 100.0);

    let mut negative = Analytics::new("c1", "u2", start());
    negative.completion_rate = -5.0;
    assert_eq!(
        h.layer.record_analytics(negative).await.unwrap().completion_rate,
        0.0
    );
}

/// Store whose identity index misses the first `misses` Google lookups,
/// the way an eventually consistent index lags a concurrent creation.
struct LaggingIndex {
    inner: InMemoryRepository,
    misses: AtomicUsize,
}

#[async_trait]
impl ProfileRepository for LaggingIndex {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.inner.get_profile(user_id).await
    }

    async fn find_user_id(&self, identity: &IdentityKey) -> Result<Option<String>> {
        let lagging = matches!(identity, IdentityKey::Google(_))
            && self
                .misses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if lagging {
            return Ok(None);
        }
        self.inner.find_user_id(identity).await
    }

    async fn create_user(&self, profile: &Profile) -> Result<()> {
        self.inner.create_user(profile).await
    }

    async fn touch_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.inner.touch_last_login(user_id, at).await
    }
}

#[async_trait]
impl ProgressRepository for LaggingIndex {
    async fn list_progress(&self, user_id: &str) -> Result<Vec<Progress>> {
        self.inner.list_progress(user_id).await
    }

    async fn save_progress(&self, progress: &Progress) -> Result<()> {
        self.inner.save_progress(progress).await
    }
}

#[async_trait]
impl SessionRepository for LaggingIndex {
    async fn create_session(&self, session: &Session) -> Result<()> {
        self.inner.create_session(session).await
    }

    async fn get_session(&self, user_id: &str, session_id: &SessionId) -> Result<Option<Session>> {
        self.inner.get_session(user_id, session_id).await
    }
}

#[async_trait]
impl AnalyticsRepository for LaggingIndex {
    async fn list_course_analytics(&self, course_id: &str) -> Result<Vec<Analytics>> {
        self.inner.list_course_analytics(course_id).await
    }

    async fn save_analytics(&self, analytics: &Analytics) -> Result<()> {
        self.inner.save_analytics(analytics).await
    }
}

fn lagging_layer(store: &InMemoryRepository, misses: usize) -> AccessLayer {
    AccessLayer::new(
        LaggingIndex {
            inner: store.clone(),
            misses: AtomicUsize::new(misses),
        },
        Arc::new(MockVerifier),
        Arc::new(JwtIssuer::new(b"integration-secret", Duration::days(7))),
    )
    .with_clock(Arc::new(ManualClock::new(start() + Duration::hours(1))))
}

#[tokio::test]
async fn test_login_losing_creation_race_resolves_to_winner() {
    let store = InMemoryRepository::new();
    let winner = Profile::new("winner", "g1", "a@x.com", "Alice", "", start());
    store.create_user(&winner).await.unwrap();

    // The first Google lookup misses the winner, so login tries to create.
    let layer = lagging_layer(&store, 1);
    let assertion = MockVerifier::assertion("g1", "a@x.com", None, None);
    let outcome = layer
        .login(&assertion, ClientContext::default())
        .await
        .unwrap();

    assert!(!outcome.created);
    assert_eq!(outcome.user.id, "winner");
    assert_eq!(outcome.user.name, "Alice");

    let profile = store.get_profile("winner").await.unwrap().unwrap();
    assert_eq!(profile.last_login, start() + Duration::hours(1));
    // Winner's pair plus the new session, no second user
    assert_eq!(store.record_count().await, 3);
}

#[tokio::test]
async fn test_login_losing_race_falls_back_to_email_lookup() {
    let store = InMemoryRepository::new();
    let winner = Profile::new("winner", "g1", "a@x.com", "Alice", "", start());
    store.create_user(&winner).await.unwrap();

    // Both Google lookups miss; the email index still finds the winner.
    let layer = lagging_layer(&store, 2);
    let assertion = MockVerifier::assertion("g1", "a@x.com", None, None);
    let outcome = layer
        .login(&assertion, ClientContext::default())
        .await
        .unwrap();

    assert_eq!(outcome.user.id, "winner");
    assert!(!outcome.created);
}
