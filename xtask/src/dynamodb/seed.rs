//! Seed command implementation.

use super::error::Result;
use chrono::{DateTime, Duration, Utc};
use learnbyshorts_core::keyspace::IdentityKey;
use learnbyshorts_core::learning::{generate_user_id, Analytics, Profile, Progress, ProgressUpdate};
use learnbyshorts_core::storage::{AnalyticsRepository, ProfileRepository, ProgressRepository};

const COURSES: [(&str, u32); 6] = [
    ("rust-basics", 12),
    ("aws-dynamodb", 8),
    ("spanish-a1", 20),
    ("photography", 10),
    ("music-theory", 15),
    ("speed-reading", 6),
];

/// Identity the demo user logs in with.
#[derive(Debug, Clone)]
pub struct DemoUser {
    pub google_id: String,
    pub email: String,
    pub name: String,
}

/// Everything written for one demo user.
#[derive(Debug, Clone)]
pub struct SeedData {
    pub profile: Profile,
    pub progress: Vec<Progress>,
    pub analytics: Vec<Analytics>,
}

/// What the seed actually wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub user_id: String,
    pub created_user: bool,
    pub progress: usize,
    pub analytics: usize,
}

/// Generate a demo user with progress in `course_count` courses.
///
/// Each course is further along than the previous one, the first is
/// complete, and the progress records are staggered an hour apart.
pub fn generate_seed_data(user: &DemoUser, course_count: usize, now: DateTime<Utc>) -> SeedData {
    let user_id = generate_user_id();
    let profile = Profile::new(&user_id, &user.google_id, &user.email, &user.name, "", now);

    let mut progress = Vec::new();
    let mut analytics = Vec::new();

    for (i, (course_id, total)) in COURSES.iter().take(course_count).enumerate() {
        let done = total.saturating_sub(i as u32 * 3);
        let completed_topics: Vec<String> = (1..=done).map(|t| format!("topic-{t}")).collect();
        let saved_at = now - Duration::hours((course_count - i) as i64);

        let record = Progress::record(
            &user_id,
            ProgressUpdate {
                course_id: course_id.to_string(),
                topic_index: done,
                completed_topics: completed_topics.clone(),
                total_topics: Some(*total),
            },
            saved_at,
        );

        let mut row = Analytics::new(*course_id, &user_id, saved_at)
            .with_time_spent(u64::from(done) * 95)
            .with_completion_rate(record.completion_percentage())
            .with_audio_usage(done / 2);
        if let Some(last) = completed_topics.last() {
            row = row.with_last_topic(last);
        }

        progress.push(record);
        analytics.push(row);
    }

    SeedData {
        profile,
        progress,
        analytics,
    }
}

/// Write seed data through the store.
///
/// An existing user with the same Google id is reused, so reseeding only
/// overwrites progress and analytics.
pub async fn seed_user<S>(store: &S, data: SeedData) -> Result<SeedSummary>
where
    S: ProfileRepository + ProgressRepository + AnalyticsRepository,
{
    let identity = IdentityKey::Google(data.profile.google_id.clone());
    let existing = store.find_user_id(&identity).await?;
    let created_user = existing.is_none();

    let user_id = match existing {
        Some(user_id) => user_id,
        None => {
            store.create_user(&data.profile).await?;
            data.profile.user_id.clone()
        }
    };

    for record in &data.progress {
        let mut record = record.clone();
        record.user_id = user_id.clone();
        store.save_progress(&record).await?;
    }
    for row in &data.analytics {
        let mut row = row.clone();
        row.user_id = user_id.clone();
        store.save_analytics(&row).await?;
    }

    Ok(SeedSummary {
        user_id,
        created_user,
        progress: data.progress.len(),
        analytics: data.analytics.len(),
    })
}

/// Maximum number of courses a seed can cover.
pub fn max_courses() -> usize {
    COURSES.len()
}
