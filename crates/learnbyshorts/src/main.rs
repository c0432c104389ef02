use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::RngCore;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use learnbyshorts::storage::DynamoDbRepository;
use learnbyshorts::{AccessLayer, Config};
use learnbyshorts_auth::{AuthConfig, JwtIssuer};
use learnbyshorts_core::auth::{CredentialIssuer, IdentityVerifier};
use learnbyshorts_core::keyspace::IdentityKey;
use learnbyshorts_core::learning::{Analytics, ProgressUpdate, SessionId};

/// LearnByShorts - Operator tool for the user-data table
#[derive(Parser, Debug)]
#[command(name = "learnbyshorts")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a user's profile
    Profile { user_id: String },

    /// List a user's course progress
    Progress { user_id: String },

    /// Overwrite a user's progress in one course
    SaveProgress(SaveProgressArgs),

    /// Resolve a Google id or email to a user id
    Lookup(LookupArgs),

    /// List the analytics rows of a course
    Analytics { course_id: String },

    /// Create or overwrite one analytics row
    RecordAnalytics(RecordAnalyticsArgs),

    /// Show a session if it has not expired
    Session { user_id: String, session_id: String },

    /// Validate a bearer credential and show the profile it names (needs JWT_SECRET)
    VerifyToken { token: String },

    /// Log in with a mock identity assertion (local runs only)
    #[cfg(feature = "mock")]
    MockLogin {
        #[arg(long)]
        google_id: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Args, Debug)]
struct SaveProgressArgs {
    user_id: String,
    course_id: String,
    /// Index of the topic the user is on
    #[arg(long, default_value_t = 0)]
    topic_index: u32,
    /// Completed topic ids, comma separated
    #[arg(long, value_delimiter = ',')]
    completed: Vec<String>,
    /// Number of topics in the course (default: number of completed topics)
    #[arg(long)]
    total: Option<u32>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct LookupArgs {
    #[arg(long)]
    google_id: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

#[derive(Args, Debug)]
struct RecordAnalyticsArgs {
    course_id: String,
    user_id: String,
    /// Seconds spent in the course
    #[arg(long, default_value_t = 0)]
    time_spent: u64,
    /// Completion rate in percent
    #[arg(long, default_value_t = 0.0)]
    completion_rate: f64,
    /// Number of audio playbacks
    #[arg(long, default_value_t = 0)]
    audio_usage: u32,
    #[arg(long)]
    last_topic: Option<String>,
}

/// The operator tool has no identity provider of its own.
#[cfg(not(feature = "mock"))]
struct NoIdentityProvider;

#[cfg(not(feature = "mock"))]
#[async_trait::async_trait]
impl IdentityVerifier for NoIdentityProvider {
    async fn verify(
        &self,
        _assertion: &str,
    ) -> Result<learnbyshorts_core::auth::IdentityClaims, learnbyshorts_core::auth::AuthError> {
        Err(learnbyshorts_core::auth::AuthError::InvalidAssertion(
            "no identity provider configured".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = Config::from_env();
    tracing::debug!(store = %config.store.target_display(), "using store");

    let store = DynamoDbRepository::from_config(&config.store).await;
    let layer = AccessLayer::from_config(
        store,
        verifier(),
        credential_issuer(&cli.command)?,
        &config,
    );

    run(&layer, cli.command).await
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "learnbyshorts=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays parseable.
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(feature = "mock")]
fn verifier() -> Arc<dyn IdentityVerifier> {
    Arc::new(learnbyshorts_auth::MockVerifier)
}

#[cfg(not(feature = "mock"))]
fn verifier() -> Arc<dyn IdentityVerifier> {
    Arc::new(NoIdentityProvider)
}

/// Commands that issue or validate credentials need the configured secret.
/// The others get a throwaway key so `JWT_SECRET` is not required for reads.
fn credential_issuer(command: &Command) -> Result<Arc<dyn CredentialIssuer>> {
    let needs_secret = match command {
        Command::VerifyToken { .. } => true,
        #[cfg(feature = "mock")]
        Command::MockLogin { .. } => true,
        _ => false,
    };

    if needs_secret {
        let auth = AuthConfig::from_env().context("loading auth configuration")?;
        return Ok(Arc::new(JwtIssuer::from_config(&auth)));
    }

    let mut secret = [0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    Ok(Arc::new(JwtIssuer::new(&secret, chrono::Duration::days(1))))
}

async fn run(layer: &AccessLayer, command: Command) -> Result<()> {
    match command {
        Command::Profile { user_id } => print(&layer.get_profile(&user_id).await?),
        Command::Progress { user_id } => print(&layer.list_progress(&user_id).await?),
        Command::SaveProgress(args) => {
            let update = ProgressUpdate {
                course_id: args.course_id,
                topic_index: args.topic_index,
                completed_topics: args.completed,
                total_topics: args.total,
            };
            print(&layer.save_progress(&args.user_id, update).await?)
        }
        Command::Lookup(args) => {
            let identity = match (args.google_id, args.email) {
                (Some(google_id), _) => IdentityKey::Google(google_id),
                (None, Some(email)) => IdentityKey::Email(email),
                (None, None) => anyhow::bail!("one of --google-id or --email is required"),
            };
            let user_id = layer.lookup_identity(&identity).await?;
            print(&serde_json::json!({ "user_id": user_id }))
        }
        Command::Analytics { course_id } => print(&layer.list_course_analytics(&course_id).await?),
        Command::RecordAnalytics(args) => {
            let mut analytics = Analytics::new(args.course_id, args.user_id, chrono::Utc::now())
                .with_time_spent(args.time_spent)
                .with_completion_rate(args.completion_rate)
                .with_audio_usage(args.audio_usage);
            if let Some(topic) = args.last_topic {
                analytics = analytics.with_last_topic(topic);
            }
            print(&layer.record_analytics(analytics).await?)
        }
        Command::Session {
            user_id,
            session_id,
        } => print(&layer.get_session(&user_id, &SessionId::new(session_id)).await?),
        Command::VerifyToken { token } => print(&layer.verify_credential(&token).await?),
        #[cfg(feature = "mock")]
        Command::MockLogin {
            google_id,
            email,
            name,
        } => {
            let assertion =
                learnbyshorts_auth::MockVerifier::assertion(&google_id, &email, name.as_deref(), None);
            let context = learnbyshorts::ClientContext {
                device_info: Some("learnbyshorts-cli".to_string()),
                ip_address: None,
            };
            print(&layer.login(&assertion, context).await?)
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
