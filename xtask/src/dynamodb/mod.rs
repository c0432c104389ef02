//! DynamoDB infrastructure management commands.

mod client;
mod config;
mod deploy;
mod error;
mod planning;
mod seed;

use error::{DynamodbError, Result};

use crate::prelude::*;
use dialoguer::Confirm;
use learnbyshorts::storage::DynamoDbRepository;
use learnbyshorts::StoreConfig;

/// DynamoDB infrastructure management commands.
#[derive(Debug, clap::Parser)]
pub struct DynamodbCommand {
    #[command(subcommand)]
    pub action: DynamodbAction,
}

/// Available DynamoDB actions.
#[derive(Debug, clap::Subcommand)]
pub enum DynamodbAction {
    /// Deploy or destroy the user-data table.
    Deploy(DeployCommand),

    /// Seed a demo user with course progress and analytics.
    Seed(SeedCommand),
}

/// Deploy or update DynamoDB infrastructure.
#[derive(Debug, clap::Parser)]
#[command(long_about = "Deploy or destroy the LearnByShorts user-data table.

By default, this command creates or updates the single table with its
primary key (PK, SK), the GSI1 identity index, on-demand billing and
expiry on the TTL attribute.

The command shows a plan of changes before applying and asks for confirmation.

Environment variables:
  DYNAMODB_TABLE_NAME - Table name (defaults to learnbyshorts-data)
  AWS_ENDPOINT_URL    - Use local DynamoDB (e.g., http://localhost:8000)
  AWS_REGION          - AWS region (defaults to us-east-1)
  AWS_PROFILE         - AWS profile to use for credentials")]
pub struct DeployCommand {
    /// Skip confirmation prompts.
    #[arg(long)]
    pub force: bool,

    /// Destroy the table instead of creating/updating.
    #[arg(long)]
    pub destroy: bool,

    /// Table name to use.
    #[arg(long, env = "DYNAMODB_TABLE_NAME", default_value = config::DEFAULT_TABLE_NAME)]
    pub table_name: String,

    /// Value of the Environment tag on a new table.
    #[arg(long, default_value = "dev")]
    pub environment: String,
}

/// Seed a demo user.
#[derive(Debug, clap::Parser)]
#[command(long_about = "Create a demo user and write course progress for it.

The user is created the same way a first login creates it (profile plus
email index record). Rerunning the command with the same Google id reuses
the user and overwrites its progress and analytics rows.")]
pub struct SeedCommand {
    /// Google subject id of the demo user.
    #[arg(long, default_value = "demo-google-id")]
    pub google_id: String,

    /// Email of the demo user.
    #[arg(long, default_value = "demo@learnbyshorts.dev")]
    pub email: String,

    /// Display name of the demo user.
    #[arg(long, default_value = "Demo Learner")]
    pub name: String,

    /// Number of courses to write progress for.
    #[arg(long, default_value = "4")]
    pub courses: usize,

    /// Table name to use.
    #[arg(long, env = "DYNAMODB_TABLE_NAME", default_value = config::DEFAULT_TABLE_NAME)]
    pub table_name: String,

    /// Skip confirmation prompts.
    #[arg(long)]
    pub force: bool,
}

/// Main entry point for dynamodb command.
pub async fn run(command: DynamodbCommand, global: crate::Global) -> Result<()> {
    match command.action {
        DynamodbAction::Deploy(deploy_cmd) => run_deploy(deploy_cmd, &global).await,
        DynamodbAction::Seed(seed_cmd) => run_seed(seed_cmd, &global).await,
    }
}

/// Asks before a change unless `--force` was given.
fn confirm(prompt: &str, default: bool, force: bool) -> Result<()> {
    if force {
        return Ok(());
    }
    if Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()?
    {
        Ok(())
    } else {
        Err(DynamodbError::UserCancelled)
    }
}

fn store_config(table_name: &str) -> StoreConfig {
    StoreConfig {
        table_name: table_name.to_string(),
        ..learnbyshorts::Config::from_env().store
    }
}

async fn run_deploy(cmd: DeployCommand, global: &crate::Global) -> Result<()> {
    let store = store_config(&cmd.table_name);

    if !global.is_silent() {
        aprintln!("{} {}", p_b("Target:"), store.target_display());
        aprintln!();
    }

    let dynamo_client = client::create_client(&store).await;
    let current_state = client::get_table_state(&dynamo_client, &cmd.table_name).await?;

    if cmd.destroy {
        let plan = planning::calculate_destroy_plan(current_state.as_ref(), &cmd.table_name);

        if !global.is_silent() {
            aprintln!("{}", p_y("Destroy Plan:"));
            for line in planning::format_destroy_plan(&plan) {
                aprintln!("  {}", p_r(&line));
            }
            aprintln!();
        }

        if matches!(plan, planning::DestroyPlan::AlreadyGone { .. }) {
            if !global.is_silent() {
                aprintln!("{}", p_g("Nothing to destroy."));
            }
            return Ok(());
        }

        confirm(
            "Are you sure you want to delete this table? ALL DATA WILL BE LOST",
            false,
            cmd.force,
        )?;

        if !global.is_silent() {
            aprintln!("{}", p_b("Deleting table..."));
        }

        deploy::execute_destroy_plan(&dynamo_client, &plan).await?;

        if !global.is_silent() {
            aprintln!("{}", p_g("Table destroyed successfully."));
        }
        return Ok(());
    }

    let table_config = config::learnbyshorts_table_config()
        .with_table_name(&cmd.table_name)
        .with_environment(&cmd.environment);

    let plan = planning::calculate_deploy_plan(current_state.as_ref(), &table_config);

    if !global.is_silent() {
        aprintln!("{}", p_c("Deploy Plan:"));
        for line in planning::format_deploy_plan(&plan) {
            let painted = match line.chars().next() {
                Some('+') => p_g(&line),
                Some('-') => p_r(&line),
                Some('~') => p_y(&line),
                _ => line,
            };
            aprintln!("  {}", painted);
        }
        aprintln!();
    }

    if matches!(plan, planning::DeployPlan::NoChanges { .. }) {
        if !global.is_silent() {
            aprintln!("{}", p_g("Infrastructure is up to date."));
        }
        return Ok(());
    }

    confirm("Apply these changes?", true, cmd.force)?;

    if !global.is_silent() {
        aprintln!("{}", p_b("Applying changes..."));
    }

    deploy::execute_deploy_plan(&dynamo_client, &plan).await?;

    if !global.is_silent() {
        aprintln!("{}", p_g("Infrastructure deployed successfully."));
    }

    Ok(())
}

async fn run_seed(cmd: SeedCommand, global: &crate::Global) -> Result<()> {
    let store = store_config(&cmd.table_name);
    let course_count = cmd.courses.min(seed::max_courses());

    if !global.is_silent() {
        aprintln!("{} {}", p_b("Target:"), store.target_display());
        aprintln!("{} {} <{}>", p_b("User:"), cmd.name, cmd.email);
        aprintln!("{} {}", p_b("Google id:"), cmd.google_id);
        aprintln!("{} {}", p_b("Courses:"), course_count);
        aprintln!();
    }

    let dynamo_client = client::create_client(&store).await;

    let table_state = client::get_table_state(&dynamo_client, &cmd.table_name).await?;
    if table_state.is_none() {
        return Err(DynamodbError::TableNotFound {
            table_name: cmd.table_name,
        });
    }

    let user = seed::DemoUser {
        google_id: cmd.google_id,
        email: cmd.email,
        name: cmd.name,
    };
    let data = seed::generate_seed_data(&user, course_count, chrono::Utc::now());

    if !global.is_silent() {
        aprintln!("{}", p_c("Progress to write:"));
        for progress in &data.progress {
            aprintln!(
                "  {} - {}/{} topics ({:.0}%)",
                progress.course_id,
                progress.completed_topics.len(),
                progress.total_topics,
                progress.completion_percentage()
            );
        }
        aprintln!();
    }

    confirm("Write the demo user?", true, cmd.force)?;

    let repository = DynamoDbRepository::new(dynamo_client, &cmd.table_name)
        .with_index_name(&store.index_name);
    let summary = seed::seed_user(&repository, data).await?;

    if !global.is_silent() {
        let user_note = if summary.created_user {
            "created"
        } else {
            "already existed"
        };
        aprintln!(
            "{} user {} {}, {} progress and {} analytics records written.",
            p_g("Success:"),
            summary.user_id,
            user_note,
            summary.progress,
            summary.analytics
        );
    }

    Ok(())
}
