//! submirror - branch-to-discrete-repo mirroring CLI
//!
//! The `submirror` command is the body of a CI job: on a qualifying push
//! to the integral repository's development branch it pushes all subrepos
//! out to their discrete repositories and records a follow-up commit.
//!
//! ## Commands
//!
//! - `sync`: run the full mirror pipeline
//! - `check`: evaluate the trigger guard only
//! - `head`: print head metadata of a repository

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use submirror_core::{
    git_ssh_command, GitRepo, PushEvent, SshKey, TriggerDecision, TriggerPolicy, DEFAULT_MARKER,
};
use submirror_sync::{GitSubrepoCli, MirrorPipeline, SyncConfig, SyncOutcome, SyncSpec};

#[derive(Parser)]
#[command(name = "submirror")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mirror integral-branch pushes into discrete repositories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full mirror pipeline for a push event
    Sync {
        /// Branch whose pushes qualify for mirroring
        #[arg(short, long, default_value = "master")]
        branch: String,

        /// URL of the integral repository to clone
        #[arg(short, long)]
        integral_url: String,

        /// Working directory for the clone and installed credentials
        #[arg(short, long, default_value = ".submirror")]
        workdir: PathBuf,

        /// Update script executed inside the clone after the reset
        #[arg(short, long)]
        update_script: PathBuf,

        /// Loop-prevention marker substring
        #[arg(long, default_value = DEFAULT_MARKER)]
        marker: String,

        /// Branch the triggering push landed on
        #[arg(long, env = "SUBMIRROR_EVENT_BRANCH")]
        event_branch: String,

        /// Head commit message of the triggering push
        #[arg(long, env = "SUBMIRROR_HEAD_MESSAGE")]
        head_message: String,

        /// Name of the environment variable holding the SSH private key
        #[arg(long, default_value = "SUBMIRROR_SSH_KEY")]
        ssh_key_env: String,

        /// Skip SSH credential installation (local or https remotes)
        #[arg(long)]
        no_ssh: bool,

        /// Per-command timeout in seconds (0 disables)
        #[arg(long, default_value = "600")]
        timeout_secs: u64,

        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Evaluate the trigger guard for a push event and print the decision
    Check {
        /// Branch whose pushes qualify for mirroring
        #[arg(short, long, default_value = "master")]
        branch: String,

        /// Loop-prevention marker substring
        #[arg(long, default_value = DEFAULT_MARKER)]
        marker: String,

        /// Branch the triggering push landed on
        #[arg(long, env = "SUBMIRROR_EVENT_BRANCH")]
        event_branch: String,

        /// Head commit message of the triggering push
        #[arg(long, env = "SUBMIRROR_HEAD_MESSAGE")]
        head_message: String,
    },

    /// Print head commit metadata of a repository
    Head {
        /// Repository directory
        #[arg(default_value = ".")]
        repo: PathBuf,

        /// Per-command timeout in seconds (0 disables)
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    submirror_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Sync {
            branch,
            integral_url,
            workdir,
            update_script,
            marker,
            event_branch,
            head_message,
            ssh_key_env,
            no_ssh,
            timeout_secs,
            report,
        } => {
            cmd_sync(SyncArgs {
                branch,
                integral_url,
                workdir,
                update_script,
                marker,
                event_branch,
                head_message,
                ssh_key_env,
                no_ssh,
                timeout_secs,
                report,
            })
            .await
        }
        Commands::Check {
            branch,
            marker,
            event_branch,
            head_message,
        } => cmd_check(&branch, &marker, &event_branch, &head_message),
        Commands::Head { repo, timeout_secs } => cmd_head(&repo, timeout_secs).await,
    }
}

struct SyncArgs {
    branch: String,
    integral_url: String,
    workdir: PathBuf,
    update_script: PathBuf,
    marker: String,
    event_branch: String,
    head_message: String,
    ssh_key_env: String,
    no_ssh: bool,
    timeout_secs: u64,
    report: Option<PathBuf>,
}

/// Run the full mirror pipeline
async fn cmd_sync(args: SyncArgs) -> Result<()> {
    let policy = TriggerPolicy::new(&args.branch, &args.marker);
    let event = PushEvent::new(&args.event_branch, &args.head_message);

    // A skipped push performs no steps, credential setup included; a
    // missing secret must not fail a run that would skip anyway.
    let decision = policy.decide(&event);
    if !decision.should_run() {
        println!("Skipped: {}", describe_decision(decision));
        return Ok(());
    }

    let spec = SyncSpec::new(&args.branch, &args.integral_url, &args.marker);

    let mut git_env = Vec::new();
    if !args.no_ssh {
        let key = SshKey::from_env(&args.ssh_key_env)
            .with_context(|| format!("no SSH key in ${}", args.ssh_key_env))?;
        let key_path = key
            .install(&args.workdir.join(".ssh"))
            .context("failed to install SSH key")?;
        git_env.push(("GIT_SSH_COMMAND".to_string(), git_ssh_command(&key_path)));
    }

    let config = SyncConfig {
        workdir: args.workdir,
        update_script: args.update_script,
        timeout_secs: args.timeout_secs,
        git_env,
    };

    let pusher = Arc::new(GitSubrepoCli::new(args.timeout_secs));
    let outcome = MirrorPipeline::run(&policy, &event, &spec, &config, pusher)
        .await
        .context("mirror pipeline failed to run")?;

    let result = match outcome {
        SyncOutcome::Skipped(decision) => {
            println!("Skipped: {}", describe_decision(decision));
            return Ok(());
        }
        SyncOutcome::Completed(result) => result,
    };

    println!("Run ID: {}", result.run_id);
    println!(
        "Status: {}",
        if result.success {
            "✓ SYNCED"
        } else {
            "✗ FAILED"
        }
    );
    println!("Parent commit: {}", result.parent_commit_id);
    println!("Integral message: {}", result.integral_commit_message);
    println!("Duration: {}ms", result.duration_ms);
    println!();

    for step in &result.steps {
        let status = if step.success { "✓" } else { "✗" };
        println!(
            "  {} {} ({}ms) {}",
            status, step.step_name, step.duration_ms, step.detail
        );
    }

    println!();
    println!(
        "Summary: {}/{} steps passed",
        result.passed_count(),
        result.steps.len()
    );

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if result.success {
        Ok(())
    } else {
        anyhow::bail!("mirror sync failed")
    }
}

/// Evaluate the trigger guard and print the decision
fn cmd_check(branch: &str, marker: &str, event_branch: &str, head_message: &str) -> Result<()> {
    let policy = TriggerPolicy::new(branch, marker);
    let event = PushEvent::new(event_branch, head_message);
    let decision = policy.decide(&event);

    println!("{}", describe_decision(decision));
    Ok(())
}

/// Print head commit metadata of a repository
async fn cmd_head(repo: &PathBuf, timeout_secs: u64) -> Result<()> {
    let head = GitRepo::open(repo)
        .with_timeout(timeout_secs)
        .head_metadata()
        .await
        .with_context(|| format!("failed to read head of {}", repo.display()))?;

    println!("Commit:  {}", head.commit_id);
    println!("Subject: {}", head.subject);
    println!("Author:  {} <{}>", head.author_name, head.author_email);
    Ok(())
}

fn describe_decision(decision: TriggerDecision) -> &'static str {
    match decision {
        TriggerDecision::Run => "run: push qualifies for mirroring",
        TriggerDecision::SkipMarker => "skip: head commit carries the sync marker",
        TriggerDecision::SkipBranch => "skip: push landed on a different branch",
    }
}
