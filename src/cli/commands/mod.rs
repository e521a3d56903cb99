//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Every handler resolves a facade through the [`RepositoryFactory`] and
//! prints the result. Handlers are async because the repository layer is;
//! [`crate::cli::run`] drives them on a multi-threaded runtime.

use std::io::{Read, Write};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use super::args::Command;
use crate::core::config::Config;
use crate::core::types::FileEntry;
use crate::repo::mutation::MutationOutcome;
use crate::repo::{EvictionSweeper, RepoSettings, RepositoryFactory};
use crate::review::gerrit::GerritReview;

/// Build the factory from configuration.
pub fn factory(config: &Config) -> Result<Arc<RepositoryFactory>> {
    let settings = RepoSettings::from_config(config).context("incomplete [vcs] configuration")?;
    let review_url = config
        .review_url()
        .context("incomplete [review] configuration")?;

    let review = &config.file.review;
    let credentials = review
        .username
        .as_deref()
        .map(|user| (user, review.password.as_deref().unwrap_or("")));

    Ok(Arc::new(RepositoryFactory::new(
        settings,
        Arc::new(GerritReview::new(review_url, credentials)),
    )))
}

/// Dispatch a parsed command.
pub async fn dispatch(command: Command, config: &Config) -> Result<()> {
    let factory = factory(config)?;

    match command {
        Command::Ls {
            version,
            path,
            json,
        } => {
            let repo = factory.get_repo_by_version(&version).await?;
            let entries = repo.file_list(path.as_deref().unwrap_or("")).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{}", format_entry(entry));
                }
            }
        }
        Command::Cat { version, path } => {
            let repo = factory.get_repo_by_version(&version).await?;
            let content = repo.read_file(&path).await?;
            std::io::stdout().write_all(content.as_bytes())?;
        }
        Command::Write { version, path } => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("failed to read content from stdin")?;

            let repo = factory.get_repo_by_version(&version).await?;
            report(repo.write_file(&path, &content).await?, &path);
        }
        Command::Rm { version, path } => {
            let repo = factory.get_repo_by_version(&version).await?;
            report(repo.delete_file(&path).await?, &path);
        }
        Command::Exists { version, path } => {
            let repo = factory.get_repo_by_version(&version).await?;
            let exists = repo.is_file_exists(&path).await?;
            println!("{}", if exists { "yes" } else { "no" });
        }
        Command::Refresh => {
            factory.refresh_head().await?;
            println!("Trunk refreshed.");
        }
        Command::Sweep => {
            let project = config.review_project()?;
            let sweeper = EvictionSweeper::new(Arc::clone(&factory), project);
            let report = sweeper.sweep_once().await?;
            println!(
                "Removed {} clone(s), skipped {}, failed {}.",
                report.removed.len(),
                report.skipped,
                report.failed
            );
        }
    }

    Ok(())
}

fn format_entry(entry: &FileEntry) -> String {
    let updated = entry
        .updated_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{:<8} {:<19} {}", entry.status, updated, entry.path)
}

fn report(outcome: MutationOutcome, path: &str) {
    match outcome {
        MutationOutcome::Unchanged => println!("{}: unchanged", path),
        MutationOutcome::Pushed { commit } => {
            println!("{}: pushed {}", path, &commit[..commit.len().min(12)])
        }
    }
}
