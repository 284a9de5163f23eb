use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use interfaces::{MemoryContentStream, MemoryPost, SqliteKeyValueStore};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use true_blocklist::{
    messages, AccountName, BlocklistError, ConfirmPrompt, ContentItem, FetchConfig, Fetcher,
    HideTarget, PreferenceSource, ProgressObserver, StoredPreferences, TriggerSurface,
    TrueBlocklist, UpdateOutcome, UpdateSummary,
};

#[derive(Parser)]
#[command(name = "true-blocklist", about = "Enforce your blocks across every blog you own")]
struct Cli {
    /// Where the blocklist and preferences are kept
    #[arg(
        long,
        env = "TRUE_BLOCKLIST_DATABASE_URL",
        default_value = "sqlite://true_blocklist.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Gather blocks from every listed blog and replace the stored blocklist
    Update {
        /// Blog you control; repeat for each blog
        #[arg(long = "account", required = true)]
        accounts: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Print the stored blocklist
    Show,
    /// Read or replace the soft blocklist
    Soft {
        /// New comma-separated soft blocklist; prints the current one when omitted
        text: Option<String>,
    },
    /// Run a single post through the filter
    Check {
        #[arg(long)]
        author: String,
        #[arg(long)]
        reblogged_from: Option<String>,
        /// Trail attributions, oldest first
        #[arg(long, value_delimiter = ',')]
        trail: Vec<String>,
    },
    /// Forget the stored blocklist
    Clear,
}

/// Trigger surface printing to the terminal.
struct ConsoleSurface {
    assume_yes: bool,
}

impl ProgressObserver for ConsoleSurface {
    fn on_progress(&self, _total_found: usize) {}
}

#[async_trait]
impl TriggerSurface for ConsoleSurface {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        if self.assume_yes {
            return true;
        }

        println!("{}", prompt.title);
        println!("{}", prompt.message);
        print!("{} [y/N] ", prompt.confirm_label);
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut answer).await {
            Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
            Err(_) => false,
        }
    }

    fn status(&self, text: &str) {
        for line in status_lines(text) {
            println!("{}", line);
        }
    }

    fn complete(&self, summary: &UpdateSummary) {
        println!("{}", messages::COMPLETE_TITLE);
        for (account, found) in &summary.per_account {
            println!("  {}: {}", account, found);
        }
    }

    fn failed(&self, error: &BlocklistError) {
        eprintln!("Update failed: {}", error);
    }
}

/// Lines printed for a status update. The working warning follows the
/// working title, which is only shown once the user has confirmed.
fn status_lines(text: &str) -> Vec<&str> {
    if text == messages::WORKING_TITLE {
        vec![text, messages::WORKING_WARNING]
    } else {
        vec![text]
    }
}

/// Only `update` talks to the API, so only `update` reads the fetch
/// settings from the environment.
fn fetch_config_for(command: &Command) -> Result<FetchConfig> {
    match command {
        Command::Update { .. } => Ok(FetchConfig::from_env()?),
        _ => Ok(FetchConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let kv = Arc::new(
        SqliteKeyValueStore::connect(&cli.database_url)
            .await
            .with_context(|| format!("Failed to open {}", cli.database_url))?,
    );
    let preferences = Arc::new(StoredPreferences::new(kv.clone()));
    let stream = Arc::new(MemoryContentStream::new());

    let accounts = match &cli.command {
        Command::Update { accounts, .. } => accounts.iter().cloned().map(AccountName::from).collect(),
        _ => Vec::new(),
    };

    let fetcher = Fetcher::http(fetch_config_for(&cli.command)?)?;
    let blocklist = TrueBlocklist::new(fetcher, accounts, kv, preferences.clone(), stream.clone());

    match cli.command {
        Command::Update { yes, .. } => {
            let surface = ConsoleSurface { assume_yes: yes };
            match blocklist.update_blocks(&surface).await {
                Ok(UpdateOutcome::Completed(summary)) => {
                    info!("Stored {} blocked accounts", summary.total_blocked);
                }
                Ok(UpdateOutcome::Declined) => println!("Nothing changed."),
                Err(e) => {
                    error!("Update failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::Show => {
            let list = blocklist.store().get().await?;
            for name in list.iter() {
                println!("{}", name);
            }
            println!("{} blocked blogs", list.len());
        }
        Command::Soft { text: Some(text) } => {
            preferences.set_soft_blocklist(&text).await?;
            println!("Soft blocklist updated.");
        }
        Command::Soft { text: None } => {
            println!("{}", preferences.soft_blocklist().await?);
        }
        Command::Check {
            author,
            reblogged_from,
            trail,
        } => {
            let mut item = ContentItem::new(author).with_trail(trail);
            item.reblogged_from = reblogged_from;

            blocklist.enable();
            let post = MemoryPost::new(item);
            stream.emit(&[post.clone()]).await;

            let hidden = post.hidden_targets();
            if hidden.is_empty() {
                println!("visible");
            } else if hidden.contains(&HideTarget::Item) {
                println!("hidden");
            } else {
                let indices: Vec<String> = hidden
                    .iter()
                    .filter_map(|target| match target {
                        HideTarget::TrailEntry(index) => Some(index.to_string()),
                        HideTarget::Item => None,
                    })
                    .collect();
                println!("trail entries hidden: {}", indices.join(", "));
            }
        }
        Command::Clear => {
            blocklist.disable().await?;
            println!("Stored blocklist removed.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_follows_working_title_only() {
        assert_eq!(
            status_lines(messages::WORKING_TITLE),
            vec![messages::WORKING_TITLE, messages::WORKING_WARNING]
        );
        assert_eq!(status_lines(messages::GATHERING), vec![messages::GATHERING]);
    }

    #[test]
    fn bad_fetch_settings_only_break_update() {
        std::env::set_var("TRUE_BLOCKLIST_TIMEOUT_SECONDS", "soon");

        let update = Command::Update {
            accounts: vec!["me".to_string()],
            yes: true,
        };
        assert!(fetch_config_for(&update).is_err());

        for command in [
            Command::Show,
            Command::Soft { text: None },
            Command::Clear,
            Command::Check {
                author: "someone".to_string(),
                reblogged_from: None,
                trail: Vec::new(),
            },
        ] {
            let config = fetch_config_for(&command).unwrap();
            assert_eq!(config.timeout_seconds, FetchConfig::default().timeout_seconds);
        }

        std::env::remove_var("TRUE_BLOCKLIST_TIMEOUT_SECONDS");
    }
}
