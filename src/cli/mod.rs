use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;

use crate::application::{
    LedgerError, LedgerService, LedgerSettings, MemberDirectory, NoDirectory, StaticDirectory,
};
use crate::bot::{CommandHandler, ConsoleSession, WriterChannel};
use crate::config::Config;
use crate::domain::{Amount, DEFAULT_AMOUNT, Member};
use crate::logging;

/// Excavator - track who borrowed how many shared items
#[derive(Parser)]
#[command(name = "excavator")]
#[command(about = "A lending ledger driven by chat commands")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to excavator.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ledger file, overriding the configured one
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the ledger file if it doesn't exist yet
    Init,

    /// Hand out items to a user
    Credit {
        /// Who hands them out, as id:name
        issuer: Member,

        /// Who receives them, as id:name
        subject: Member,

        /// Number of items
        #[arg(default_value_t = DEFAULT_AMOUNT, allow_negative_numbers = true)]
        amount: Amount,
    },

    /// Register items handed back by a user
    Debit {
        /// Who takes them back, as id:name
        issuer: Member,

        /// Who returns them, as id:name
        subject: Member,

        /// Number of items
        #[arg(default_value_t = DEFAULT_AMOUNT, allow_negative_numbers = true)]
        amount: Amount,
    },

    /// Show a user's balance and recent actions, or everything borrowed
    Status {
        /// User to report on, as id:name (omit for everyone)
        subject: Option<Member>,

        /// Number of actions to show
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Verify stored balances against the action log
    Check,

    /// Type chat commands on stdin as if they were posted in a channel
    Console {
        /// Member typing, as id:name (switch later with "/as id:name")
        #[arg(long = "as", default_value = "1:console")]
        author: Member,

        /// Known members, as id:name (repeatable)
        #[arg(short, long = "member")]
        members: Vec<Member>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(store) = self.store {
            config.store_path = store;
        }
        config.validate()?;
        logging::init(self.verbose, config.log_path.as_deref())?;

        let settings = config.ledger_settings();

        match self.command {
            Commands::Init => {
                let service =
                    LedgerService::init(&config.store_path, config.backend, settings).await?;
                println!("Ledger initialized: {}", service.store_description());
            }

            Commands::Credit {
                issuer,
                subject,
                amount,
            } => {
                let service = connect(&config, settings).await?;
                let result = service.credit(&issuer, &subject, amount).await;
                print_messages(&service).await;
                result?;
            }

            Commands::Debit {
                issuer,
                subject,
                amount,
            } => {
                let service = connect(&config, settings).await?;
                let result = service.debit(&issuer, &subject, amount).await;
                print_messages(&service).await;
                result?;
            }

            Commands::Status { subject, count } => {
                let service = connect(&config, settings).await?;
                let result = service.status(subject.as_ref(), count, &NoDirectory).await;
                print_messages(&service).await;
                result?;
            }

            Commands::Check => {
                let service = connect(&config, settings).await?;
                run_check_command(&service).await?;
            }

            Commands::Console { author, members } => {
                let service = Arc::new(connect(&config, settings).await?);
                run_console_command(service, &config, author, members).await?;
            }
        }

        Ok(())
    }
}

async fn connect(config: &Config, settings: LedgerSettings) -> Result<LedgerService, LedgerError> {
    LedgerService::connect(&config.store_path, config.backend, settings).await
}

async fn print_messages(service: &LedgerService) {
    for message in service.drain_messages().await {
        println!("{}", message);
    }
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await;

    println!("Lendings: {}", report.lending_count);
    println!("Actions:  {}", report.action_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
        return Ok(());
    }

    println!("Issues found:");
    if report.has_sequence_gaps {
        println!("  - Action sequence has gaps");
    }
    if report.has_duplicate_sequences {
        println!("  - Action sequence has duplicates");
    }
    if report.invalid_amounts > 0 {
        println!("  - {} action(s) with a non-positive amount", report.invalid_amounts);
    }
    if report.overflowing_credits > 0 {
        println!("  - {} credit(s) overflowing a balance", report.overflowing_credits);
    }
    if report.settled_lendings > 0 {
        println!("  - {} settled lending(s) still stored", report.settled_lendings);
    }
    for mismatch in &report.mismatches {
        println!(
            "  - User {}: stored {} but the action log gives {}",
            mismatch.subject_id, mismatch.recorded, mismatch.replayed
        );
    }
    anyhow::bail!("Ledger integrity check failed");
}

async fn run_console_command(
    service: Arc<LedgerService>,
    config: &Config,
    author: Member,
    members: Vec<Member>,
) -> Result<()> {
    let directory = Arc::new(StaticDirectory::with_members(members));
    let lookup: Arc<dyn MemberDirectory> = directory.clone();
    let handler = CommandHandler::new(service, lookup, &config.command_prefix, config.bot_id);
    let mut session = ConsoleSession::new(handler, directory, author);

    eprintln!(
        "Typing as {}. Commands start with \"{}\", \"/as id:name\" switches user, Ctrl-D quits.",
        session.author(),
        config.command_prefix
    );

    let channel = WriterChannel::new("console", tokio::io::stdout());
    let handled = session
        .run(BufReader::new(tokio::io::stdin()), &channel)
        .await
        .context("Console session failed")?;
    info!(handled, "Console session ended");
    Ok(())
}
