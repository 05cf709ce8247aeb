use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use tokio::sync::oneshot;

use hreg_client::{AvailabilityError, UsernameValidator, ValidationObserver, ValidationResult};
use hreg_registry::{HandleRegistry, RenameOutcome};
use hreg_store::{DocumentStore, JsonFileStore};
use hreg_types::OwnerId;

use crate::cli::*;
use crate::config::CliConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let store = JsonFileStore::open(&cli.store)
        .with_context(|| format!("opening store {}", cli.store.display()))?;
    let store: Arc<dyn DocumentStore> = Arc::new(store);
    let registry = Arc::new(HandleRegistry::with_config(store, config.registry.clone())?);

    match cli.command {
        Command::Check(args) => cmd_check(registry, &config, args).await,
        Command::Generate => cmd_generate(&registry).await,
        Command::Create(args) => cmd_create(&registry, args).await,
        Command::Rename(args) => cmd_rename(&registry, args).await,
        Command::Lookup(args) => cmd_lookup(&registry, args).await,
        Command::History(args) => cmd_history(&registry, args).await,
    }
}

fn parse_owner(s: &str) -> anyhow::Result<OwnerId> {
    s.parse().with_context(|| format!("invalid owner id {s:?}"))
}

/// Prints validator events and signals when the outcome is known.
struct ConsoleObserver {
    done: Mutex<Option<oneshot::Sender<bool>>>,
}

impl ConsoleObserver {
    fn finish(&self, valid: bool) {
        if let Some(tx) = self.done.lock().expect("lock poisoned").take() {
            let _ = tx.send(valid);
        }
    }
}

impl ValidationObserver for ConsoleObserver {
    fn on_validation_start(&self, candidate: &str) {
        println!("  {} {}", "validating".dimmed(), candidate.bold());
    }

    fn on_validation_complete(&self, result: &ValidationResult) {
        let code = result.verdict.code();
        if result.is_valid() {
            println!("{} {} is {}", "✓".green().bold(), result.candidate.bold(), code.green());
        } else {
            println!("{} {} is {}", "✗".red().bold(), result.candidate.bold(), code.red());
        }
        self.finish(result.is_valid());
    }

    fn on_availability_check_start(&self, candidate: &str) {
        println!("  {} {}", "checking availability of".dimmed(), candidate);
    }

    fn on_availability_check_complete(&self, _candidate: &str, available: bool) {
        println!("  {} {}", "available:".dimmed(), available);
    }

    fn on_error(&self, candidate: &str, error: &AvailabilityError) {
        println!("{} {}: {} ({})", "!".yellow().bold(), candidate, error, error.code().yellow());
        self.finish(false);
    }
}

async fn cmd_check(
    registry: Arc<HandleRegistry>,
    config: &CliConfig,
    args: CheckArgs,
) -> anyhow::Result<()> {
    if args.candidate.trim().is_empty() {
        anyhow::bail!("candidate is empty");
    }
    let current = match &args.owner {
        Some(owner) => {
            let owner = parse_owner(owner)?;
            registry
                .owner(owner)
                .await?
                .and_then(|record| record.handle().map(|h| h.to_string()))
        }
        None => None,
    };

    let (tx, rx) = oneshot::channel();
    let observer = Arc::new(ConsoleObserver {
        done: Mutex::new(Some(tx)),
    });
    let validator =
        UsernameValidator::with_config(current.as_deref(), observer, config.validator.clone());
    let delay = args
        .delay_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.validator.debounce());

    let probe_registry = Arc::clone(&registry);
    validator.validate_with_delay(
        &args.candidate,
        move |candidate| async move { probe_registry.is_available(&candidate).await },
        delay,
    );

    let valid = rx.await.context("validator stopped without a result")?;
    if !valid {
        anyhow::bail!("{} cannot be used", args.candidate.trim());
    }
    Ok(())
}

async fn cmd_generate(registry: &HandleRegistry) -> anyhow::Result<()> {
    let handle = registry.generate().await?;
    println!("{}", handle.as_str().cyan());
    Ok(())
}

async fn cmd_create(registry: &HandleRegistry, args: CreateArgs) -> anyhow::Result<()> {
    let owner = match &args.owner {
        Some(owner) => parse_owner(owner)?,
        None => OwnerId::new(),
    };
    let handle = match &args.handle {
        Some(handle) => registry.create_and_reserve(handle, owner, false).await?,
        None => registry.reserve_generated(owner).await?,
    };
    println!("{} Reserved {}", "✓".green().bold(), handle.as_str().yellow().bold());
    println!("  Owner: {}", owner.to_string().cyan());
    Ok(())
}

async fn cmd_rename(registry: &HandleRegistry, args: RenameArgs) -> anyhow::Result<()> {
    let owner = parse_owner(&args.owner)?;
    match registry.rename(owner, &args.handle).await? {
        RenameOutcome::Unchanged => {
            println!("{} already holds {}", owner.to_string().cyan(), args.handle.trim().yellow());
        }
        RenameOutcome::Renamed { previous, current } => {
            let previous = previous
                .map(|h| h.into_string())
                .unwrap_or_else(|| "(none)".into());
            println!(
                "{} Renamed {} → {}",
                "✓".green().bold(),
                previous.dimmed(),
                current.as_str().yellow().bold()
            );
        }
    }
    Ok(())
}

async fn cmd_lookup(registry: &HandleRegistry, args: LookupArgs) -> anyhow::Result<()> {
    match registry.lookup_owner(&args.handle).await? {
        Some(record) => {
            println!("{} → {}", args.handle.trim().yellow().bold(), record.id.to_string().cyan());
            println!("  Owner since: {}", record.created_at);
            println!("  Handles held: {}", record.history().len());
        }
        None => println!("{} is not registered", args.handle.trim().yellow()),
    }
    Ok(())
}

async fn cmd_history(registry: &HandleRegistry, args: HistoryArgs) -> anyhow::Result<()> {
    let owner = parse_owner(&args.owner)?;
    let history = registry.history(owner).await?;
    if history.is_empty() {
        println!("{} has no handles.", owner.to_string().cyan());
        return Ok(());
    }
    for entry in &history {
        match entry.used_until {
            Some(until) => println!(
                "  {}  {} .. {}",
                entry.handle.as_str().dimmed(),
                entry.used_from,
                until
            ),
            None => println!(
                "* {}  {} .. {}",
                entry.handle.as_str().green().bold(),
                entry.used_from,
                "now".green()
            ),
        }
    }
    Ok(())
}
