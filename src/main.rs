//! # Herald — idempotent notification dispatcher
//!
//! Usage:
//!   herald orders                 # Send whatever order notifications are due
//!   herald reminders              # Schedule today's event reminders and wait them out
//!   herald ledger                 # Show what has been sent so far
//!   herald --dry-run orders       # Render and log, send nothing

mod telemetry;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use herald_channels::{
    CsvEventSource, CsvRecordSource, EmailTransport, LogTransport, MessageBuilder,
};
use herald_core::HeraldConfig;
use herald_core::traits::{EventSource, Ledger, RecordSource, Transport};
use herald_scheduler::{
    Classifier, DeferredScheduler, Dispatcher, Payload, ReminderRelay, reminder_events,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "📣 Herald — order notifications and event reminders, each sent exactly once"
)]
struct Cli {
    /// Config file (default: ~/.herald/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render and log messages instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// One pass over the orders sheet
    Orders,
    /// Schedule reminders for upcoming events, then release them on time
    Reminders,
    /// List ledger entries
    Ledger,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HeraldConfig::load_from(path)?,
        None => HeraldConfig::load()?,
    };
    config.apply_env_overrides();

    let _telemetry = telemetry::init(cli.verbose, &config.log)?;

    let ledger = herald_ledger::open(&config.ledger)?;

    match cli.command {
        Command::Ledger => list_ledger(ledger.as_ref()),
        Command::Orders => run_orders(&config, dispatcher(&cli, &config, ledger)?).await,
        Command::Reminders => run_reminders(&config, dispatcher(&cli, &config, ledger)?).await,
    }
}

fn dispatcher(cli: &Cli, config: &HeraldConfig, ledger: Arc<dyn Ledger>) -> Result<Dispatcher> {
    let templates = MessageBuilder::from_config(config);
    let transport: Arc<dyn Transport> = if cli.dry_run {
        tracing::info!("📝 Dry run: messages are logged, not sent");
        Arc::new(LogTransport::new(templates))
    } else {
        Arc::new(EmailTransport::new(config.email.clone(), templates)?)
    };

    Ok(Dispatcher::new(
        ledger,
        transport,
        Classifier::new(&config.status_table),
        config.dispatch.clone(),
    ))
}

fn list_ledger(ledger: &dyn Ledger) -> Result<()> {
    write_ledger(ledger, &mut std::io::stdout().lock())?;
    Ok(())
}

fn write_ledger(ledger: &dyn Ledger, out: &mut impl Write) -> std::io::Result<()> {
    let entries = ledger.entries();
    let noun = if entries.len() == 1 { "entry" } else { "entries" };
    writeln!(out, "📒 {} {noun} in ledger '{}'", entries.len(), ledger.name())?;
    for entry in entries {
        writeln!(
            out,
            "   {}  {:<12} {:<24} → {}",
            entry.sent_at.format("%Y-%m-%d %H:%M:%S"),
            entry.kind.as_str(),
            entry.subject_id,
            entry.recipient
        )?;
    }
    Ok(())
}

async fn run_orders(config: &HeraldConfig, mut dispatcher: Dispatcher) -> Result<()> {
    let started = Instant::now();
    let source = CsvRecordSource::new(&config.orders);

    let records = match source.fetch_records().await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("⚠️ No orders loaded ({e}), nothing to do");
            return Ok(());
        }
    };
    if records.is_empty() {
        tracing::warn!("⚠️ Orders sheet is empty, nothing to do");
        return Ok(());
    }

    let report = dispatcher.process_all(&records).await;
    println!("📦 Orders run finished in {:.1}s", started.elapsed().as_secs_f64());
    println!("   Processed: {}", report.processed);
    println!("   Sent:      {}", report.sent);
    println!("   Skipped:   {}", report.skipped);
    println!("   Failed:    {}", report.failed_count());
    for failure in &report.failed {
        println!("   ❌ {}/{}: {}", failure.subject_id, failure.kind, failure.error);
    }
    for key in &report.unrecorded {
        println!("   ⚠️  {key} sent but not recorded");
    }
    Ok(())
}

async fn run_reminders(config: &HeraldConfig, dispatcher: Dispatcher) -> Result<()> {
    let source = CsvEventSource::new(config.reminders.source.clone());
    let events = match source.fetch_events().await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("⚠️ No events loaded ({e}), nothing to do");
            return Ok(());
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("🛑 Ctrl-C received, stopping after the current item");
                cancel.cancel();
            }
        });
    }

    let scheduler = DeferredScheduler::new(config.scheduler.trailing_offset());
    let batch = scheduler.plan(reminder_events(events));
    for ignored in batch.ignored() {
        tracing::info!(
            "⏭️ Ignored event (reminder time too soon): {} at {}",
            ignored.payload.details,
            ignored.event_time
        );
    }
    for item in batch.items() {
        if let Payload::Event(ev) = &item.payload {
            tracing::info!("🗓️ Reminder scheduled for {}: {}", item.fire_time, ev.details);
        }
    }

    let relay = ReminderRelay::new(dispatcher);
    let outcome = relay.release(&scheduler, batch, &cancel).await;

    println!("⏰ Reminder batch {}", outcome.state());
    println!("   Released: {}", outcome.released_count);
    println!("   Ignored:  {}", outcome.ignored_count());
    println!("   Failed:   {}", outcome.failures.len());
    if outcome.cancelled {
        println!("   Pending:  {} (cancelled)", outcome.pending);
    }
    Ok(())
}
