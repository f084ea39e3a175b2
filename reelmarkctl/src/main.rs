use std::{
    io::{self, Read},
    path::Path,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use reelmark_core::{
    identity::{derive_key, identity_basis},
    model::{ContentKey, Observation, TelemetryReport},
};
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod file_store;
mod tracker;

use cli::{Cli, Command, InputArgs, KeyArgs, TelemetryAction};
use tracker::Tracker;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays machine readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let Cli {
        config,
        store,
        command,
    } = Cli::parse();
    let open = || Tracker::open(config.as_deref(), store.clone());

    match command {
        Command::Key(args) => print_key(&args),
        Command::Record(input) => {
            let tracker = open()?;
            let observation: Observation = read_document(&input)?;
            if observation.url.trim().is_empty() {
                bail!("observation has no url");
            }
            let outcome = tracker
                .reconciler
                .record_observation(&observation)
                .await
                .context("recording observation")?;
            print_json(&json!({
                "key": outcome.key,
                "record": outcome.record,
                "removedLegacy": outcome.removed_legacy,
                "removedDuplicates": outcome.removed_duplicates,
            }))?;
        }
        Command::Lookup { url } => {
            let tracker = open()?;
            let found = tracker.reconciler.lookup(&url).await?;
            print_json(&json!(found))?;
        }
        Command::List => {
            let tracker = open()?;
            let listed = tracker.reconciler.list_progress().await?;
            let rows: Vec<Value> = listed
                .into_iter()
                .map(|entry| json!({ "key": entry.key, "record": entry.record }))
                .collect();
            print_json(&Value::Array(rows))?;
        }
        Command::Delete { key } => {
            let key = ContentKey::parse(&key)
                .with_context(|| format!("invalid content key {key:?}"))?;
            let tracker = open()?;
            if tracker.reconciler.delete_progress(&key).await? {
                println!("deleted {key}");
            } else {
                println!("no record stored under {key}");
            }
        }
        Command::Prune => {
            let tracker = open()?;
            let removed = tracker.retention.prune_progress().await?;
            print_json(&json!({ "removed": removed }))?;
        }
        Command::Repair => {
            let tracker = open()?;
            let dropped = tracker.reconciler.repair_index().await?;
            print_json(&json!({ "dropped": dropped }))?;
        }
        Command::Telemetry { action } => run_telemetry(&open()?, action).await?,
    }

    Ok(())
}

async fn run_telemetry(tracker: &Tracker, action: TelemetryAction) -> Result<()> {
    match action {
        TelemetryAction::Record(input) => {
            let report: TelemetryReport = read_document(&input)?;
            let entry = tracker
                .telemetry
                .record(report)
                .await
                .context("recording telemetry")?;
            print_json(&json!(entry))?;
        }
        TelemetryAction::List => {
            let entries = tracker.telemetry.list().await?;
            print_json(&json!(entries))?;
        }
        TelemetryAction::Clear => {
            tracker.telemetry.clear().await?;
            println!("telemetry cleared");
        }
        TelemetryAction::Retention { hours } => {
            let settings = match hours {
                Some(hours) => {
                    tracker.settings.set_telemetry_retention_hours(hours).await?
                }
                None => tracker.settings.load().await?,
            };
            println!("{}", settings.telemetry_retention_hours);
        }
    }
    Ok(())
}

fn print_key(args: &KeyArgs) {
    let content_type = args.content_type.map(Into::into);
    let key = derive_key(
        args.url.as_deref(),
        args.title.as_deref(),
        args.platform.as_deref(),
        content_type,
        args.series.as_deref(),
    );
    println!("{key}");
    if args.show_basis {
        println!(
            "{}",
            identity_basis(
                args.url.as_deref(),
                args.title.as_deref(),
                args.platform.as_deref(),
                content_type,
                args.series.as_deref(),
            )
        );
    }
}

fn read_document<T>(input: &InputArgs) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw = match input.input.as_deref() {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("parsing JSON input")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
