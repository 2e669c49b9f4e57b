use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;

use caldera_core::config::Settings;
use caldera_rfc::rfc::ical::object::TimeWindow;
use caldera_service::caldav::service::outcome::ObjectOutcome;
use caldera_service::caldav::service::report::{QueryCoordinator, QueryRequest};
use caldera_service::storage::FsObjectStore;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Parser)]
#[command(name = "caldera", version, about = "Expand and filter stored calendar objects")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a time-range query over a collection.
    Query(QueryArgs),
    /// Drop cache records of objects no longer in a collection.
    Prune {
        #[arg(long)]
        collection: String,
    },
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Collection directory, relative to `storage.collection_root`.
    #[arg(long)]
    pub collection: String,

    /// Window start, `YYYYMMDDTHHMMSSZ`. Open when omitted.
    #[arg(long, value_name = "UTC")]
    pub start: Option<String>,

    /// Window end (exclusive), `YYYYMMDDTHHMMSSZ`. Open when omitted.
    #[arg(long, value_name = "UTC")]
    pub end: Option<String>,

    /// Return materialized occurrences instead of stored objects.
    #[arg(long)]
    pub expand: bool,

    /// Zone for floating times and all-day dates.
    #[arg(long = "tz", value_name = "ZONE")]
    pub reference_zone: Option<String>,

    /// Object identities; every object in the collection when empty.
    pub identities: Vec<String>,
}

/// One JSON status line per object.
#[derive(Debug, Serialize)]
struct ObjectReport<'a> {
    identity: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instances: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// ## Summary
/// Executes a parsed command and writes its output to `out`.
///
/// ## Errors
/// Returns `AppError` for invalid arguments, an unknown collection,
/// storage failures and output failures. Per-object failures are part of
/// the output, not errors.
pub async fn run(cli: Cli, settings: &Settings, out: &mut impl Write) -> AppResult<()> {
    match cli.command {
        Command::Query(args) => query(args, settings, out).await,
        Command::Prune { collection } => {
            let store = FsObjectStore::open(&settings.storage.collection_root, &collection).await?;
            let coordinator = QueryCoordinator::from_settings(store, settings, &collection)?;
            let removed = coordinator.prune_cache().await?;
            writeln!(out, "{}", serde_json::json!({ "collection": collection, "removed": removed }))?;
            Ok(())
        }
    }
}

async fn query(args: QueryArgs, settings: &Settings, out: &mut impl Write) -> AppResult<()> {
    let window = TimeWindow::parse(args.start.as_deref(), args.end.as_deref())?;
    let reference_zone = args
        .reference_zone
        .as_deref()
        .map(|zone| {
            Tz::from_str(zone).map_err(|e| AppError::InvalidArgument(format!("--tz {zone}: {e}")))
        })
        .transpose()?;

    let store = FsObjectStore::open(&settings.storage.collection_root, &args.collection).await?;
    let coordinator = QueryCoordinator::from_settings(store, settings, &args.collection)?;

    let outcomes = if args.identities.is_empty() {
        coordinator
            .query_all(window, args.expand, reference_zone)
            .await?
    } else {
        coordinator
            .query(&QueryRequest {
                window,
                identities: args.identities,
                expand: args.expand,
                reference_zone,
            })
            .await?
    };

    write_outcomes(&outcomes, out)
}

fn write_outcomes(outcomes: &BTreeMap<String, ObjectOutcome>, out: &mut impl Write) -> AppResult<()> {
    for (identity, outcome) in outcomes {
        let report = ObjectReport {
            identity,
            status: outcome.status(),
            instances: match outcome {
                ObjectOutcome::Matched(data) => data.instance_count(),
                ObjectOutcome::Empty | ObjectOutcome::Failed(_) => None,
            },
            error: match outcome {
                ObjectOutcome::Failed(failure) => Some(failure.to_string()),
                ObjectOutcome::Matched(_) | ObjectOutcome::Empty => None,
            },
        };
        writeln!(out, "{}", serde_json::to_string(&report)?)?;
        if let ObjectOutcome::Matched(data) = outcome {
            out.write_all(data.text().as_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}
