//! ContentHub command-line tool.
//!
//! Runs the content operations against a JSON fixture file.
//!
//! Usage:
//!   contenthub --fixtures crates/cli/fixtures/sample.json info comment <id>
//!   contenthub update user_join <id>=active

mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contenthub_kernel::content::{LogSink, bind_sink, collect_console_items};
use contenthub_kernel::event::Params;
use contenthub_kernel::{Config, ContentCoordinator, EventBus};
use contenthub_sdk::types::{ChangeSet, EntityId, ModerationStatus, StatusChange};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::fixtures::Fixtures;

#[derive(Parser, Debug)]
#[command(name = "contenthub", version, about = "Inspect and moderate ContentHub content")]
struct Args {
    /// JSON file holding users, comments and avatars.
    #[arg(long, env = "CONTENTHUB_FIXTURES", default_value = "contenthub.json")]
    fixtures: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered entity types.
    Types,

    /// Show info views of entities.
    Info {
        entity_type: String,
        #[arg(required = true)]
        ids: Vec<EntityId>,
    },

    /// Change moderation status: `<id>=<status>[,flagged|,unflagged]`.
    Update {
        entity_type: String,
        #[arg(required = true, value_parser = parse_change)]
        changes: Vec<(EntityId, StatusChange)>,
    },

    /// Delete entities.
    Delete {
        entity_type: String,
        #[arg(required = true)]
        ids: Vec<EntityId>,
    },

    /// List the admin console items.
    Console,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let fixtures = Fixtures::load(&args.fixtures)?;
    let stores = fixtures.stores();

    let bus = Arc::new(EventBus::from_config(&config));
    let provider = stores.untranslated_provider();
    provider.bind(&bus).context("failed to bind base module")?;
    bind_sink(&bus, Arc::new(LogSink::default())).context("failed to bind log sink")?;
    bus.freeze();

    let content = ContentCoordinator::new(Arc::clone(&bus), config)?;
    provider.attach(&content);
    info!(types = content.registry().len(), "content types registered");

    match args.command {
        Command::Types => print_json(&content.registry().types()),
        Command::Info { entity_type, ids } => print_json(&content.get_info(&entity_type, &ids)?),
        Command::Update {
            entity_type,
            changes,
        } => {
            let changes: ChangeSet = changes.into_iter().collect();
            let report = content.update_info(&entity_type, &changes)?;
            fixtures.snapshot(&stores).save(&args.fixtures)?;
            print_json(&report)
        }
        Command::Delete { entity_type, ids } => {
            content.delete(&entity_type, &ids)?;
            fixtures.snapshot(&stores).save(&args.fixtures)?;
            print_json(&ids)
        }
        Command::Console => print_json(&collect_console_items(&bus, Params::new())?),
    }
}

/// Parse `<id>=<status>` with an optional `,flagged` or `,unflagged` suffix.
fn parse_change(arg: &str) -> Result<(EntityId, StatusChange), String> {
    let (id, rest) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected <id>=<status>, got '{arg}'"))?;
    let id: EntityId = id
        .trim()
        .parse()
        .map_err(|e| format!("invalid id '{id}': {e}"))?;

    let (status, flag) = match rest.split_once(',') {
        Some((status, flag)) => (status, Some(flag.trim())),
        None => (rest, None),
    };
    let mut change = StatusChange::to(status.parse::<ModerationStatus>()?);
    match flag {
        None => {}
        Some("flagged") => change = change.with_flagged(true),
        Some("unflagged") => change = change.with_flagged(false),
        Some(other) => return Err(format!("unknown flag '{other}' (expected flagged or unflagged)")),
    }

    Ok((id, change))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Log to stderr so stdout carries only JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use uuid::Uuid;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn change_with_status_only() {
        let id = Uuid::now_v7();
        let (parsed, change) = parse_change(&format!("{id}=active")).unwrap();

        assert_eq!(parsed, id);
        assert_eq!(change, StatusChange::to(ModerationStatus::Active));
    }

    #[test]
    fn change_with_flag() {
        let id = Uuid::now_v7();
        let (_, change) = parse_change(&format!("{id}=approval,flagged")).unwrap();

        assert_eq!(change.status, ModerationStatus::Approval);
        assert_eq!(change.flagged, Some(true));
    }

    #[test]
    fn malformed_changes_are_rejected() {
        let id = Uuid::now_v7();
        assert!(parse_change("active").is_err());
        assert!(parse_change("not-a-uuid=active").is_err());
        assert!(parse_change(&format!("{id}=deleted")).is_err());
        assert!(parse_change(&format!("{id}=active,pinned")).is_err());
    }

    #[test]
    fn update_command_parses_several_changes() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let args = Args::try_parse_from([
            "contenthub",
            "--fixtures",
            "f.json",
            "update",
            "comment",
            &format!("{a}=active"),
            &format!("{b}=approval,unflagged"),
        ])
        .unwrap();

        let Command::Update {
            entity_type,
            changes,
        } = args.command
        else {
            panic!("expected update command");
        };
        assert_eq!(entity_type, "comment");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].1.flagged, Some(false));
    }
}
