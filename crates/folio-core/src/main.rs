//! `folio` command-line driver over JSON files

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use folio_core::{FolioConfig, FolioService, MemoryStore};
use folio_identity::{IdMinter, Reconciler, SequentialMinter, UlidMinter};
use folio_lifecycle::{infer_long_term_keys, sanitize_seed};
use folio_model::{Instance, InstanceData, Page, Template};
use folio_projection::Projector;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let history = || {
        Arg::new("history")
            .long("history")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("JSON array of instance data maps, most recent first")
    };
    let allow = || {
        Arg::new("allow")
            .long("allow")
            .action(ArgAction::Append)
            .help("Long-term key to carry regardless of history (repeatable)")
    };

    Command::new("folio")
        .version(folio_core::VERSION)
        .about("Versioned form templates with per-subject instances")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML or YAML configuration file"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("compact")
                .value_parser(["compact", "json"])
                .help("Log output format (logs go to stderr)"),
        )
        .subcommand(
            Command::new("reconcile")
                .about("Assign stable ids to a structure against its previous revision")
                .arg(
                    Arg::new("previous")
                        .long("previous")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of pages currently stored (omit for a new template)"),
                )
                .arg(
                    Arg::new("next")
                        .long("next")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of pages being saved"),
                )
                .arg(
                    Arg::new("sequential")
                        .long("sequential")
                        .action(ArgAction::SetTrue)
                        .help("Mint b1/r1-style ids instead of ULIDs"),
                ),
        )
        .subcommand(
            Command::new("project")
                .about("Render an instance at its pinned template version")
                .arg(
                    Arg::new("template")
                        .long("template")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Template document JSON"),
                )
                .arg(
                    Arg::new("instance")
                        .long("instance")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Instance document JSON"),
                ),
        )
        .subcommand(
            Command::new("infer-keys")
                .about("Infer long-term keys from a subject's history")
                .arg(history())
                .arg(allow()),
        )
        .subcommand(
            Command::new("sanitize")
                .about("Build sanitized seed data for a new cycle")
                .arg(history())
                .arg(allow()),
        )
        .subcommand(
            Command::new("integrity")
                .about("Report (template, subject) pairs with several live instances")
                .arg(
                    Arg::new("instances")
                        .long("instances")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of instance documents"),
                ),
        )
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing --{name}"))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn allowlist(args: &ArgMatches) -> BTreeSet<String> {
    args.get_many::<String>("allow")
        .map(|keys| keys.cloned().collect())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let log_format = matches
        .get_one::<String>("log-format")
        .map_or("compact", String::as_str);
    init_tracing(log_format);

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => FolioConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => FolioConfig::default(),
    };

    match matches.subcommand() {
        Some(("reconcile", args)) => {
            let previous: Vec<Page> = match args.get_one::<PathBuf>("previous") {
                Some(path) => read_json(path)?,
                None => Vec::new(),
            };
            let next: Vec<Page> = read_json(path_arg(args, "next")?)?;
            let minter: Box<dyn IdMinter> = if args.get_flag("sequential") {
                Box::new(SequentialMinter::new())
            } else {
                Box::new(UlidMinter)
            };
            let reconciled = Reconciler::new(minter.as_ref())
                .with_options(config.signature)
                .reconcile(&previous, next);
            tracing::info!(
                blocks_minted = reconciled.report.blocks_minted,
                rows_minted = reconciled.report.rows_minted,
                "reconciled structure"
            );
            print_json(&reconciled.pages)?;
        }
        Some(("project", args)) => {
            let template: Template = read_json(path_arg(args, "template")?)?;
            let instance: Instance = read_json(path_arg(args, "instance")?)?;
            let view = Projector::new().project(&template, instance.template_version, &instance.data);
            print_json(&view)?;
        }
        Some(("infer-keys", args)) => {
            let history: Vec<InstanceData> = read_json(path_arg(args, "history")?)?;
            let inference = infer_long_term_keys(&history, &allowlist(args), &config.inference)
                .context("key inference failed")?;
            print_json(&json!({
                "longTerm": inference.long_term,
                "sampled": inference.sampled,
                "counts": inference.counts,
                "oversized": inference.oversized,
            }))?;
        }
        Some(("sanitize", args)) => {
            let history: Vec<InstanceData> = read_json(path_arg(args, "history")?)?;
            let policy = &config.inference;
            let inference = infer_long_term_keys(&history, &allowlist(args), policy)
                .context("key inference failed")?;
            let seed = sanitize_seed(
                history.iter().take(policy.sample_size),
                &inference.long_term,
                &policy.blacklist,
            );
            print_json(&json!({
                "data": seed.data,
                "stripped": seed.stripped,
                "flagsReset": seed.flags_reset,
            }))?;
        }
        Some(("integrity", args)) => {
            let instances: Vec<Instance> = read_json(path_arg(args, "instances")?)?;
            let store = Arc::new(MemoryStore::new());
            store.import_instances(instances);
            let service = FolioService::with_store(config, store);
            let report = service
                .integrity_report()
                .await
                .context("integrity scan failed")?;
            print_json(&report)?;
            if !report.is_clean() {
                std::process::exit(1);
            }
        }
        _ => {}
    }
    Ok(())
}
