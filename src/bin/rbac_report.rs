//! RBAC report
//!
//! Loads an endpoint catalog, registers it the way a host would at startup and
//! prints the policy every operation ends up with.

use anyhow::{bail, Context};
use clap::Parser;
use endpoint_rbac::{
    FailurePolicy, GlobalConfig, PolicyResolver, PolicySource, RbacError, Registrar,
    RegistrarConfig, ResolvedPolicy, RouteTable, StaticCatalog,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "rbac-report")]
#[command(about = "Resolve and print the access policy of every endpoint in a catalog")]
struct Args {
    /// Catalog file (.toml or .json)
    #[arg(short = 'c', long)]
    catalog: PathBuf,

    /// RBAC configuration file (TOML, [rbac] section)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deny unannotated operations in groups that use RBAC (overrides --config)
    #[arg(long)]
    deny_non_annotated: bool,

    /// Directory searched for the default-deny marker (repeatable)
    #[arg(long = "marker-path")]
    marker_paths: Vec<PathBuf>,

    /// Output format (text, json) [default: text]
    #[arg(short = 'f', long, default_value = "text")]
    format: String,

    /// Registration worker threads
    #[arg(short = 'w', long, default_value = "4")]
    workers: usize,

    /// Report unresolvable operations instead of stopping at them
    #[arg(long)]
    reject_failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

/// Parse output format from CLI string
fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        _ => Err(format!("Invalid format '{}'. Valid options: text, json", s)),
    }
}

fn load_config(args: &Args) -> anyhow::Result<GlobalConfig> {
    if args.deny_non_annotated {
        return Ok(GlobalConfig::new(true));
    }
    if let Some(path) = &args.config {
        return GlobalConfig::load(path)
            .with_context(|| format!("failed to load configuration {:?}", path));
    }
    Ok(GlobalConfig::from_marker(&args.marker_paths))
}

#[derive(Serialize)]
struct Report {
    deny_non_annotated_by_default: bool,
    routes: Vec<RouteEntry>,
    rejected: Vec<RejectedEntry>,
}

#[derive(Serialize)]
struct RouteEntry {
    operation: String,
    method: Option<String>,
    policy: Option<ResolvedPolicy>,
    source: PolicySource,
}

#[derive(Serialize)]
struct RejectedEntry {
    operation: String,
    error: String,
}

fn build_report(config: GlobalConfig, table: &RouteTable) -> Report {
    Report {
        deny_non_annotated_by_default: config.deny_non_annotated_by_default,
        routes: table
            .iter()
            .map(|route| RouteEntry {
                operation: route.id.to_string(),
                method: route.method.map(|m| m.to_string()),
                policy: route.policy().cloned(),
                source: route.source(),
            })
            .collect(),
        rejected: table
            .rejected()
            .iter()
            .map(|r| RejectedEntry {
                operation: r.id.to_string(),
                error: r.error.to_string(),
            })
            .collect(),
    }
}

fn print_text(report: &Report) {
    for route in &report.routes {
        let policy = route
            .policy
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "none".to_string());
        println!(
            "{:<8} {:<40} {:<32} ({})",
            route.method.as_deref().unwrap_or("-"),
            route.operation,
            policy,
            route.source
        );
    }
    for rejected in &report.rejected {
        println!("REJECTED {:<40} {}", rejected.operation, rejected.error);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let format = parse_format(&args.format).map_err(anyhow::Error::msg)?;

    let config = load_config(&args)?;
    info!(
        "deny_non_annotated_by_default={}",
        config.deny_non_annotated_by_default
    );

    let catalog = StaticCatalog::load(&args.catalog)
        .with_context(|| format!("failed to load catalog {:?}", args.catalog))?;
    info!("Loaded {} groups from {:?}", catalog.len(), args.catalog);

    let registrar = Registrar::with_config(
        PolicyResolver::new(config),
        RegistrarConfig {
            failure_policy: if args.reject_failed {
                FailurePolicy::RejectOperation
            } else {
                FailurePolicy::AbortStartup
            },
            workers: args.workers,
        },
    );

    let table = match registrar.register_parallel(&catalog) {
        Ok(table) => table,
        Err(RbacError::RegistrationAborted { rejected }) => {
            for err in &rejected {
                error!("{}", err);
            }
            bail!("{} operation(s) failed to resolve", rejected.len());
        }
        Err(e) => return Err(e.into()),
    };

    let report = build_report(config, &table);
    match format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !report.rejected.is_empty() {
        bail!("{} operation(s) failed to resolve", report.rejected.len());
    }

    Ok(())
}
