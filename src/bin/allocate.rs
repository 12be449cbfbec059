use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fi_allocator::{allocate, Account, Constraints, Order, Policy, Security};
use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Runs the allocation engine against a JSON scenario file and prints the result.
#[derive(Debug, Parser)]
#[command(name = "allocate", about = "Allocate a block order across portfolio accounts")]
struct Cli {
    /// Path to a JSON scenario file containing order/security/accounts/policy/constraints.
    scenario: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Scenario {
    order: Order,
    security: Security,
    accounts: Vec<Account>,
    policy: Policy,
    constraints: Constraints,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let raw = fs::read_to_string(&cli.scenario)
        .with_context(|| format!("failed to read scenario file {}", cli.scenario.display()))?;

    let scenario: Scenario = serde_json::from_str(&raw).context("failed to parse scenario file")?;

    let result = allocate(&scenario.order, &scenario.security, &scenario.accounts, &scenario.policy, &scenario.constraints);

    let json = serde_json::to_string_pretty(&result).context("failed to serialize allocation result")?;
    println!("{json}");
    Ok(())
}
