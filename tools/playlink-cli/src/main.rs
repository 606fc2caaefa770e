//! PlayLink diagnostics CLI
//!
//! Runs the client core offline, without any host on the network.
//!
//! # Usage
//!
//! ```bash
//! # Resolve a negotiation scenario and print the configuration as JSON
//! playlink negotiate ./scenarios/hevc_software_fallback.toml
//!
//! # Generate a pairing PIN
//! playlink pin
//!
//! # Check how a manually entered host address is interpreted
//! playlink parse-address "[fe80::1]:48010"
//!
//! # Validate a client config file and print the effective settings
//! playlink config ./playlink.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use playlink_core::registry::{HostAddress, DEFAULT_HTTP_PORT};
use playlink_core::{
    resolve, Advisory, ClientCapabilities, ClientConfig, FatalReason, HostCapabilities, Pin,
    ResolvedStreamConfig, UserOverrides,
};

/// Exit code when negotiation fails fatally
const EXIT_FATAL: i32 = 2;

#[derive(Parser)]
#[command(name = "playlink")]
#[command(author, version)]
#[command(about = "Offline diagnostics for PlayLink stream negotiation and pairing")]
struct Args {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a stream configuration from a scenario TOML file
    Negotiate {
        /// Scenario with [host], [client] and [overrides] tables
        scenario: PathBuf,

        /// Compact single-line JSON output
        #[arg(long)]
        compact: bool,
    },

    /// Generate a 4-digit pairing PIN
    Pin,

    /// Parse a manually entered host address
    ParseAddress {
        input: String,

        /// Port assumed when the input has none
        #[arg(short, long, default_value_t = DEFAULT_HTTP_PORT)]
        port: u16,
    },

    /// Validate a client config file and print the effective settings
    Config {
        /// Config file; defaults are printed when omitted
        path: Option<PathBuf>,
    },
}

/// Negotiation inputs read from a scenario file.
#[derive(Debug, Deserialize)]
struct Scenario {
    host: HostCapabilities,
    #[serde(default)]
    client: ClientCapabilities,
    #[serde(default)]
    overrides: UserOverrides,
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum NegotiationReport {
    Resolved {
        config: ResolvedStreamConfig,
    },
    Fatal {
        message: String,
        #[serde(flatten)]
        reason: FatalReason,
        advisory: Advisory,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    match args.command {
        Command::Negotiate { scenario, compact } => {
            let scenario = load_scenario(&scenario)?;
            let (report, fatal) = negotiate(&scenario);
            let json = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{}", json);
            if fatal {
                std::process::exit(EXIT_FATAL);
            }
        }
        Command::Pin => {
            println!("{}", Pin::generate());
        }
        Command::ParseAddress { input, port } => {
            let address = HostAddress::parse(&input, port)?;
            println!("{}", serde_json::to_string(&address)?);
            tracing::info!(%address, ipv6 = address.is_ipv6(), "parsed address");
        }
        Command::Config { path } => {
            let config = match path {
                Some(path) => ClientConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => ClientConfig::default(),
            }
            .apply_env();
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    parse_scenario(&content).with_context(|| format!("Invalid scenario {}", path.display()))
}

fn parse_scenario(content: &str) -> Result<Scenario> {
    Ok(toml::from_str(content)?)
}

/// Returns the report and whether negotiation was fatal.
fn negotiate(scenario: &Scenario) -> (NegotiationReport, bool) {
    match resolve(&scenario.host, &scenario.client, &scenario.overrides) {
        Ok(config) => {
            tracing::debug!(advisories = config.advisories.len(), "negotiation resolved");
            (NegotiationReport::Resolved { config }, false)
        }
        Err(reason) => {
            tracing::warn!(reason = %reason, "negotiation failed");
            let report = NegotiationReport::Fatal {
                message: reason.to_string(),
                advisory: reason.to_advisory(),
                reason,
            };
            (report, true)
        }
    }
}
