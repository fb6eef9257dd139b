//! Shroud operator tool.
//!
//! # Usage
//!
//! ```bash
//! # Check a certificate blob against the production trust root
//! shroud inspect cert.bin
//!
//! # Derive the access key a profile key grants
//! shroud derive-key 00112233...
//!
//! # Read and write access modes in a redb database
//! shroud mode get --db ud.redb +15551234567
//! shroud mode set --db ud.redb +15551234567 unrestricted
//! ```

mod commands;

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand, ValueEnum};
use shroud_core::{AccessMode, Environment, SystemEnv, config::DEFAULT_CERTIFICATE_EXPIRY_MARGIN};
use shroud_crypto::{Deployment, TrustRoot};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sealed-sender operator tool
#[derive(Parser, Debug)]
#[command(name = "shroud")]
#[command(about = "Inspect sealed-sender certificates, access keys, and access modes")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate a serialized sender certificate
    Inspect {
        /// Path to the certificate blob
        path: PathBuf,

        /// Deployment whose trust root to use
        #[arg(long, value_enum, default_value_t = DeploymentArg::Production)]
        deployment: DeploymentArg,

        /// Hex Ed25519 key overriding the deployment trust root
        #[arg(long)]
        trust_root: Option<String>,

        /// Server certificate key id to treat as revoked (repeatable)
        #[arg(long = "revoked")]
        revoked_key_ids: Vec<u32>,

        /// Validation time in ms since the Unix epoch (default: now + margin)
        #[arg(long)]
        at_ms: Option<u64>,
    },

    /// Derive an access key from a hex profile key
    DeriveKey {
        /// 32-byte profile key, hex
        profile_key: String,
    },

    /// Read or write access modes
    Mode {
        #[command(subcommand)]
        action: ModeAction,
    },
}

#[derive(Subcommand, Debug)]
enum ModeAction {
    /// Print the mode of a recipient
    Get {
        /// Path to the redb database
        #[arg(long)]
        db: PathBuf,

        /// Recipient id
        recipient: String,
    },

    /// Set the mode of a recipient
    Set {
        /// Path to the redb database
        #[arg(long)]
        db: PathBuf,

        /// Recipient id
        recipient: String,

        /// unknown, enabled, disabled, or unrestricted
        mode: AccessMode,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DeploymentArg {
    Production,
    Staging,
}

impl From<DeploymentArg> for Deployment {
    fn from(arg: DeploymentArg) -> Self {
        match arg {
            DeploymentArg::Production => Self::Production,
            DeploymentArg::Staging => Self::Staging,
        }
    }
}

#[allow(clippy::print_stdout)]
fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match args.command {
        Command::Inspect { path, deployment, trust_root, revoked_key_ids, at_ms } => {
            let deployment = Deployment::from(deployment);
            let trust_root = match trust_root {
                Some(hex_key) => commands::parse_trust_root(&hex_key)?,
                None => TrustRoot::for_deployment(deployment)?,
            };
            let validation_time_ms = at_ms.unwrap_or_else(|| {
                let margin_ms = DEFAULT_CERTIFICATE_EXPIRY_MARGIN.as_millis() as u64;
                SystemEnv::new().wall_clock_millis().saturating_add(margin_ms)
            });
            tracing::info!(%deployment, validation_time_ms, "Inspecting certificate");

            let bytes = commands::read_certificate(&path)?;
            let inspection = commands::inspect_certificate(
                &bytes,
                trust_root,
                &revoked_key_ids,
                validation_time_ms,
            )?;
            println!("{}", inspection.report);

            if !inspection.valid {
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::DeriveKey { profile_key } => {
            println!("{}", commands::derive_key(&profile_key)?);
        },
        Command::Mode { action: ModeAction::Get { db, recipient } } => {
            println!("{}", commands::get_mode(&db, &recipient)?);
        },
        Command::Mode { action: ModeAction::Set { db, recipient, mode } } => {
            commands::set_mode(&db, &recipient, mode)?;
        },
    }

    Ok(ExitCode::SUCCESS)
}
