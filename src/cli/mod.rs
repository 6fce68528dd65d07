//! # Command Line Interface
//!
//! Node certificate tooling: first-start initialization, host certificate
//! rotation, and the CA hand-off used when a node joins a cluster.

pub mod output;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::certs::{
    CaTransferPayload, CertificateBundle, CertsLocator, CredentialStore, FileMode,
    FsCredentialStore, RcgenCaProvider, TlsContext, WritePolicy,
};
use crate::config::TlsInitConfig;
use crate::observability::{init_logging, log_config_info};

#[derive(Parser, Debug)]
#[command(name = "autotls")]
#[command(about = "Node TLS certificate bootstrap and rotation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Certificates directory override
    #[arg(long, global = true)]
    pub certs_dir: Option<PathBuf>,

    /// Advertised RPC address override
    #[arg(long, global = true)]
    pub advertise_addr: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create every missing CA and host certificate
    Init,

    /// Re-issue host certificates with the existing CAs
    Rotate,

    /// Export this node's CAs for a joining node
    Collect {
        /// Write the payload to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Initialize this node from CAs exported by a cluster member
    Receive {
        /// Payload produced by `collect`
        #[arg(long)]
        bundle: PathBuf,
    },

    /// Show which certificates are present
    Status {
        /// Output format (json, yaml, or table)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

/// Run CLI commands
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);
    execute(cli, &mut std::io::stdout())
}

/// Execute a parsed command. Payloads and reports go to `out`.
pub fn execute(cli: Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    log_config_info(&config);

    let store = FsCredentialStore;
    let ctx = TlsContext::new(&config.certs_dir, &store, &RcgenCaProvider, &CertsLocator);

    match cli.command {
        Commands::Init => {
            CertificateBundle::default()
                .bootstrap(&ctx, &config.addresses)
                .context("failed to initialize node certificates")?;
        }
        Commands::Rotate => {
            let rotated = CertificateBundle::rotate(&ctx, &config.addresses)
                .context("failed to rotate host certificates")?;
            let names: Vec<&str> = rotated.iter().map(|slot| slot.as_str()).collect();
            info!(rotated = ?names, "host certificates rotated");
        }
        Commands::Collect { output } => {
            let bundle = CertificateBundle::collect_local_bundle(&ctx)
                .context("failed to collect CA certificates")?;
            let payload = CaTransferPayload::from(&bundle).to_json()?;
            match output {
                Some(path) => write_payload(&store, &path, &payload)?,
                None => writeln!(out, "{payload}")?,
            }
        }
        Commands::Receive { bundle } => {
            let contents = std::fs::read_to_string(&bundle)
                .with_context(|| format!("failed to read {}", bundle.display()))?;
            let mut received = CaTransferPayload::from_json(&contents)?.into_bundle()?;
            received
                .receive_bundle(&ctx, &config.addresses)
                .context("failed to initialize node from received CAs")?;
        }
        Commands::Status { format } => {
            let format = output::OutputFormat::parse(&format)?;
            let report = CertificateBundle::status(&ctx)?;
            writeln!(out, "{}", output::render_status(&report, format)?)?;
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> anyhow::Result<TlsInitConfig> {
    let mut config = TlsInitConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.certs_dir {
        config.certs_dir = dir.clone();
    }
    if let Some(addr) = &cli.advertise_addr {
        config.addresses.advertise_addr = Some(addr.clone());
    }
    config.validate()?;
    Ok(config)
}

/// The payload holds CA private keys, so it gets key permissions and is
/// never written over an existing file.
fn write_payload(store: &dyn CredentialStore, path: &Path, payload: &str) -> anyhow::Result<()> {
    store
        .store(path, payload.as_bytes(), FileMode::PrivateKey, WritePolicy::CreateNew)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "CA payload written");
    Ok(())
}
