//! # Tracker Decoder
//!
//! Decode a single tracker uplink from the command line and print it as JSON.
//!
//! ```text
//! tracker-decoder decode --device tagsl --port 1 8002cdcd1300744f5e166018040b14341a
//! tracker-decoder capture-time --received-at 2024-08-05T12:00:18Z <nav-hex>...
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tracker_decoder::config::Config;
use tracker_decoder::device::{
    NomadXsDecoder, SmartLabelDecoder, SmartLabelVersion, TagSlDecoder, TagXlDecoder, UplinkContext, UplinkDecoder,
};
use tracker_decoder::gnssng::Capture;
use tracker_decoder::solver::{LoraCloudClient, PositionSolver, ReqwestTransport, SolverVersion};

#[derive(Debug, Parser)]
#[command(name = "tracker-decoder", version, about = "Decode asset tracker uplinks")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "TRACKER_DECODER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode one uplink payload
    Decode {
        #[arg(short, long, value_enum)]
        device: Device,

        #[arg(short, long)]
        port: u8,

        /// 16 hex characters, needed by solver ports
        #[arg(long, default_value = "0000000000000000")]
        dev_eui: String,

        /// LoRaWAN uplink frame counter
        #[arg(long, default_value_t = 0)]
        fcnt: u32,

        /// Network reception time, defaults to now
        #[arg(long)]
        received_at: Option<DateTime<Utc>>,

        /// Payload as hex
        payload: String,
    },

    /// Infer the capture time of a GNSS-NG navigation group
    CaptureTime {
        /// Reception time shared by every frame
        #[arg(long)]
        received_at: DateTime<Utc>,

        /// NAV frames as hex
        #[arg(required = true)]
        payloads: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Device {
    Tagsl,
    Tagxl,
    Nomadxs,
    Smartlabel,
    SmartlabelV2,
}

/// Solver for GNSS ports, when the configuration provides one
fn build_solver(config: &Config) -> Result<Option<Arc<dyn PositionSolver>>> {
    match config.solver.version {
        SolverVersion::V2 if !config.solver.base_url.is_empty() => {
            let client = LoraCloudClient::new(config.loracloud_settings(), Arc::new(ReqwestTransport::new()))
                .context("Failed to create LoRaCloud client")?;
            Ok(Some(Arc::new(client)))
        }
        SolverVersion::V2 => {
            debug!("No solver base_url configured, GNSS ports are unavailable");
            Ok(None)
        }
        SolverVersion::V1 => {
            warn!("Solver v1 needs a position estimator and is only available as a library");
            Ok(None)
        }
    }
}

fn build_decoder(device: Device, config: &Config) -> Result<Box<dyn UplinkDecoder>> {
    let options = config.decode_options();
    Ok(match device {
        Device::Tagsl => Box::new(TagSlDecoder::new(options)),
        Device::Nomadxs => Box::new(NomadXsDecoder::new(options)),
        Device::Tagxl => Box::new(
            TagXlDecoder::new(options, build_solver(config)?).with_buffered_age(config.tagxl_buffered_age()),
        ),
        Device::Smartlabel => Box::new(SmartLabelDecoder::new(
            SmartLabelVersion::V1,
            options,
            build_solver(config)?,
        )),
        Device::SmartlabelV2 => Box::new(SmartLabelDecoder::new(
            SmartLabelVersion::V2,
            options,
            build_solver(config)?,
        )),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize logging; stdout carries the JSON result
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("Tracker decoder v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Decode {
            device,
            port,
            dev_eui,
            fcnt,
            received_at,
            payload,
        } => {
            let decoder = build_decoder(device, &config)?;

            let mut ctx = UplinkContext::new(dev_eui, fcnt);
            ctx.received_at = received_at;

            let cancel = ctx.cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, cancelling...");
                    cancel.cancel();
                }
            });

            let decoded = decoder
                .decode(&payload, port, &ctx)
                .await
                .with_context(|| format!("Failed to decode port {} as {}", port, decoder.name()))?;
            if let Some(validation) = &decoded.validation {
                warn!("Validation failed: {}", validation);
            }
            println!("{}", serde_json::to_string_pretty(&decoded.uplink.to_json())?);
        }
        Command::CaptureTime { received_at, payloads } => {
            let captures: Vec<Capture> = payloads.into_iter().map(|p| Capture::new(p, received_at)).collect();
            let at = config
                .capture_time_solver()
                .solve(&captures)
                .context("Failed to infer capture time")?;
            println!("{}", at.to_rfc3339());
        }
    }

    Ok(())
}
