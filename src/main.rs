//! CLI Entry Point for encoder-daq
//!
//! Provides command-line interface for:
//! - Listing the DAQ devices the configured driver can see
//! - Polling rotary encoders and printing unwrapped angles until Ctrl+C
//! - Printing the effective configuration
//!
//! # Usage
//!
//! List devices:
//! ```bash
//! encoder-daq list
//! ```
//!
//! Show the configuration after file and environment merging:
//! ```bash
//! ENCODER_DAQ_ACQUISITION__HIGH_CHANNEL=3 encoder-daq config
//! ```
//!
//! Poll channels 0-3 of the first device for 500 iterations:
//! ```bash
//! encoder-daq run --high-channel 3 --iterations 500
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;

use encoder_daq::acquisition::{AcquisitionLoop, StopReason};
use encoder_daq::config::{AppConfig, DriverKind, DEFAULT_CONFIG_PATH};
use encoder_daq::display::{self, ConsoleDisplay};
use encoder_daq::hardware::mock::MockInventory;
use encoder_daq::hardware::DeviceInventory;
use encoder_daq::logging;
use encoder_daq::session::{self, DeviceSession};
use encoder_daq::unwrap::ReferenceMode;

#[derive(Parser)]
#[command(name = "encoder-daq")]
#[command(about = "Poll analog rotary encoders and print unwrapped angles", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the DAQ devices the configured driver can see
    List,

    /// Poll encoders and print unwrapped angles (default)
    Run(RunArgs),

    /// Print the effective configuration (file + environment) as TOML
    Config,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Index of the device to use, as shown by `list`
    #[arg(long)]
    device: Option<usize>,

    /// First channel (reference channel when re-sampling)
    #[arg(long)]
    low_channel: Option<u32>,

    /// Last channel
    #[arg(long)]
    high_channel: Option<u32>,

    /// Index into the device's supported ranges
    #[arg(long)]
    range_index: Option<usize>,

    /// Use a fixed full-scale voltage instead of re-reading the reference channel
    #[arg(long, value_name = "VOLTS")]
    fixed_reference: Option<f64>,

    /// Fraction of full scale treated as a wrap-around
    #[arg(long)]
    tolerance_ratio: Option<f64>,

    /// Stop after this many iterations
    #[arg(long)]
    iterations: Option<u64>,

    /// Seed for simulated hardware noise
    #[arg(long)]
    seed: Option<u64>,

    /// Do not clear the terminal before polling
    #[arg(long)]
    no_clear: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(index) = self.device {
            config.device.descriptor_index = index;
        }
        if let Some(low) = self.low_channel {
            config.acquisition.low_channel = low;
        }
        if let Some(high) = self.high_channel {
            config.acquisition.high_channel = high;
        }
        if let Some(index) = self.range_index {
            config.acquisition.range_index = index;
        }
        if let Some(full_scale) = self.fixed_reference {
            config.unwrap.reference = ReferenceMode::Fixed { full_scale };
        }
        if let Some(ratio) = self.tolerance_ratio {
            config.unwrap.tolerance_ratio = ratio;
        }
        if let Some(iterations) = self.iterations {
            config.acquisition.max_iterations = Some(iterations);
        }
        if let Some(seed) = self.seed {
            config.device.seed = Some(seed);
        }
        if self.no_clear {
            config.acquisition.clear_screen = false;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run(RunArgs::default()));

    let mut config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Commands::Run(args) = &command {
        args.apply(&mut config);
    }
    config.validate()?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let inventory = build_inventory(&config);

    match command {
        Commands::List => list_devices(inventory.as_ref(), &config).await,
        Commands::Run(_) => run(inventory.as_ref(), &config).await,
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn build_inventory(config: &AppConfig) -> Box<dyn DeviceInventory> {
    match config.device.driver {
        DriverKind::Mock => Box::new(MockInventory::new(config.device.seed)),
    }
}

async fn list_devices(inventory: &dyn DeviceInventory, config: &AppConfig) -> Result<()> {
    let devices = session::discover(inventory, config.device.interface).await?;
    display::write_device_list(&mut io::stdout().lock(), &devices)?;
    Ok(())
}

async fn run(inventory: &dyn DeviceInventory, config: &AppConfig) -> Result<()> {
    let devices = session::discover(inventory, config.device.interface).await?;
    {
        let mut out = io::stdout().lock();
        display::write_device_list(&mut out, &devices)?;
        out.flush()?;
    }

    let descriptor = session::select(&devices, config.device.descriptor_index)?;
    println!("\nConnecting to {} - please wait...", descriptor.dev_string);
    let session =
        DeviceSession::open(inventory, descriptor, &config.device, &config.acquisition).await?;

    let result = poll(&session, config).await;
    let closed = session.shutdown().await;

    let summary = result?;
    closed?;

    match summary.stop_reason {
        StopReason::Cancelled => tracing::info!(iterations = summary.iterations, "interrupted"),
        StopReason::IterationLimit => {
            tracing::info!(iterations = summary.iterations, "iteration limit reached")
        }
        StopReason::NumericFault { channel, .. } => {
            tracing::info!(iterations = summary.iterations, channel, "stopped on numeric fault")
        }
    }
    Ok(())
}

async fn poll(
    session: &DeviceSession,
    config: &AppConfig,
) -> Result<encoder_daq::acquisition::LoopSummary> {
    display::write_ready_summary(&mut io::stdout().lock(), session.descriptor(), session.settings())?;

    let mut console = ConsoleDisplay::new(io::stdout(), session.descriptor());
    if config.acquisition.clear_screen {
        console.clear()?;
    }

    let summary = AcquisitionLoop::new(session.analog_input(), *session.settings(), config)
        .run(&mut console, shutdown_signal())
        .await?;
    Ok(summary)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Ctrl+C handler unavailable; run until stopped otherwise");
        std::future::pending::<()>().await;
    }
}
