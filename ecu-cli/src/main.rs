//! ECU Simulator CLI Application
//!
//! This is the command-line front end for the simulated engine ECU.
//! It uses the ecu-core library and adds:
//! - Command-line and TOML configuration
//! - Logging setup
//! - Text or JSON output of every received frame
//! - SocketCAN as the bus transport

use anyhow::{Context, Result};
use clap::Parser;
use ecu_core::{FrameReport, ReceiveLoop, SignalKind, SignalTable, Transport};
use std::path::PathBuf;
use std::sync::Arc;

mod config;

use config::{AppConfig, OutputFormat};

/// ECU Simulator - engine ECU on a CAN bus
#[derive(Parser, Debug)]
#[command(name = "ecu-sim")]
#[command(about = "Simulated engine ECU: decodes CAN frames and sends telemetry while the ignition is on", long_about = None)]
#[command(version)]
struct Args {
    /// CAN interface to listen and transmit on (default: vcan0)
    #[arg(short, long, value_name = "IFACE")]
    interface: Option<String>,

    /// Path to configuration file (ecu.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Delay between telemetry cycles in milliseconds
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: Option<u64>,

    /// Output format for received frames
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Print the signal table and exit
    #[arg(long)]
    list_signals: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("ECU Simulator v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using ecu-core library v{}", ecu_core::VERSION);

    let config = resolve_config(&args)?;
    log::debug!("Effective configuration: {:?}", config);

    if args.list_signals {
        return list_signals(config.output.format);
    }

    run(&config)
}

/// Merge the optional config file with command-line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(interface) = &args.interface {
        config.bus.interface = interface.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        config.telemetry.interval_ms = interval_ms;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }

    Ok(config)
}

#[cfg(target_os = "linux")]
fn run(config: &AppConfig) -> Result<()> {
    let transport = ecu_core::SocketCanTransport::new(config.bus.interface.clone());
    run_on(Arc::new(transport), config)
}

#[cfg(not(target_os = "linux"))]
fn run(_config: &AppConfig) -> Result<()> {
    anyhow::bail!("SocketCAN is only available on Linux")
}

/// Run the ECU until the bus closes or fails
fn run_on<T: Transport>(transport: Arc<T>, config: &AppConfig) -> Result<()> {
    let ecu_config = config.ecu_config();
    let mut ecu = ReceiveLoop::connect(transport, &ecu_config)
        .with_context(|| format!("Cannot start ECU on {}", ecu_config.interface))?;

    let format = config.output.format;
    let result = ecu.run(|report| print_report(report, format));

    // Stop telemetry before reporting, whatever ended the loop
    for report in ecu.controller_mut().shutdown() {
        log::debug!(
            "Telemetry session {}: {} cycles, {} frames, {} dropped",
            report.session,
            report.cycles,
            report.frames_sent,
            report.send_failures
        );
    }

    let stats = result.context("Receive loop failed")?;
    log::info!(
        "Received {} frames: {} accepted, {} rejected, {} unrecognized, {} ignition changes",
        stats.received,
        stats.accepted,
        stats.rejected,
        stats.unrecognized,
        stats.ignition_changes
    );

    Ok(())
}

fn print_report(report: &FrameReport, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", report),
        OutputFormat::Json => match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => log::warn!("Cannot serialize frame 0x{:X}: {}", report.frame.id, e),
        },
    }
}

/// Print the compiled-in signal table
fn list_signals(format: OutputFormat) -> Result<()> {
    let table = SignalTable::standard();

    if let OutputFormat::Json = format {
        let descriptors: Vec<_> = table.iter().collect();
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    println!("═══════════════════════════════════════════════");
    println!("  ECU Signal Table");
    println!("═══════════════════════════════════════════════\n");

    for desc in table.iter() {
        let layout = match desc.kind {
            SignalKind::Switch { .. } => "switch, byte 0".to_string(),
            SignalKind::BigEndian16 { unit, .. } => format!("u16 BE, bytes 0-1 [{}]", unit),
            SignalKind::Byte { unit, .. } => format!("u8, byte 0 [{}]", unit),
        };
        println!(
            "  0x{:03X}  {:<22} {:<20} DLC {}  {}",
            desc.id,
            desc.name,
            desc.kind.label(),
            desc.expected_len,
            layout
        );
    }

    let stats = table.stats();
    println!(
        "\n  {} messages ({} switches, {} sensors)",
        stats.num_messages, stats.num_switches, stats.num_sensors
    );

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{} {}] {}",
                chrono::Local::now().format("%Y/%m/%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecu_core::{Connection, Frame, MemoryBus, IGNITION_ID};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "ecu-sim",
            "--interface",
            "can2",
            "--interval-ms",
            "200",
            "--format",
            "json",
        ]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.bus.interface, "can2");
        assert_eq!(config.telemetry.interval_ms, 200);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_zero_interval_flag_rejected() {
        let result = Args::try_parse_from(["ecu-sim", "--interval-ms", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_on_memory_bus() {
        let bus = MemoryBus::new();
        let mut external = bus.connect().unwrap();

        let mut config = AppConfig::default();
        config.telemetry.interval_ms = 10;

        let runner = {
            let bus = bus.clone();
            thread::spawn(move || run_on(Arc::new(bus), &config))
        };

        // Wait for the ECU's RX connection before talking to it
        while bus.connection_count() < 2 {
            thread::sleep(Duration::from_millis(5));
        }
        external
            .send(&Frame::full(IGNITION_ID, [1, 0, 0, 0, 0, 0, 0, 0]))
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        bus.close();

        assert!(runner.join().unwrap().is_ok());
    }
}
