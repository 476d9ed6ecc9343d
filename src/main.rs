// src/main.rs
//! Route Recorder - record GPS trips from gpsd or a serial receiver

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use route_recorder::{
    config::RecorderConfig,
    display::{format_distance, TerminalDisplay},
    export::{ExportFormat, SessionExporter},
    feed::{list_serial_ports, FixSource, LocationFeed},
    session::{SessionId, SessionRegistry, SessionSettings},
    store::{JsonStore, PersistenceSink, PersistenceWriter},
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "route-recorder", version, about = "Record GPS routes with distance, speed and waypoints")]
struct Cli {
    /// Directory holding recorded trips (overrides the config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a trip until Ctrl+C or `stop`
    Record {
        /// Trip name; a dated default is used when empty
        #[arg(short, long, default_value = "")]
        name: String,
        #[arg(long, value_enum)]
        source: Option<SourceKind>,
        /// gpsd host
        #[arg(long)]
        host: Option<String>,
        /// gpsd port
        #[arg(long)]
        port: Option<u16>,
        /// Serial device, e.g. /dev/ttyUSB0
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
        /// Minimum movement in meters between trace points
        #[arg(long)]
        threshold: Option<f64>,
        /// Log progress instead of drawing the dashboard
        #[arg(long)]
        no_dashboard: bool,
    },
    /// List recorded trips, most recent first
    List,
    /// Export a recorded trip
    Export {
        id: SessionId,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Gpx)]
        format: ExportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List available serial ports
    Ports,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Gpsd,
    Serial,
}

enum Input {
    Waypoint { name: String, description: String },
    Stop,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line == "stop" {
        return Some(Input::Stop);
    }
    let rest = line.strip_prefix("wp ")?;
    let (name, description) = rest.split_once('|').unwrap_or((rest, ""));
    Some(Input::Waypoint {
        name: name.trim().to_string(),
        description: description.trim().to_string(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("route_recorder=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match RecorderConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("{}; using defaults", e);
            RecorderConfig::default()
        }
    };
    let store_dir = match cli.store {
        Some(dir) => dir,
        None => config.store_dir()?,
    };
    let store = Arc::new(JsonStore::open(&store_dir)?);

    match cli.command {
        Command::Record {
            name,
            source,
            host,
            port,
            device,
            baud,
            threshold,
            no_dashboard,
        } => {
            let mut config = config;
            match source {
                Some(SourceKind::Serial) => config.source_type = "serial".to_string(),
                Some(SourceKind::Gpsd) => config.source_type = "gpsd".to_string(),
                None => {}
            }
            if host.is_some() {
                config.gpsd_host = host;
            }
            if port.is_some() {
                config.gpsd_port = port;
            }
            if device.is_some() {
                config.serial_port = device;
            }
            if baud.is_some() {
                config.serial_baudrate = baud;
            }
            if let Some(threshold) = threshold {
                config.movement_threshold_m = threshold;
            }
            record(config, store, name, !no_dashboard).await
        }
        Command::List => {
            let trips = store.list_sessions()?;
            if trips.is_empty() {
                println!("No trips recorded in {}", store_dir.display());
            }
            for trip in trips {
                println!(
                    "{:>14}  {:<30} {:>10} {:>12} {:>8.1} km/h",
                    trip.session_id,
                    trip.name,
                    format_distance(trip.distance_m),
                    trip.format_duration(),
                    trip.average_speed_kmh
                );
            }
            Ok(())
        }
        Command::Export { id, format, output } => {
            let session = store
                .load_session(id)
                .with_context(|| format!("loading trip {}", id))?;
            let path = output.unwrap_or_else(|| PathBuf::from(format!("{}.{}", id, format.extension())));
            SessionExporter::new(&session).export_to_file(&path, format)?;
            println!("Exported {} as {} to {}", id, format.display_name(), path.display());
            Ok(())
        }
        Command::Ports => {
            let ports = list_serial_ports()?;
            if ports.is_empty() {
                println!("No serial ports found.");
            } else {
                println!("Available serial ports:");
                for port in ports {
                    println!("  {}", port);
                }
            }
            Ok(())
        }
    }
}

async fn record(
    config: RecorderConfig,
    store: Arc<JsonStore>,
    name: String,
    dashboard: bool,
) -> anyhow::Result<()> {
    let writer = PersistenceWriter::spawn(store);
    let registry = SessionRegistry::new(SessionSettings::from(&config), writer.clone());

    let feed = Arc::new(LocationFeed::new());
    feed.start(FixSource::from_config(&config)?)
        .await
        .context("starting location feed")?;

    let initial_fix = match feed.current_fix(Duration::from_millis(config.fix_timeout_ms)).await {
        Ok(fix) => Some(fix),
        Err(e) => {
            tracing::warn!("{}; starting without a position", e);
            None
        }
    };

    let session = registry.begin(initial_fix).await?;
    session.attach_fixes(feed.subscribe()).await?;

    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_input(&line) {
                Some(input) => {
                    if input_tx.send(input).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => tracing::warn!("Unknown command '{}'", line.trim()),
            }
        }
    });

    let running = Arc::new(AtomicBool::new(true));
    let display = if dashboard {
        let snapshots = session.subscribe();
        let feed = Arc::clone(&feed);
        let running = Arc::clone(&running);
        Some(tokio::spawn(async move {
            TerminalDisplay::new()
                .run(snapshots, move || feed.latest(), running)
                .await
        }))
    } else {
        None
    };

    let mut input_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            input = input_rx.recv(), if input_open => match input {
                Some(Input::Stop) => break,
                Some(Input::Waypoint { name, description }) => {
                    if let Err(e) = registry.add_waypoint(&name, &description, None).await {
                        tracing::warn!("Could not add waypoint: {}", e);
                    }
                }
                None => input_open = false,
            },
        }
    }

    running.store(false, Ordering::Relaxed);
    if let Some(display) = display {
        if let Err(e) = display.await? {
            tracing::warn!("Dashboard error: {}", e);
        }
    }

    let summary = registry.stop(&name).await?;
    feed.stop().await;
    writer.flush().await;

    println!("\nTrip '{}' saved as {}", summary.name, summary.session_id);
    println!("  Distance:      {}", format_distance(summary.distance_m));
    println!("  Duration:      {}", summary.format_duration());
    println!("  Average speed: {:.1} km/h", summary.average_speed_kmh);
    if writer.failed_writes() > 0 {
        println!("  Warning: {} writes could not be stored", writer.failed_writes());
    }
    Ok(())
}
