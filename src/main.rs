// src/main.rs
//! Walk Tracker - record walks from a GPS source and browse the saved history

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use walk_tracker::config::TrackerConfig;
use walk_tracker::display::TrackingDisplay;
use walk_tracker::export::{export_walk, WalkExportFormat};
use walk_tracker::geo;
use walk_tracker::location::{
    GpsdLocationSource, LocationProvider, ReplayLocationSource, SerialLocationSource,
};
use walk_tracker::store::{FileStorage, WalkStore};
use walk_tracker::walk::{format_duration, format_timestamp, Coordinate, Walk};
use walk_tracker::{Result, StopOutcome, TrackerError, WalkTracker};

#[derive(Parser)]
#[command(
    name = "walk-tracker",
    version,
    about = "Record walks from a GPS source and browse the saved history"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a walk until Ctrl+C, then save it
    Track {
        /// Discard the walk on stop instead of saving it
        #[arg(long)]
        no_save: bool,
        /// Override the configured location source (gpsd, serial, replay)
        #[arg(long)]
        source: Option<String>,
        /// Coordinate file for the replay source (JSON array)
        #[arg(long)]
        replay_file: Option<PathBuf>,
    },
    /// List saved walks, newest first
    List,
    /// Show one saved walk in detail
    Show {
        id: String,
        /// Report the trace point nearest to LAT,LON
        #[arg(long)]
        near: Option<String>,
    },
    /// Delete one saved walk
    Delete { id: String },
    /// Delete all saved walks
    Clear,
    /// Export a saved walk's trace to a file
    Export {
        id: String,
        /// Output format: gpx, geojson, or csv
        #[arg(long, default_value = "gpx")]
        format: WalkExportFormat,
        /// Output path (defaults to walk-<id>.<ext>)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show or change the stored configuration
    Config {
        /// Use gpsd as the location source: HOST:PORT
        #[arg(long)]
        gpsd: Option<String>,
        /// Use a serial NMEA receiver: PORT:BAUDRATE
        #[arg(long)]
        serial: Option<String>,
        /// Use a replayed trace: path to a JSON coordinate file
        #[arg(long)]
        replay: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walk_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = TrackerConfig::load().unwrap_or_default();
    let store = WalkStore::new(Arc::new(FileStorage::new(config.data_dir()?)));

    match cli.command {
        Command::Track {
            no_save,
            source,
            replay_file,
        } => run_track(&config, store, no_save, source.as_deref(), replay_file).await,
        Command::List => run_list(store).await,
        Command::Show { id, near } => run_show(store, &id, near.as_deref()).await,
        Command::Delete { id } => run_delete(store, &id).await,
        Command::Clear => run_clear(store).await,
        Command::Export { id, format, output } => run_export(store, &id, format, output).await,
        Command::Config {
            gpsd,
            serial,
            replay,
        } => run_config(config, gpsd, serial, replay),
    }
}

fn build_provider(
    config: &TrackerConfig,
    source_override: Option<&str>,
    replay_file: Option<PathBuf>,
) -> Result<Arc<dyn LocationProvider>> {
    let source = source_override.unwrap_or(&config.source_type);

    match source {
        "gpsd" => {
            let host = config.gpsd_host.clone().unwrap_or_else(|| "localhost".to_string());
            let port = config.gpsd_port.unwrap_or(2947);
            Ok(Arc::new(GpsdLocationSource::new(host, port)))
        }
        "serial" => {
            let port = config.serial_port.clone().ok_or_else(|| {
                TrackerError::Other(
                    "Serial source needs a port; set one with `walk-tracker config --serial PORT:BAUDRATE`"
                        .to_string(),
                )
            })?;
            let baudrate = config.serial_baudrate.unwrap_or(9600);
            Ok(Arc::new(SerialLocationSource::new(port, baudrate)))
        }
        "replay" => {
            let path = replay_file
                .or_else(|| config.replay_path.clone())
                .ok_or_else(|| {
                    TrackerError::Other(
                        "Replay source needs a coordinate file; pass --replay-file".to_string(),
                    )
                })?;
            Ok(Arc::new(ReplayLocationSource::from_json_file(path)?))
        }
        other => Err(TrackerError::Other(format!(
            "Unknown location source '{}'",
            other
        ))),
    }
}

async fn run_track(
    config: &TrackerConfig,
    store: WalkStore,
    no_save: bool,
    source: Option<&str>,
    replay_file: Option<PathBuf>,
) -> Result<()> {
    let provider = build_provider(config, source, replay_file)?;

    if let Some(last) = store.last_location().await {
        println!(
            "Last known location: {:.6}, {:.6}",
            last.latitude, last.longitude
        );
    }

    let tracker = Arc::new(WalkTracker::new(provider, store));
    tracker.start_walk().await?;

    let display_tracker = Arc::clone(&tracker);
    let display = tokio::spawn(async move { TrackingDisplay::new().run(&display_tracker).await });

    tokio::signal::ctrl_c().await.map_err(TrackerError::Io)?;

    let outcome = tracker.stop_walk(!no_save).await?;
    let _ = display.await;

    match outcome {
        StopOutcome::Saved(walk) => {
            println!(
                "Saved walk {}: {} points, {:.2} km in {}",
                walk.id,
                walk.point_count(),
                walk.distance_km(),
                format_duration(walk.duration)
            );
        }
        StopOutcome::Discarded(walk) => {
            println!("Walk discarded ({} points)", walk.point_count());
        }
    }

    Ok(())
}

async fn run_list(store: WalkStore) -> Result<()> {
    let mut walks = store.list().await;

    if walks.is_empty() {
        println!("No walks saved yet");
        return Ok(());
    }

    // Newest first for display.
    walks.reverse();

    for walk in &walks {
        println!(
            "{}  {}  {}  {:>5} points  {:>7.2} km",
            walk.id,
            format_timestamp(walk.start_time),
            format_duration(walk.duration),
            walk.point_count(),
            walk.distance_km()
        );
    }

    Ok(())
}

async fn run_show(store: WalkStore, id: &str, near: Option<&str>) -> Result<()> {
    let walk = store
        .get(id)
        .await
        .ok_or_else(|| TrackerError::Other(format!("No walk with id {}", id)))?;

    println!("Walk {}", walk.id);
    println!("  Date:     {}", format_timestamp(walk.start_time));
    println!("  Duration: {}", format_duration(walk.duration));
    println!("  Distance: {:.2} km", walk.distance_km());
    println!("  Points:   {}", walk.point_count());

    if let Some(region) = geo::bounding_region(&walk.coordinates) {
        println!(
            "  Region:   center {:.6}, {:.6} (span {:.4} x {:.4})",
            region.center.latitude, region.center.longitude, region.lat_span, region.lon_span
        );
    }

    print_markers(&walk);

    if let Some(arg) = near {
        let target = parse_coordinate_arg(arg)?;
        match geo::nearest_point_index(&walk.coordinates, target) {
            Some(index) => {
                let point = walk.coordinates[index];
                println!(
                    "  Nearest point to {:.6}, {:.6}: #{} ({:.6}, {:.6})",
                    target.latitude, target.longitude, index, point.latitude, point.longitude
                );
            }
            None => println!("  Nearest point: trace is empty"),
        }
    }

    Ok(())
}

fn print_markers(walk: &Walk) {
    if let (Some(start), Some(end)) = (walk.coordinates.first(), walk.coordinates.last()) {
        println!("  Start:    {:.6}, {:.6}", start.latitude, start.longitude);
        println!("  End:      {:.6}, {:.6}", end.latitude, end.longitude);
    }

    let waypoints = geo::sample_waypoints(&walk.coordinates, geo::DEFAULT_WAYPOINT_COUNT);
    if !waypoints.is_empty() {
        println!("  Waypoints:");
        for waypoint in waypoints {
            println!(
                "    #{:<5} {:.6}, {:.6}",
                waypoint.index, waypoint.coordinate.latitude, waypoint.coordinate.longitude
            );
        }
    }
}

fn parse_coordinate_arg(arg: &str) -> Result<Coordinate> {
    let invalid = || TrackerError::Other(format!("Expected LAT,LON but got '{}'", arg));

    let (lat, lon) = arg.split_once(',').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;

    Ok(Coordinate::new(latitude, longitude))
}

async fn run_delete(store: WalkStore, id: &str) -> Result<()> {
    if store.get(id).await.is_none() {
        println!("No walk with id {}", id);
        return Ok(());
    }

    store.remove(id).await?;
    println!("Deleted walk {}", id);
    Ok(())
}

async fn run_clear(store: WalkStore) -> Result<()> {
    let count = store.list().await.len();
    store.clear().await?;
    println!("Removed {} walk(s)", count);
    Ok(())
}

async fn run_export(
    store: WalkStore,
    id: &str,
    format: WalkExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let walk = store
        .get(id)
        .await
        .ok_or_else(|| TrackerError::Other(format!("No walk with id {}", id)))?;

    let path = output
        .unwrap_or_else(|| PathBuf::from(format!("walk-{}.{}", walk.id, format.extension())));

    export_walk(&walk, &path, format)?;
    println!(
        "Exported walk {} as {} to {}",
        walk.id,
        format.display_name(),
        path.display()
    );

    Ok(())
}

fn run_config(
    mut config: TrackerConfig,
    gpsd: Option<String>,
    serial: Option<String>,
    replay: Option<PathBuf>,
) -> Result<()> {
    let mut changed = false;

    if let Some(arg) = gpsd {
        let (host, port) = arg
            .split_once(':')
            .ok_or_else(|| TrackerError::Other(format!("Expected HOST:PORT but got '{}'", arg)))?;
        let port: u16 = port
            .parse()
            .map_err(|_| TrackerError::Other(format!("Invalid gpsd port '{}'", port)))?;
        config.update_gpsd(host.to_string(), port);
        changed = true;
    }

    if let Some(arg) = serial {
        let (port, baudrate) = arg.split_once(':').ok_or_else(|| {
            TrackerError::Other(format!("Expected PORT:BAUDRATE but got '{}'", arg))
        })?;
        let baudrate: u32 = baudrate
            .parse()
            .map_err(|_| TrackerError::Other(format!("Invalid baudrate '{}'", baudrate)))?;
        config.update_serial(port.to_string(), baudrate);
        changed = true;
    }

    if let Some(path) = replay {
        config.update_replay(path);
        changed = true;
    }

    if changed {
        config.save()?;
        println!("Configuration saved");
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
