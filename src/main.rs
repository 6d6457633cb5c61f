use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flate2::read::GzDecoder;
use route_gapfill_rs::server::{self, AppState};
use route_gapfill_rs::types::parse_timestamp;
use route_gapfill_rs::{
    export, reconstruct_route, Config, GapFiller, OrsClient, RouteFillClient, Sample, Track,
};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "route_gapfill")]
#[command(about = "Detect gaps in GPS tracks and reconstruct walking paths across them", long_about = None)]
struct Args {
    /// JSON config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tracking HTTP API
    Serve {
        #[arg(long, default_value = "5000")]
        port: u16,
    },
    /// Reconstruct a recorded track from a points file
    Replay {
        /// Path to a {"points": [...]} JSON file, optionally gzipped
        #[arg(long)]
        input: PathBuf,

        /// Write the reconstruction JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write a GPX document
        #[arg(long)]
        gpx: Option<PathBuf>,
    },
}

#[derive(Deserialize)]
struct PointRecord {
    lat: f64,
    lon: f64,
    timestamp: String,
    accuracy: Option<f64>,
}

#[derive(Deserialize)]
struct PointsFile {
    points: Vec<PointRecord>,
}

fn load_points(path: &Path) -> Result<PointsFile> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut text = String::new();
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    Ok(serde_json::from_str(&text)?)
}

async fn replay<C: RouteFillClient>(
    filler: &GapFiller<C>,
    config: &Config,
    input: &Path,
    output: Option<&Path>,
    gpx: Option<&Path>,
) -> Result<()> {
    let points = load_points(input)?;
    let mut track = Track::new(&config.gaps);
    let mut skipped = 0usize;

    for record in points.points {
        let Some(timestamp) = parse_timestamp(&record.timestamp) else {
            log::warn!("Skipping point with invalid timestamp {:?}", record.timestamp);
            skipped += 1;
            continue;
        };
        let sample = Sample::observed(record.lat, record.lon, timestamp).with_accuracy(record.accuracy);
        if let Err(e) = track.push_sample(sample) {
            log::warn!("Skipping point: {}", e);
            skipped += 1;
        }
    }
    track.finish()?;

    let stats = track.stats();
    log::info!(
        "Loaded {} points ({} skipped), {:.2} km, {} gap(s)",
        stats.point_count,
        skipped,
        stats.distance_km,
        stats.gap_count
    );
    for gap in track.detected_gaps() {
        log::info!(
            "  gap {}: samples {}→{}, {:.0}s, {:.3} km",
            gap.id,
            gap.start_index,
            gap.end_index,
            gap.elapsed_seconds,
            gap.straight_line_distance_km
        );
    }

    let route = reconstruct_route(&track, filler).await?;
    let json = export::to_json(&route)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            log::info!("Wrote reconstruction to {}", path.display());
        }
        None => println!("{}", json),
    }

    if let Some(path) = gpx {
        let name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| track.id.clone());
        fs::write(path, export::to_gpx(&route, &name))?;
        log::info!("Wrote GPX to {}", path.display());
    }

    log::info!(
        "Reconstructed {}/{} gap(s)",
        route.summary.filled_count,
        route.summary.total_gaps
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let client = OrsClient::new(&config.provider);
    if !client.is_configured() {
        log::warn!(
            "No routing credential ({} unset); gaps will be reported but not filled",
            route_gapfill_rs::config::API_KEY_ENV
        );
    }
    let filler = GapFiller::from_config(client, &config);

    match args.command {
        Command::Serve { port } => {
            let state = AppState::new(filler, config.gaps.clone());
            server::serve(state, port).await?;
        }
        Command::Replay { input, output, gpx } => {
            replay(&filler, &config, &input, output.as_deref(), gpx.as_deref()).await?;
        }
    }

    Ok(())
}
