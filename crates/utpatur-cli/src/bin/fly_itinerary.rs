//! Fly an itinerary without a map.
//!
//! Usage:
//!   fly_itinerary --demo kungsleden --speed 10
//!   fly_itinerary --itinerary trip.json --offline --seek 12.5
//!   fly_itinerary --demo loop --seek-ratio 0.5
//!
//! The itinerary file is the planner's saved-trip JSON (`stops` or `huts`).
//! Flight events are printed as they happen; camera poses go to the log at
//! trace level (`RUST_LOG=utpatur_cli=trace`).

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use utpatur_cli::sim::{DemoRoute, LoggingViewport};
use utpatur_core::{
    build_profile, flatten, format_thousands, Bounds, FlightPlan, FlightStatus, FlightTuning,
    Itinerary, ProfileAxis, TerrainTuning,
};
use utpatur_flight::{
    Config, FlightController, FlightEvent, IntervalFrames, NoTerrain, OpenMeteoProvider,
    StopReason, TerrainProvider,
};

/// Headless camera flight over a hut-to-hut itinerary
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Saved itinerary JSON; a built-in demo route is flown when omitted
    #[arg(long)]
    itinerary: Option<PathBuf>,

    /// Built-in route to fly
    #[arg(long, value_enum, default_value = "kungsleden")]
    demo: DemoRoute,

    /// Flight tuning overrides as JSON
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// Speed multiplier to select before take-off (must be a configured step)
    #[arg(long, default_value_t = 10)]
    speed: u32,

    /// Jump to this distance (km) right after take-off
    #[arg(long)]
    seek: Option<f64>,

    /// Jump to a position on the elevation profile, 0 = start, 1 = end
    #[arg(long, conflicts_with = "seek")]
    seek_ratio: Option<f64>,

    /// Skip terrain sampling
    #[arg(long)]
    offline: bool,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Log as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json)?;

    let itinerary = load_itinerary(&args)?;
    let tuning = load_tuning(args.tuning.as_ref())?;
    if !tuning.speed_steps.contains(&args.speed) {
        bail!(
            "speed {}x is not one of the configured steps {:?}",
            args.speed,
            tuning.speed_steps
        );
    }

    let totals = itinerary.totals();
    println!(
        "{} days ({} rest), {} km, +{} m / -{} m",
        itinerary.days(),
        itinerary.rest_days(),
        format_thousands(totals.distance_km.round()),
        format_thousands(totals.ascent_m),
        format_thousands(totals.descent_m)
    );

    let area = Bounds::from_stops(&itinerary.stops);
    println!(
        "Area {:.3}..{:.3} N, {:.3}..{:.3} E",
        area.min_lat, area.max_lat, area.min_lon, area.max_lon
    );
    let seek_km = resolve_seek(&itinerary, &args)?;

    let plan = flatten(&itinerary);
    let config = Config::from_env();

    if args.offline || !config.terrain_enabled() {
        tracing::info!("Terrain sampling disabled");
        fly(Arc::new(NoTerrain), plan, tuning, &config, seek_km, &args).await
    } else {
        let client = reqwest::Client::builder()
            .user_agent(concat!("utpatur/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let provider = OpenMeteoProvider::new(client, &config);
        fly(Arc::new(provider), plan, tuning, &config, seek_km, &args).await
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("utpatur_flight=info".parse()?)
        .add_directive("utpatur_cli=info".parse()?);
    if json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }
    Ok(())
}

/// Seek target in km, from `--seek` or a profile position.
fn resolve_seek(itinerary: &Itinerary, args: &Args) -> Result<Option<f64>> {
    let profile = build_profile(itinerary).unwrap_or_default();
    let axis = ProfileAxis::from_points(&profile);
    if let Some(axis) = &axis {
        let ticks: Vec<String> = axis.ticks().into_iter().map(format_thousands).collect();
        println!("Elevation axis: {} m", ticks.join(" / "));
    }

    let Some(ratio) = args.seek_ratio else {
        return Ok(args.seek);
    };
    let Some(axis) = axis else {
        bail!("itinerary has no elevation profile to seek along");
    };
    let km = axis.distance_at_ratio(ratio);
    match axis.nearest_hut(&profile, km).and_then(|p| p.hut.as_ref()) {
        Some(hut) => println!("Seek target {:.1} km, at {}", km, hut.name),
        None => println!("Seek target {:.1} km", km),
    }
    Ok(Some(km))
}

fn load_itinerary(args: &Args) -> Result<Itinerary> {
    let Some(path) = &args.itinerary else {
        tracing::info!("Flying demo route {:?}", args.demo);
        return Ok(args.demo.itinerary());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read itinerary {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse itinerary {}", path.display()))
}

fn load_tuning(path: Option<&PathBuf>) -> Result<FlightTuning> {
    let Some(path) = path else {
        return Ok(FlightTuning::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tuning {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse tuning {}", path.display()))
}

async fn fly<P>(
    provider: Arc<P>,
    plan: FlightPlan,
    tuning: FlightTuning,
    config: &Config,
    seek_km: Option<f64>,
    args: &Args,
) -> Result<()>
where
    P: TerrainProvider + 'static,
{
    let frames = IntervalFrames::new(config.frame_interval());
    let (controller, handle) = FlightController::new(
        provider,
        LoggingViewport::default(),
        frames,
        tuning.clone(),
        TerrainTuning::default(),
    );
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let mut events = handle.subscribe();
    let status = handle.status();
    let task = tokio::spawn(controller.run(shutdown_rx));

    handle.start(plan).await?;

    let mut last_decile = 0;
    let mut reason = StopReason::Shutdown;
    loop {
        let received = tokio::select! {
            received = events.recv() => received,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, landing");
                let _ = shutdown_tx.send(());
                // an idle controller exits without a Stopped event
                if *status.borrow() == FlightStatus::Idle {
                    break;
                }
                continue;
            }
        };
        let event = match received {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Event printer lagged, skipped {} events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        }

        match event {
            FlightEvent::TerrainProgress { percent } => {
                tracing::debug!("Preparing terrain {}%", percent);
            }
            FlightEvent::Started {
                total_km,
                first_waypoint,
            } => {
                if !args.json {
                    println!(
                        "Take-off at {} ({:.1} km to fly)",
                        first_waypoint.as_deref().unwrap_or("start"),
                        total_km
                    );
                }
                // the selector starts at the first step
                let presses = tuning
                    .speed_steps
                    .iter()
                    .position(|step| *step == args.speed)
                    .unwrap_or(0);
                for _ in 0..presses {
                    handle.cycle_speed().await?;
                }
                if let Some(km) = seek_km {
                    handle.seek_km(km).await?;
                } else {
                    handle.toggle_pause().await?;
                }
            }
            FlightEvent::WaypointReached { name, day_index } if !args.json => {
                println!("Day {}: {}", day_index, name);
            }
            FlightEvent::Progress {
                distance_km,
                percent,
            } if !args.json => {
                let decile = (percent / 10.0).floor() as u32;
                if decile > last_decile {
                    last_decile = decile;
                    println!("{:>3.0}%  {:.1} km", percent, distance_km);
                }
            }
            FlightEvent::Rejected { reason } => {
                bail!("Flight rejected: {}", reason);
            }
            FlightEvent::Stopped { reason: stopped } => {
                reason = stopped;
                break;
            }
            _ => {}
        }
    }

    drop(handle);
    let viewport = task.await.context("Flight controller panicked")?;
    let record = viewport.record();
    tracing::info!(
        "Flight ended ({:?}): {} camera updates, {} renders, camera between {:.0} and {:.0} m",
        reason,
        record.camera_sets,
        record.renders,
        record.lowest_camera_m.unwrap_or(0.0),
        record.highest_camera_m.unwrap_or(0.0)
    );

    match reason {
        StopReason::Completed | StopReason::Requested | StopReason::Shutdown => Ok(()),
        StopReason::ViewportFailed => bail!("viewport failed during the flight"),
    }
}
