//! Decode a leg geometry string and summarise it.
//!
//! Usage:
//!   decode_path '<encoded>'
//!   decode_path --file leg.txt --points

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use utpatur_core::{decode_with_altitude, format_thousands, DistanceIndex, PathSample};

/// Inspect an encoded (lat, lon, altitude) path
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Encoded path
    encoded: Option<String>,

    /// Read the encoded path from a file instead
    #[arg(long, conflicts_with = "encoded")]
    file: Option<PathBuf>,

    /// List every decoded point
    #[arg(long)]
    points: bool,

    /// Print the decoded samples as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let encoded = match (&args.encoded, &args.file) {
        (Some(encoded), _) => encoded.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("pass an encoded path or --file"),
    };

    let samples = decode_with_altitude(encoded.trim());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&samples)?);
        return Ok(());
    }

    let points: Vec<_> = samples.iter().map(|s| s.point).collect();
    let index = DistanceIndex::build(&points);
    let (ascent_m, descent_m) = climb_totals(&samples);

    println!("Points:   {}", samples.len());
    println!("Distance: {:.2} km", index.total() / 1000.0);
    println!(
        "Climb:    +{} m / -{} m",
        format_thousands(ascent_m),
        format_thousands(descent_m)
    );
    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        println!(
            "From {:.5},{:.5} to {:.5},{:.5}",
            first.point.lat, first.point.lon, last.point.lat, last.point.lon
        );
    }

    if args.points {
        for (i, sample) in samples.iter().enumerate() {
            println!(
                "{:>5}  {:>8.3} km  {:.5},{:.5}  {}",
                i,
                index.distance_at(i) / 1000.0,
                sample.point.lat,
                sample.point.lon,
                sample
                    .altitude_m
                    .map(|a| format!("{:.0} m", a))
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
    Ok(())
}

fn climb_totals(samples: &[PathSample]) -> (f64, f64) {
    let altitudes: Vec<f64> = samples.iter().filter_map(|s| s.altitude_m).collect();
    altitudes.windows(2).fold((0.0, 0.0), |(up, down), pair| {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            (up + delta, down)
        } else {
            (up, down - delta)
        }
    })
}
