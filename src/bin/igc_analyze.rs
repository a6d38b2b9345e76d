//! igc-analyze - inspect an IGC flight log from the command line
//!
//! Usage:
//!   igc-analyze <file.igc> [--window <sec>] [--from <sec> --to <sec>]
//!                          [--epsilon <m>] [--json]
//!
//! Prints the header, flight summary, climb phases, thermal circles,
//! statistics for the selected time range and the size of the simplified
//! track.

use clap::Parser;
use chrono::NaiveDate;
use igc_analysis::{
    analyze_flight, simplify, AnalysisConfig, FlightAnalysis, SegmentStats,
};
use log::{error, info};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "igc-analyze")]
#[command(about = "Analyze an IGC flight log", long_about = None)]
struct Cli {
    /// IGC file to analyze
    file: PathBuf,

    /// Vario / speed smoothing window in seconds
    #[arg(short, long, default_value = "5")]
    window: f64,

    /// Start of the statistics range (seconds since first fix)
    #[arg(long, default_value = "0")]
    from: f64,

    /// End of the statistics range; equal to --from means the whole flight
    #[arg(long, default_value = "0")]
    to: f64,

    /// RDP tolerance in meters
    #[arg(short, long, default_value = "15")]
    epsilon: f64,

    /// Flight date (YYYY-MM-DD) for files without an HFDTE record
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Print machine-readable JSON instead of a report
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    let text = match fs::read(&cli.file) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            error!("Cannot read {}: {}", cli.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut config = AnalysisConfig {
        smoothing_window_sec: cli.window,
        ..AnalysisConfig::default()
    };
    config.simplify.epsilon_meters = cli.epsilon;

    let flight = match analyze_flight(&text, cli.date, &config) {
        Ok(flight) => flight,
        Err(e) => {
            error!("{}: {}", cli.file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    info!("Loaded {} ({} fixes)", cli.file.display(), flight.fixes.len());

    let window = flight.time_window(cli.from, cli.to);
    let stats = flight.stats_window(&window);
    let simplified = simplify(
        &flight.fixes,
        config.simplify.epsilon_meters,
        config.simplify.min_points_no_rdp,
    );

    if cli.json {
        let report = serde_json::json!({
            "header": flight.header,
            "date": flight.date,
            "summary": flight.summary,
            "climbs": flight.climbs,
            "thermals": flight.thermals,
            "window": window,
            "stats": stats,
            "fixes": flight.fixes.len(),
            "simplified_fixes": simplified.len(),
        });
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Cannot serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&flight, &stats, simplified.len());
    }

    ExitCode::SUCCESS
}

fn print_report(flight: &FlightAnalysis, stats: &SegmentStats, simplified: usize) {
    let h = &flight.header;
    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    println!("\n{}", "=".repeat(60));
    println!("Flight {}", flight.date);
    println!("{}", "=".repeat(60));
    println!("  Pilot:        {}", or_dash(&h.pilot));
    println!("  Glider:       {} ({})", or_dash(&h.glider_type), or_dash(&h.glider_id));
    println!("  Recorder:     {}", or_dash(&h.recorder_type));

    let s = &flight.summary;
    println!("\nSummary");
    println!("  Duration:     {:.0} min", s.duration_sec / 60.0);
    if let (Some(takeoff), Some(landing)) = (s.takeoff, s.landing) {
        println!("  Takeoff:      {} UTC", takeoff);
        println!("  Landing:      {} UTC", landing);
    }
    println!("  Altitude:     {:.0} .. {:.0} m", s.min_altitude_m, s.max_altitude_m);
    println!("  Distance:     {:.1} km path, {:.1} km straight", s.path_distance_m / 1000.0, s.straight_distance_m / 1000.0);
    println!("  Thermalling:  {:.0} min in {} circles", s.thermal_time_sec / 60.0, s.thermal_count);
    println!("  Fixes:        {} ({} simplified, {} records skipped)", flight.fixes.len(), simplified, flight.skipped_records);

    println!("\nClimbs ({})", flight.climbs.len());
    for (i, c) in flight.climbs.iter().enumerate() {
        println!(
            "  #{:<3} {:>6.0}s - {:>6.0}s  +{:>5.0} m  {:>4.1} m/s  peak {:.0} m",
            i + 1, c.start_sec, c.end_sec, c.gain_m, c.avg_climb_ms, c.peak_alt_m
        );
    }

    println!("\nThermal circles ({})", flight.thermals.len());
    for t in &flight.thermals {
        println!(
            "  climb #{:<3} {:>6.0}s - {:>6.0}s  {:?} {:.1} turns  r={:.0} m  q={:.2}  +{:.0} m",
            t.climb_idx + 1, t.start_sec, t.end_sec, t.direction, t.turns, t.radius_m, t.quality, t.alt_gain_m
        );
    }

    println!("\nSegment");
    if !stats.has_segment {
        println!("  (no segment)");
        return;
    }
    let f = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{:.1}", x));
    let pct = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{:.0}%", x * 100.0));
    println!("  Range:        {}s - {}s", f(stats.start_sec), f(stats.end_sec));
    println!("  Altitude:     {} -> {} m (delta {} m)", f(stats.alt_start_m), f(stats.alt_end_m), f(stats.alt_delta_m));
    println!("  Vario:        avg {} / min {} / max {} m/s", f(stats.vario_avg_ms), f(stats.vario_min_ms), f(stats.vario_max_ms));
    println!("  Speed:        avg {} / max {} km/h", f(stats.speed_avg_kmh), f(stats.speed_max_kmh));
    println!("  Time:         climb {}  sink {}  glide {}", pct(stats.climb_fraction), pct(stats.sink_fraction), pct(stats.glide_fraction));
    if let Some(lc) = stats.longest_climb {
        println!(
            "  Longest climb: {:.0}s - {:.0}s, +{:.0} m at {:.1} m/s",
            lc.start_sec, lc.end_sec, lc.gain_m, lc.avg_vario_ms
        );
    }
}
