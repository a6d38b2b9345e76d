//! Analyze a generated IGC flight that crosses UTC midnight.
//!
//! Run with: cargo run --example synthetic_flight

use std::f64::consts::FRAC_PI_2;
use std::fmt::Write;

use igc_analysis::{analyze_flight, geo_utils::METERS_PER_DEGREE, simplify, AnalysisConfig};

const LAT0: f64 = 46.3;
const LON0: f64 = 7.6;
const FIX_INTERVAL_SEC: u32 = 2;
const STEP_M: f64 = 20.0;

/// Glider state while generating the track, in local meters.
struct Track {
    x: f64,
    y: f64,
    heading: f64,
    alt: f64,
    points: Vec<(f64, f64, f64)>,
}

impl Track {
    fn glide(&mut self, fixes: usize, sink_per_fix: f64) {
        for _ in 0..fixes {
            self.x += STEP_M * self.heading.sin();
            self.y += STEP_M * self.heading.cos();
            self.alt -= sink_per_fix;
            self.points.push((self.x, self.y, self.alt));
        }
    }

    fn circle(&mut self, fixes: usize, radius: f64, climb_per_fix: f64) {
        let theta = 2.0 * (STEP_M / (2.0 * radius)).asin();
        // centre to the right of the current heading
        let cx = self.x + radius * (self.heading + FRAC_PI_2).sin();
        let cy = self.y + radius * (self.heading + FRAC_PI_2).cos();
        let mut phi = self.heading - FRAC_PI_2;
        for _ in 0..fixes {
            phi += theta;
            self.x = cx + radius * phi.sin();
            self.y = cy + radius * phi.cos();
            self.alt += climb_per_fix;
            self.points.push((self.x, self.y, self.alt));
        }
        self.heading = phi + FRAC_PI_2;
    }
}

fn to_igc(points: &[(f64, f64, f64)], start_secs: u32) -> String {
    let mut text = String::from("AXSY001\nHFDTE311224\nHFPLTPILOTINCHARGE:Demo Pilot\nHFGTYGLIDERTYPE:Demo Wing\n");
    let lon_scale = METERS_PER_DEGREE * LAT0.to_radians().cos();

    for (i, &(x, y, alt)) in points.iter().enumerate() {
        let secs = (start_secs + i as u32 * FIX_INTERVAL_SEC) % 86_400;
        let lat = LAT0 + y / METERS_PER_DEGREE;
        let lon = LON0 + x / lon_scale;
        let _ = writeln!(
            text,
            "B{:02}{:02}{:02}{:02}{:05}N{:03}{:05}EA{:05}{:05}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60,
            lat.trunc() as u32,
            (lat.fract() * 60_000.0).round() as u32,
            lon.trunc() as u32,
            (lon.fract() * 60_000.0).round() as u32,
            alt.round() as i32,
            alt.round() as i32,
        );
    }
    text
}

fn main() {
    let mut track = Track {
        x: 0.0,
        y: 0.0,
        heading: 0.0,
        alt: 1800.0,
        points: vec![(0.0, 0.0, 1800.0)],
    };
    track.glide(200, 1.2);
    track.circle(150, 60.0, 2.5);
    track.glide(300, 1.2);
    track.circle(120, 80.0, 2.0);
    track.glide(200, 1.2);

    // Start at 23:50 UTC so the log crosses midnight
    let igc = to_igc(&track.points, 23 * 3600 + 50 * 60);

    let config = AnalysisConfig::default();
    let flight = match analyze_flight(&igc, None, &config) {
        Ok(flight) => flight,
        Err(e) => {
            eprintln!("Parse failed: {}", e);
            return;
        }
    };

    println!("Synthetic flight on {}", flight.date);
    println!(
        "  {} fixes, last t_abs = {:.0}s (past midnight: {})",
        flight.fixes.len(),
        flight.fixes.last().map_or(0.0, |f| f.t_abs_sec),
        flight.fixes.last().map_or(false, |f| f.t_abs_sec > 86_400.0)
    );
    println!("  Duration: {:.0} min", flight.summary.duration_sec / 60.0);

    println!("\nClimb phases:");
    for c in &flight.climbs {
        println!(
            "  idx {:>4}..{:<4} +{:.0} m ({:.1} m/s)",
            c.start_idx, c.end_idx, c.gain_m, c.avg_climb_ms
        );
    }

    println!("\nThermal circles:");
    for t in &flight.thermals {
        println!(
            "  idx {:>4}..{:<4} {:?}, r = {:.0} m, {:.1} turns, quality {:.2}",
            t.start_idx, t.end_idx, t.direction, t.radius_m, t.turns, t.quality
        );
    }

    let whole = flight.stats_window(&flight.full_window());
    println!("\nWhole flight:");
    println!("  climbing {:.0}% of the time", whole.climb_fraction.unwrap_or(0.0) * 100.0);
    println!("  average speed {:.1} km/h", whole.speed_avg_kmh.unwrap_or(0.0));

    let simplified = simplify(&flight.fixes, 15.0, 500);
    println!("\nRDP (15 m): {} -> {} fixes", flight.fixes.len(), simplified.len());
}
