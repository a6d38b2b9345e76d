//! # IGC Analysis
//!
//! Flight-track analysis for paragliding and gliding IGC logs.
//!
//! This library provides:
//! - IGC parsing with UTC-midnight rollover handling
//! - Per-fix series, trailing-window vario and time-weighted speed
//! - Segment statistics over any `[start, end]` time range
//! - Climb phase and thermal circle detection
//! - Metric Ramer-Douglas-Peucker track simplification, optionally in the
//!   background with stale-result discarding
//!
//! ## Features
//!
//! - **`serde`** - Serialize/Deserialize for configs and results
//! - **`parallel`** - Run thermal detection across climb phases with rayon
//! - **`worker`** - Background simplification on tokio (default)
//! - **`cli`** - The `igc-analyze` command-line tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use igc_analysis::{analyze_flight, AnalysisConfig};
//!
//! let igc = "AXXX001\nHFDTE150724\n\
//!            B1200004600000N00800000EA0100001000\n\
//!            B1200054600010N00800000EA0105001050\n\
//!            B1200104600020N00800000EA0100501005\n";
//!
//! let flight = analyze_flight(igc, None, &AnalysisConfig::default()).unwrap();
//! assert_eq!(flight.fixes.len(), 3);
//!
//! // Scrub a time window; start == end means the whole flight
//! let stats = flight.stats(0.0, 0.0);
//! assert!(stats.has_segment);
//! assert_eq!(stats.alt_delta_m, Some(5.0));
//! ```

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use log::info;

pub mod error;
pub use error::{ParseError, Result, SimplifyError};

pub mod geo_utils;

pub mod igc;
pub use igc::{IgcHeader, ParsedFlight};

pub mod series;
pub use series::{build_series, FlightSeries, SeriesConfig, WindowPoint};

pub mod smoothing;
pub use smoothing::{smoothed_speed, vario};

pub mod stats;
pub use stats::{
    compute_stats, compute_stats_with_config, flight_summary, FlightSummary, LongestClimb,
    SegmentStats, StatsConfig, TimeWindow,
};

pub mod climb;
pub use climb::{detect_climbs, ClimbConfig, ClimbPhase};

pub mod thermal;
#[cfg(feature = "parallel")]
pub use thermal::detect_thermals_parallel;
pub use thermal::{detect_thermals, ThermalCircle, ThermalConfig, TurnDirection};

pub mod simplify;
pub use simplify::{simplify, simplify_indices, SimplifyConfig};

#[cfg(feature = "worker")]
pub mod worker;
#[cfg(feature = "worker")]
pub use worker::{SimplifyHandle, SimplifyJob, SimplifyResponse, SimplifyWorker};

pub mod cache;
pub use cache::AnalysisCache;

// ============================================================================
// Core Types
// ============================================================================

/// One GPS + barometric sample from a B-record.
///
/// # Example
/// ```
/// use igc_analysis::Fix;
/// let fix = Fix::new(12.0, 46.5, 7.9, 1850.0);
/// assert_eq!(fix.t_abs_sec, 12.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fix {
    /// Seconds since the first fix of the flight
    pub t_sec: f64,
    /// Seconds since UTC midnight of the flight date, past 86400 after a
    /// midnight rollover
    pub t_abs_sec: f64,
    pub lat: f64,
    pub lon: f64,
    /// GNSS altitude when plausible, otherwise pressure altitude
    pub altitude_m: f64,
    pub pressure_altitude_m: Option<f64>,
    pub gnss_altitude_m: Option<f64>,
    /// `A` (3D fix) validity flag of the record
    pub valid: bool,
}

impl Fix {
    /// Create a fix with `t_abs_sec == t_sec` and no raw altitude readings.
    pub fn new(t_sec: f64, lat: f64, lon: f64, altitude_m: f64) -> Self {
        Self {
            t_sec,
            t_abs_sec: t_sec,
            lat,
            lon,
            altitude_m,
            pressure_altitude_m: None,
            gnss_altitude_m: None,
            valid: true,
        }
    }

    /// UTC wall-clock time of this fix on a flight that started on `date`.
    ///
    /// `None` if the result is outside chrono's representable range.
    pub fn timestamp(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        let offset = TimeDelta::try_milliseconds((self.t_abs_sec * 1000.0).round() as i64)?;
        midnight.checked_add_signed(offset)
    }
}

/// Per-fix derived sample; `series[i]` belongs to `fixes[i]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesPoint {
    pub t_sec: f64,
    pub altitude_m: f64,
    /// Ground speed from the previous fix (0 for the first)
    pub g_speed_kmh: f64,
}

/// A `(t_sec, value)` pair from the smoothing engine. Vario is m/s, speed
/// km/h.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowedSample {
    pub t_sec: f64,
    pub value: f64,
}

impl WindowedSample {
    #[inline]
    pub fn new(t_sec: f64, value: f64) -> Self {
        Self { t_sec, value }
    }
}

/// Bounding box of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Center of the box as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Every tunable of the pipeline.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalysisConfig {
    /// Trailing window for vario and smoothed speed (seconds). Default: 5.0
    pub smoothing_window_sec: f64,
    pub series: SeriesConfig,
    pub stats: StatsConfig,
    pub climb: ClimbConfig,
    pub thermal: ThermalConfig,
    pub simplify: SimplifyConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            smoothing_window_sec: 5.0,
            series: SeriesConfig::default(),
            stats: StatsConfig::default(),
            climb: ClimbConfig::default(),
            thermal: ThermalConfig::default(),
            simplify: SimplifyConfig::default(),
        }
    }
}

/// Everything derived from one IGC file, except the simplified track.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlightAnalysis {
    pub header: IgcHeader,
    pub date: NaiveDate,
    pub fixes: Vec<Fix>,
    pub skipped_records: usize,
    pub series: FlightSeries,
    pub vario: Vec<WindowedSample>,
    pub speed: Vec<WindowedSample>,
    pub climbs: Vec<ClimbPhase>,
    pub thermals: Vec<ThermalCircle>,
    pub summary: FlightSummary,
    stats_config: StatsConfig,
}

impl FlightAnalysis {
    /// Segment statistics for `[start_sec, end_sec]` of this flight.
    pub fn stats(&self, start_sec: f64, end_sec: f64) -> SegmentStats {
        compute_stats_with_config(
            &self.series.points,
            &self.vario,
            start_sec,
            end_sec,
            &self.stats_config,
        )
    }

    /// Segment statistics for a selected [`TimeWindow`].
    pub fn stats_window(&self, window: &TimeWindow) -> SegmentStats {
        self.stats(window.start_sec, window.end_sec)
    }

    /// Flight duration in seconds.
    pub fn total_sec(&self) -> f64 {
        self.series.points.last().map_or(0.0, |p| p.t_sec)
    }

    /// Window covering the whole flight.
    pub fn full_window(&self) -> TimeWindow {
        TimeWindow::full(self.total_sec())
    }

    /// Window `[start_sec, end_sec]` clamped to this flight.
    pub fn time_window(&self, start_sec: f64, end_sec: f64) -> TimeWindow {
        TimeWindow::new(start_sec, end_sec, self.total_sec())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Parse an IGC file and run the full analysis.
///
/// `date_hint` is only used when the file has no `HFDTE` record.
pub fn analyze_flight(
    igc_text: &str,
    date_hint: Option<NaiveDate>,
    config: &AnalysisConfig,
) -> Result<FlightAnalysis> {
    let parsed = igc::parse(igc_text, date_hint)?;
    Ok(analyze_parsed(parsed, config))
}

/// Run the analysis on an already parsed flight.
pub fn analyze_parsed(parsed: ParsedFlight, config: &AnalysisConfig) -> FlightAnalysis {
    let ParsedFlight {
        header,
        date,
        fixes,
        skipped_records,
    } = parsed;

    let series = build_series(&fixes, config.series.calc_window_sec);
    let vario = smoothing::vario(&series.points, config.smoothing_window_sec);
    let speed = smoothed_speed(&series.points, config.smoothing_window_sec);
    let climbs = detect_climbs(&series.points, &vario, &config.climb);

    #[cfg(feature = "parallel")]
    let thermals = detect_thermals_parallel(&fixes, &climbs, &config.thermal);

    #[cfg(not(feature = "parallel"))]
    let thermals = detect_thermals(&fixes, &climbs, &config.thermal);

    let summary = flight_summary(&fixes, Some(date), &climbs, &thermals);

    info!(
        "[analysis] {} fixes over {:.0}s: {} climbs, {} thermal circles",
        fixes.len(),
        summary.duration_sec,
        climbs.len(),
        thermals.len()
    );

    FlightAnalysis {
        header,
        date,
        fixes,
        skipped_records,
        series,
        vario,
        speed,
        climbs,
        thermals,
        summary,
        stats_config: config.stats.clone(),
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    /// An IGC file with one fix every 5 s from 12:00:00 UTC, drifting north
    /// about 18 m per fix, at the given altitudes.
    pub fn synthetic_igc(altitudes: &[i32]) -> String {
        let mut text = String::from("AXXX001\nHFDTE150724\nHFPLTPILOTINCHARGE:Test Pilot\n");
        for (i, alt) in altitudes.iter().enumerate() {
            let secs = 12 * 3600 + i * 5;
            text.push_str(&format!(
                "B{:02}{:02}{:02}46{:05}N00800000EA{:05}{:05}\n",
                secs / 3600,
                secs / 60 % 60,
                secs % 60,
                i * 10,
                alt,
                alt
            ));
        }
        text
    }
}

// ============================================================================
// Tests
// ============================================================================
