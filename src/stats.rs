//! Segment statistics over an arbitrary `[start, end]` time range, plus the
//! whole-flight summary.
//!
//! The segment engine is called on every scrub of the selected time window,
//! so it never scans the full series: the range is located by binary search
//! and only the samples inside it are visited.

use chrono::NaiveDateTime;
use log::debug;

use crate::climb::ClimbPhase;
use crate::geo_utils::{compute_bounds, haversine_distance, polyline_length};
use crate::thermal::ThermalCircle;
use crate::{Bounds, Fix, SeriesPoint, WindowedSample};

/// Thresholds for classifying time as climbing, sinking or gliding.
///
/// The asymmetry is deliberate: a glider in a normal glide sinks at around
/// 1 m/s, so only clearly stronger sink counts as sinking.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsConfig {
    /// Vario above this counts as climbing (m/s). Default: 0.5
    pub climb_threshold_ms: f64,
    /// Vario below this counts as sinking (m/s). Default: -0.7
    pub sink_threshold_ms: f64,
    /// Ranges shorter than this are treated as "no selection" and replaced by
    /// the whole flight (seconds). Default: 1e-4
    pub degenerate_range_sec: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            climb_threshold_ms: 0.5,
            sink_threshold_ms: -0.7,
            degenerate_range_sec: 1e-4,
        }
    }
}

/// The longest uninterrupted climb inside a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LongestClimb {
    pub start_sec: f64,
    pub end_sec: f64,
    pub duration_sec: f64,
    pub gain_m: f64,
    pub avg_vario_ms: f64,
}

/// A selected sub-range of the flight timeline.
///
/// `start_sec` and `end_sec` are kept within `[0, total_sec]`. An empty
/// window (`start_sec == end_sec`) selects the whole flight when passed to
/// the segment engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeWindow {
    pub start_sec: f64,
    pub end_sec: f64,
    pub total_sec: f64,
}

impl TimeWindow {
    /// Window `[start_sec, end_sec]` on a flight lasting `total_sec`, with
    /// both ends clamped to the flight.
    pub fn new(start_sec: f64, end_sec: f64, total_sec: f64) -> Self {
        let total_sec = total_sec.max(0.0);
        Self {
            start_sec: start_sec.max(0.0).min(total_sec),
            end_sec: end_sec.max(0.0).min(total_sec),
            total_sec,
        }
    }

    /// The whole flight.
    pub fn full(total_sec: f64) -> Self {
        Self::new(0.0, total_sec, total_sec)
    }

    pub fn duration_sec(&self) -> f64 {
        (self.end_sec - self.start_sec).abs()
    }
}

/// Descriptive statistics of one time range.
///
/// When `has_segment` is false every other field is `None`; check the flag
/// before using any value.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentStats {
    pub has_segment: bool,

    /// Normalized range actually analyzed
    pub start_sec: Option<f64>,
    pub end_sec: Option<f64>,
    pub duration_sec: Option<f64>,

    /// Altitude at the range edges (interpolated) and extremes inside it
    pub alt_start_m: Option<f64>,
    pub alt_end_m: Option<f64>,
    pub alt_delta_m: Option<f64>,
    pub alt_min_m: Option<f64>,
    pub alt_max_m: Option<f64>,

    /// Over vario samples whose timestamp lies inside the range
    pub vario_avg_ms: Option<f64>,
    pub vario_min_ms: Option<f64>,
    pub vario_max_ms: Option<f64>,

    /// Share of time spent climbing / sinking / gliding (0..=1, sum to 1)
    pub climb_fraction: Option<f64>,
    pub sink_fraction: Option<f64>,
    pub glide_fraction: Option<f64>,

    pub speed_avg_kmh: Option<f64>,
    pub speed_max_kmh: Option<f64>,
    /// Path length over ground
    pub distance_m: Option<f64>,

    pub longest_climb: Option<LongestClimb>,
}

impl SegmentStats {
    /// The "nothing to show" result.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// [`compute_stats_with_config`] with the default thresholds.
///
/// # Example
///
/// ```rust
/// use igc_analysis::{SeriesPoint, smoothing::vario, stats::compute_stats};
///
/// let series: Vec<SeriesPoint> = (0..60)
///     .map(|i| SeriesPoint { t_sec: i as f64, altitude_m: 1000.0 + i as f64, g_speed_kmh: 30.0 })
///     .collect();
/// let v = vario(&series, 5.0);
///
/// let stats = compute_stats(&series, &v, 10.0, 40.0);
/// assert!(stats.has_segment);
/// assert_eq!(stats.alt_delta_m, Some(30.0));
///
/// // start == end selects the whole flight
/// assert_eq!(compute_stats(&series, &v, 0.0, 0.0), compute_stats(&series, &v, 0.0, 59.0));
/// ```
pub fn compute_stats(
    series: &[SeriesPoint],
    vario: &[WindowedSample],
    start_sec: f64,
    end_sec: f64,
) -> SegmentStats {
    compute_stats_with_config(series, vario, start_sec, end_sec, &StatsConfig::default())
}

/// Compute [`SegmentStats`] for `[start_sec, end_sec]`.
///
/// The range is normalized first: a (near-)empty or non-finite selection
/// means the whole flight, reversed bounds are swapped, and both ends are
/// clamped to the series.
pub fn compute_stats_with_config(
    series: &[SeriesPoint],
    vario: &[WindowedSample],
    start_sec: f64,
    end_sec: f64,
    config: &StatsConfig,
) -> SegmentStats {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return SegmentStats::empty();
    };
    let (min_t, max_t) = (first.t_sec, last.t_sec);

    let (mut s, mut e) = if !start_sec.is_finite()
        || !end_sec.is_finite()
        || (end_sec - start_sec).abs() < config.degenerate_range_sec
    {
        (min_t, max_t)
    } else {
        (start_sec.min(end_sec), start_sec.max(end_sec))
    };
    s = s.clamp(min_t, max_t);
    e = e.clamp(min_t, max_t);

    let duration = e - s;
    if duration <= 0.0 {
        return SegmentStats::empty();
    }

    // Samples inside [s, e]
    let i0 = series.partition_point(|p| p.t_sec < s);
    let i1 = series.partition_point(|p| p.t_sec <= e);
    let inside = &series[i0..i1];

    // Altitude
    let alt_start = altitude_at(series, s);
    let alt_end = altitude_at(series, e);
    let (alt_min, alt_max) = inside.iter().fold(
        (alt_start.min(alt_end), alt_start.max(alt_end)),
        |(lo, hi), p| (lo.min(p.altitude_m), hi.max(p.altitude_m)),
    );

    // Vario extremes and mean
    let v0 = vario.partition_point(|w| w.t_sec < s);
    let v1 = vario.partition_point(|w| w.t_sec <= e);
    let vario_inside = &vario[v0..v1.max(v0)];
    let (vario_avg, vario_min, vario_max) = if vario_inside.is_empty() {
        (None, None, None)
    } else {
        let sum: f64 = vario_inside.iter().map(|w| w.value).sum();
        let lo = vario_inside.iter().map(|w| w.value).fold(f64::INFINITY, f64::min);
        let hi = vario_inside
            .iter()
            .map(|w| w.value)
            .fold(f64::NEG_INFINITY, f64::max);
        (Some(sum / vario_inside.len() as f64), Some(lo), Some(hi))
    };

    // Time integration over the inter-fix intervals overlapping [s, e].
    // Interval k spans (t[k-1], t[k]] and carries the values of sample k.
    let k_first = series.partition_point(|p| p.t_sec <= s).max(1);
    let k_last = series.partition_point(|p| p.t_sec < e).min(series.len() - 1);

    let mut covered = 0.0;
    let mut classified = 0.0;
    let mut climb_time = 0.0;
    let mut sink_time = 0.0;
    let mut speed_max: Option<f64> = None;
    let mut speed_integral = 0.0;

    for k in k_first..=k_last {
        let lo = series[k - 1].t_sec.max(s);
        let hi = series[k].t_sec.min(e);
        let dt = hi - lo;
        if dt <= 0.0 {
            continue;
        }
        covered += dt;
        speed_integral += series[k].g_speed_kmh * dt;
        speed_max = Some(speed_max.map_or(series[k].g_speed_kmh, |m| m.max(series[k].g_speed_kmh)));

        if let Some(v) = vario.get(k) {
            classified += dt;
            if v.value > config.climb_threshold_ms {
                climb_time += dt;
            } else if v.value < config.sink_threshold_ms {
                sink_time += dt;
            }
        }
    }

    let (climb_fraction, sink_fraction, glide_fraction) = if classified > 0.0 {
        let climb = climb_time / classified;
        let sink = sink_time / classified;
        (Some(climb), Some(sink), Some((1.0 - climb - sink).max(0.0)))
    } else {
        (None, None, None)
    };

    let longest_climb = longest_climb(series, vario_inside, config.climb_threshold_ms);

    debug!(
        "[stats] range {:.1}..{:.1}s, {} samples, {} vario samples",
        s,
        e,
        inside.len(),
        vario_inside.len()
    );

    SegmentStats {
        has_segment: true,
        start_sec: Some(s),
        end_sec: Some(e),
        duration_sec: Some(duration),
        alt_start_m: Some(alt_start),
        alt_end_m: Some(alt_end),
        alt_delta_m: Some(alt_end - alt_start),
        alt_min_m: Some(alt_min),
        alt_max_m: Some(alt_max),
        vario_avg_ms: vario_avg,
        vario_min_ms: vario_min,
        vario_max_ms: vario_max,
        climb_fraction,
        sink_fraction,
        glide_fraction,
        speed_avg_kmh: (covered > 0.0).then(|| speed_integral / covered),
        speed_max_kmh: speed_max,
        distance_m: Some(speed_integral / 3.6),
        longest_climb,
    }
}

/// Greedy scan for the longest run of vario samples above `threshold`.
///
/// A run closes at the last climbing sample when vario drops to or below the
/// threshold, or at the end of the range.
fn longest_climb(
    series: &[SeriesPoint],
    vario: &[WindowedSample],
    threshold: f64,
) -> Option<LongestClimb> {
    let mut best: Option<(f64, f64)> = None;
    let mut run: Option<(f64, f64)> = None;

    let mut close = |run: Option<(f64, f64)>| {
        if let Some((a, b)) = run {
            if b > a && best.map_or(true, |(ba, bb)| b - a > bb - ba) {
                best = Some((a, b));
            }
        }
    };

    for w in vario {
        if w.value > threshold {
            run = Some(match run {
                Some((start, _)) => (start, w.t_sec),
                None => (w.t_sec, w.t_sec),
            });
        } else {
            close(run.take());
        }
    }
    close(run);

    best.map(|(start_sec, end_sec)| {
        let duration_sec = end_sec - start_sec;
        let gain_m = altitude_at(series, end_sec) - altitude_at(series, start_sec);
        LongestClimb {
            start_sec,
            end_sec,
            duration_sec,
            gain_m,
            avg_vario_ms: gain_m / duration_sec,
        }
    })
}

/// Linearly interpolated altitude at time `t`, clamped to the series ends.
fn altitude_at(series: &[SeriesPoint], t: f64) -> f64 {
    let k = series.partition_point(|p| p.t_sec <= t);
    if k == 0 {
        return series.first().map_or(0.0, |p| p.altitude_m);
    }
    if k >= series.len() {
        return series.last().map_or(0.0, |p| p.altitude_m);
    }
    let a = &series[k - 1];
    let b = &series[k];
    let span = b.t_sec - a.t_sec;
    if span <= 0.0 {
        return a.altitude_m;
    }
    a.altitude_m + (b.altitude_m - a.altitude_m) * (t - a.t_sec) / span
}

// =============================================================================
// Whole-flight summary
// =============================================================================

/// Headline numbers for a whole flight.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlightSummary {
    pub duration_sec: f64,
    /// Wall-clock UTC time of the first and last fix
    pub takeoff: Option<NaiveDateTime>,
    pub landing: Option<NaiveDateTime>,
    pub min_altitude_m: f64,
    pub max_altitude_m: f64,
    pub climb_count: usize,
    pub thermal_count: usize,
    /// Total time spent in detected thermal circles
    pub thermal_time_sec: f64,
    pub path_distance_m: f64,
    /// Takeoff to landing in a straight line
    pub straight_distance_m: f64,
    pub bounds: Option<Bounds>,
}

/// Summarize a flight from its fixes and detected phases.
pub fn flight_summary(
    fixes: &[Fix],
    date: Option<chrono::NaiveDate>,
    climbs: &[ClimbPhase],
    thermals: &[ThermalCircle],
) -> FlightSummary {
    let (Some(first), Some(last)) = (fixes.first(), fixes.last()) else {
        return FlightSummary::default();
    };

    let (min_altitude_m, max_altitude_m) = fixes.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), f| (lo.min(f.altitude_m), hi.max(f.altitude_m)),
    );

    FlightSummary {
        duration_sec: last.t_sec - first.t_sec,
        takeoff: date.and_then(|d| first.timestamp(d)),
        landing: date.and_then(|d| last.timestamp(d)),
        min_altitude_m,
        max_altitude_m,
        climb_count: climbs.len(),
        thermal_count: thermals.len(),
        thermal_time_sec: thermals.iter().map(|t| t.end_sec - t.start_sec).sum(),
        path_distance_m: polyline_length(fixes),
        straight_distance_m: haversine_distance(first, last),
        bounds: compute_bounds(fixes),
    }
}
