//! Per-fix derived series and the coarse windowed view.
//!
//! [`build_series`] establishes the time base used by everything downstream:
//! `points[i]` always corresponds to `fixes[i]`.

use log::debug;

use crate::geo_utils::haversine_distance;
use crate::{Fix, SeriesPoint};

/// Configuration for series building.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesConfig {
    /// Width of the coarse aggregation buckets in seconds.
    /// Non-positive disables the windowed view. Default: 10.0
    pub calc_window_sec: f64,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            calc_window_sec: 10.0,
        }
    }
}

/// One `calc_window_sec`-wide bucket of the coarse series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowPoint {
    /// Bucket start time (seconds since first fix)
    pub t_sec: f64,
    /// Mean altitude of the fixes in the bucket
    pub altitude_m: f64,
    /// Mean instantaneous ground speed in the bucket
    pub g_speed_kmh: f64,
    /// Net climb rate between the first and last fix of the bucket
    pub vario_ms: f64,
}

/// Output of [`build_series`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlightSeries {
    /// One point per fix, same order
    pub points: Vec<SeriesPoint>,
    /// Coarse buckets, independent of the smoothing engine
    pub windows: Vec<WindowPoint>,
}

impl FlightSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Ground speed between two fixes in km/h. Zero when time does not advance.
#[inline]
pub fn instantaneous_speed_kmh(from: &Fix, to: &Fix) -> f64 {
    let dt = to.t_sec - from.t_sec;
    if dt <= 0.0 {
        return 0.0;
    }
    haversine_distance(from, to) / dt * 3.6
}

/// Build the per-fix series and the coarse windowed series.
///
/// The first point has speed 0: no speed is attributed before the first
/// movement is observed. Fewer than two fixes yield empty output.
///
/// # Example
///
/// ```rust
/// use igc_analysis::{Fix, series::build_series};
///
/// let fixes = vec![
///     Fix::new(0.0, 46.0, 8.0, 1000.0),
///     Fix::new(10.0, 46.001, 8.0, 1010.0),
/// ];
/// let series = build_series(&fixes, 10.0);
/// assert_eq!(series.points.len(), 2);
/// assert_eq!(series.points[0].g_speed_kmh, 0.0);
/// assert!((series.points[1].g_speed_kmh - 40.0).abs() < 0.5);
/// ```
pub fn build_series(fixes: &[Fix], calc_window_sec: f64) -> FlightSeries {
    if fixes.len() < 2 {
        return FlightSeries::default();
    }

    let mut points = Vec::with_capacity(fixes.len());
    points.push(SeriesPoint {
        t_sec: fixes[0].t_sec,
        altitude_m: fixes[0].altitude_m,
        g_speed_kmh: 0.0,
    });
    for w in fixes.windows(2) {
        points.push(SeriesPoint {
            t_sec: w[1].t_sec,
            altitude_m: w[1].altitude_m,
            g_speed_kmh: instantaneous_speed_kmh(&w[0], &w[1]),
        });
    }

    let windows = bucket_windows(&points, calc_window_sec);
    debug!(
        "[series] {} points, {} windows of {}s",
        points.len(),
        windows.len(),
        calc_window_sec
    );

    FlightSeries { points, windows }
}

fn bucket_windows(points: &[SeriesPoint], width: f64) -> Vec<WindowPoint> {
    if !(width.is_finite() && width > 0.0) || points.is_empty() {
        return Vec::new();
    }

    let origin = points[0].t_sec;
    let bucket_of = |p: &SeriesPoint| ((p.t_sec - origin) / width).floor() as i64;

    let mut windows = Vec::new();
    let mut begin = 0;
    while begin < points.len() {
        let bucket = bucket_of(&points[begin]);
        let mut end = begin + 1;
        while end < points.len() && bucket_of(&points[end]) == bucket {
            end += 1;
        }

        let slice = &points[begin..end];
        let n = slice.len() as f64;
        let first = &slice[0];
        let last = &slice[slice.len() - 1];
        let dt = last.t_sec - first.t_sec;

        windows.push(WindowPoint {
            t_sec: origin + bucket as f64 * width,
            altitude_m: slice.iter().map(|p| p.altitude_m).sum::<f64>() / n,
            g_speed_kmh: slice.iter().map(|p| p.g_speed_kmh).sum::<f64>() / n,
            vario_ms: if dt > 0.0 {
                (last.altitude_m - first.altitude_m) / dt
            } else {
                0.0
            },
        });
        begin = end;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn northbound(n: usize, dt: f64, climb_per_fix: f64) -> Vec<Fix> {
        (0..n)
            .map(|i| {
                Fix::new(
                    i as f64 * dt,
                    46.0 + i as f64 * 0.0001,
                    8.0,
                    1000.0 + i as f64 * climb_per_fix,
                )
            })
            .collect()
    }

    #[test]
    fn test_degenerate_input_is_empty() {
        assert!(build_series(&[], 10.0).is_empty());
        let one = northbound(1, 1.0, 0.0);
        let series = build_series(&one, 10.0);
        assert!(series.points.is_empty());
        assert!(series.windows.is_empty());
    }

    #[test]
    fn test_points_align_with_fixes() {
        let fixes = northbound(25, 1.0, 1.0);
        let series = build_series(&fixes, 10.0);
        assert_eq!(series.points.len(), fixes.len());
        for (p, f) in series.points.iter().zip(&fixes) {
            assert_eq!(p.t_sec, f.t_sec);
            assert_eq!(p.altitude_m, f.altitude_m);
        }
        // 0.0001 deg latitude per second ~ 11.1 m/s ~ 40 km/h
        assert!((series.points[5].g_speed_kmh - 40.0).abs() < 0.5);
    }

    #[test]
    fn test_windows_bucket_by_time() {
        let fixes = northbound(25, 1.0, 1.0);
        let series = build_series(&fixes, 10.0);
        // t = 0..=24 -> buckets [0,10), [10,20), [20,30)
        assert_eq!(series.windows.len(), 3);
        assert_eq!(series.windows[1].t_sec, 10.0);
        assert!((series.windows[1].altitude_m - 1014.5).abs() < 1e-9);
        assert!((series.windows[1].vario_ms - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_windows_disabled() {
        let fixes = northbound(5, 1.0, 0.0);
        assert!(build_series(&fixes, 0.0).windows.is_empty());
        assert_eq!(build_series(&fixes, 0.0).points.len(), 5);
    }
}
