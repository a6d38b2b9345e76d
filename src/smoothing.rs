//! Trailing-window vario and time-weighted speed.
//!
//! Both functions return one [`WindowedSample`] per input point (no
//! resampling) and locate the window start by binary search, so a full
//! series costs `O(n log n)`.
//!
//! ## Warm-up
//!
//! Until `window_sec` seconds have elapsed since the first point:
//! - vario is exactly `0.0`. A climb rate from one or two samples is noise.
//! - speed is the raw per-fix speed. A single speed reading is meaningful.

use crate::{SeriesPoint, WindowedSample};

/// Vario output is clamped to +/- this value (m/s) to suppress glitches.
pub const VARIO_CLAMP_MS: f64 = 25.0;

/// Trailing-window vertical speed in m/s.
///
/// For a point at time `t`, the reference is the latest point at or before
/// `t - window_sec`, and vario is the altitude difference over the time
/// difference. A non-positive window falls back to the previous point.
///
/// # Example
///
/// ```rust
/// use igc_analysis::{SeriesPoint, smoothing::vario};
///
/// let points: Vec<SeriesPoint> = [1000.0, 1050.0, 1005.0]
///     .iter()
///     .enumerate()
///     .map(|(i, &alt)| SeriesPoint { t_sec: i as f64 * 5.0, altitude_m: alt, g_speed_kmh: 0.0 })
///     .collect();
///
/// let v = vario(&points, 5.0);
/// assert_eq!(v[0].value, 0.0);  // warm-up
/// assert!(v[1].value > 0.0);    // climbing
/// assert!(v[2].value < 0.0);    // descending from the peak
/// ```
pub fn vario(points: &[SeriesPoint], window_sec: f64) -> Vec<WindowedSample> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let t0 = first.t_sec;
    let windowed = window_sec.is_finite() && window_sec > 0.0;

    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let reference = if windowed {
                if p.t_sec - t0 < window_sec {
                    None
                } else {
                    let target = p.t_sec - window_sec;
                    points
                        .partition_point(|q| q.t_sec <= target)
                        .checked_sub(1)
                }
            } else {
                i.checked_sub(1)
            };

            let value = reference
                .map(|j| {
                    let dt = p.t_sec - points[j].t_sec;
                    if dt > 0.0 {
                        ((p.altitude_m - points[j].altitude_m) / dt)
                            .clamp(-VARIO_CLAMP_MS, VARIO_CLAMP_MS)
                    } else {
                        0.0
                    }
                })
                .unwrap_or(0.0);

            WindowedSample::new(p.t_sec, value)
        })
        .collect()
}

/// Trailing time-weighted average ground speed in km/h.
///
/// Speed is treated as a step function: `points[k].g_speed_kmh` holds on
/// `(t[k-1], t[k]]`. The prefix integral of that step function is
/// interpolated at `t` and `t - window_sec`, so the window edges need not
/// fall on fix boundaries.
pub fn smoothed_speed(points: &[SeriesPoint], window_sec: f64) -> Vec<WindowedSample> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let t0 = first.t_sec;

    if !(window_sec.is_finite() && window_sec > 0.0) {
        return points
            .iter()
            .map(|p| WindowedSample::new(p.t_sec, p.g_speed_kmh))
            .collect();
    }

    let integral = SpeedIntegral::new(points);

    points
        .iter()
        .map(|p| {
            let value = if p.t_sec - t0 < window_sec {
                p.g_speed_kmh
            } else {
                (integral.at(p.t_sec) - integral.at(p.t_sec - window_sec)) / window_sec
            };
            WindowedSample::new(p.t_sec, value)
        })
        .collect()
}

/// Prefix integral of the step-function speed (km/h * s).
struct SpeedIntegral<'a> {
    points: &'a [SeriesPoint],
    prefix: Vec<f64>,
}

impl<'a> SpeedIntegral<'a> {
    fn new(points: &'a [SeriesPoint]) -> Self {
        let mut prefix = Vec::with_capacity(points.len());
        let mut acc = 0.0;
        for (k, p) in points.iter().enumerate() {
            if k > 0 {
                acc += p.g_speed_kmh * (p.t_sec - points[k - 1].t_sec);
            }
            prefix.push(acc);
        }
        Self { points, prefix }
    }

    /// Integral from the first point up to time `t`, clamped to the series.
    fn at(&self, t: f64) -> f64 {
        let n = self.points.len();
        if n == 0 || t <= self.points[0].t_sec {
            return 0.0;
        }
        if t >= self.points[n - 1].t_sec {
            return self.prefix[n - 1];
        }
        // points[k-1].t_sec <= t < points[k].t_sec
        let k = self.points.partition_point(|p| p.t_sec <= t);
        let prev = &self.points[k - 1];
        self.prefix[k - 1] + self.points[k].g_speed_kmh * (t - prev.t_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points_from(samples: &[(f64, f64, f64)]) -> Vec<SeriesPoint> {
        samples
            .iter()
            .map(|&(t_sec, altitude_m, g_speed_kmh)| SeriesPoint {
                t_sec,
                altitude_m,
                g_speed_kmh,
            })
            .collect()
    }

    fn steady_climb(n: usize, rate: f64) -> Vec<SeriesPoint> {
        (0..n)
            .map(|i| SeriesPoint {
                t_sec: i as f64,
                altitude_m: 1000.0 + rate * i as f64,
                g_speed_kmh: 36.0,
            })
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(vario(&[], 5.0).is_empty());
        assert!(smoothed_speed(&[], 5.0).is_empty());
    }

    #[test]
    fn test_vario_warm_up_is_zero() {
        let pts = steady_climb(30, 2.0);
        let v = vario(&pts, 10.0);
        assert_eq!(v.len(), pts.len());
        for s in v.iter().filter(|s| s.t_sec < 10.0) {
            assert_eq!(s.value, 0.0);
        }
        for s in v.iter().filter(|s| s.t_sec >= 10.0) {
            assert!((s.value - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_vario_is_clamped() {
        let pts = points_from(&[(0.0, 1000.0, 0.0), (1.0, 1000.0, 0.0), (2.0, 1500.0, 0.0)]);
        let v = vario(&pts, 1.0);
        assert_eq!(v[2].value, VARIO_CLAMP_MS);
    }

    #[test]
    fn test_vario_uses_latest_point_before_window() {
        // irregular sampling: reference for t=12 with window 5 is t=6 (latest <= 7)
        let pts = points_from(&[
            (0.0, 1000.0, 0.0),
            (3.0, 1003.0, 0.0),
            (6.0, 1006.0, 0.0),
            (9.0, 1012.0, 0.0),
            (12.0, 1018.0, 0.0),
        ]);
        let v = vario(&pts, 5.0);
        assert!((v[4].value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_vario_without_window_uses_previous_point() {
        let pts = points_from(&[(0.0, 1000.0, 0.0), (2.0, 1004.0, 0.0), (4.0, 1002.0, 0.0)]);
        let v = vario(&pts, 0.0);
        assert_eq!(v[0].value, 0.0);
        assert!((v[1].value - 2.0).abs() < 1e-9);
        assert!((v[2].value + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_warm_up_is_raw() {
        let pts = points_from(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 20.0),
            (2.0, 0.0, 40.0),
            (3.0, 0.0, 60.0),
        ]);
        let s = smoothed_speed(&pts, 10.0);
        let raw: Vec<f64> = pts.iter().map(|p| p.g_speed_kmh).collect();
        let out: Vec<f64> = s.iter().map(|p| p.value).collect();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_speed_time_weighted_average() {
        // 10 km/h for 8 s then 50 km/h for 2 s -> 18 km/h over a 10 s window
        let mut samples = vec![(0.0, 0.0, 0.0)];
        for t in 1..=8 {
            samples.push((t as f64, 0.0, 10.0));
        }
        samples.push((10.0, 0.0, 50.0));
        let pts = points_from(&samples);
        let s = smoothed_speed(&pts, 10.0);
        assert!((s.last().unwrap().value - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_integral_interpolates_inside_step() {
        let pts = points_from(&[(0.0, 0.0, 0.0), (4.0, 0.0, 36.0), (8.0, 0.0, 72.0)]);
        let integral = SpeedIntegral::new(&pts);
        assert_eq!(integral.at(-1.0), 0.0);
        assert!((integral.at(2.0) - 72.0).abs() < 1e-9);
        assert!((integral.at(6.0) - (144.0 + 144.0)).abs() < 1e-9);
        assert!((integral.at(100.0) - (144.0 + 288.0)).abs() < 1e-9);
    }

    #[test]
    fn test_smoothing_is_deterministic() {
        let pts = steady_climb(50, 1.5);
        assert_eq!(vario(&pts, 7.0), vario(&pts, 7.0));
        assert_eq!(smoothed_speed(&pts, 7.0), smoothed_speed(&pts, 7.0));
    }
}
