//! Ramer-Douglas-Peucker track simplification.
//!
//! Fixes are projected onto a local equirectangular plane around the first
//! fix, so the tolerance is in meters. The divide-and-conquer runs on an
//! explicit stack of index ranges; near-collinear tracks with tens of
//! thousands of fixes cannot overflow the call stack.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::geo_utils::LocalProjection;
use crate::Fix;

/// How often (in processed ranges) a cancellable run polls its flag.
const CANCEL_POLL_INTERVAL: usize = 256;

/// Configuration for track simplification.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimplifyConfig {
    /// Max perpendicular distance of a dropped fix from the simplified
    /// track (meters). Non-positive disables simplification. Default: 15.0
    pub epsilon_meters: f64,
    /// Tracks with fewer fixes are returned unchanged. Default: 1500
    pub min_points_no_rdp: usize,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            epsilon_meters: 15.0,
            min_points_no_rdp: 1500,
        }
    }
}

/// Simplify a track, keeping the first and last fix.
///
/// Returns the input unchanged when it has fewer than `min_points_no_rdp`
/// (or 3) fixes, or when `epsilon_meters` is not positive.
///
/// # Example
///
/// ```rust
/// use igc_analysis::{Fix, simplify::simplify};
///
/// // 100 fixes on a straight line collapse to the endpoints
/// let fixes: Vec<Fix> = (0..100)
///     .map(|i| Fix::new(i as f64, 46.0 + i as f64 * 0.0001, 8.0, 1000.0))
///     .collect();
/// let simplified = simplify(&fixes, 5.0, 10);
/// assert_eq!(simplified.len(), 2);
/// assert_eq!(simplified[0], fixes[0]);
/// assert_eq!(simplified[1], fixes[99]);
/// ```
pub fn simplify(fixes: &[Fix], epsilon_meters: f64, min_points_no_rdp: usize) -> Vec<Fix> {
    simplify_indices(fixes, epsilon_meters, min_points_no_rdp)
        .into_iter()
        .map(|i| fixes[i])
        .collect()
}

/// Like [`simplify`] but returns the indices of the kept fixes.
pub fn simplify_indices(fixes: &[Fix], epsilon_meters: f64, min_points_no_rdp: usize) -> Vec<usize> {
    run(fixes, epsilon_meters, min_points_no_rdp, None).unwrap_or_default()
}

/// [`simplify`] that gives up and returns `None` once `cancel` is set.
pub(crate) fn simplify_cancellable(
    fixes: &[Fix],
    epsilon_meters: f64,
    min_points_no_rdp: usize,
    cancel: &AtomicBool,
) -> Option<Vec<Fix>> {
    run(fixes, epsilon_meters, min_points_no_rdp, Some(cancel))
        .map(|indices| indices.into_iter().map(|i| fixes[i]).collect())
}

fn run(
    fixes: &[Fix],
    epsilon_meters: f64,
    min_points_no_rdp: usize,
    cancel: Option<&AtomicBool>,
) -> Option<Vec<usize>> {
    let n = fixes.len();
    if n < 3 || n < min_points_no_rdp || !(epsilon_meters > 0.0) {
        return Some((0..n).collect());
    }

    let projection = LocalProjection::new(fixes[0].lat, fixes[0].lon);
    let points: Vec<(f64, f64)> = fixes.iter().map(|f| projection.project(f)).collect();
    let keep = rdp_keep(&points, epsilon_meters * epsilon_meters, cancel)?;

    let mut indices: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter_map(|(i, &k)| if k { Some(i) } else { None })
        .collect();
    if indices.len() < 2 {
        indices = vec![0, n - 1];
    }

    debug!("[simplify] {} -> {} fixes (eps {} m)", n, indices.len(), epsilon_meters);
    Some(indices)
}

/// Mark the points to keep. `None` if cancelled.
fn rdp_keep(points: &[(f64, f64)], epsilon_sq: f64, cancel: Option<&AtomicBool>) -> Option<Vec<bool>> {
    let n = points.len();
    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    let mut processed = 0usize;

    while let Some((start, end)) = stack.pop() {
        if processed % CANCEL_POLL_INTERVAL == 0
            && cancel.map_or(false, |c| c.load(Ordering::Relaxed))
        {
            return None;
        }
        processed += 1;
        if end <= start + 1 {
            continue;
        }

        let mut max_distance_sq = 0.0;
        let mut max_index = start;
        for (offset, p) in points[start + 1..end].iter().enumerate() {
            let d = segment_distance_sq(*p, points[start], points[end]);
            if d > max_distance_sq {
                max_distance_sq = d;
                max_index = start + 1 + offset;
            }
        }

        if max_distance_sq > epsilon_sq {
            keep[max_index] = true;
            stack.push((max_index, end));
            stack.push((start, max_index));
        }
    }

    Some(keep)
}

/// Squared distance from `p` to the segment `a`-`b` in the projected plane.
#[inline]
fn segment_distance_sq(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    (p.0 - cx).powi(2) + (p.1 - cy).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A wiggly northbound track: ~11 m per fix, +/- 40 m east-west sine.
    fn wiggly_track(n: usize) -> Vec<Fix> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                let east_m = 40.0 * (t / 25.0).sin();
                Fix::new(
                    t,
                    46.0 + t * 0.0001,
                    8.0 + east_m / (111_320.0 * 46.0_f64.to_radians().cos()),
                    1000.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_small_inputs_unchanged() {
        assert!(simplify(&[], 10.0, 0).is_empty());
        let two = wiggly_track(2);
        assert_eq!(simplify(&two, 10.0, 0), two);
    }

    #[test]
    fn test_below_threshold_unchanged() {
        let track = wiggly_track(500);
        assert_eq!(simplify(&track, 10.0, 1500), track);
    }

    #[test]
    fn test_non_positive_epsilon_unchanged() {
        let track = wiggly_track(2000);
        assert_eq!(simplify(&track, 0.0, 1500).len(), 2000);
        assert_eq!(simplify(&track, -5.0, 1500).len(), 2000);
    }

    #[test]
    fn test_preserves_corner() {
        let fixes = vec![
            Fix::new(0.0, 46.0, 8.0, 0.0),
            Fix::new(1.0, 46.01, 8.0, 0.0),
            Fix::new(2.0, 46.01, 8.01, 0.0),
        ];
        assert_eq!(simplify(&fixes, 50.0, 0).len(), 3);
    }

    #[test]
    fn test_rdp_bounds() {
        let track = wiggly_track(3000);
        let eps = 5.0;
        let indices = simplify_indices(&track, eps, 1500);

        assert!(indices.len() > 2 && indices.len() < track.len());
        assert_eq!(indices[0], 0);
        assert_eq!(*indices.last().unwrap(), track.len() - 1);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));

        let projection = LocalProjection::new(track[0].lat, track[0].lon);
        for pair in indices.windows(2) {
            let a = projection.project(&track[pair[0]]);
            let b = projection.project(&track[pair[1]]);
            for fix in &track[pair[0] + 1..pair[1]] {
                let d = segment_distance_sq(projection.project(fix), a, b).sqrt();
                assert!(d <= eps + 1e-9, "dropped fix {} m off the chord", d);
            }
        }
    }

    #[test]
    fn test_long_collinear_track() {
        let track: Vec<Fix> = (0..100_000)
            .map(|i| Fix::new(i as f64, 46.0 + i as f64 * 1e-5, 8.0 + i as f64 * 1e-5, 1000.0))
            .collect();
        let simplified = simplify(&track, 1.0, 1500);
        assert_eq!(simplified.len(), 2);
    }

    #[test]
    fn test_segment_distance_clamps_to_endpoints() {
        let d = segment_distance_sq((-3.0, 4.0), (0.0, 0.0), (10.0, 0.0));
        assert!((d - 25.0).abs() < 1e-12);
        let d = segment_distance_sq((5.0, 2.0), (0.0, 0.0), (10.0, 0.0));
        assert!((d - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_cancelled_run_returns_none() {
        let track = wiggly_track(5000);
        let cancel = AtomicBool::new(true);
        assert!(simplify_cancellable(&track, 0.5, 1500, &cancel).is_none());

        let cancel = AtomicBool::new(false);
        assert!(simplify_cancellable(&track, 0.5, 1500, &cancel).is_some());
    }
}
