//! Climb phase detection.
//!
//! One left-to-right pass over the series with a small state machine:
//!
//! ```text
//!   Idle ──(above anchor and rising)──> Building ──(gain >= start_gain)──> Confirmed
//!    ^                                     │                                   │
//!    └───────(back at anchor / drop)───────┘<──────────(drop from peak)────────┘
//! ```
//!
//! A phase ends when altitude falls below the running peak by
//! `max(drop_pct * gain, min_drop_abs_m)`. It is reported as
//! `[start, peak]` only if the gain and length minimums hold. This applies
//! to a candidate that never reached `start_gain_m` as well, so a
//! `start_gain_m` above `min_gain_m` does not raise the reporting floor.

use log::debug;

use crate::{SeriesPoint, WindowedSample};

/// Configuration for climb phase detection.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClimbConfig {
    /// Gain above the tentative start that confirms a climb. Default: 20.0
    pub start_gain_m: f64,
    /// Minimum total gain for a phase to be reported. Default: 50.0
    pub min_gain_m: f64,
    /// Relative drop from peak (fraction of the gain) that ends a phase. Default: 0.25
    pub drop_pct: f64,
    /// Absolute floor for the drop that ends a phase. Default: 40.0
    pub min_drop_abs_m: f64,
    /// Minimum phase length in points. Default: 10
    pub min_len_pts: usize,
}

impl Default for ClimbConfig {
    fn default() -> Self {
        Self {
            start_gain_m: 20.0,
            min_gain_m: 50.0,
            drop_pct: 0.25,
            min_drop_abs_m: 40.0,
            min_len_pts: 10,
        }
    }
}

impl ClimbConfig {
    /// Altitude loss from the peak that terminates a phase with `gain_m` so far.
    #[inline]
    pub fn drop_threshold(&self, gain_m: f64) -> f64 {
        (self.drop_pct * gain_m).max(self.min_drop_abs_m)
    }
}

/// A sustained altitude gain between two fix indices (inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClimbPhase {
    pub start_idx: usize,
    /// Index of the peak
    pub end_idx: usize,
    pub start_alt_m: f64,
    pub peak_alt_m: f64,
    pub gain_m: f64,
    pub start_sec: f64,
    pub end_sec: f64,
    /// Mean climb rate over the phase (m/s)
    pub avg_climb_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Building,
    Confirmed,
}

/// Segment the flight into climb phases.
///
/// `vario` should be the smoothed vertical speed aligned with `points`; a
/// candidate climb only starts on a sample with positive vario. When `vario`
/// is empty, a rise from the previous point is used instead.
///
/// Phases are returned ordered by `start_idx` and never overlap.
pub fn detect_climbs(
    points: &[SeriesPoint],
    vario: &[WindowedSample],
    config: &ClimbConfig,
) -> Vec<ClimbPhase> {
    let mut phases = Vec::new();
    let Some(first) = points.first() else {
        return phases;
    };

    let mut state = State::Idle;
    let mut start = (0usize, first.altitude_m);
    let mut peak = start;

    for (i, p) in points.iter().enumerate() {
        let alt = p.altitude_m;

        match state {
            State::Idle => {
                let rising = match vario.get(i) {
                    Some(v) => v.value > 0.0,
                    None => i > 0 && alt > points[i - 1].altitude_m,
                };
                if alt > start.1 && rising {
                    state = State::Building;
                    peak = (i, alt);
                } else {
                    start = (i, alt);
                }
            }
            State::Building | State::Confirmed => {
                if alt > peak.1 {
                    peak = (i, alt);
                }
                let gain = peak.1 - start.1;
                let dropped = peak.1 - alt >= config.drop_threshold(gain);

                if state == State::Building {
                    if alt <= start.1 || dropped {
                        // Unconfirmed candidates still count if they pass the minimums
                        phases.extend(make_phase(points, start.0, peak.0, config));
                        state = State::Idle;
                        start = (i, alt);
                    } else if gain >= config.start_gain_m {
                        state = State::Confirmed;
                    }
                } else if dropped {
                    phases.extend(make_phase(points, start.0, peak.0, config));
                    state = State::Idle;
                    start = (i, alt);
                }
            }
        }
    }

    if state != State::Idle {
        phases.extend(make_phase(points, start.0, peak.0, config));
    }

    debug!("[climb] {} phases from {} points", phases.len(), points.len());
    phases
}

fn make_phase(
    points: &[SeriesPoint],
    start_idx: usize,
    end_idx: usize,
    config: &ClimbConfig,
) -> Option<ClimbPhase> {
    if end_idx <= start_idx || end_idx - start_idx + 1 < config.min_len_pts {
        return None;
    }
    let start = &points[start_idx];
    let end = &points[end_idx];
    let gain_m = end.altitude_m - start.altitude_m;
    if gain_m < config.min_gain_m {
        return None;
    }

    let duration = end.t_sec - start.t_sec;
    Some(ClimbPhase {
        start_idx,
        end_idx,
        start_alt_m: start.altitude_m,
        peak_alt_m: end.altitude_m,
        gain_m,
        start_sec: start.t_sec,
        end_sec: end.t_sec,
        avg_climb_ms: if duration > 0.0 { gain_m / duration } else { 0.0 },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smoothing::vario;

    /// Build a 1 Hz series from (points, altitude change per point) legs.
    fn profile(start_alt: f64, legs: &[(usize, f64)]) -> Vec<SeriesPoint> {
        let mut alt = start_alt;
        let mut out = Vec::new();
        for &(n, step) in legs {
            for _ in 0..n {
                if !out.is_empty() {
                    alt += step;
                }
                out.push(SeriesPoint {
                    t_sec: out.len() as f64,
                    altitude_m: alt,
                    g_speed_kmh: 30.0,
                });
            }
        }
        out
    }

    fn detect(points: &[SeriesPoint], config: &ClimbConfig) -> Vec<ClimbPhase> {
        detect_climbs(points, &vario(points, 5.0), config)
    }

    #[test]
    fn test_empty_input() {
        assert!(detect_climbs(&[], &[], &ClimbConfig::default()).is_empty());
    }

    #[test]
    fn test_drop_threshold_relative_or_absolute() {
        let config = ClimbConfig::default();
        assert_eq!(config.drop_threshold(100.0), 40.0);
        assert_eq!(config.drop_threshold(400.0), 100.0);
    }

    #[test]
    fn test_two_separate_climbs() {
        let pts = profile(1000.0, &[(20, 0.0), (100, 2.0), (50, -2.0), (60, 2.0), (30, -2.0)]);
        let phases = detect(&pts, &ClimbConfig::default());

        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].start_idx, 19);
        assert_eq!(phases[0].end_idx, 119);
        assert_eq!(phases[0].peak_alt_m, 1200.0);
        assert_eq!(phases[0].gain_m, 200.0);
        assert!((phases[0].avg_climb_ms - 2.0).abs() < 1e-9);
        assert_eq!(phases[1].end_idx, 229);
        assert!(phases[0].end_idx < phases[1].start_idx);
        for phase in &phases {
            assert!(phase.gain_m >= ClimbConfig::default().min_gain_m);
            assert!(phase.end_idx > phase.start_idx);
        }
    }

    #[test]
    fn test_small_dip_does_not_end_climb() {
        // +60 m, dip 20 m (< 40 m floor), then +40 m more
        let pts = profile(1000.0, &[(10, 0.0), (30, 2.0), (20, -1.0), (20, 2.0)]);
        let phases = detect(&pts, &ClimbConfig::default());
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].start_idx, 9);
        assert_eq!(phases[0].end_idx, 79);
        assert_eq!(phases[0].gain_m, 80.0);
    }

    #[test]
    fn test_lower_floor_splits_climb() {
        let pts = profile(1000.0, &[(10, 0.0), (30, 2.0), (20, -1.0), (20, 2.0)]);
        let config = ClimbConfig {
            min_drop_abs_m: 10.0,
            ..ClimbConfig::default()
        };
        let phases = detect(&pts, &config);
        // the dip now ends the first climb; the 40 m second climb is too small
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].end_idx, 39);
        assert_eq!(phases[0].gain_m, 60.0);
    }

    #[test]
    fn test_small_gain_discarded() {
        let pts = profile(1000.0, &[(10, 0.0), (15, 2.0), (40, -2.0)]);
        assert!(detect(&pts, &ClimbConfig::default()).is_empty());
    }

    #[test]
    fn test_unconfirmed_candidate_meeting_minimums_is_reported() {
        let config = ClimbConfig {
            start_gain_m: 100.0,
            ..ClimbConfig::default()
        };

        // 80 m gain ended by a drop, never confirmed
        let pts = profile(1000.0, &[(10, 0.0), (40, 2.0), (30, -3.0)]);
        let phases = detect(&pts, &config);
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].start_idx, 9);
        assert_eq!(phases[0].end_idx, 49);
        assert_eq!(phases[0].gain_m, 80.0);

        // same climb cut off by the end of the track
        let pts = profile(1000.0, &[(10, 0.0), (40, 2.0)]);
        let phases = detect(&pts, &config);
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].end_idx, 49);

        // below min_gain_m stays discarded
        let pts = profile(1000.0, &[(10, 0.0), (15, 2.0), (40, -2.0)]);
        assert!(detect(&pts, &config).is_empty());
    }

    #[test]
    fn test_without_vario_uses_altitude_rise() {
        let pts = profile(1000.0, &[(5, 0.0), (40, 2.0), (30, -3.0)]);
        let phases = detect_climbs(&pts, &[], &ClimbConfig::default());
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].start_idx, 4);
        assert_eq!(phases[0].gain_m, 80.0);
    }
}
