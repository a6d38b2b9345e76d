//! # Thermal Circle Detection
//!
//! Finds sustained turning inside climb phases.
//!
//! ## Algorithm
//!
//! 1. For each climb phase, slide a `window_pts` window over its fixes with
//!    step `step_pts`
//! 2. Sum the signed heading change between consecutive fix-to-fix bearings
//! 3. A window is circling when:
//!    - the net turn is at least `min_turn_deg`
//!    - at least `min_sign_consistency` of the steps turn the same way
//!    - the radius estimate (chord length / turn angle per step) has a mean in
//!      `[min_radius_m, max_radius_m + max_radius_slack_m]` and a relative
//!      spread of at most `max_radius_rel_std`
//! 4. Qualifying windows closer than `merge_gap_pts` are merged, the start is
//!    moved back by `backtrack_pts`, and the merged span must gain at least
//!    `min_alt_gain_m`
//!
//! Every circle lies inside the phase it was found in.

use log::debug;

use crate::climb::ClimbPhase;
use crate::geo_utils::{bearing_deg, haversine_distance, heading_delta};
use crate::Fix;

/// Legs shorter than this have no meaningful bearing and are skipped.
const MIN_LEG_M: f64 = 0.5;

/// Steps turning less than this are excluded from the radius estimate.
const MIN_RADIUS_TURN_DEG: f64 = 1.0;

/// Configuration for thermal circle detection.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThermalConfig {
    /// Fixes per sliding window. Default: 20
    pub window_pts: usize,
    /// Window advance in fixes. Default: 5
    pub step_pts: usize,
    /// Net heading change a window must reach (degrees). Default: 270.0
    pub min_turn_deg: f64,
    /// Smallest plausible circle radius (meters). Default: 20.0
    pub min_radius_m: f64,
    /// Largest plausible circle radius (meters). Default: 250.0
    pub max_radius_m: f64,
    /// Overshoot tolerated above `max_radius_m`. Default: 50.0
    pub max_radius_slack_m: f64,
    /// Max std/mean of the per-step radius estimates. Default: 0.6
    pub max_radius_rel_std: f64,
    /// Fraction of steps that must turn the majority way. Default: 0.75
    pub min_sign_consistency: f64,
    /// Minimum altitude gain across a merged circle (meters). Default: 5.0
    pub min_alt_gain_m: f64,
    /// Windows this close (in fixes) are merged. Default: 5
    pub merge_gap_pts: usize,
    /// Fixes to extend a merged circle backwards. Default: 3
    pub backtrack_pts: usize,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            window_pts: 20,
            step_pts: 5,
            min_turn_deg: 270.0,
            min_radius_m: 20.0,
            max_radius_m: 250.0,
            max_radius_slack_m: 50.0,
            max_radius_rel_std: 0.6,
            min_sign_consistency: 0.75,
            min_alt_gain_m: 5.0,
            merge_gap_pts: 5,
            backtrack_pts: 3,
        }
    }
}

/// Which way the glider is circling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TurnDirection {
    /// Counter-clockwise seen from above
    Left,
    /// Clockwise seen from above
    Right,
}

/// A circling interval inside one climb phase.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThermalCircle {
    /// Index of the enclosing phase in the climb list
    pub climb_idx: usize,
    pub start_idx: usize,
    pub end_idx: usize,
    pub start_sec: f64,
    pub end_sec: f64,
    /// Mean estimated turn radius (meters)
    pub radius_m: f64,
    /// 0..=1, higher is rounder and more consistent
    pub quality: f64,
    pub alt_gain_m: f64,
    pub direction: TurnDirection,
    /// Net heading change in full circles
    pub turns: f64,
}

/// A qualifying window, indices inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WindowHit {
    start: usize,
    end: usize,
    radius_m: f64,
    quality: f64,
}

/// Detect thermal circles in every climb phase.
///
/// Circles are returned ordered by phase, then by start index.
pub fn detect_thermals(
    fixes: &[Fix],
    climbs: &[ClimbPhase],
    config: &ThermalConfig,
) -> Vec<ThermalCircle> {
    let circles: Vec<ThermalCircle> = climbs
        .iter()
        .enumerate()
        .flat_map(|(climb_idx, phase)| detect_in_phase(fixes, climb_idx, phase, config))
        .collect();

    debug!(
        "[thermal] {} circles in {} climb phases",
        circles.len(),
        climbs.len()
    );
    circles
}

/// Parallel version of [`detect_thermals`], one rayon task per climb phase.
/// Produces identical output.
#[cfg(feature = "parallel")]
pub fn detect_thermals_parallel(
    fixes: &[Fix],
    climbs: &[ClimbPhase],
    config: &ThermalConfig,
) -> Vec<ThermalCircle> {
    use rayon::prelude::*;

    let circles: Vec<ThermalCircle> = climbs
        .par_iter()
        .enumerate()
        .flat_map_iter(|(climb_idx, phase)| detect_in_phase(fixes, climb_idx, phase, config))
        .collect();

    debug!(
        "[thermal] {} circles in {} climb phases (parallel)",
        circles.len(),
        climbs.len()
    );
    circles
}

fn detect_in_phase(
    fixes: &[Fix],
    climb_idx: usize,
    phase: &ClimbPhase,
    config: &ThermalConfig,
) -> Vec<ThermalCircle> {
    let first = phase.start_idx;
    let last = phase.end_idx.min(fixes.len().saturating_sub(1));
    let window = config.window_pts.max(3);
    let step = config.step_pts.max(1);

    if last < first || last - first + 1 < window {
        return Vec::new();
    }

    let mut hits = Vec::new();
    let mut start = first;
    while start + window - 1 <= last {
        if let Some(hit) = evaluate_window(fixes, start, start + window - 1, config) {
            hits.push(hit);
        }
        start += step;
    }

    merge_hits(&hits, config.merge_gap_pts)
        .into_iter()
        .filter_map(|group| {
            let start_idx = group.start.saturating_sub(config.backtrack_pts).max(first);
            let end_idx = group.end.min(last);
            let alt_gain_m = fixes[end_idx].altitude_m - fixes[start_idx].altitude_m;
            if alt_gain_m < config.min_alt_gain_m {
                return None;
            }
            let net_turn: f64 = turn_deltas(&fixes[start_idx..=end_idx]).iter().sum();

            Some(ThermalCircle {
                climb_idx,
                start_idx,
                end_idx,
                start_sec: fixes[start_idx].t_sec,
                end_sec: fixes[end_idx].t_sec,
                radius_m: group.radius_m,
                quality: group.quality,
                alt_gain_m,
                direction: if net_turn >= 0.0 {
                    TurnDirection::Right
                } else {
                    TurnDirection::Left
                },
                turns: net_turn.abs() / 360.0,
            })
        })
        .collect()
}

/// Signed heading changes between consecutive legs, skipping legs too short
/// to have a bearing. Returns `(delta_deg, mean_chord_m)` pairs.
fn turn_steps(fixes: &[Fix]) -> Vec<(f64, f64)> {
    let legs: Vec<(f64, f64)> = fixes
        .windows(2)
        .filter_map(|w| {
            let d = haversine_distance(&w[0], &w[1]);
            (d >= MIN_LEG_M).then(|| (bearing_deg(&w[0], &w[1]), d))
        })
        .collect();

    legs.windows(2)
        .map(|l| (heading_delta(l[0].0, l[1].0), (l[0].1 + l[1].1) / 2.0))
        .collect()
}

fn turn_deltas(fixes: &[Fix]) -> Vec<f64> {
    turn_steps(fixes).into_iter().map(|(d, _)| d).collect()
}

fn evaluate_window(
    fixes: &[Fix],
    start: usize,
    end: usize,
    config: &ThermalConfig,
) -> Option<WindowHit> {
    let steps = turn_steps(&fixes[start..=end]);
    if steps.is_empty() {
        return None;
    }

    let net_turn: f64 = steps.iter().map(|(d, _)| d).sum();
    if net_turn.abs() < config.min_turn_deg {
        return None;
    }

    let sign = net_turn.signum();
    let agreeing = steps.iter().filter(|(d, _)| d * sign > 0.0).count();
    let consistency = agreeing as f64 / steps.len() as f64;
    if consistency < config.min_sign_consistency {
        return None;
    }

    // Radius per step: arc length over turn angle
    let radii: Vec<f64> = steps
        .iter()
        .filter(|(d, _)| d * sign >= MIN_RADIUS_TURN_DEG)
        .map(|(d, chord)| chord / d.abs().to_radians())
        .collect();
    if radii.is_empty() {
        return None;
    }
    let n = radii.len() as f64;
    let mean = radii.iter().sum::<f64>() / n;
    let variance = radii.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let rel_std = if mean > 0.0 { variance.sqrt() / mean } else { f64::INFINITY };

    if mean < config.min_radius_m
        || mean > config.max_radius_m + config.max_radius_slack_m
        || rel_std > config.max_radius_rel_std
    {
        return None;
    }

    let quality = consistency * (net_turn.abs() / 360.0).min(1.0) * (1.0 - rel_std.min(1.0));

    Some(WindowHit {
        start,
        end,
        radius_m: mean,
        quality: quality.clamp(0.0, 1.0),
    })
}

/// Union overlapping or nearby windows. Radius and quality are averaged over
/// the merged windows.
fn merge_hits(hits: &[WindowHit], gap: usize) -> Vec<WindowHit> {
    let mut merged: Vec<WindowHit> = Vec::new();
    let mut count = 0usize;

    for hit in hits {
        let joins = merged
            .last()
            .map_or(false, |current| hit.start <= current.end + gap);
        if joins {
            if let Some(current) = merged.last_mut() {
                current.end = current.end.max(hit.end);
                current.radius_m += hit.radius_m;
                current.quality += hit.quality;
                count += 1;
            }
        } else {
            finish_group(merged.last_mut(), count);
            merged.push(*hit);
            count = 1;
        }
    }
    finish_group(merged.last_mut(), count);
    merged
}

fn finish_group(group: Option<&mut WindowHit>, count: usize) {
    if let Some(group) = group {
        if count > 1 {
            group.radius_m /= count as f64;
            group.quality /= count as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::METERS_PER_DEGREE;

    const LAT0: f64 = 46.0;
    const LON0: f64 = 8.0;

    fn to_fix(i: usize, x: f64, y: f64, alt: f64) -> Fix {
        let lat = LAT0 + y / METERS_PER_DEGREE;
        let lon = LON0 + x / (METERS_PER_DEGREE * LAT0.to_radians().cos());
        Fix::new(i as f64 * 2.0, lat, lon, alt)
    }

    /// 30 fixes gliding north, `circle_pts` fixes circling, 40 fixes gliding
    /// out. One fix every 2 s, `step_m` apart. `clockwise` picks the turn way.
    fn circling_track(radius: f64, step_m: f64, circle_pts: usize, clockwise: bool) -> Vec<Fix> {
        let mut fixes = Vec::new();
        let mut alt = 1000.0;
        let side = if clockwise { 1.0 } else { -1.0 };

        for i in 0..30 {
            fixes.push(to_fix(i, 0.0, -step_m * (30 - i) as f64, alt));
            alt -= 1.5;
        }

        // Circle through the origin heading north, centre to the side
        let theta = 2.0 * (step_m / (2.0 * radius)).asin();
        let mut heading = 0.0;
        for k in 0..circle_pts {
            let phi = -std::f64::consts::FRAC_PI_2 + k as f64 * theta;
            let x = side * (radius + radius * phi.sin());
            let y = radius * phi.cos();
            fixes.push(to_fix(fixes.len(), x, y, alt));
            alt += 2.0;
            heading = side * (phi + std::f64::consts::FRAC_PI_2);
        }

        let last = *fixes.last().unwrap();
        let (x0, y0) = (
            (last.lon - LON0) * METERS_PER_DEGREE * LAT0.to_radians().cos(),
            (last.lat - LAT0) * METERS_PER_DEGREE,
        );
        for j in 1..=40 {
            let d = step_m * j as f64;
            fixes.push(to_fix(fixes.len(), x0 + d * heading.sin(), y0 + d * heading.cos(), alt));
            alt -= 1.5;
        }
        fixes
    }

    fn phase(start_idx: usize, end_idx: usize) -> ClimbPhase {
        ClimbPhase {
            start_idx,
            end_idx,
            start_alt_m: 0.0,
            peak_alt_m: 0.0,
            gain_m: 0.0,
            start_sec: 0.0,
            end_sec: 0.0,
            avg_climb_ms: 0.0,
        }
    }

    #[test]
    fn test_detects_right_hand_circle() {
        let fixes = circling_track(60.0, 20.0, 60, true);
        let circles = detect_thermals(&fixes, &[phase(30, 89)], &ThermalConfig::default());

        assert_eq!(circles.len(), 1);
        let c = circles[0];
        assert_eq!(c.climb_idx, 0);
        assert_eq!(c.start_idx, 30);
        assert_eq!(c.end_idx, 89);
        assert_eq!(c.direction, TurnDirection::Right);
        assert!((c.radius_m - 60.0).abs() < 3.0, "radius {}", c.radius_m);
        assert!(c.turns > 2.5);
        assert!(c.quality > 0.8 && c.quality <= 1.0);
        assert!((c.alt_gain_m - 118.0).abs() < 1e-9);
    }

    #[test]
    fn test_detects_left_hand_circle() {
        let fixes = circling_track(70.0, 20.0, 60, false);
        let circles = detect_thermals(&fixes, &[phase(30, 89)], &ThermalConfig::default());
        assert_eq!(circles.len(), 1);
        assert_eq!(circles[0].direction, TurnDirection::Left);
    }

    #[test]
    fn test_circle_stays_inside_phase() {
        let fixes = circling_track(60.0, 20.0, 60, true);
        let phases = [phase(40, 75)];
        let circles = detect_thermals(&fixes, &phases, &ThermalConfig::default());
        assert!(!circles.is_empty());
        for c in &circles {
            let p = &phases[c.climb_idx];
            assert!(c.start_idx >= p.start_idx && c.end_idx <= p.end_idx);
        }
    }

    #[test]
    fn test_straight_glide_is_not_circling() {
        let fixes = circling_track(60.0, 20.0, 0, true);
        assert!(detect_thermals(&fixes, &[phase(0, 69)], &ThermalConfig::default()).is_empty());
    }

    #[test]
    fn test_radius_too_small_rejected() {
        let fixes = circling_track(8.0, 10.0, 60, true);
        assert!(detect_thermals(&fixes, &[phase(30, 89)], &ThermalConfig::default()).is_empty());
    }

    #[test]
    fn test_phase_shorter_than_window() {
        let fixes = circling_track(60.0, 20.0, 60, true);
        assert!(detect_thermals(&fixes, &[phase(40, 50)], &ThermalConfig::default()).is_empty());
    }

    #[test]
    fn test_sinking_circle_rejected() {
        let mut fixes = circling_track(60.0, 20.0, 60, true);
        for (i, f) in fixes.iter_mut().enumerate() {
            f.altitude_m = 2000.0 - i as f64;
        }
        assert!(detect_thermals(&fixes, &[phase(30, 89)], &ThermalConfig::default()).is_empty());
    }

    #[test]
    fn test_merge_hits_respects_gap() {
        let hit = |start, end| WindowHit {
            start,
            end,
            radius_m: 50.0,
            quality: 0.5,
        };
        let hits = [hit(0, 19), hit(5, 24), hit(40, 59)];

        let merged = merge_hits(&hits, 5);
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].start, merged[0].end), (0, 24));
        assert_eq!(merged[0].radius_m, 50.0);
        assert_eq!((merged[1].start, merged[1].end), (40, 59));

        assert_eq!(merge_hits(&hits, 20).len(), 1);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let fixes = circling_track(60.0, 20.0, 60, true);
        let phases = [phase(0, 40), phase(45, 89)];
        let config = ThermalConfig::default();
        assert_eq!(
            detect_thermals(&fixes, &phases, &config),
            detect_thermals_parallel(&fixes, &phases, &config)
        );
    }
}
