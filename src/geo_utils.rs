//! # Geographic Utilities
//!
//! Geographic computations shared by the analysis modules.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two fixes |
//! | [`polyline_length`] | Path length of a fix sequence in meters |
//! | [`bearing_deg`] | Ground track from one fix to the next |
//! | [`heading_delta`] | Signed change between two bearings |
//! | [`compute_bounds`] | Bounding box of a fix sequence |
//! | [`LocalProjection`] | Equirectangular lat/lon to meters around an origin |
//!
//! ## Example
//!
//! ```rust
//! use igc_analysis::{Fix, geo_utils};
//!
//! let a = Fix::new(0.0, 46.0, 8.0, 1000.0);
//! let b = Fix::new(10.0, 46.001, 8.0, 1000.0);
//!
//! let d = geo_utils::haversine_distance(&a, &b);
//! assert!((d - 111.2).abs() < 1.0);
//!
//! let bearing = geo_utils::bearing_deg(&a, &b);
//! assert!(bearing.abs() < 1e-6); // due north
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula from `geo` (mean Earth radius
//! 6,371 km). Bearings and the RDP projection use a local flat-earth
//! approximation: longitude degrees are scaled by `cos(latitude)`. Over the
//! few hundred meters between consecutive fixes the error is negligible.

use geo::{Distance, Haversine, Point};

use crate::{Bounds, Fix};

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two fixes in meters.
///
/// Uses geo's mean Earth radius of 6,371,008.8 m. Against a 6371 km sphere
/// the results differ by under 0.0002% (about 15 cm per degree of arc).
///
/// ```rust
/// use igc_analysis::{Fix, geo_utils};
///
/// let london = Fix::new(0.0, 51.5074, -0.1278, 0.0);
/// let paris = Fix::new(0.0, 48.8566, 2.3522, 0.0);
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(a: &Fix, b: &Fix) -> f64 {
    let point1 = Point::new(a.lon, a.lat);
    let point2 = Point::new(b.lon, b.lat);
    Haversine::distance(point1, point2)
}

/// Total path length of a fix sequence in meters.
///
/// Empty or single-fix sequences return 0.0.
pub fn polyline_length(fixes: &[Fix]) -> f64 {
    if fixes.len() < 2 {
        return 0.0;
    }

    fixes
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Direction Functions
// =============================================================================

/// Ground track from `a` to `b` in degrees clockwise from north, in `[0, 360)`.
///
/// Computed from the lat/lon deltas with longitude scaled by the cosine of the
/// mean latitude. Identical positions yield 0.0.
pub fn bearing_deg(a: &Fix, b: &Fix) -> f64 {
    let mid_lat = ((a.lat + b.lat) / 2.0).to_radians();
    let dx = (b.lon - a.lon) * mid_lat.cos();
    let dy = b.lat - a.lat;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    let deg = dx.atan2(dy).to_degrees();
    if deg < 0.0 {
        deg + 360.0
    } else {
        deg
    }
}

/// Signed heading change from bearing `from` to bearing `to`, in `(-180, 180]`.
///
/// Positive values are clockwise (right) turns.
#[inline]
pub fn heading_delta(from: f64, to: f64) -> f64 {
    let mut d = (to - from) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

// =============================================================================
// Projection
// =============================================================================

/// Equirectangular projection around a fixed origin.
///
/// Maps lat/lon to planar meters (`x` east, `y` north). The longitude scale is
/// frozen at the origin latitude, which is accurate enough for the extent of a
/// single flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    origin_lat: f64,
    origin_lon: f64,
    meters_per_deg_lon: f64,
}

impl LocalProjection {
    /// Create a projection centered on the given origin.
    pub fn new(origin_lat: f64, origin_lon: f64) -> Self {
        let meters_per_deg_lon = METERS_PER_DEGREE * origin_lat.to_radians().cos();
        Self {
            origin_lat,
            origin_lon,
            meters_per_deg_lon,
        }
    }

    /// Project a fix to `(x, y)` meters relative to the origin.
    #[inline]
    pub fn project(&self, fix: &Fix) -> (f64, f64) {
        (
            (fix.lon - self.origin_lon) * self.meters_per_deg_lon,
            (fix.lat - self.origin_lat) * METERS_PER_DEGREE,
        )
    }
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Bounding box of a fix sequence, or `None` if it is empty.
pub fn compute_bounds(fixes: &[Fix]) -> Option<Bounds> {
    if fixes.is_empty() {
        return None;
    }
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lon = f64::MAX;
    let mut max_lon = f64::MIN;

    for f in fixes {
        min_lat = min_lat.min(f.lat);
        max_lat = max_lat.max(f.lat);
        min_lon = min_lon.min(f.lon);
        max_lon = max_lon.max(f.lon);
    }

    Some(Bounds {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn at(lat: f64, lon: f64) -> Fix {
        Fix::new(0.0, lat, lon, 0.0)
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = at(46.5, 7.9);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_uses_mean_earth_radius() {
        // one degree of latitude along a meridian is R * pi / 180
        let d = haversine_distance(&at(46.0, 8.0), &at(47.0, 8.0));
        assert!(approx_eq(d, 111_195.08, 0.01));
        let on_6371_km_sphere = 6_371_000.0 * 1.0_f64.to_radians();
        assert!((d - on_6371_km_sphere).abs() < 0.2);
    }

    #[test]
    fn test_polyline_length_short_inputs() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[at(46.5, 7.9)]), 0.0);
    }

    #[test]
    fn test_polyline_length_sums_legs() {
        let track = vec![at(46.0, 8.0), at(46.001, 8.0), at(46.002, 8.0)];
        let length = polyline_length(&track);
        assert!(approx_eq(length, 222.4, 1.0));
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = at(46.0, 8.0);
        assert!(approx_eq(bearing_deg(&origin, &at(46.001, 8.0)), 0.0, 1e-6));
        assert!(approx_eq(bearing_deg(&origin, &at(46.0, 8.001)), 90.0, 1e-6));
        assert!(approx_eq(bearing_deg(&origin, &at(45.999, 8.0)), 180.0, 1e-6));
        assert!(approx_eq(bearing_deg(&origin, &at(46.0, 7.999)), 270.0, 1e-6));
    }

    #[test]
    fn test_heading_delta_wraps() {
        assert!(approx_eq(heading_delta(350.0, 10.0), 20.0, 1e-9));
        assert!(approx_eq(heading_delta(10.0, 350.0), -20.0, 1e-9));
        assert!(approx_eq(heading_delta(0.0, 180.0), 180.0, 1e-9));
        assert!(approx_eq(heading_delta(90.0, 90.0), 0.0, 1e-9));
    }

    #[test]
    fn test_projection_scales_longitude() {
        let proj = LocalProjection::new(60.0, 10.0);
        let (x, y) = proj.project(&at(60.0, 10.001));
        assert!(approx_eq(x, METERS_PER_DEGREE * 0.001 * 0.5, 0.01));
        assert!(approx_eq(y, 0.0, 1e-9));
    }

    #[test]
    fn test_compute_bounds() {
        assert!(compute_bounds(&[]).is_none());
        let bounds = compute_bounds(&[at(46.0, 8.1), at(46.2, 7.9), at(46.1, 8.0)]).unwrap();
        assert_eq!(bounds.min_lat, 46.0);
        assert_eq!(bounds.max_lat, 46.2);
        assert_eq!(bounds.min_lon, 7.9);
        assert_eq!(bounds.max_lon, 8.1);
    }
}
