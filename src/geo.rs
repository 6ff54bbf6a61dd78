// src/geo.rs
//! Geometry over GPS traces: distance, map regions, waypoint sampling
//!
//! All functions are pure and operate on WGS84 coordinates in degrees. The
//! Haversine distance assumes a spherical Earth; traces crossing the
//! antimeridian or the poles are not special-cased.

use crate::walk::Coordinate;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Padding multiplier applied to a trace's bounding spans.
pub const REGION_PADDING: f64 = 1.2;

/// Minimum latitude/longitude span, so near-stationary traces don't zoom in
/// to nothing.
pub const MIN_REGION_SPAN: f64 = 0.01;

/// Number of interior waypoints sampled from a trace by default.
pub const DEFAULT_WAYPOINT_COUNT: usize = 5;

/// Traces shorter than this yield no sampled waypoints.
const MIN_POINTS_FOR_WAYPOINTS: usize = 10;

/// Map viewport framing a trace: center plus latitude/longitude spans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub center: Coordinate,
    pub lat_span: f64,
    pub lon_span: f64,
}

/// An intermediate trace point sampled for display as a map marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceWaypoint {
    pub coordinate: Coordinate,
    pub index: usize,
}

/// Total trace length in kilometers: the sum of great-circle distances
/// between consecutive points. Traces with fewer than two points have
/// length 0.
pub fn distance_km(coords: &[Coordinate]) -> f64 {
    if coords.len() < 2 {
        return 0.0;
    }

    coords
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

/// Haversine great-circle distance between two points, in kilometers.
fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Compute the padded map region framing a trace.
///
/// The center is the midpoint of the min/max box; spans are padded by
/// [`REGION_PADDING`] and floored at [`MIN_REGION_SPAN`]. Empty traces have
/// no region.
pub fn bounding_region(coords: &[Coordinate]) -> Option<Region> {
    let first = coords.first()?;

    let mut min_lat = first.latitude;
    let mut max_lat = first.latitude;
    let mut min_lon = first.longitude;
    let mut max_lon = first.longitude;

    for coord in coords {
        min_lat = min_lat.min(coord.latitude);
        max_lat = max_lat.max(coord.latitude);
        min_lon = min_lon.min(coord.longitude);
        max_lon = max_lon.max(coord.longitude);
    }

    Some(Region {
        center: Coordinate::new((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0),
        lat_span: ((max_lat - min_lat) * REGION_PADDING).max(MIN_REGION_SPAN),
        lon_span: ((max_lon - min_lon) * REGION_PADDING).max(MIN_REGION_SPAN),
    })
}

/// Index of the trace point closest to `target`.
///
/// Uses planar squared distance, which is accurate enough at map-interaction
/// zoom levels and avoids the trigonometry. Ties resolve to the first
/// occurrence; empty traces have no nearest point.
pub fn nearest_point_index(coords: &[Coordinate], target: Coordinate) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (index, coord) in coords.iter().enumerate() {
        let d_lat = coord.latitude - target.latitude;
        let d_lon = coord.longitude - target.longitude;
        let squared = d_lat * d_lat + d_lon * d_lon;

        match best {
            Some((_, best_squared)) if squared >= best_squared => {}
            _ => best = Some((index, squared)),
        }
    }

    best.map(|(index, _)| index)
}

/// Sample up to `count` evenly spaced interior waypoints from a trace.
///
/// Traces with fewer than 10 points yield nothing. The first and last points
/// are never emitted; callers mark those separately as start/end.
pub fn sample_waypoints(coords: &[Coordinate], count: usize) -> Vec<TraceWaypoint> {
    if coords.len() < MIN_POINTS_FOR_WAYPOINTS || count == 0 {
        return Vec::new();
    }

    let last = coords.len() - 1;
    let mut waypoints: Vec<TraceWaypoint> = Vec::with_capacity(count);

    for i in 1..=count {
        let index = i * last / (count + 1);
        if index == 0 || index == last {
            continue;
        }
        if waypoints.last().map_or(false, |prev| prev.index == index) {
            continue;
        }
        waypoints.push(TraceWaypoint {
            coordinate: coords[index],
            index,
        });
    }

    waypoints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equator_track() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.0, 0.002),
        ]
    }

    #[test]
    fn test_distance_empty_and_single() {
        assert_eq!(distance_km(&[]), 0.0);
        assert_eq!(distance_km(&[Coordinate::new(51.5, -0.12)]), 0.0);
    }

    #[test]
    fn test_distance_identical_points() {
        let still = vec![Coordinate::new(48.85, 2.35); 5];
        assert_eq!(distance_km(&still), 0.0);
    }

    #[test]
    fn test_distance_equator_segments() {
        // Two segments of ~0.111 km each at the equator.
        let total = distance_km(&equator_track());
        assert!((total - 0.222).abs() < 0.005, "got {}", total);
    }

    #[test]
    fn test_distance_symmetric_under_reversal() {
        let mut track = vec![
            Coordinate::new(51.5074, -0.1278),
            Coordinate::new(51.5080, -0.1290),
            Coordinate::new(51.5090, -0.1300),
            Coordinate::new(51.5101, -0.1289),
        ];
        let forward = distance_km(&track);
        track.reverse();
        let backward = distance_km(&track);
        assert!((forward - backward).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_region_empty() {
        assert_eq!(bounding_region(&[]), None);
    }

    #[test]
    fn test_bounding_region_center_and_floor() {
        let region = bounding_region(&equator_track()).unwrap();

        // Center stays inside the min/max box.
        assert_eq!(region.center.latitude, 0.0);
        assert!(region.center.longitude >= 0.0 && region.center.longitude <= 0.002);
        // A near-stationary trace still gets the minimum span.
        assert_eq!(region.lat_span, MIN_REGION_SPAN);
        assert_eq!(region.lon_span, MIN_REGION_SPAN);
    }

    #[test]
    fn test_bounding_region_padding() {
        let track = vec![Coordinate::new(51.0, -1.0), Coordinate::new(52.0, 1.0)];
        let region = bounding_region(&track).unwrap();

        assert!((region.center.latitude - 51.5).abs() < 1e-9);
        assert!((region.center.longitude - 0.0).abs() < 1e-9);
        assert!((region.lat_span - 1.2).abs() < 1e-9);
        assert!((region.lon_span - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_point_empty() {
        assert_eq!(nearest_point_index(&[], Coordinate::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_nearest_point_basic() {
        let track = equator_track();
        let index = nearest_point_index(&track, Coordinate::new(0.0, 0.0019));
        assert_eq!(index, Some(2));
    }

    #[test]
    fn test_nearest_point_tie_takes_first() {
        let track = vec![
            Coordinate::new(0.0, -1.0),
            Coordinate::new(0.0, 1.0),
        ];
        let index = nearest_point_index(&track, Coordinate::new(0.0, 0.0));
        assert_eq!(index, Some(0));
    }

    #[test]
    fn test_sample_waypoints_short_trace() {
        let track: Vec<Coordinate> = (0..9)
            .map(|i| Coordinate::new(0.0, i as f64 * 0.001))
            .collect();
        assert!(sample_waypoints(&track, DEFAULT_WAYPOINT_COUNT).is_empty());
    }

    #[test]
    fn test_sample_waypoints_excludes_endpoints() {
        let track: Vec<Coordinate> = (0..50)
            .map(|i| Coordinate::new(0.0, i as f64 * 0.001))
            .collect();
        let waypoints = sample_waypoints(&track, DEFAULT_WAYPOINT_COUNT);

        assert_eq!(waypoints.len(), DEFAULT_WAYPOINT_COUNT);
        for pair in waypoints.windows(2) {
            assert!(pair[0].index < pair[1].index);
        }
        assert!(waypoints.iter().all(|w| w.index != 0 && w.index != 49));
    }

    #[test]
    fn test_sample_waypoints_indices_match_coordinates() {
        let track: Vec<Coordinate> = (0..20)
            .map(|i| Coordinate::new(i as f64 * 0.01, 0.0))
            .collect();
        for waypoint in sample_waypoints(&track, 3) {
            assert_eq!(waypoint.coordinate, track[waypoint.index]);
        }
    }
}
