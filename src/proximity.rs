use std::collections::HashSet;

use crate::geo::GeoPoint;

pub const EARTH_RADIUS: f64 = 6371000.0; // unit: meter

/// A toll is considered to be on the route when it is within this lateral
/// distance of the route polyline. Applied uniformly to every toll and every
/// request.
pub const TOLL_MATCH_THRESHOLD: f64 = 100.0; // unit: meter

pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS * c
}

fn initial_bearing(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    y.atan2(x)
}

/// Minimum great-circle distance from `point` to the segment between `start`
/// and `end`, with the projection clamped to the segment. Checking only the
/// vertices is not enough: a point can sit right next to the middle of a long
/// segment while being far from both endpoints.
pub fn point_to_segment_distance(point: &GeoPoint, start: &GeoPoint, end: &GeoPoint) -> f64 {
    let segment_length = haversine_distance(start, end);
    let start_to_point = haversine_distance(start, point);
    // degenerate segment (includes duplicate consecutive route points)
    if segment_length == 0.0 || start_to_point == 0.0 {
        return start_to_point;
    }

    let bearing_to_point = initial_bearing(start, point);
    let bearing_to_end = initial_bearing(start, end);

    // projection falls behind `start`
    if (bearing_to_point - bearing_to_end).cos() <= 0.0 {
        return start_to_point;
    }

    let angular = start_to_point / EARTH_RADIUS;
    let cross_track = (angular.sin() * (bearing_to_point - bearing_to_end).sin()).asin();
    let along_track = (angular.cos() / cross_track.cos()).clamp(-1.0, 1.0).acos() * EARTH_RADIUS;

    // projection falls past `end`
    if along_track >= segment_length {
        return haversine_distance(end, point);
    }
    cross_track.abs() * EARTH_RADIUS
}

/// Minimum great-circle distance from `point` to the route polyline. A
/// single-point route degenerates to plain point-to-point distance.
pub fn distance_to_route(point: &GeoPoint, route: &[GeoPoint]) -> f64 {
    match route {
        [] => f64::INFINITY,
        [only] => haversine_distance(only, point),
        _ => route
            .windows(2)
            .map(|segment| point_to_segment_distance(point, &segment[0], &segment[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Returns the ids of all tolls within `threshold` meters of the route. The
/// result is a set: a toll near a segment junction is within the threshold of
/// two segments but still matches only once. O(tolls × route points), which is
/// fine at the expected scale (hundreds of each).
pub fn match_tolls(
    route: &[GeoPoint],
    tolls: &[(i64, GeoPoint)],
    threshold: f64,
) -> HashSet<i64> {
    tolls
        .iter()
        .filter(|(_, location)| distance_to_route(location, route) <= threshold)
        .map(|(id, _)| *id)
        .collect()
}
