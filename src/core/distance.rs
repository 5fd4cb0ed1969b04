use crate::models::BoundingBox;

/// Earth's radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree of latitude used by the bounding-box pre-filter
const KM_PER_DEGREE: f64 = 111.0;

const LON_SLACK: f64 = 1.000_001;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Calculate a bounding box around a center point
///
/// This is much faster than Haversine for pre-filtering.
/// 1° latitude ≈ 111km, so the latitude band is `radius_km / 111`.
///
/// The longitude reach is the exact east-west extent of the spherical cap,
/// `asin(sin(r / R) / cos(lat))`. The circle's widest point sits poleward of
/// the center, so `r / (111 * cos(lat))` is too narrow at high latitudes.
/// When the cap reaches past a pole or spans more than half the globe, the
/// longitude bound is dropped instead.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;

    let min_lat = lat - lat_delta;
    let max_lat = lat + lat_delta;

    let crosses_pole = min_lat < -90.0 || max_lat > 90.0;
    let lon_delta = longitude_reach(lat, radius_km);

    let (min_lon, max_lon) = match lon_delta {
        Some(delta) if !crosses_pole && delta < 180.0 => (Some(lon - delta), Some(lon + delta)),
        _ => (None, None),
    };

    BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

/// Half-width in degrees of the longitude band covered by a circle
///
/// `None` when the circle wraps around a pole.
fn longitude_reach(lat: f64, radius_km: f64) -> Option<f64> {
    let angular = radius_km / EARTH_RADIUS_KM;
    if !angular.is_finite() || angular >= std::f64::consts::FRAC_PI_2 {
        return None;
    }

    let ratio = angular.sin() / lat.to_radians().cos().abs();
    if !ratio.is_finite() || ratio >= 1.0 {
        return None;
    }

    // Slack for rounding at the exact boundary
    Some(ratio.asin().to_degrees() * LON_SLACK)
}

/// Check if a point is within a bounding box
///
/// Boxes that extend past ±180° longitude are matched against the wrapped
/// longitude as well.
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    if lat < bbox.min_lat || lat > bbox.max_lat {
        return false;
    }

    match (bbox.min_lon, bbox.max_lon) {
        (Some(min_lon), Some(max_lon)) => [lon, lon - 360.0, lon + 360.0]
            .iter()
            .any(|l| *l >= min_lon && *l <= max_lon),
        _ => true,
    }
}
