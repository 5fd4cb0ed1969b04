use crate::core::distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box};
use crate::error::{validate_origin, validate_radius, DiscoveryError};
use crate::models::Restaurant;

/// Keep the restaurants within `radius_km` of the origin
///
/// Stage 1 is the bounding-box pre-filter, stage 2 the exact Haversine
/// check (`distance <= radius_km`). Restaurants without usable coordinates
/// are skipped. Output keeps input order; ordering is the ranker's job.
///
/// # Errors
/// `InvalidQueryParameter` for a non-positive radius or an out-of-range origin.
pub fn filter_by_radius(
    candidates: Vec<Restaurant>,
    origin_lat: f64,
    origin_lon: f64,
    radius_km: f64,
) -> Result<Vec<(Restaurant, f64)>, DiscoveryError> {
    validate_radius(radius_km)?;
    validate_origin(origin_lat, origin_lon)?;

    let total = candidates.len();
    let bbox = calculate_bounding_box(origin_lat, origin_lon, radius_km);

    let within: Vec<(Restaurant, f64)> = candidates
        .into_iter()
        .filter_map(|restaurant| {
            let point = restaurant.coordinates()?;

            if !is_within_bounding_box(point.latitude, point.longitude, &bbox) {
                return None;
            }

            let distance_km =
                haversine_distance(origin_lat, origin_lon, point.latitude, point.longitude);

            (distance_km <= radius_km).then_some((restaurant, distance_km))
        })
        .collect();

    tracing::debug!(
        "Geo filter kept {} of {} candidates within {}km",
        within.len(),
        total,
        radius_km
    );

    Ok(within)
}
