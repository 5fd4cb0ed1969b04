use thiserror::Error;

use crate::services::repository::RepositoryError;

/// Errors surfaced at the discovery pipeline boundary
///
/// Per-restaurant data defects (missing coordinates, odd tags) are never
/// errors; they only exclude the affected restaurant from the result.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid query parameter: {0}")]
    InvalidQueryParameter(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl DiscoveryError {
    /// True when the caller sent a bad request and retrying will not help
    pub fn is_client_error(&self) -> bool {
        matches!(self, DiscoveryError::InvalidQueryParameter(_))
    }
}

/// Validate an origin coordinate pair
pub fn validate_origin(latitude: f64, longitude: f64) -> Result<(), DiscoveryError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(DiscoveryError::InvalidQueryParameter(format!(
            "latitude must be within [-90, 90], got {}",
            latitude
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(DiscoveryError::InvalidQueryParameter(format!(
            "longitude must be within [-180, 180], got {}",
            longitude
        )));
    }
    Ok(())
}

/// Validate a search radius
pub fn validate_radius(radius_km: f64) -> Result<(), DiscoveryError> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(DiscoveryError::InvalidQueryParameter(format!(
            "radius must be a positive number of kilometers, got {}",
            radius_km
        )));
    }
    Ok(())
}
