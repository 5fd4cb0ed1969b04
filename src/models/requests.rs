use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::DiscoveryError;
use crate::models::domain::{DiscoveryQuery, GeoPoint, UserPreferences};

/// Request to discover restaurants
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DiscoverRequest {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub query: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[serde(alias = "radius_km", rename = "radiusKm")]
    #[validate(range(exclusive_min = 0.0))]
    pub radius_km: Option<f64>,
    #[validate(range(min = 0))]
    pub limit: Option<i64>,
    #[serde(default)]
    pub preferences: UserPreferences,
}

impl DiscoverRequest {
    /// Convert into a pipeline query
    ///
    /// Latitude and longitude must be given together or not at all.
    pub fn into_query(self) -> Result<DiscoveryQuery, DiscoveryError> {
        let origin = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            (None, None) => None,
            _ => {
                return Err(DiscoveryError::InvalidQueryParameter(
                    "latitude and longitude must be provided together".to_string(),
                ))
            }
        };

        Ok(DiscoveryQuery {
            query: self.query,
            origin,
            radius_km: self.radius_km,
            limit: self.limit,
            preferences: self.preferences,
        })
    }
}

/// Request to drop cached discovery results
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct InvalidateCacheRequest {
    /// Fingerprint to drop; everything is dropped when absent
    #[validate(length(min = 1))]
    pub fingerprint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: serde_json::Value) -> DiscoverRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_parse_and_convert() {
        let req = request(serde_json::json!({
            "query": "ramen",
            "latitude": 37.7749,
            "longitude": -122.4194,
            "radiusKm": 3.0,
            "limit": 5,
            "preferences": {
                "dietaryRestrictions": ["vegan"],
                "allergens": ["peanuts"],
                "minimumRating": 4.0,
                "budgetLevel": 2
            }
        }));

        assert!(req.validate().is_ok());
        let query = req.into_query().unwrap();
        assert_eq!(query.origin, Some(GeoPoint::new(37.7749, -122.4194)));
        assert_eq!(query.preferences.dietary_restrictions, vec!["vegan"]);
        assert_eq!(query.preferences.budget_level, 2);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let req = request(serde_json::json!({ "latitude": 120.0, "longitude": 0.0 }));
        assert!(req.validate().is_err());

        let req = request(serde_json::json!({ "radiusKm": 0.0 }));
        assert!(req.validate().is_err());

        let req = request(serde_json::json!({ "limit": -2 }));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_half_origin_rejected() {
        let req = request(serde_json::json!({ "latitude": 37.0 }));
        assert!(matches!(
            req.into_query(),
            Err(DiscoveryError::InvalidQueryParameter(_))
        ));
    }

    #[test]
    fn test_minimal_request() {
        let req = request(serde_json::json!({}));
        assert!(req.validate().is_ok());
        let query = req.into_query().unwrap();
        assert!(query.origin.is_none());
        assert!(query.preferences.dietary_restrictions.is_empty());
    }
}
