use serde::{Deserialize, Serialize};

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Latitude in [-90, 90], longitude in [-180, 180], both finite
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Candidate venue as supplied by the restaurant repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(rename = "priceTier", default)]
    pub price_tier: Option<u8>,
    #[serde(rename = "dietaryOptions", default)]
    pub dietary_options: Vec<String>,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(rename = "averageCost", default)]
    pub average_cost: Option<f64>,
    #[serde(rename = "isOpen", default = "default_true")]
    pub is_open: bool,
    #[serde(rename = "dietaryVerified", default)]
    pub dietary_verified: bool,
    #[serde(rename = "updatedAt", default = "chrono::Utc::now")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Restaurant {
    /// Coordinates usable for location-bound queries, if any
    pub fn coordinates(&self) -> Option<GeoPoint> {
        self.location.filter(GeoPoint::is_valid)
    }

    /// Rating clamped into the 0-5 scale, ignoring non-finite values
    pub fn normalized_rating(&self) -> Option<f64> {
        self.rating
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, 5.0))
    }
}

fn default_true() -> bool { true }

/// Budget range in currency units (0 means unset)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetRange {
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub preferred: f64,
    #[serde(default)]
    pub max: f64,
}

/// User discovery preferences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(rename = "dietaryRestrictions", default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(rename = "minimumRating", default)]
    pub minimum_rating: f64,
    /// Maximum acceptable price tier; 0 means no preference
    #[serde(rename = "budgetLevel", default)]
    pub budget_level: u8,
    /// Maximum travel distance; 0 disables the distance bound
    #[serde(rename = "maxDistanceKm", default)]
    pub max_distance_km: f64,
    #[serde(default)]
    pub budget: BudgetRange,
    #[serde(rename = "openNow", default)]
    pub open_now: bool,
}

/// Allergen risk classification, independent of the compatibility score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Ok,
    Caution,
    Warning,
}

/// Output of the compatibility scorer for one restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub compatibility: f64,
    pub safety: SafetyLevel,
    #[serde(rename = "matchedRestrictions")]
    pub matched_restrictions: Vec<String>,
    #[serde(rename = "missingRestrictions")]
    pub missing_restrictions: Vec<String>,
    #[serde(rename = "conflictingAllergens")]
    pub conflicting_allergens: Vec<String>,
}

/// Ranked result ready for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRestaurant {
    pub restaurant: Restaurant,
    #[serde(rename = "distanceKm")]
    pub distance_km: Option<f64>,
    pub compatibility: f64,
    pub safety: SafetyLevel,
    pub score: f64,
}

/// Geospatial bounding box
///
/// `min_lon`/`max_lon` are `None` when the longitude span is unbounded,
/// which happens close to the poles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: Option<f64>,
    pub max_lon: Option<f64>,
}

/// Candidate query handed to the restaurant repository
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub bounding_box: Option<BoundingBox>,
    /// When set, rows are returned nearest first so `limit` keeps the closest
    pub origin: Option<GeoPoint>,
    pub open_only: bool,
    pub limit: usize,
}

/// Scoring weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub distance: f64,
    pub rating: f64,
    pub compatibility: f64,
    pub price: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: 0.30,
            rating: 0.30,
            compatibility: 0.25,
            price: 0.15,
        }
    }
}

impl ScoringWeights {
    /// Sum of all weights, used to normalise scores into 0-1
    pub fn total(&self) -> f64 {
        self.distance + self.rating + self.compatibility + self.price
    }
}

/// One discovery request as seen by the pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryQuery {
    /// Free-text search, part of the cache fingerprint
    pub query: String,
    pub origin: Option<GeoPoint>,
    pub radius_km: Option<f64>,
    pub limit: Option<i64>,
    pub preferences: UserPreferences,
}
