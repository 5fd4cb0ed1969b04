// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, BudgetRange, CandidateFilter, CompatibilityResult, DiscoveryQuery, GeoPoint,
    RankedRestaurant, Restaurant, SafetyLevel, ScoringWeights, UserPreferences,
};
pub use requests::{DiscoverRequest, InvalidateCacheRequest};
pub use responses::{DiscoverResponse, ErrorResponse, HealthResponse, InvalidateCacheResponse};
