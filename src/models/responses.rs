use serde::{Deserialize, Serialize};
use crate::models::domain::RankedRestaurant;

/// Response for the discover endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub results: Vec<RankedRestaurant>,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    pub cached: bool,
    pub fingerprint: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Cache invalidation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateCacheResponse {
    pub success: bool,
    pub fingerprint: Option<String>,
}
