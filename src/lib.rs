//! Dine Algo - Restaurant discovery and recommendation scoring
//!
//! This library provides the discovery core used by the Dine app: a
//! geographic pre-filter, dietary compatibility scoring, weighted ranking
//! and a time-boxed result cache, wired together by `DiscoveryService`.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{RankingEngine, filter_by_radius, distance::{haversine_distance, calculate_bounding_box}};
pub use error::DiscoveryError;
pub use models::{Restaurant, UserPreferences, RankedRestaurant, SafetyLevel, ScoringWeights, DiscoveryQuery, GeoPoint};
pub use services::{DiscoveryService, ResultCache, CacheKey};
