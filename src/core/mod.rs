// Core algorithm exports
pub mod compatibility;
pub mod distance;
pub mod filters;
pub mod geo_filter;
pub mod ranker;
pub mod scoring;

pub use compatibility::{normalize_tag, score as score_compatibility};
pub use distance::{haversine_distance, calculate_bounding_box, is_within_bounding_box};
pub use filters::{check_distance, check_preferences, Rejection};
pub use geo_filter::filter_by_radius;
pub use ranker::{RankResult, RankingEngine};
pub use scoring::calculate_score;
