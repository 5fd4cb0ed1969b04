use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::core::distance::{haversine_distance, is_within_bounding_box};
use crate::models::{CandidateFilter, Restaurant};

/// Errors that can occur when loading candidate restaurants
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Source of candidate restaurants for a discovery pass
///
/// Implementations may push the bounding box and `open_only` down to their
/// storage, but callers still run the exact radius check afterwards.
pub trait RestaurantRepository: Send + Sync {
    fn fetch_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> impl Future<Output = Result<Vec<Restaurant>, RepositoryError>> + Send;

    fn health_check(&self) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Repository backed by a shared in-memory snapshot
///
/// Used by tests, benchmarks and local development without a database.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    restaurants: Arc<RwLock<Vec<Restaurant>>>,
}

impl InMemoryRepository {
    pub fn new(restaurants: Vec<Restaurant>) -> Self {
        Self {
            restaurants: Arc::new(RwLock::new(restaurants)),
        }
    }

    /// Insert or replace a restaurant by id
    pub async fn upsert(&self, restaurant: Restaurant) {
        let mut restaurants = self.restaurants.write().await;
        match restaurants.iter_mut().find(|r| r.id == restaurant.id) {
            Some(existing) => *existing = restaurant,
            None => restaurants.push(restaurant),
        }
    }

    /// Remove a restaurant, returning whether it existed
    pub async fn remove(&self, id: &str) -> bool {
        let mut restaurants = self.restaurants.write().await;
        let before = restaurants.len();
        restaurants.retain(|r| r.id != id);
        restaurants.len() != before
    }

    pub async fn len(&self) -> usize {
        self.restaurants.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.restaurants.read().await.is_empty()
    }
}

impl RestaurantRepository for InMemoryRepository {
    async fn fetch_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<Restaurant>, RepositoryError> {
        let restaurants = self.restaurants.read().await;

        let mut candidates: Vec<Restaurant> = restaurants
            .iter()
            .filter(|r| !filter.open_only || r.is_open)
            .filter(|r| match &filter.bounding_box {
                Some(bbox) => r
                    .coordinates()
                    .map(|p| is_within_bounding_box(p.latitude, p.longitude, bbox))
                    .unwrap_or(false),
                None => true,
            })
            .cloned()
            .collect();

        // Nearest first, unlocated last, so a limit drops the farthest rows
        if let Some(origin) = filter.origin {
            let distance_km = |r: &Restaurant| {
                r.coordinates()
                    .map(|p| haversine_distance(origin.latitude, origin.longitude, p.latitude, p.longitude))
                    .unwrap_or(f64::INFINITY)
            };
            candidates.sort_by(|a, b| distance_km(a).total_cmp(&distance_km(b)));
        }

        if filter.limit > 0 {
            candidates.truncate(filter.limit);
        }

        tracing::debug!("Loaded {} candidates from memory", candidates.len());

        Ok(candidates)
    }

    async fn health_check(&self) -> Result<bool, RepositoryError> {
        Ok(true)
    }
}
