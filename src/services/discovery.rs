use std::sync::Arc;
use std::time::Duration;

use crate::core::{calculate_bounding_box, filter_by_radius, RankingEngine};
use crate::error::{validate_origin, validate_radius, DiscoveryError};
use crate::models::{CandidateFilter, DiscoveryQuery, RankedRestaurant};
use crate::services::cache::{CacheKey, ResultCache};
use crate::services::repository::RestaurantRepository;

/// Tunables for the discovery pipeline
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Radius used when neither the request nor the preferences set one
    pub default_radius_km: f64,
    pub default_limit: usize,
    pub max_limit: usize,
    /// Upper bound on rows pulled from the repository per request (0 = unbounded)
    ///
    /// Repositories return the nearest rows first when an origin is given,
    /// so a cap drops the farthest candidates.
    pub candidate_fetch_limit: usize,
    pub cache_ttl: Duration,
    /// Decimal places kept from the origin when fingerprinting
    pub coordinate_precision: u32,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            default_radius_km: 5.0,
            default_limit: 20,
            max_limit: 100,
            candidate_fetch_limit: 0,
            cache_ttl: Duration::from_secs(300),
            coordinate_precision: 3,
        }
    }
}

/// Outcome of one discovery request
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub results: Vec<RankedRestaurant>,
    /// Candidates fetched from the repository; 0 when served from cache
    pub total_candidates: usize,
    pub cached: bool,
    pub fingerprint: String,
}

/// Discovery pipeline: validate, look up the cache, fetch, filter, rank, store
pub struct DiscoveryService<R> {
    repository: Arc<R>,
    engine: RankingEngine,
    cache: Arc<ResultCache>,
    options: DiscoveryOptions,
}

impl<R: RestaurantRepository> DiscoveryService<R> {
    pub fn new(
        repository: Arc<R>,
        engine: RankingEngine,
        cache: Arc<ResultCache>,
        options: DiscoveryOptions,
    ) -> Self {
        Self {
            repository,
            engine,
            cache,
            options,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Resolve the effective result limit
    ///
    /// Negative limits are rejected; larger-than-allowed limits are capped.
    fn resolve_limit(&self, limit: Option<i64>) -> Result<usize, DiscoveryError> {
        match limit {
            None => Ok(self.options.default_limit.min(self.options.max_limit)),
            Some(l) if l < 0 => Err(DiscoveryError::InvalidQueryParameter(format!(
                "limit must not be negative, got {}",
                l
            ))),
            Some(l) => Ok((l as usize).min(self.options.max_limit)),
        }
    }

    /// Resolve the effective search radius
    ///
    /// Request radius first, then the user's travel distance, then the default.
    /// A positive travel distance always caps the result.
    fn resolve_radius(&self, query: &DiscoveryQuery) -> Result<f64, DiscoveryError> {
        let max_distance_km = query.preferences.max_distance_km;

        let radius_km = match query.radius_km {
            Some(r) => r,
            None if max_distance_km > 0.0 => max_distance_km,
            None => self.options.default_radius_km,
        };
        validate_radius(radius_km)?;

        if max_distance_km > 0.0 {
            Ok(radius_km.min(max_distance_km))
        } else {
            Ok(radius_km)
        }
    }

    /// Run the full discovery pipeline for one request
    ///
    /// Without an origin, distance-bound stages are skipped and the distance
    /// term of the score is neutral.
    pub async fn discover(&self, query: DiscoveryQuery) -> Result<DiscoveryOutcome, DiscoveryError> {
        let limit = self.resolve_limit(query.limit)?;

        let radius_km = match query.origin {
            Some(origin) => {
                validate_origin(origin.latitude, origin.longitude)?;
                Some(self.resolve_radius(&query)?)
            }
            None => {
                if let Some(r) = query.radius_km {
                    validate_radius(r)?;
                }
                None
            }
        };

        let fingerprint = CacheKey::discovery(
            &query,
            radius_km,
            limit,
            self.options.coordinate_precision,
        );

        if let Some(results) = self.cache.get(&fingerprint).await {
            tracing::debug!("Serving {} cached results for {}", results.len(), fingerprint);
            return Ok(DiscoveryOutcome {
                results,
                total_candidates: 0,
                cached: true,
                fingerprint,
            });
        }

        let filter = CandidateFilter {
            bounding_box: query
                .origin
                .zip(radius_km)
                .map(|(o, r)| calculate_bounding_box(o.latitude, o.longitude, r)),
            origin: query.origin,
            open_only: query.preferences.open_now,
            limit: self.options.candidate_fetch_limit,
        };

        let candidates = self.repository.fetch_candidates(&filter).await?;
        let total_candidates = candidates.len();

        if filter.limit > 0 && total_candidates >= filter.limit {
            tracing::warn!(
                "Candidate fetch hit the cap of {} for {}; results may omit better matches",
                filter.limit,
                fingerprint
            );
        }

        let mut preferences = query.preferences;
        let ranked = match (query.origin, radius_km) {
            (Some(origin), Some(radius)) => {
                let within = filter_by_radius(candidates, origin.latitude, origin.longitude, radius)?;
                // Radius is already capped by the travel distance, so it is
                // both the distance bound and the normalisation range
                preferences.max_distance_km = radius;
                self.engine.rank_with_distances(
                    within.into_iter().map(|(r, d)| (r, Some(d))).collect(),
                    &preferences,
                    true,
                    limit,
                )
            }
            _ => self.engine.rank_with_distances(
                candidates.into_iter().map(|r| (r, None)).collect(),
                &preferences,
                false,
                limit,
            ),
        };

        self.cache
            .put(&fingerprint, ranked.results.clone(), self.options.cache_ttl)
            .await;

        tracing::info!(
            "Discovered {} restaurants from {} candidates",
            ranked.results.len(),
            total_candidates
        );

        Ok(DiscoveryOutcome {
            results: ranked.results,
            total_candidates,
            cached: false,
            fingerprint,
        })
    }

    /// Drop a cached result set, or all of them when no fingerprint is given
    pub async fn invalidate(&self, fingerprint: Option<&str>) {
        match fingerprint {
            Some(fp) => self.cache.invalidate(fp).await,
            None => self.cache.clear().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, Restaurant, UserPreferences};
    use crate::services::repository::InMemoryRepository;

    fn restaurant(id: &str, lat: f64, lon: f64) -> Restaurant {
        Restaurant {
            id: id.to_string(),
            name: format!("Restaurant {}", id),
            location: Some(GeoPoint::new(lat, lon)),
            rating: Some(4.2),
            price_tier: Some(2),
            dietary_options: vec!["vegetarian".to_string()],
            allergens: vec![],
            average_cost: None,
            is_open: true,
            dietary_verified: true,
            updated_at: chrono::Utc::now(),
        }
    }

    fn service(restaurants: Vec<Restaurant>) -> DiscoveryService<InMemoryRepository> {
        DiscoveryService::new(
            Arc::new(InMemoryRepository::new(restaurants)),
            RankingEngine::default(),
            Arc::new(ResultCache::new(100, Duration::from_secs(60))),
            DiscoveryOptions::default(),
        )
    }

    fn sf_query() -> DiscoveryQuery {
        DiscoveryQuery {
            query: "dinner".to_string(),
            origin: Some(GeoPoint::new(37.7749, -122.4194)),
            radius_km: Some(5.0),
            limit: Some(10),
            preferences: UserPreferences::default(),
        }
    }

    #[tokio::test]
    async fn test_second_call_is_cached() {
        let svc = service(vec![restaurant("a", 37.7749, -122.4194)]);

        let first = svc.discover(sf_query()).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.results.len(), 1);

        let second = svc.discover(sf_query()).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.results, first.results);
        assert_eq!(second.fingerprint, first.fingerprint);
    }

    #[tokio::test]
    async fn test_rejects_bad_parameters() {
        let svc = service(vec![]);

        let mut bad_radius = sf_query();
        bad_radius.radius_km = Some(0.0);
        assert!(matches!(
            svc.discover(bad_radius).await,
            Err(DiscoveryError::InvalidQueryParameter(_))
        ));

        let mut bad_origin = sf_query();
        bad_origin.origin = Some(GeoPoint::new(95.0, 0.0));
        assert!(svc.discover(bad_origin).await.is_err());

        let mut bad_limit = sf_query();
        bad_limit.limit = Some(-1);
        assert!(svc.discover(bad_limit).await.is_err());
    }

    #[tokio::test]
    async fn test_without_origin_skips_distance() {
        let svc = service(vec![
            restaurant("sf", 37.7749, -122.4194),
            restaurant("paris", 48.8566, 2.3522),
        ]);

        let mut query = sf_query();
        query.origin = None;
        query.radius_km = None;

        let outcome = svc.discover(query).await.unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|r| r.distance_km.is_none()));
    }

    #[tokio::test]
    async fn test_limit_is_capped() {
        let restaurants: Vec<Restaurant> = (0..150)
            .map(|i| restaurant(&format!("r{:03}", i), 37.7749, -122.4194))
            .collect();
        let svc = service(restaurants);

        let mut query = sf_query();
        query.limit = Some(1000);

        let outcome = svc.discover(query).await.unwrap();
        assert_eq!(outcome.results.len(), 100);
    }

    #[tokio::test]
    async fn test_travel_distance_caps_request_radius() {
        let svc = service(vec![
            restaurant("near", 37.7799, -122.4194),
            // ~5.5km north
            restaurant("far", 37.8249, -122.4194),
        ]);

        let mut wide = sf_query();
        wide.radius_km = Some(10.0);
        wide.preferences.max_distance_km = 1.0;

        let outcome = svc.discover(wide).await.unwrap();
        let ids: Vec<&str> = outcome.results.iter().map(|r| r.restaurant.id.as_str()).collect();
        assert_eq!(ids, vec!["near"]);
        assert!(outcome.results.iter().all(|r| r.distance_km.unwrap() <= 1.0));

        // Same effective radius, same cache bucket
        let mut narrow = sf_query();
        narrow.radius_km = Some(1.0);
        narrow.preferences.max_distance_km = 1.0;

        let again = svc.discover(narrow).await.unwrap();
        assert!(again.cached);
        assert_eq!(again.fingerprint, outcome.fingerprint);
    }

    #[tokio::test]
    async fn test_default_fetch_is_not_truncated_before_ranking() {
        let mut restaurants: Vec<Restaurant> = (0..5)
            .map(|i| {
                let mut r = restaurant(&format!("a{}", i), 37.7749, -122.4194);
                r.rating = Some(1.0);
                r
            })
            .collect();
        let mut best = restaurant("z_best", 37.7749, -122.4194);
        best.rating = Some(5.0);
        restaurants.push(best);

        let svc = service(restaurants);

        let mut query = sf_query();
        query.limit = Some(1);

        let outcome = svc.discover(query).await.unwrap();
        assert_eq!(outcome.total_candidates, 6);
        assert_eq!(outcome.results[0].restaurant.id, "z_best");
    }

    #[tokio::test]
    async fn test_fetch_cap_keeps_nearest_candidates() {
        let svc = DiscoveryService::new(
            Arc::new(InMemoryRepository::new(vec![
                restaurant("a_edge", 37.8100, -122.4194),
                restaurant("b_mid", 37.7900, -122.4194),
                restaurant("c_close", 37.7760, -122.4194),
            ])),
            RankingEngine::default(),
            Arc::new(ResultCache::new(100, Duration::from_secs(60))),
            DiscoveryOptions {
                candidate_fetch_limit: 2,
                ..DiscoveryOptions::default()
            },
        );

        let outcome = svc.discover(sf_query()).await.unwrap();
        let ids: Vec<&str> = outcome.results.iter().map(|r| r.restaurant.id.as_str()).collect();
        assert_eq!(outcome.total_candidates, 2);
        assert_eq!(ids, vec!["c_close", "b_mid"]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let svc = service(vec![restaurant("a", 37.7749, -122.4194)]);

        let first = svc.discover(sf_query()).await.unwrap();
        svc.invalidate(Some(&first.fingerprint)).await;

        let second = svc.discover(sf_query()).await.unwrap();
        assert!(!second.cached);
    }
}
