use crate::core::{
    compatibility,
    distance::haversine_distance,
    filters::{check_distance, check_preferences},
    scoring::calculate_score,
};
use crate::models::{GeoPoint, RankedRestaurant, Restaurant, ScoringWeights, UserPreferences};

/// Result of a ranking pass
#[derive(Debug)]
pub struct RankResult {
    pub results: Vec<RankedRestaurant>,
    pub total_candidates: usize,
}

/// Ranking orchestrator - screens, scores and orders restaurants
///
/// # Pipeline Stages
/// 1. Distance bound (only when an origin is known)
/// 2. Compatibility scoring and safety screening
/// 3. Preference filtering (rating, price, budget, diet)
/// 4. Weighted scoring and deterministic ordering
#[derive(Debug, Clone)]
pub struct RankingEngine {
    weights: ScoringWeights,
}

impl RankingEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Rank restaurants for a user
    ///
    /// Without an origin all distance checks are skipped and the distance
    /// term of the score is neutral. Ordering is score descending, then id
    /// ascending, so identical inputs always produce identical output.
    pub fn rank(
        &self,
        candidates: Vec<Restaurant>,
        preferences: &UserPreferences,
        origin: Option<GeoPoint>,
        limit: usize,
    ) -> RankResult {
        let distances = candidates
            .into_iter()
            .map(|restaurant| {
                let distance_km = origin.and_then(|o| {
                    restaurant
                        .coordinates()
                        .map(|p| haversine_distance(o.latitude, o.longitude, p.latitude, p.longitude))
                });
                (restaurant, distance_km)
            })
            .collect();

        self.rank_with_distances(distances, preferences, origin.is_some(), limit)
    }

    /// Rank restaurants whose distance from the origin is already known
    ///
    /// Used after the geo filter, which computes distances on its way.
    pub fn rank_with_distances(
        &self,
        candidates: Vec<(Restaurant, Option<f64>)>,
        preferences: &UserPreferences,
        location_bound: bool,
        limit: usize,
    ) -> RankResult {
        let total_candidates = candidates.len();

        let mut results: Vec<RankedRestaurant> = candidates
            .into_iter()
            // Stage 1: Distance bound
            .filter(|(_, distance_km)| {
                !location_bound || check_distance(*distance_km, preferences.max_distance_km).is_ok()
            })
            // Stages 2-4: Screen and score
            .filter_map(|(restaurant, distance_km)| {
                let compat = compatibility::score(
                    &restaurant,
                    &preferences.dietary_restrictions,
                    &preferences.allergens,
                );

                if let Err(reason) = check_preferences(&restaurant, preferences, &compat) {
                    tracing::trace!("Rejected {}: {:?}", restaurant.id, reason);
                    return None;
                }

                let score = calculate_score(
                    &restaurant,
                    preferences,
                    distance_km,
                    compat.compatibility,
                    &self.weights,
                );

                Some(RankedRestaurant {
                    restaurant,
                    distance_km,
                    compatibility: compat.compatibility,
                    safety: compat.safety,
                    score,
                })
            })
            .collect();

        // Sort by score (descending) and then by id (ascending)
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.restaurant.id.cmp(&b.restaurant.id))
        });

        results.truncate(limit);

        tracing::debug!(
            "Ranked {} of {} candidates",
            results.len(),
            total_candidates
        );

        RankResult {
            results,
            total_candidates,
        }
    }
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
