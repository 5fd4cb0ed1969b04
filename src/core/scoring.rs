use crate::models::{Restaurant, ScoringWeights, UserPreferences};

/// Value used for a signal that cannot be computed (no origin, no rating, ...)
pub const NEUTRAL_SIGNAL: f64 = 0.5;

/// Calculate a ranking score (0-1) for a restaurant
///
/// Scoring formula:
/// score = (
///     distance_score * w_distance +           # Closer = higher score
///     rating / 5 * w_rating +                 # Better rated = higher
///     compatibility * w_compatibility +       # Dietary fit
///     price_fit * w_price                     # Within budget = higher
/// ) / sum(weights)
///
/// Missing signals contribute `NEUTRAL_SIGNAL`.
pub fn calculate_score(
    restaurant: &Restaurant,
    preferences: &UserPreferences,
    distance_km: Option<f64>,
    compatibility: f64,
    weights: &ScoringWeights,
) -> f64 {
    let distance_score = distance_km
        .map(|d| calculate_distance_score(d, preferences.max_distance_km))
        .unwrap_or(NEUTRAL_SIGNAL);

    let rating_score = restaurant
        .normalized_rating()
        .map(|r| r / 5.0)
        .unwrap_or(NEUTRAL_SIGNAL);

    let price_score = calculate_price_fit(restaurant, preferences);

    let total_weight = weights.total();
    if total_weight <= 0.0 {
        return 0.0;
    }

    let total = distance_score * weights.distance
        + rating_score * weights.rating
        + compatibility.clamp(0.0, 1.0) * weights.compatibility
        + price_score * weights.price;

    (total / total_weight).clamp(0.0, 1.0)
}

/// Calculate distance score (0-1)
/// Linear in the normalised distance: 1 at the origin, 0 at `max_distance_km`
#[inline]
pub fn calculate_distance_score(distance_km: f64, max_distance_km: f64) -> f64 {
    if max_distance_km <= 0.0 {
        return NEUTRAL_SIGNAL;
    }
    1.0 - (distance_km / max_distance_km).clamp(0.0, 1.0)
}

/// Calculate how well a restaurant fits the user's budget (0-1)
///
/// Prefers the average cost against the preferred budget when both are
/// known, then the price tier against the budget level.
pub fn calculate_price_fit(restaurant: &Restaurant, preferences: &UserPreferences) -> f64 {
    let budget = &preferences.budget;

    if let Some(cost) = restaurant.average_cost.filter(|c| c.is_finite() && *c >= 0.0) {
        if budget.preferred > 0.0 {
            return cost_fit(cost, budget.min, budget.preferred, budget.max);
        }
    }

    match restaurant.price_tier {
        Some(tier) if preferences.budget_level > 0 => {
            tier_fit(tier, preferences.budget_level)
        }
        _ => NEUTRAL_SIGNAL,
    }
}

/// 1 at the preferred cost, decaying linearly to 0 at the range edge
#[inline]
fn cost_fit(cost: f64, min: f64, preferred: f64, max: f64) -> f64 {
    if cost <= preferred {
        let span = preferred - min.clamp(0.0, preferred);
        if span <= 0.0 {
            return if cost == preferred { 1.0 } else { 0.0 };
        }
        1.0 - ((preferred - cost) / span).min(1.0)
    } else {
        let upper = if max > preferred { max } else { preferred * 2.0 };
        1.0 - ((cost - preferred) / (upper - preferred)).min(1.0)
    }
}

/// Cheaper than the ceiling is fine; the ceiling itself scores lowest
#[inline]
fn tier_fit(tier: u8, budget_level: u8) -> f64 {
    if tier > budget_level {
        return 0.0;
    }
    let steps = budget_level as f64;
    1.0 - (tier.saturating_sub(1) as f64 / steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BudgetRange;

    fn create_test_restaurant(rating: Option<f64>, tier: Option<u8>, cost: Option<f64>) -> Restaurant {
        Restaurant {
            id: "r1".to_string(),
            name: "Test".to_string(),
            location: None,
            rating,
            price_tier: tier,
            dietary_options: vec![],
            allergens: vec![],
            average_cost: cost,
            is_open: true,
            dietary_verified: true,
            updated_at: chrono::Utc::now(),
        }
    }

    fn create_test_preferences() -> UserPreferences {
        UserPreferences {
            max_distance_km: 10.0,
            budget_level: 3,
            budget: BudgetRange { min: 10.0, preferred: 20.0, max: 40.0 },
            ..Default::default()
        }
    }

    #[test]
    fn test_score_within_range() {
        let restaurant = create_test_restaurant(Some(4.5), Some(2), Some(22.0));
        let score = calculate_score(
            &restaurant,
            &create_test_preferences(),
            Some(2.0),
            1.0,
            &ScoringWeights::default(),
        );
        assert!(score > 0.0 && score <= 1.0);
    }

    #[test]
    fn test_distance_score() {
        assert_eq!(calculate_distance_score(0.0, 10.0), 1.0);
        assert_eq!(calculate_distance_score(10.0, 10.0), 0.0);
        assert!((calculate_distance_score(5.0, 10.0) - 0.5).abs() < 1e-9);
        assert_eq!(calculate_distance_score(3.0, 0.0), NEUTRAL_SIGNAL);
    }

    #[test]
    fn test_higher_rating_scores_higher() {
        let preferences = create_test_preferences();
        let weights = ScoringWeights::default();
        let good = create_test_restaurant(Some(4.8), Some(2), None);
        let poor = create_test_restaurant(Some(2.1), Some(2), None);

        let good_score = calculate_score(&good, &preferences, Some(1.0), 1.0, &weights);
        let poor_score = calculate_score(&poor, &preferences, Some(1.0), 1.0, &weights);

        assert!(good_score > poor_score);
    }

    #[test]
    fn test_closer_scores_higher() {
        let preferences = create_test_preferences();
        let weights = ScoringWeights::default();
        let restaurant = create_test_restaurant(Some(4.0), Some(2), None);

        let near = calculate_score(&restaurant, &preferences, Some(0.5), 1.0, &weights);
        let far = calculate_score(&restaurant, &preferences, Some(9.5), 1.0, &weights);

        assert!(near > far);
    }

    #[test]
    fn test_missing_origin_is_neutral() {
        let preferences = create_test_preferences();
        let weights = ScoringWeights {
            distance: 1.0,
            rating: 0.0,
            compatibility: 0.0,
            price: 0.0,
        };
        let restaurant = create_test_restaurant(Some(4.0), Some(2), None);

        let score = calculate_score(&restaurant, &preferences, None, 1.0, &weights);
        assert!((score - NEUTRAL_SIGNAL).abs() < 1e-9);
    }

    #[test]
    fn test_cost_fit_peaks_at_preferred() {
        let preferences = create_test_preferences();
        let at_preferred = create_test_restaurant(None, None, Some(20.0));
        let at_min = create_test_restaurant(None, None, Some(10.0));
        let at_max = create_test_restaurant(None, None, Some(40.0));

        assert_eq!(calculate_price_fit(&at_preferred, &preferences), 1.0);
        assert_eq!(calculate_price_fit(&at_min, &preferences), 0.0);
        assert_eq!(calculate_price_fit(&at_max, &preferences), 0.0);

        let between = create_test_restaurant(None, None, Some(30.0));
        assert!((calculate_price_fit(&between, &preferences) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_tier_fit_without_cost() {
        let preferences = UserPreferences {
            budget_level: 4,
            ..Default::default()
        };
        let cheap = create_test_restaurant(None, Some(1), None);
        let pricey = create_test_restaurant(None, Some(4), None);

        assert_eq!(calculate_price_fit(&cheap, &preferences), 1.0);
        assert!(calculate_price_fit(&pricey, &preferences) < calculate_price_fit(&cheap, &preferences));
    }

    #[test]
    fn test_price_fit_neutral_without_budget() {
        let restaurant = create_test_restaurant(None, Some(3), Some(50.0));
        assert_eq!(calculate_price_fit(&restaurant, &UserPreferences::default()), NEUTRAL_SIGNAL);
    }

    #[test]
    fn test_zero_weights_score_zero() {
        let weights = ScoringWeights {
            distance: 0.0,
            rating: 0.0,
            compatibility: 0.0,
            price: 0.0,
        };
        let restaurant = create_test_restaurant(Some(5.0), Some(1), None);
        let score = calculate_score(&restaurant, &create_test_preferences(), Some(0.0), 1.0, &weights);
        assert_eq!(score, 0.0);
    }
}
