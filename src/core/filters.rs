use crate::models::{CompatibilityResult, Restaurant, SafetyLevel, UserPreferences};

/// Minimum compatibility a restaurant needs when the user has dietary restrictions
pub const MIN_COMPATIBILITY: f64 = 0.5;

/// Why a candidate was dropped from the ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AllergenWarning,
    BelowMinimumRating,
    AbovePriceTier,
    AboveBudget,
    IncompatibleDiet,
    Closed,
    TooFar,
    MissingLocation,
}

/// Check a restaurant against the user's hard preferences
///
/// Distance is checked separately by the ranker since it depends on the origin.
pub fn check_preferences(
    restaurant: &Restaurant,
    preferences: &UserPreferences,
    compatibility: &CompatibilityResult,
) -> Result<(), Rejection> {
    // Allergens first: a warning is never shown regardless of score
    if compatibility.safety == SafetyLevel::Warning {
        return Err(Rejection::AllergenWarning);
    }

    if preferences.open_now && !restaurant.is_open {
        return Err(Rejection::Closed);
    }

    if let Some(rating) = restaurant.normalized_rating() {
        if rating < preferences.minimum_rating {
            return Err(Rejection::BelowMinimumRating);
        }
    }

    // Budget level 0 means "no preference"
    if preferences.budget_level > 0 {
        if let Some(tier) = restaurant.price_tier {
            if tier > preferences.budget_level {
                return Err(Rejection::AbovePriceTier);
            }
        }
    }

    if preferences.budget.max > 0.0 {
        if let Some(cost) = restaurant.average_cost {
            if cost > preferences.budget.max {
                return Err(Rejection::AboveBudget);
            }
        }
    }

    if !preferences.dietary_restrictions.is_empty()
        && compatibility.compatibility < MIN_COMPATIBILITY
    {
        return Err(Rejection::IncompatibleDiet);
    }

    Ok(())
}

/// Check a restaurant's distance against the user's travel limit
///
/// `None` means the restaurant has no usable location while the query is
/// location-bound. A `max_distance_km` of 0 disables the bound.
#[inline]
pub fn check_distance(distance_km: Option<f64>, max_distance_km: f64) -> Result<(), Rejection> {
    match distance_km {
        None => Err(Rejection::MissingLocation),
        Some(d) if max_distance_km > 0.0 && d > max_distance_km => Err(Rejection::TooFar),
        Some(_) => Ok(()),
    }
}
