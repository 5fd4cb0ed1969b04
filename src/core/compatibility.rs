use std::collections::HashSet;

use crate::models::{CompatibilityResult, Restaurant, SafetyLevel};

/// Compatibility assigned to restaurants that declare neither dietary
/// options nor allergens, so unverified listings are not scored as 0.
pub const UNKNOWN_COMPATIBILITY: f64 = 0.5;

/// Normalise a dietary or allergen tag for comparison
#[inline]
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

fn tag_set(tags: &[String]) -> HashSet<String> {
    tags.iter()
        .map(|t| normalize_tag(t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Score a restaurant against a user's required restrictions and avoided allergens
///
/// Compatibility:
/// - no required restrictions => 1.0
/// - restaurant declares no dietary options and no allergens => 0.5 (unknown)
/// - otherwise the fraction of required restrictions the restaurant supports
///
/// Safety:
/// - `Warning` when any avoided allergen is present
/// - `Caution` when the dietary data is unverified and restrictions are required
/// - `Ok` otherwise
pub fn score(
    restaurant: &Restaurant,
    required_restrictions: &[String],
    avoid_allergens: &[String],
) -> CompatibilityResult {
    let supported = tag_set(&restaurant.dietary_options);
    let present_allergens = tag_set(&restaurant.allergens);

    // Deduplicate while keeping the caller's order for reporting
    let mut seen = HashSet::new();
    let required: Vec<String> = required_restrictions
        .iter()
        .map(|t| normalize_tag(t))
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect();

    let (matched, missing): (Vec<String>, Vec<String>) =
        required.iter().cloned().partition(|t| supported.contains(t));

    let compatibility = if required.is_empty() {
        1.0
    } else if supported.is_empty() && present_allergens.is_empty() {
        UNKNOWN_COMPATIBILITY
    } else {
        matched.len() as f64 / required.len() as f64
    };

    let mut conflicting: Vec<String> = tag_set(avoid_allergens)
        .into_iter()
        .filter(|a| present_allergens.contains(a))
        .collect();
    conflicting.sort();

    let safety = if !conflicting.is_empty() {
        SafetyLevel::Warning
    } else if !restaurant.dietary_verified && !required.is_empty() {
        SafetyLevel::Caution
    } else {
        SafetyLevel::Ok
    };

    CompatibilityResult {
        compatibility,
        safety,
        matched_restrictions: matched,
        missing_restrictions: missing,
        conflicting_allergens: conflicting,
    }
}
