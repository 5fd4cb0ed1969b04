use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::error::DiscoveryError;
use crate::models::{
    DiscoverRequest, DiscoverResponse, ErrorResponse, HealthResponse, InvalidateCacheRequest,
    InvalidateCacheResponse,
};
use crate::services::{DiscoveryService, PostgresRepository, RestaurantRepository};
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState<R = PostgresRepository> {
    pub discovery: Arc<DiscoveryService<R>>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            discovery: Arc::clone(&self.discovery),
        }
    }
}

/// Configure all discovery routes
pub fn configure<R: RestaurantRepository + 'static>(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check::<R>))
        .route("/restaurants/discover", web::post().to(discover::<R>))
        .route("/cache/invalidate", web::post().to(invalidate_cache::<R>))
        .route("/cache/stats", web::get().to(cache_stats::<R>));
}

/// Health check endpoint
async fn health_check<R: RestaurantRepository + 'static>(
    state: web::Data<AppState<R>>,
) -> impl Responder {
    let healthy = state
        .discovery
        .repository()
        .health_check()
        .await
        .unwrap_or(false);

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

fn error_response(error: &DiscoveryError) -> HttpResponse {
    if error.is_client_error() {
        HttpResponse::BadRequest().json(ErrorResponse {
            error: "Invalid query parameter".to_string(),
            message: error.to_string(),
            status_code: 400,
        })
    } else {
        HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Discovery failed".to_string(),
            message: error.to_string(),
            status_code: 500,
        })
    }
}

/// Discover restaurants endpoint
///
/// POST /api/v1/restaurants/discover
///
/// Request body:
/// ```json
/// {
///   "query": "string",
///   "latitude": 37.7749,
///   "longitude": -122.4194,
///   "radiusKm": 5.0,
///   "limit": 20,
///   "preferences": {
///     "dietaryRestrictions": ["vegetarian"],
///     "allergens": ["peanuts"],
///     "minimumRating": 4.0,
///     "budgetLevel": 2,
///     "maxDistanceKm": 5.0,
///     "budget": { "min": 10, "preferred": 20, "max": 40 },
///     "openNow": true
///   }
/// }
/// ```
async fn discover<R: RestaurantRepository + 'static>(
    state: web::Data<AppState<R>>,
    req: web::Json<DiscoverRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for discover request: {}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let query = match req.into_inner().into_query() {
        Ok(query) => query,
        Err(e) => return error_response(&e),
    };

    let request_id = uuid::Uuid::new_v4().to_string();

    tracing::info!(
        "Discover request {}: query={:?}, origin={:?}, limit={:?}",
        request_id,
        query.query,
        query.origin,
        query.limit
    );

    match state.discovery.discover(query).await {
        Ok(outcome) => {
            tracing::info!(
                "Returning {} restaurants for request {} (cached: {})",
                outcome.results.len(),
                request_id,
                outcome.cached
            );

            HttpResponse::Ok().json(DiscoverResponse {
                results: outcome.results,
                total_candidates: outcome.total_candidates,
                cached: outcome.cached,
                fingerprint: outcome.fingerprint,
                request_id,
            })
        }
        Err(e) => {
            if e.is_client_error() {
                tracing::info!("Rejected discover request {}: {}", request_id, e);
            } else {
                tracing::error!("Discover request {} failed: {}", request_id, e);
            }
            error_response(&e)
        }
    }
}

/// Invalidate cached results
///
/// POST /api/v1/cache/invalidate
///
/// Request body:
/// ```json
/// { "fingerprint": "string" }
/// ```
/// Without a fingerprint every cached result set is dropped.
async fn invalidate_cache<R: RestaurantRepository + 'static>(
    state: web::Data<AppState<R>>,
    req: web::Json<InvalidateCacheRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let fingerprint = req.into_inner().fingerprint;
    state.discovery.invalidate(fingerprint.as_deref()).await;

    HttpResponse::Ok().json(InvalidateCacheResponse {
        success: true,
        fingerprint,
    })
}

/// Cache statistics endpoint
///
/// GET /api/v1/cache/stats
async fn cache_stats<R: RestaurantRepository + 'static>(
    state: web::Data<AppState<R>>,
) -> impl Responder {
    HttpResponse::Ok().json(state.discovery.cache().stats())
}
