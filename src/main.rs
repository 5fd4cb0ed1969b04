use actix_cors::Cors;
use actix_web::{web, App, HttpServer, HttpResponse, middleware, error, http::StatusCode};
use dine_algo::config::Settings;
use dine_algo::core::RankingEngine;
use dine_algo::models::ScoringWeights;
use dine_algo::routes::{self, discover::AppState};
use dine_algo::services::{DiscoveryService, PostgresRepository, ResultCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, error, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match format {
        "pretty" => subscriber.pretty().init(),
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    // LOG_LEVEL / LOG_FORMAT override the configured logging section
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());
    init_tracing(&log_level, &log_format);

    info!("Starting Dine Algo discovery service...");

    // Initialize result cache (Redis mirror is optional)
    let cache_ttl = Duration::from_secs(settings.cache.ttl_secs);
    let max_entries = settings.cache.max_entries;

    let cache = match &settings.cache.redis_url {
        Some(redis_url) => match ResultCache::with_redis(redis_url, max_entries, cache_ttl).await {
            Ok(c) => {
                info!("Result cache initialized with Redis mirror (L1: {} entries, TTL: {}s)", max_entries, cache_ttl.as_secs());
                c
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), running with in-memory cache only", e);
                ResultCache::new(max_entries, cache_ttl)
            }
        },
        None => {
            info!("Result cache initialized (L1: {} entries, TTL: {}s)", max_entries, cache_ttl.as_secs());
            ResultCache::new(max_entries, cache_ttl)
        }
    };
    let cache = Arc::new(cache);

    // Periodic sweep to reclaim expired entries
    let purge_interval = Duration::from_secs(settings.cache.purge_interval_secs.max(1));
    let purge_cache = Arc::clone(&cache);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_interval);
        loop {
            interval.tick().await;
            purge_cache.purge_expired().await;
        }
    });

    // Initialize PostgreSQL repository
    let repository = match PostgresRepository::from_settings(&settings.database).await {
        Ok(repo) => Arc::new(repo),
        Err(e) => {
            error!("Failed to connect to PostgreSQL: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    info!("PostgreSQL repository initialized (max: {} connections)", settings.database.max_connections);

    // Initialize ranking engine with configured weights
    let weights = ScoringWeights::from(&settings.scoring.weights);
    let engine = RankingEngine::new(weights);

    info!("Ranking engine initialized with weights: {:?}", weights);

    let discovery = Arc::new(DiscoveryService::new(
        repository,
        engine,
        cache,
        settings.discovery_options(),
    ));

    let app_state = AppState { discovery };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes::<PostgresRepository>)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
