use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::models::{CandidateFilter, GeoPoint, Restaurant};
use crate::services::repository::{RepositoryError, RestaurantRepository};

const SELECT_COLUMNS: &str = r#"
    id, name, latitude, longitude, rating, price_tier, dietary_options,
    allergens, average_cost, is_open, dietary_verified, updated_at
"#;

/// PostgreSQL-backed restaurant repository
///
/// The bounding box and the open-only flag are pushed down into the query
/// so the exact radius check only sees nearby rows. With an origin, rows
/// come back nearest first so the fetch limit drops the farthest ones.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Create a new repository from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new repository from settings
    pub async fn from_settings(
        settings: &crate::config::DatabaseSettings,
    ) -> Result<Self, RepositoryError> {
        tracing::info!("Connecting to PostgreSQL (max {} connections)", settings.max_connections);

        Self::new(
            &settings.url,
            settings.max_connections,
            settings.min_connections,
            Duration::from_secs(settings.acquire_timeout_secs),
            Duration::from_secs(settings.idle_timeout_secs),
        )
        .await
    }

    /// Insert or update a restaurant
    pub async fn upsert_restaurant(&self, restaurant: &Restaurant) -> Result<(), RepositoryError> {
        let query = r#"
            INSERT INTO restaurants (
                id, name, latitude, longitude, rating, price_tier, dietary_options,
                allergens, average_cost, is_open, dietary_verified, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                rating = EXCLUDED.rating,
                price_tier = EXCLUDED.price_tier,
                dietary_options = EXCLUDED.dietary_options,
                allergens = EXCLUDED.allergens,
                average_cost = EXCLUDED.average_cost,
                is_open = EXCLUDED.is_open,
                dietary_verified = EXCLUDED.dietary_verified,
                updated_at = EXCLUDED.updated_at
        "#;

        if restaurant.id.trim().is_empty() {
            return Err(RepositoryError::InvalidInput("restaurant id is empty".to_string()));
        }

        sqlx::query(query)
            .bind(&restaurant.id)
            .bind(&restaurant.name)
            .bind(restaurant.location.map(|p| p.latitude))
            .bind(restaurant.location.map(|p| p.longitude))
            .bind(restaurant.rating)
            .bind(restaurant.price_tier.map(i16::from))
            .bind(restaurant.dietary_options.as_slice())
            .bind(restaurant.allergens.as_slice())
            .bind(restaurant.average_cost)
            .bind(restaurant.is_open)
            .bind(restaurant.dietary_verified)
            .bind(restaurant.updated_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Upserted restaurant {}", restaurant.id);

        Ok(())
    }

    /// Delete a restaurant by id
    pub async fn delete_restaurant(&self, id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM restaurants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Map a row to a restaurant
///
/// Half-present coordinates and out-of-range price tiers are treated as
/// missing rather than failing the whole batch.
fn restaurant_from_row(row: &PgRow) -> Result<Restaurant, sqlx::Error> {
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    let price_tier: Option<i16> = row.try_get("price_tier")?;

    Ok(Restaurant {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        location: latitude.zip(longitude).map(|(lat, lon)| GeoPoint::new(lat, lon)),
        rating: row.try_get("rating")?,
        price_tier: price_tier.and_then(|t| u8::try_from(t).ok()),
        dietary_options: row.try_get("dietary_options")?,
        allergens: row.try_get("allergens")?,
        average_cost: row.try_get("average_cost")?,
        is_open: row.try_get("is_open")?,
        dietary_verified: row.try_get("dietary_verified")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl RestaurantRepository for PostgresRepository {
    async fn fetch_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<Restaurant>, RepositoryError> {
        let (min_lat, max_lat) = filter
            .bounding_box
            .map(|b| (Some(b.min_lat), Some(b.max_lat)))
            .unwrap_or((None, None));

        // Longitude is only pushed down when the box does not wrap the antimeridian
        let (min_lon, max_lon) = match filter.bounding_box.and_then(|b| b.min_lon.zip(b.max_lon)) {
            Some((min, max)) if min >= -180.0 && max <= 180.0 => (Some(min), Some(max)),
            _ => (None, None),
        };

        let limit = (filter.limit > 0).then_some(filter.limit as i64);

        let query = format!(
            r#"
            SELECT {}
            FROM restaurants
            WHERE ($1 = FALSE OR is_open)
              AND ($2::DOUBLE PRECISION IS NULL OR latitude BETWEEN $2 AND $3)
              AND ($4::DOUBLE PRECISION IS NULL OR longitude BETWEEN $4 AND $5)
            ORDER BY
              ASIN(LEAST(1.0, SQRT(
                POWER(SIN(RADIANS(latitude - $7::DOUBLE PRECISION) / 2), 2)
                + COS(RADIANS($7)) * COS(RADIANS(latitude))
                  * POWER(SIN(RADIANS(longitude - $8::DOUBLE PRECISION) / 2), 2)
              ))) ASC NULLS LAST,
              id
            LIMIT $6
            "#,
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(filter.open_only)
            .bind(min_lat)
            .bind(max_lat)
            .bind(min_lon)
            .bind(max_lon)
            .bind(limit)
            .bind(filter.origin.map(|o| o.latitude))
            .bind(filter.origin.map(|o| o.longitude))
            .fetch_all(&self.pool)
            .await?;

        let candidates: Vec<Restaurant> = rows
            .iter()
            .filter_map(|row| match restaurant_from_row(row) {
                Ok(restaurant) => Some(restaurant),
                Err(e) => {
                    tracing::warn!("Skipping malformed restaurant row: {}", e);
                    None
                }
            })
            .collect();

        tracing::debug!("Loaded {} candidates from PostgreSQL", candidates.len());

        Ok(candidates)
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, RepositoryError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
