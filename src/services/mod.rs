// Service exports
pub mod cache;
pub mod discovery;
pub mod postgres;
pub mod repository;

pub use cache::{CacheEntry, CacheError, CacheKey, CacheStats, ResultCache};
pub use discovery::{DiscoveryOptions, DiscoveryOutcome, DiscoveryService};
pub use postgres::PostgresRepository;
pub use repository::{InMemoryRepository, RepositoryError, RestaurantRepository};
