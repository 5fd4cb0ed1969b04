// Route exports
pub mod discover;

use actix_web::web;

use crate::services::RestaurantRepository;

pub fn configure_routes<R: RestaurantRepository + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(discover::configure::<R>),
    );
}
