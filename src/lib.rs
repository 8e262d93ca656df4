pub mod config;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod routes;
pub mod session;
pub mod utils {
    pub mod mirror;
}

use axum::{Extension, Router};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

use crate::{hub::Hub, registry::RoomRegistry};

const BODY_LIMIT: usize = 64 * 1024;

pub fn app(registry: RoomRegistry, hub: Hub) -> Router {
    Router::new()
        .merge(routes::router())
        .layer(Extension(registry))
        .layer(Extension(hub))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(CorsLayer::permissive())
}
