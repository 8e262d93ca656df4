use axum::{routing::get, Extension, Json, Router};
use serde_json::{json, Value};

use crate::hub::Hub;

pub mod rooms;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", rooms::router())
        .merge(ws::router())
}

async fn health(Extension(hub): Extension<Hub>) -> Json<Value> {
    Json(json!({ "status": "ok", "rooms": hub.rooms().len().await }))
}
