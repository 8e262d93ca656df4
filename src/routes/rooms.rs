//! routes/rooms.rs: registry CRUD over JSON.
use axum::{
    extract::{Extension, Json, Path},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{bad, AppErr, AppResult},
    hub::Hub,
    registry::{RoomPatch, RoomRecord, RoomRegistry},
};

const DEFAULT_ROOM_NAME: &str = "Untitled room";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoom {
    #[serde(default)]
    name: String,
    #[serde(default)]
    host_id: String,
    video_url: Option<String>,
}

#[derive(Deserialize)]
struct UpdateRoom {
    video_url: Option<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/:id", get(get_room).put(update_room).delete(delete_room))
        .route("/rooms/invite/:code", get(get_room_by_invite))
}

/* ---------------- Create ---------------- */
async fn create_room(
    Extension(registry): Extension<RoomRegistry>,
    Json(p): Json<CreateRoom>,
) -> AppResult<Json<RoomRecord>> {
    if p.host_id.trim().is_empty() {
        return Err(bad("hostId is required"));
    }
    let name = match p.name.trim() {
        "" => DEFAULT_ROOM_NAME,
        name => name,
    };
    let room = registry.create_room(name, &p.host_id, p.video_url.as_deref()).await?;
    tracing::info!(room_id = %room.id, invite_code = %room.invite_code, "room registered");
    Ok(Json(room))
}

/* ---------------- Read ---------------- */
async fn get_room(
    Extension(registry): Extension<RoomRegistry>,
    Path(id): Path<String>,
) -> AppResult<Json<RoomRecord>> {
    registry.get_room(&id).await?.map(Json).ok_or(AppErr::NotFound("Room"))
}

async fn get_room_by_invite(
    Extension(registry): Extension<RoomRegistry>,
    Path(code): Path<String>,
) -> AppResult<Json<RoomRecord>> {
    registry.get_room_by_invite_code(&code).await?.map(Json).ok_or(AppErr::NotFound("Room"))
}

/* ---------------- Update ---------------- */
async fn update_room(
    Extension(registry): Extension<RoomRegistry>,
    Path(id): Path<String>,
    Json(p): Json<UpdateRoom>,
) -> AppResult<Json<RoomRecord>> {
    let patch = RoomPatch { video_url: p.video_url, ..Default::default() };
    registry.update_room(&id, &patch).await?.map(Json).ok_or(AppErr::NotFound("Room"))
}

/* ---------------- Delete ---------------- */
async fn delete_room(
    Extension(registry): Extension<RoomRegistry>,
    Extension(hub): Extension<Hub>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    registry.delete_room(&id).await?;
    // Anyone still watching gets `room_ended`.
    hub.end_room_by_id(&id).await;
    Ok(Json(json!({ "ok": true })))
}
