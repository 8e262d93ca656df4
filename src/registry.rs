//! Durable room records (id, invite code, last known video + playhead).
//!
//! The live session never reads these back; they exist so a client can find a
//! room by invite code and pick a resume point over REST.

use serde::Serialize;
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions},
    FromRow,
};

const INVITE_CODE_LEN: usize = 8;
const INVITE_ALPHABET: [char; 32] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T',
    'U', 'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];
const INVITE_ATTEMPTS: usize = 3;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS rooms (
        id              TEXT PRIMARY KEY,
        name            TEXT NOT NULL,
        host_id         TEXT NOT NULL,
        invite_code     TEXT NOT NULL UNIQUE,
        video_url       TEXT,
        video_timestamp REAL NOT NULL DEFAULT 0,
        is_playing      INTEGER NOT NULL DEFAULT 0,
        created_at      TEXT NOT NULL
    )
"#;

const COLUMNS: &str =
    "id, name, host_id, invite_code, video_url, video_timestamp, is_playing, created_at";

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct RoomRecord {
    pub id: String,
    pub name: String,
    pub host_id: String,
    pub invite_code: String,
    pub video_url: Option<String>,
    pub video_timestamp: f64,
    pub is_playing: bool,
    pub created_at: String,
}

/// Fields left `None` are kept as stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomPatch {
    pub video_url: Option<String>,
    pub video_timestamp: Option<f64>,
    pub is_playing: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct RoomRegistry {
    pool: SqlitePool,
}

impl RoomRegistry {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = if database_url.contains(":memory:") {
            // Every connection to `:memory:` is a separate database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// In-memory registry with the schema applied.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let registry = Self::connect("sqlite::memory:").await?;
        registry.migrate().await?;
        Ok(registry)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn create_room(
        &self,
        name: &str,
        host_id: &str,
        video_url: Option<&str>,
    ) -> Result<RoomRecord, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let invite_code = nanoid::nanoid!(INVITE_CODE_LEN, &INVITE_ALPHABET);
            let inserted = sqlx::query(
                "INSERT INTO rooms (id, name, host_id, invite_code, video_url, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(name)
            .bind(host_id)
            .bind(&invite_code)
            .bind(video_url)
            .bind(&created_at)
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(_) => break,
                Err(sqlx::Error::Database(e))
                    if e.is_unique_violation() && attempt < INVITE_ATTEMPTS =>
                {
                    tracing::debug!(invite_code = %invite_code, "invite code collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        self.get_room(&id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_room(&self, id: &str) -> Result<Option<RoomRecord>, sqlx::Error> {
        sqlx::query_as::<_, RoomRecord>(&format!("SELECT {COLUMNS} FROM rooms WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_room_by_invite_code(
        &self,
        code: &str,
    ) -> Result<Option<RoomRecord>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM rooms WHERE invite_code = ?");
        sqlx::query_as::<_, RoomRecord>(&sql)
            .bind(code.trim().to_ascii_uppercase())
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn update_room(
        &self,
        id: &str,
        patch: &RoomPatch,
    ) -> Result<Option<RoomRecord>, sqlx::Error> {
        let updated = sqlx::query(
            "UPDATE rooms SET
                 video_url       = COALESCE(?, video_url),
                 video_timestamp = COALESCE(?, video_timestamp),
                 is_playing      = COALESCE(?, is_playing)
             WHERE id = ?",
        )
        .bind(patch.video_url.as_deref())
        .bind(patch.video_timestamp)
        .bind(patch.is_playing)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_room(id).await
    }

    /// Returns whether a record was deleted.
    pub async fn delete_room(&self, id: &str) -> Result<bool, sqlx::Error> {
        let deleted = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }
}
