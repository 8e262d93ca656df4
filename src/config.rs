//! Server configuration, read from the environment (after `.env` is loaded).

use std::net::SocketAddr;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DATABASE_URL: &str = "sqlite://watch_server.db?mode=rwc";
const DEFAULT_ROOM_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// SQLite connection string for the room registry.
    pub database_url: String,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `watch_server=debug`.
    pub log_filter: String,
    /// Per-room broadcast buffer; a session lagging further than this loses events.
    pub room_channel_capacity: usize,
}

impl Config {
    /// | Variable | Default |
    /// |---|---|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `8000` |
    /// | `DATABASE_URL` | `sqlite://watch_server.db?mode=rwc` |
    /// | `LOG_FILTER` | `info` |
    /// | `ROOM_CHANNEL_CAPACITY` | `100` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let database_url = env("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
        let log_filter = env("LOG_FILTER").unwrap_or_else(|_| "info".into());
        let room_channel_capacity = env("ROOM_CHANNEL_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_ROOM_CHANNEL_CAPACITY);

        Self { listen_addr, database_url, log_filter, room_channel_capacity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from_map(
        map: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Result<String, std::env::VarError> {
        move |key: &str| {
            map.get(key)
                .map(|v| v.to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let cfg = Config::from_env_fn(env_from_map(HashMap::new()));
        assert_eq!(cfg.listen_addr.port(), 8000);
        assert_eq!(cfg.listen_addr.ip().to_string(), "0.0.0.0");
        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.room_channel_capacity, 100);
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_env_fn(env_from_map(HashMap::from([
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("LOG_FILTER", "watch_server=debug"),
            ("ROOM_CHANNEL_CAPACITY", "16"),
        ])));
        assert_eq!(cfg.listen_addr, "127.0.0.1:9100".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.log_filter, "watch_server=debug");
        assert_eq!(cfg.room_channel_capacity, 16);
    }

    #[test]
    fn garbage_values_fall_back() {
        let cfg = Config::from_env_fn(env_from_map(HashMap::from([
            ("PORT", "not-a-port"),
            ("ROOM_CHANNEL_CAPACITY", "0"),
        ])));
        assert_eq!(cfg.listen_addr.port(), 8000);
        assert_eq!(cfg.room_channel_capacity, 100);
    }
}
