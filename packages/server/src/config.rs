//! Server configuration read from the environment at startup.

/// Which [`IncidentStore`](road_watch_database::store::IncidentStore)
/// backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// `PostGIS` via `DATABASE_URL` / `DB_*`.
    Postgres,
    /// Process memory. Nothing survives a restart.
    Memory,
}

/// Bind address, port and store selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub store: StoreKind,
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT` and `ROAD_WATCH_STORE` from the process
    /// environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to the defaults with a warning.
    #[must_use]
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = match var("PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!("Invalid PORT {raw:?}, using 8080");
                8080
            }),
            None => 8080,
        };

        let store = match var("ROAD_WATCH_STORE").as_deref().map(str::trim) {
            None | Some("" | "postgres") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => {
                log::warn!("Unknown ROAD_WATCH_STORE {other:?}, using postgres");
                StoreKind::Postgres
            }
        };

        Self {
            bind_addr,
            port,
            store,
        }
    }
}
