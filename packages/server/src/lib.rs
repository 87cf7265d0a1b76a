#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for road-watch.
//!
//! Serves the REST API for reporting incidents, voting on them and
//! searching around a point, plus a merged view that combines local
//! reports with an optional third-party traffic feed. Incidents are kept in
//! `PostGIS` by default, or in process memory when
//! `ROAD_WATCH_STORE=memory`.

pub mod config;
pub mod error;
mod handlers;
pub mod validation;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use road_watch_database::memory::MemoryIncidentStore;
use road_watch_database::store::{IncidentStore, PostgisIncidentStore};
use road_watch_database::{db, run_migrations};
use road_watch_feed::FeedClient;

use crate::config::{ServerConfig, StoreKind};
use crate::error::ApiError;

pub use handlers::IDENTITY_HEADER;

/// Shared application state.
pub struct AppState {
    /// Incident and vote storage.
    pub store: Arc<dyn IncidentStore>,
    /// External traffic feed, `None` when not configured.
    pub feed: Option<FeedClient>,
}

/// Registers the `/api` routes and the JSON/query error handlers.
///
/// Used by [`run_server`] and by handler tests, so both see the same
/// routing and the same error shape for malformed input.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("invalid JSON body: {err}")).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("invalid query: {err}")).into()
    }))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .service(
                web::resource("/incidents")
                    .route(web::get().to(handlers::list_incidents))
                    .route(web::post().to(handlers::create_incident)),
            )
            .route("/incidents/nearby", web::get().to(handlers::nearby))
            .route("/incidents/feed", web::get().to(handlers::feed))
            .route("/incidents/{id}/votes", web::post().to(handlers::vote)),
    );
}

/// Starts the road-watch API server.
///
/// Opens the configured incident store (connecting to `PostGIS` and
/// running migrations unless the memory store is selected), sets up the
/// optional traffic feed client, and starts the Actix-Web HTTP server. This
/// is a regular async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the store cannot be opened,
/// migrations fail, the feed client cannot be built, or the HTTP server
/// fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env();

    let store: Arc<dyn IncidentStore> = match config.store {
        StoreKind::Postgres => {
            log::info!("Connecting to database...");
            let db_conn = db::connect_from_env()
                .await
                .map_err(|e| std::io::Error::other(format!("Failed to connect to database: {e}")))?;

            log::info!("Running migrations...");
            run_migrations(db_conn.as_ref())
                .await
                .map_err(std::io::Error::other)?;

            Arc::new(PostgisIncidentStore::new(Arc::from(db_conn)))
        }
        StoreKind::Memory => {
            log::warn!("Using in-memory incident store; data is lost on restart");
            Arc::new(MemoryIncidentStore::new())
        }
    };

    let feed = FeedClient::from_env().map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState { store, feed });

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}
