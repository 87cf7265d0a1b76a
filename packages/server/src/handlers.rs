//! HTTP handler functions for the road-watch API.

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use road_watch_incident_models::{Incident, MapIncident, Voter};
use road_watch_lifecycle::{expiry, merge};
use road_watch_server_models::{
    ApiHealth, ApiIncident, ApiMergedIncidents, CreateIncidentRequest, ExternalFeedStatus,
    FeedQueryParams, NearbyQueryParams, VoteRequest,
};

use crate::AppState;
use crate::error::ApiError;
use crate::validation;

/// Header carrying the caller's opaque identity.
pub const IDENTITY_HEADER: &str = "X-User-Id";

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/incidents`
///
/// Lists active incidents with their vote tallies, newest first.
pub async fn list_incidents(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let incidents = state.store.list_active_incidents().await?;
    let api_incidents: Vec<ApiIncident> = incidents.into_iter().map(ApiIncident::from).collect();
    Ok(HttpResponse::Ok().json(api_incidents))
}

/// `POST /api/incidents`
pub async fn create_incident(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateIncidentRequest>,
) -> Result<HttpResponse, ApiError> {
    let new_incident = validation::new_incident(body.into_inner(), identity(&req))?;

    let incident = state.store.create_incident(&new_incident).await?;
    log::info!(
        "Created {} incident {} at {:?}",
        incident.incident_type,
        incident.id,
        incident.location.to_array()
    );

    Ok(HttpResponse::Created().json(ApiIncident::from(incident)))
}

/// `POST /api/incidents/{id}/votes`
///
/// Records an up or down vote from the caller. A repeat vote by the same
/// identity replaces the earlier one.
pub async fn vote(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<VoteRequest>,
) -> Result<HttpResponse, ApiError> {
    let incident_id: i64 = path
        .trim()
        .parse()
        .map_err(|_| ApiError::Validation(format!("invalid incident id {:?}", path.as_str())))?;
    let direction = validation::vote_direction(body.vote_type.as_deref())?;
    let voter = Voter::from_identity(identity(&req).as_deref());

    let incident = state
        .store
        .cast_vote(incident_id, &voter, direction)
        .await?;

    log::debug!(
        "Vote {direction} on incident {incident_id}: up={} down={} reliability={:.2} active={}",
        incident.votes.up,
        incident.votes.down,
        incident.reliability_score,
        incident.active
    );

    Ok(HttpResponse::Ok().json(ApiIncident::from(incident)))
}

/// `GET /api/incidents/nearby`
///
/// Active incidents within `radius` kilometers of the query point, nearest
/// first, each with its distance in meters.
pub async fn nearby(
    state: web::Data<AppState>,
    params: web::Query<NearbyQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let center = validation::query_point(params.longitude, params.latitude)?;
    let radius_meters = validation::radius_meters(params.radius)?;

    let incidents = state.store.find_nearby(center, radius_meters).await?;
    let api_incidents: Vec<ApiIncident> = incidents.into_iter().map(ApiIncident::from).collect();
    Ok(HttpResponse::Ok().json(api_incidents))
}

/// `GET /api/incidents/feed`
///
/// Local incidents in the area merged with the external traffic feed and
/// filtered to those still current. A failing feed degrades the response
/// to local incidents only.
pub async fn feed(
    state: web::Data<AppState>,
    params: web::Query<FeedQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let area = validation::feed_area(&params)?;

    let local: Vec<Incident> = state
        .store
        .list_active_incidents()
        .await?
        .into_iter()
        .filter(|incident| area.contains(incident.location))
        .collect();

    let (external, status) = match &state.feed {
        None => (Vec::new(), ExternalFeedStatus::Disabled),
        Some(client) => match client.fetch_incidents(&area).await {
            Ok(incidents) => (incidents, ExternalFeedStatus::Ok),
            Err(e) => {
                log::warn!("Traffic feed unavailable, serving local incidents only: {e}");
                (Vec::new(), ExternalFeedStatus::Unavailable)
            }
        },
    };

    let now = Utc::now();
    let incidents: Vec<MapIncident> = merge::merge(&local, &external)
        .into_iter()
        .filter(|incident| expiry::is_current(incident, now))
        .collect();

    Ok(HttpResponse::Ok().json(ApiMergedIncidents {
        incidents,
        external: status,
    }))
}

/// Reads the caller identity header. Missing, blank or non-ASCII values
/// are treated as anonymous.
fn identity(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}
