#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the road-watch server.
//!
//! These types are serialized to JSON for the REST API consumed by the
//! mobile client. They are separate from the store types so the wire
//! contract can evolve independently.

use chrono::{DateTime, Utc};
use road_watch_incident_models::{
    GeoPoint, Incident, IncidentType, MapIncident, NearbyIncident, VoteTally,
};
use serde::{Deserialize, Serialize};

/// An incident as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncident {
    /// Unique incident ID.
    pub id: i64,
    /// Incident type.
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    /// `[longitude, latitude]`.
    pub location: GeoPoint,
    /// Free-text description.
    pub description: String,
    /// When the incident was reported (ISO 8601).
    pub created_at: DateTime<Utc>,
    /// Reporter identity, `null` for anonymous reports.
    pub created_by: Option<String>,
    /// Reliability score in `[0, 1]`.
    pub reliability: f64,
    /// Vote counts.
    pub votes: VoteTally,
    /// Whether the incident is active.
    pub active: bool,
    /// Distance from the query point in meters (nearby search only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl From<Incident> for ApiIncident {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id,
            incident_type: incident.incident_type,
            location: incident.location,
            description: incident.description,
            created_at: incident.created_at,
            created_by: incident.reported_by,
            reliability: incident.reliability_score,
            votes: incident.votes,
            active: incident.active,
            distance: None,
        }
    }
}

impl From<NearbyIncident> for ApiIncident {
    fn from(nearby: NearbyIncident) -> Self {
        Self {
            distance: Some(nearby.distance_meters),
            ..Self::from(nearby.incident)
        }
    }
}

impl From<ApiIncident> for Incident {
    fn from(api: ApiIncident) -> Self {
        Self {
            id: api.id,
            incident_type: api.incident_type,
            location: api.location,
            description: api.description,
            created_at: api.created_at,
            reported_by: api.created_by,
            active: api.active,
            reliability_score: api.reliability,
            votes: api.votes,
        }
    }
}

/// Body of `POST /api/incidents`.
///
/// Fields are loosely typed so the handler can reject bad input with a
/// specific validation message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateIncidentRequest {
    /// One of `traffic`, `accident`, `hazard`, `police`, `closure`.
    #[serde(rename = "type", default)]
    pub incident_type: Option<String>,
    /// `[longitude, latitude]`.
    #[serde(default)]
    pub location: Option<serde_json::Value>,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `POST /api/incidents/{id}/votes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteRequest {
    /// `up` or `down`.
    #[serde(rename = "type", default)]
    pub vote_type: Option<String>,
}

/// Query parameters for the nearby endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearbyQueryParams {
    /// Query point longitude.
    pub longitude: Option<f64>,
    /// Query point latitude.
    pub latitude: Option<f64>,
    /// Search radius in kilometers (default 5).
    pub radius: Option<f64>,
}

/// Query parameters for the merged feed endpoint.
///
/// Either `bbox` or a `longitude`/`latitude` pair (with optional `radius`
/// in kilometers) selects the area.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedQueryParams {
    /// Bounding box as `west,south,east,north`.
    pub bbox: Option<String>,
    /// Center longitude.
    pub longitude: Option<f64>,
    /// Center latitude.
    pub latitude: Option<f64>,
    /// Radius in kilometers around the center (default 5).
    pub radius: Option<f64>,
}

/// State of the external feed for a merged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalFeedStatus {
    /// Feed incidents were merged in.
    Ok,
    /// The feed failed; only local incidents are included.
    Unavailable,
    /// No feed is configured.
    Disabled,
}

/// Response of the merged feed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMergedIncidents {
    /// Current incidents, local first.
    pub incidents: Vec<MapIncident>,
    /// Whether feed incidents are included.
    pub external: ExternalFeedStatus,
}

/// Error payload returned for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Error details.
    pub error: ApiErrorDetail,
}

/// Machine-readable code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// `validation_error`, `not_found` or `internal_error`.
    pub code: String,
    /// Description of the failure.
    pub message: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}
