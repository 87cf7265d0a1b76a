//! HTTP client for the road-watch API.

use std::time::Duration;

use road_watch_incident_models::{GeoPoint, Incident, IncidentType, NearbyIncident, VoteDirection};
use road_watch_server_models::{ApiErrorBody, ApiIncident};
use serde_json::json;

use crate::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Header carrying the caller's identity.
const IDENTITY_HEADER: &str = "X-User-Id";

/// Client for the road-watch API server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    identity: Option<String>,
}

impl ApiClient {
    /// Creates an anonymous client for the server at `base_url`
    /// (e.g. `http://localhost:8080`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            identity: None,
        })
    }

    /// Sends `identity` with every request, attributing reports and votes.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the server answers
    /// with an error status.
    pub async fn list_incidents(&self) -> Result<Vec<Incident>, ClientError> {
        let incidents: Vec<ApiIncident> = self
            .send(self.client.get(self.url("/api/incidents")))
            .await?
            .json()
            .await?;
        Ok(incidents.into_iter().map(Incident::from).collect())
    }

    /// Reports a new incident.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] if the server rejects the
    /// report, or another [`ClientError`] on transport or server failure.
    pub async fn create_incident(
        &self,
        incident_type: IncidentType,
        location: GeoPoint,
        description: &str,
    ) -> Result<Incident, ClientError> {
        let body = json!({
            "type": incident_type,
            "location": location,
            "description": description,
        });

        let incident: ApiIncident = self
            .send(self.client.post(self.url("/api/incidents")).json(&body))
            .await?
            .json()
            .await?;
        Ok(incident.into())
    }

    /// Votes on an incident and returns its updated state.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the incident does not exist,
    /// or another [`ClientError`] on failure.
    pub async fn vote(
        &self,
        incident_id: i64,
        direction: VoteDirection,
    ) -> Result<Incident, ClientError> {
        let url = self.url(&format!("/api/incidents/{incident_id}/votes"));

        let incident: ApiIncident = self
            .send(self.client.post(url).json(&json!({ "type": direction })))
            .await?
            .json()
            .await?;
        Ok(incident.into())
    }

    /// Active incidents within `radius_km` of `center`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the server answers
    /// with an error status.
    pub async fn nearby(
        &self,
        center: GeoPoint,
        radius_km: Option<f64>,
    ) -> Result<Vec<NearbyIncident>, ClientError> {
        let mut query = vec![
            ("longitude", center.longitude().to_string()),
            ("latitude", center.latitude().to_string()),
        ];
        if let Some(radius) = radius_km {
            query.push(("radius", radius.to_string()));
        }

        let incidents: Vec<ApiIncident> = self
            .send(
                self.client
                    .get(self.url("/api/incidents/nearby"))
                    .query(&query),
            )
            .await?
            .json()
            .await?;

        Ok(incidents
            .into_iter()
            .map(|api| {
                let distance_meters = api.distance.unwrap_or_default();
                NearbyIncident {
                    incident: api.into(),
                    distance_meters,
                }
            })
            .collect())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let request = match &self.identity {
            Some(identity) => request.header(IDENTITY_HEADER, identity),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body))
    }
}

/// Maps an error response to a [`ClientError`], preferring the message in
/// a structured error body over the raw text.
fn error_for_status(status: reqwest::StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map_or_else(|_| body.to_string(), |err| err.error.message);

    match status {
        reqwest::StatusCode::BAD_REQUEST => ClientError::Validation(message),
        reqwest::StatusCode::NOT_FOUND => ClientError::NotFound(message),
        status => ClientError::Server { status, message },
    }
}
