#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Third-party traffic incident feed client.
//!
//! Queries a `TomTom`-style incident details endpoint by bounding box and
//! normalizes each entry into an [`ExternalIncident`]. The only things the
//! rest of the system relies on are an identifier and a location; both are
//! left as `None` when the feed doesn't provide something usable, and the
//! merge step drops those entries.
//!
//! See <https://developer.tomtom.com/traffic-api/documentation/traffic-incidents/incident-details>

pub mod retry;

use std::time::Duration;

use chrono::{DateTime, Utc};
use road_watch_incident_models::{BoundingBox, ExternalIncident, GeoPoint, IncidentType};
use serde_json::Value;
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Default incident details endpoint.
pub const DEFAULT_FEED_URL: &str = "https://api.tomtom.com/traffic/services/5/incidentDetails";

/// Fields requested from the incident details endpoint.
const FEED_FIELDS: &str = "{incidents{type,geometry{type,coordinates},properties{id,iconCategory,startTime,events{description,code}}}}";

/// Per-request timeout for feed calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the traffic feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed answered with an error status.
    #[error("Feed returned HTTP {status}")]
    Status {
        /// The response status.
        status: reqwest::StatusCode,
    },

    /// The body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The body was JSON but not in the expected shape.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// Client for the traffic incident feed.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl FeedClient {
    /// Creates a client for `base_url` authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
        })
    }

    /// Builds a client from `TRAFFIC_FEED_URL` and `TRAFFIC_FEED_API_KEY`.
    ///
    /// Returns `Ok(None)` when no API key is configured, in which case the
    /// system runs on local incidents only.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the HTTP client cannot be built.
    pub fn from_env() -> Result<Option<Self>, FeedError> {
        let Some(api_key) = std::env::var("TRAFFIC_FEED_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
        else {
            log::info!("TRAFFIC_FEED_API_KEY not set, external incident feed disabled");
            return Ok(None);
        };

        let base_url =
            std::env::var("TRAFFIC_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());

        Self::new(base_url, api_key).map(Some)
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches the incidents inside `bbox`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the request fails after retries or the
    /// response is not an incident list.
    pub async fn fetch_incidents(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<ExternalIncident>, FeedError> {
        let bbox_param = bbox.to_query_string();

        let body = retry::send_json(&self.retry, || {
            self.client.get(&self.base_url).query(&[
                ("key", self.api_key.as_str()),
                ("bbox", bbox_param.as_str()),
                ("fields", FEED_FIELDS),
                ("language", "en-GB"),
                ("timeValidityFilter", "present"),
            ])
        })
        .await?;

        let incidents = parse_incidents(&body, Utc::now())?;
        log::debug!("Fetched {} feed incidents for bbox {bbox_param}", incidents.len());
        Ok(incidents)
    }
}

/// Parses an incident details response.
///
/// `fetched_at` is used as the observation time for entries without a
/// parseable `startTime`.
///
/// # Errors
///
/// Returns [`FeedError::Parse`] if the body has no `incidents` array.
pub fn parse_incidents(
    body: &Value,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<ExternalIncident>, FeedError> {
    let items = body
        .get("incidents")
        .and_then(Value::as_array)
        .ok_or_else(|| FeedError::Parse {
            message: "Feed response has no incidents array".to_string(),
        })?;

    Ok(items
        .iter()
        .map(|item| parse_incident(item, fetched_at))
        .collect())
}

fn parse_incident(item: &Value, fetched_at: DateTime<Utc>) -> ExternalIncident {
    let properties = item.get("properties").unwrap_or(&Value::Null);

    let id = match properties.get("id").or_else(|| item.get("id")) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let incident_type = properties
        .get("iconCategory")
        .and_then(Value::as_u64)
        .and_then(map_icon_category);

    let location = item.get("geometry").and_then(GeoPoint::from_json);

    let description = properties
        .get("events")
        .and_then(Value::as_array)
        .and_then(|events| events.first())
        .and_then(|event| event.get("description"))
        .or_else(|| properties.get("description"))
        .and_then(Value::as_str)
        .map(String::from);

    let observed_at = properties
        .get("startTime")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or(fetched_at, |dt| dt.with_timezone(&Utc));

    ExternalIncident {
        id,
        incident_type,
        location,
        description,
        observed_at,
    }
}

/// Maps a feed icon category to an incident type.
///
/// Unknown (0) and categories outside the documented range have no
/// mapping.
#[must_use]
pub const fn map_icon_category(category: u64) -> Option<IncidentType> {
    match category {
        1 => Some(IncidentType::Accident),
        6 => Some(IncidentType::Traffic),
        7..=9 => Some(IncidentType::Closure),
        2..=5 | 10..=14 => Some(IncidentType::Hazard),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_feed_incidents() {
        let body = json!({
            "incidents": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [4.8897, 52.3740]},
                    "properties": {
                        "id": "4a1b7f3c",
                        "iconCategory": 1,
                        "startTime": "2026-10-15T08:30:00Z",
                        "events": [{"description": "Accident", "code": 201}]
                    }
                },
                {
                    "type": "Feature",
                    "geometry": {
                        "type": "LineString",
                        "coordinates": [[4.90, 52.37], [4.91, 52.38]]
                    },
                    "properties": {"id": 9001, "iconCategory": 6}
                }
            ]
        });
        let fetched_at = Utc::now();

        let incidents = parse_incidents(&body, fetched_at).unwrap();
        assert_eq!(incidents.len(), 2);

        let first = &incidents[0];
        assert_eq!(first.id.as_deref(), Some("4a1b7f3c"));
        assert_eq!(first.incident_type, Some(IncidentType::Accident));
        assert_eq!(first.location, GeoPoint::new(4.8897, 52.3740).ok());
        assert_eq!(first.description.as_deref(), Some("Accident"));
        assert_eq!(first.observed_at.to_rfc3339(), "2026-10-15T08:30:00+00:00");

        let second = &incidents[1];
        assert_eq!(second.id.as_deref(), Some("9001"));
        assert_eq!(second.incident_type, Some(IncidentType::Traffic));
        assert_eq!(second.location, GeoPoint::new(4.90, 52.37).ok());
        assert_eq!(second.description, None);
        assert_eq!(second.observed_at, fetched_at);
    }

    #[test]
    fn keeps_unresolvable_entries_for_merge_to_drop() {
        let body = json!({
            "incidents": [
                {"properties": {"iconCategory": 8}, "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
                {"properties": {"id": "no-geometry"}}
            ]
        });

        let incidents = parse_incidents(&body, Utc::now()).unwrap();
        assert_eq!(incidents[0].id, None);
        assert_eq!(incidents[0].incident_type, Some(IncidentType::Closure));
        assert_eq!(incidents[1].location, None);
        assert_eq!(incidents[1].incident_type, None);
    }

    #[test]
    fn rejects_body_without_incidents() {
        let err = parse_incidents(&json!({"error": "bad key"}), Utc::now()).unwrap_err();
        assert!(matches!(err, FeedError::Parse { .. }));
    }

    #[test]
    fn icon_category_mapping() {
        assert_eq!(map_icon_category(0), None);
        assert_eq!(map_icon_category(1), Some(IncidentType::Accident));
        assert_eq!(map_icon_category(6), Some(IncidentType::Traffic));
        assert_eq!(map_icon_category(9), Some(IncidentType::Closure));
        assert_eq!(map_icon_category(11), Some(IncidentType::Hazard));
        assert_eq!(map_icon_category(99), None);
    }
}
