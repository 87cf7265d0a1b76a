#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Road incident taxonomy, vote tallies, and geographic point types.
//!
//! This crate defines the shared incident model used across the whole
//! road-watch system: the store persists [`Incident`]s, the lifecycle
//! crate scores and expires them, and the traffic feed produces
//! [`ExternalIncident`]s that get merged into [`MapIncident`]s for display.

pub mod location;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use location::{BoundingBox, GeoPoint, InvalidLocationError};

/// The closed set of reportable road incident types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IncidentType {
    /// Slow or stopped traffic
    Traffic,
    /// Collision or broken-down vehicle
    Accident,
    /// Object, weather, or road-surface danger
    Hazard,
    /// Police presence or speed check
    Police,
    /// Road or lane closure
    Closure,
}

impl IncidentType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Traffic,
            Self::Accident,
            Self::Hazard,
            Self::Police,
            Self::Closure,
        ]
    }
}

/// Direction of a vote on an incident.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VoteDirection {
    /// The incident is still there.
    Up,
    /// The incident is gone or was never there.
    Down,
}

impl VoteDirection {
    /// The stored `is_confirmed` flag for this direction.
    #[must_use]
    pub const fn is_confirmed(self) -> bool {
        matches!(self, Self::Up)
    }

    #[must_use]
    pub const fn from_confirmed(is_confirmed: bool) -> Self {
        if is_confirmed { Self::Up } else { Self::Down }
    }
}

/// Who cast a vote.
///
/// Anonymous votes carry no identity, so they cannot be deduplicated: each
/// one is stored as its own row. Identified voters hold exactly one vote
/// per incident and re-voting overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Voter {
    /// An identity vouched for by the token issuer.
    Identified(String),
    /// No identity was supplied.
    Anonymous,
}

impl Voter {
    /// Builds a voter from an optional identity, treating blank values as
    /// anonymous.
    #[must_use]
    pub fn from_identity(identity: Option<&str>) -> Self {
        match identity.map(str::trim) {
            Some(id) if !id.is_empty() => Self::Identified(id.to_string()),
            _ => Self::Anonymous,
        }
    }

    /// The identity stored in the `user_id` column, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Identified(id) => Some(id),
            Self::Anonymous => None,
        }
    }
}

/// Up/down vote counts for an incident, always derived from vote rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    /// Confirming votes.
    pub up: u32,
    /// Dismissing votes.
    pub down: u32,
}

impl VoteTally {
    #[must_use]
    pub const fn new(up: u32, down: u32) -> Self {
        Self { up, down }
    }

    /// Total number of votes cast.
    #[must_use]
    pub const fn total(self) -> u32 {
        self.up.saturating_add(self.down)
    }

    /// Returns this tally with one more vote in `direction`.
    #[must_use]
    pub const fn with_vote(self, direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => Self::new(self.up.saturating_add(1), self.down),
            VoteDirection::Down => Self::new(self.up, self.down.saturating_add(1)),
        }
    }
}

/// A new incident as submitted by a reporter, before the store assigns an
/// id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    /// Incident type.
    pub incident_type: IncidentType,
    /// Where the incident is.
    pub location: GeoPoint,
    /// Free-text description (empty when not supplied).
    pub description: String,
    /// Reporter identity, `None` for anonymous reports.
    pub reported_by: Option<String>,
}

/// A user-reported incident as stored, annotated with its vote tally.
#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    /// Primary key.
    pub id: i64,
    /// Incident type.
    pub incident_type: IncidentType,
    /// Where the incident is.
    pub location: GeoPoint,
    /// Free-text description.
    pub description: String,
    /// When the store inserted the incident.
    pub created_at: DateTime<Utc>,
    /// Reporter identity, `None` for anonymous reports.
    pub reported_by: Option<String>,
    /// Whether the incident is still shown in default listings.
    pub active: bool,
    /// Confidence in `[0, 1]` derived from the vote tally.
    pub reliability_score: f64,
    /// Vote counts.
    pub votes: VoteTally,
}

/// An incident returned by a radius search.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyIncident {
    /// The incident.
    pub incident: Incident,
    /// Geodesic distance from the query point in meters.
    pub distance_meters: f64,
}

/// An incident from the third-party traffic feed.
///
/// Identifier and location are optional because the feed does not always
/// provide resolvable values; such entries are dropped when merging.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalIncident {
    /// Identifier in the feed's own namespace.
    pub id: Option<String>,
    /// Mapped incident type, `None` when the feed category has no mapping.
    pub incident_type: Option<IncidentType>,
    /// Normalized location.
    pub location: Option<GeoPoint>,
    /// Feed-provided description.
    pub description: Option<String>,
    /// When the feed says the incident started (or when it was fetched).
    pub observed_at: DateTime<Utc>,
}

/// Where a displayed incident came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IncidentSource {
    /// Reported by a user and stored locally.
    Local,
    /// Provided by the third-party feed.
    External,
}

/// An incident in the unified display list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapIncident {
    /// Identifier, stringified for local incidents.
    pub id: String,
    /// Where the incident came from.
    pub source: IncidentSource,
    /// Incident type, `None` for unmapped feed categories.
    #[serde(rename = "type")]
    pub incident_type: Option<IncidentType>,
    /// Where the incident is.
    pub location: GeoPoint,
    /// Description (empty when unknown).
    pub description: String,
    /// Creation or observation time.
    pub created_at: DateTime<Utc>,
    /// Whether the incident is active.
    pub active: bool,
    /// Reliability score, only known for local incidents.
    pub reliability: Option<f64>,
    /// Vote counts (always zero for feed incidents).
    pub votes: VoteTally,
}

impl From<&Incident> for MapIncident {
    fn from(incident: &Incident) -> Self {
        Self {
            id: incident.id.to_string(),
            source: IncidentSource::Local,
            incident_type: Some(incident.incident_type),
            location: incident.location,
            description: incident.description.clone(),
            created_at: incident.created_at,
            active: incident.active,
            reliability: Some(incident.reliability_score),
            votes: incident.votes,
        }
    }
}
