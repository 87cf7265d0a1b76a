//! The incident store interface the API server is written against.

use std::sync::Arc;

use async_trait::async_trait;
use road_watch_incident_models::{
    GeoPoint, Incident, NearbyIncident, NewIncident, VoteDirection, Voter,
};
use switchy_database::Database;

use crate::{DbError, queries};

/// Durable storage for incidents and votes.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Inserts a new incident.
    async fn create_incident(&self, incident: &NewIncident) -> Result<Incident, DbError>;

    /// Active incidents with tallies, newest first.
    async fn list_active_incidents(&self) -> Result<Vec<Incident>, DbError>;

    /// Active incidents within `radius_meters` of `center`, nearest first.
    async fn find_nearby(
        &self,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<NearbyIncident>, DbError>;

    /// A single incident, active or not.
    async fn get_incident(&self, incident_id: i64) -> Result<Option<Incident>, DbError>;

    /// Records a vote and recomputes reliability atomically, returning the
    /// updated incident.
    async fn cast_vote(
        &self,
        incident_id: i64,
        voter: &Voter,
        direction: VoteDirection,
    ) -> Result<Incident, DbError>;
}

/// [`IncidentStore`] backed by `PostGIS`.
#[derive(Clone)]
pub struct PostgisIncidentStore {
    db: Arc<dyn Database>,
}

impl PostgisIncidentStore {
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IncidentStore for PostgisIncidentStore {
    async fn create_incident(&self, incident: &NewIncident) -> Result<Incident, DbError> {
        queries::create_incident(self.db.as_ref(), incident).await
    }

    async fn list_active_incidents(&self) -> Result<Vec<Incident>, DbError> {
        queries::list_active_incidents(self.db.as_ref()).await
    }

    async fn find_nearby(
        &self,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<NearbyIncident>, DbError> {
        queries::find_nearby(self.db.as_ref(), center, radius_meters).await
    }

    async fn get_incident(&self, incident_id: i64) -> Result<Option<Incident>, DbError> {
        queries::get_incident(self.db.as_ref(), incident_id).await
    }

    async fn cast_vote(
        &self,
        incident_id: i64,
        voter: &Voter,
        direction: VoteDirection,
    ) -> Result<Incident, DbError> {
        queries::cast_vote(self.db.as_ref(), incident_id, voter, direction).await
    }
}
