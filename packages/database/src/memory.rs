//! In-memory [`IncidentStore`] for tests and local development.
//!
//! Mirrors the `PostGIS` store's semantics: tallies are counted from vote
//! rows on every read, identified voters upsert, anonymous votes always
//! insert, and deactivation is sticky. A single mutex guards all state, so
//! each operation is atomic the same way a transaction is.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use geo::{Distance, Geodesic};
use road_watch_incident_models::{
    GeoPoint, Incident, NearbyIncident, NewIncident, VoteDirection, VoteTally, Voter,
};
use road_watch_lifecycle::reliability;

use crate::DbError;
use crate::store::IncidentStore;

#[derive(Debug)]
struct StoredVote {
    incident_id: i64,
    user_id: Option<String>,
    is_confirmed: bool,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    incidents: Vec<Incident>,
    votes: Vec<StoredVote>,
}

impl State {
    fn tally(&self, incident_id: i64) -> VoteTally {
        self.votes
            .iter()
            .filter(|v| v.incident_id == incident_id)
            .fold(VoteTally::default(), |tally, v| {
                tally.with_vote(VoteDirection::from_confirmed(v.is_confirmed))
            })
    }

    fn with_tally(&self, incident: &Incident) -> Incident {
        Incident {
            votes: self.tally(incident.id),
            ..incident.clone()
        }
    }

    fn position(&self, incident_id: i64) -> Result<usize, DbError> {
        self.incidents
            .iter()
            .position(|i| i.id == incident_id)
            .ok_or(DbError::NotFound { incident_id })
    }

    fn record_vote(
        &mut self,
        incident_id: i64,
        voter: &Voter,
        is_confirmed: bool,
    ) -> Result<VoteTally, DbError> {
        self.position(incident_id)?;

        let existing = voter.id().and_then(|user_id| {
            self.votes.iter_mut().find(|v| {
                v.incident_id == incident_id && v.user_id.as_deref() == Some(user_id)
            })
        });

        match existing {
            Some(vote) => vote.is_confirmed = is_confirmed,
            None => self.votes.push(StoredVote {
                incident_id,
                user_id: voter.id().map(String::from),
                is_confirmed,
            }),
        }

        Ok(self.tally(incident_id))
    }

    fn set_reliability(&mut self, incident_id: i64, score: f64, active: bool) -> Result<(), DbError> {
        let idx = self.position(incident_id)?;
        let incident = &mut self.incidents[idx];
        incident.reliability_score = score;
        incident.active = active;
        Ok(())
    }
}

/// [`IncidentStore`] that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryIncidentStore {
    state: Mutex<State>,
}

impl MemoryIncidentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn create_incident(&self, incident: &NewIncident) -> Result<Incident, DbError> {
        let mut state = self.lock();
        state.next_id += 1;

        let created = Incident {
            id: state.next_id,
            incident_type: incident.incident_type,
            location: incident.location,
            description: incident.description.clone(),
            created_at: Utc::now(),
            reported_by: incident.reported_by.clone(),
            active: true,
            reliability_score: 1.0,
            votes: VoteTally::default(),
        };
        state.incidents.push(created.clone());

        Ok(created)
    }

    async fn list_active_incidents(&self) -> Result<Vec<Incident>, DbError> {
        let state = self.lock();
        let mut incidents: Vec<Incident> = state
            .incidents
            .iter()
            .filter(|i| i.active)
            .map(|i| state.with_tally(i))
            .collect();

        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(incidents)
    }

    async fn find_nearby(
        &self,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<NearbyIncident>, DbError> {
        let state = self.lock();
        let origin = center.to_point();

        let mut nearby: Vec<NearbyIncident> = state
            .incidents
            .iter()
            .filter(|i| i.active)
            .filter_map(|i| {
                let distance_meters = Geodesic.distance(origin, i.location.to_point());
                (distance_meters <= radius_meters).then(|| NearbyIncident {
                    incident: state.with_tally(i),
                    distance_meters,
                })
            })
            .collect();

        nearby.sort_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then(a.incident.id.cmp(&b.incident.id))
        });
        Ok(nearby)
    }

    async fn get_incident(&self, incident_id: i64) -> Result<Option<Incident>, DbError> {
        let state = self.lock();
        Ok(state
            .incidents
            .iter()
            .find(|i| i.id == incident_id)
            .map(|i| state.with_tally(i)))
    }

    async fn cast_vote(
        &self,
        incident_id: i64,
        voter: &Voter,
        direction: VoteDirection,
    ) -> Result<Incident, DbError> {
        let mut state = self.lock();
        let idx = state.position(incident_id)?;
        let was_active = state.incidents[idx].active;

        let tally = state.record_vote(incident_id, voter, direction.is_confirmed())?;
        let outcome = reliability::evaluate(was_active, tally);
        state.set_reliability(incident_id, outcome.score, outcome.active)?;

        if was_active && !outcome.active {
            log::info!(
                "Incident {incident_id} deactivated (up={}, down={}, score={:.2})",
                tally.up,
                tally.down,
                outcome.score
            );
        }

        Ok(state.with_tally(&state.incidents[idx]))
    }
}
