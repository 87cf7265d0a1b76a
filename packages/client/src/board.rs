//! Incidents shown on the map.
//!
//! The board keeps the merged list from the last refresh. Expiry is not
//! applied once and stored: [`IncidentBoard::visible`] checks every
//! incident against the clock it is given, so incidents drop off as they
//! age without another refresh.

use chrono::{DateTime, Utc};
use road_watch_feed::FeedClient;
use road_watch_incident_models::{
    BoundingBox, ExternalIncident, Incident, IncidentSource, MapIncident, VoteDirection,
};
use road_watch_lifecycle::{expiry, merge, reliability};

use crate::ClientError;
use crate::api::ApiClient;

/// Merged local and feed incidents for one map area.
#[derive(Debug, Default)]
pub struct IncidentBoard {
    incidents: Vec<MapIncident>,
}

impl IncidentBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reloads the board for `area`.
    ///
    /// Local incidents are required; the feed is optional and a failure
    /// only logs a warning. Returns the number of incidents kept.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if local incidents cannot be fetched. The
    /// board keeps its previous contents in that case.
    pub async fn refresh(
        &mut self,
        api: &ApiClient,
        feed: Option<&FeedClient>,
        area: &BoundingBox,
        now: DateTime<Utc>,
    ) -> Result<usize, ClientError> {
        let local: Vec<Incident> = api
            .list_incidents()
            .await?
            .into_iter()
            .filter(|incident| area.contains(incident.location))
            .collect();

        let external = match feed {
            Some(client) => client.fetch_incidents(area).await.unwrap_or_else(|e| {
                log::warn!("Traffic feed unavailable, showing local incidents only: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Ok(self.replace(&local, &external, now))
    }

    /// Replaces the board contents with `local` merged with `external`,
    /// keeping only incidents current at `now`.
    pub fn replace(
        &mut self,
        local: &[Incident],
        external: &[ExternalIncident],
        now: DateTime<Utc>,
    ) -> usize {
        self.incidents = merge::merge(local, external)
            .into_iter()
            .filter(|incident| expiry::is_current(incident, now))
            .collect();
        self.incidents.len()
    }

    /// Applies a vote locally before the server confirms it.
    ///
    /// Only local incidents can be voted on. The next refresh replaces the
    /// optimistic state with the server's. Returns `false` if `id` is not
    /// a local incident on the board.
    pub fn apply_optimistic_vote(&mut self, id: &str, direction: VoteDirection) -> bool {
        let Some(incident) = self
            .incidents
            .iter_mut()
            .find(|i| i.source == IncidentSource::Local && i.id == id)
        else {
            return false;
        };

        incident.votes = incident.votes.with_vote(direction);
        let updated = reliability::evaluate(incident.active, incident.votes);
        incident.reliability = Some(updated.score);
        incident.active = updated.active;
        true
    }

    /// Incidents current at `now`.
    #[must_use]
    pub fn visible(&self, now: DateTime<Utc>) -> Vec<&MapIncident> {
        self.incidents
            .iter()
            .filter(|incident| expiry::is_current(*incident, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use road_watch_incident_models::{GeoPoint, IncidentType, VoteTally};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn local(id: i64, incident_type: IncidentType, age_hours: i64) -> Incident {
        Incident {
            id,
            incident_type,
            location: GeoPoint::new(2.35, 48.85).unwrap(),
            description: String::new(),
            created_at: now() - TimeDelta::hours(age_hours),
            reported_by: None,
            active: true,
            reliability_score: 1.0,
            votes: VoteTally::default(),
        }
    }

    fn external(id: &str, age_hours: i64) -> ExternalIncident {
        ExternalIncident {
            id: Some(id.to_string()),
            incident_type: Some(IncidentType::Closure),
            location: GeoPoint::new(2.36, 48.86).ok(),
            description: None,
            observed_at: now() - TimeDelta::hours(age_hours),
        }
    }

    #[test]
    fn replace_merges_and_drops_expired() {
        let mut board = IncidentBoard::new();
        let kept = board.replace(
            &[
                local(1, IncidentType::Accident, 1),
                local(2, IncidentType::Police, 3),
            ],
            &[external("tt-1", 2), external("tt-2", 13)],
            now(),
        );

        assert_eq!(kept, 2);
        let ids: Vec<&str> = board.visible(now()).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["1", "tt-1"]);
    }

    #[test]
    fn visible_re_evaluates_expiry() {
        let mut board = IncidentBoard::new();
        board.replace(&[local(1, IncidentType::Traffic, 2)], &[], now());

        assert_eq!(board.visible(now()).len(), 1);
        assert_eq!(board.visible(now() + TimeDelta::hours(2)).len(), 0);
    }

    #[test]
    fn optimistic_votes_only_on_local() {
        let mut board = IncidentBoard::new();
        board.replace(&[local(1, IncidentType::Hazard, 0)], &[external("tt-1", 0)], now());

        assert!(board.apply_optimistic_vote("1", VoteDirection::Up));
        assert!(!board.apply_optimistic_vote("tt-1", VoteDirection::Up));
        assert!(!board.apply_optimistic_vote("42", VoteDirection::Up));

        let visible = board.visible(now());
        assert_eq!(visible[0].votes, VoteTally::new(1, 0));
        assert_eq!(visible[1].votes, VoteTally::default());
    }

    #[test]
    fn optimistic_down_votes_hide_incident() {
        let mut board = IncidentBoard::new();
        board.replace(&[local(1, IncidentType::Closure, 0)], &[], now());

        for _ in 0..3 {
            assert!(board.apply_optimistic_vote("1", VoteDirection::Down));
        }

        assert!(board.visible(now()).is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_state() {
        let mut board = IncidentBoard::new();
        board.replace(&[local(1, IncidentType::Accident, 0)], &[], now());

        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let area = BoundingBox::new(2.0, 48.0, 3.0, 49.0);
        let result = board.refresh(&api, None, &area, now()).await;

        assert!(matches!(result, Err(ClientError::Http(_))));
        assert_eq!(board.visible(now()).len(), 1);
    }
}
