//! Client-side expiry of incidents.
//!
//! Independent of the server's `active` flag, an incident is only shown
//! while it is younger than its type's time-to-live and hasn't collected
//! a clear majority of down-votes. The decision is re-evaluated on every
//! render; nothing here is cached.

use chrono::{DateTime, TimeDelta, Utc};
use road_watch_incident_models::{Incident, IncidentType, MapIncident, VoteTally};

/// Time-to-live for types without a specific entry.
pub const DEFAULT_TTL_HOURS: i64 = 4;

/// Down-votes needed for early retirement.
pub const EARLY_RETIREMENT_DOWN_VOTES: u32 = 3;

/// Anything that can be checked for expiry.
pub trait Expirable {
    /// Incident type, `None` if unknown.
    fn incident_type(&self) -> Option<IncidentType>;
    /// When the incident was created or first observed.
    fn created_at(&self) -> DateTime<Utc>;
    /// Server-side active flag.
    fn is_active(&self) -> bool;
    /// Vote counts.
    fn votes(&self) -> VoteTally;
}

impl Expirable for Incident {
    fn incident_type(&self) -> Option<IncidentType> {
        Some(self.incident_type)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn votes(&self) -> VoteTally {
        self.votes
    }
}

impl Expirable for MapIncident {
    fn incident_type(&self) -> Option<IncidentType> {
        self.incident_type
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn votes(&self) -> VoteTally {
        self.votes
    }
}

/// Returns how long an incident of `incident_type` stays current.
#[must_use]
pub fn time_to_live(incident_type: Option<IncidentType>) -> TimeDelta {
    let hours = match incident_type {
        Some(IncidentType::Traffic) => 3,
        Some(IncidentType::Police) => 2,
        Some(IncidentType::Accident) => 6,
        Some(IncidentType::Hazard) => 4,
        Some(IncidentType::Closure) => 12,
        None => DEFAULT_TTL_HOURS,
    };
    TimeDelta::hours(hours)
}

/// When `incident` stops being current by age alone.
#[must_use]
pub fn expires_at(incident: &impl Expirable) -> DateTime<Utc> {
    incident.created_at() + time_to_live(incident.incident_type())
}

/// Whether `incident` should still be displayed at `now`.
#[must_use]
pub fn is_current(incident: &impl Expirable, now: DateTime<Utc>) -> bool {
    if !incident.is_active() {
        return false;
    }

    if now - incident.created_at() > time_to_live(incident.incident_type()) {
        return false;
    }

    let votes = incident.votes();
    !(votes.down > votes.up && votes.down >= EARLY_RETIREMENT_DOWN_VOTES)
}

#[cfg(test)]
mod tests {
    use road_watch_incident_models::GeoPoint;

    use super::*;

    fn incident(incident_type: IncidentType, age: TimeDelta, now: DateTime<Utc>) -> Incident {
        Incident {
            id: 1,
            incident_type,
            location: GeoPoint::new(2.35, 48.85).unwrap(),
            description: String::new(),
            created_at: now - age,
            reported_by: None,
            active: true,
            reliability_score: 1.0,
            votes: VoteTally::default(),
        }
    }

    #[test]
    fn police_expires_after_two_hours() {
        let now = Utc::now();
        let stale = incident(IncidentType::Police, TimeDelta::minutes(150), now);
        assert!(!is_current(&stale, now));

        let fresh = incident(IncidentType::Police, TimeDelta::hours(1), now);
        assert!(is_current(&fresh, now));
    }

    #[test]
    fn ttl_per_type() {
        let now = Utc::now();
        for (incident_type, hours) in [
            (IncidentType::Traffic, 3),
            (IncidentType::Police, 2),
            (IncidentType::Accident, 6),
            (IncidentType::Hazard, 4),
            (IncidentType::Closure, 12),
        ] {
            let at_limit = incident(incident_type, TimeDelta::hours(hours), now);
            assert!(is_current(&at_limit, now), "{incident_type} at limit");

            let past = incident(
                incident_type,
                TimeDelta::hours(hours) + TimeDelta::seconds(1),
                now,
            );
            assert!(!is_current(&past, now), "{incident_type} past limit");
            assert_eq!(expires_at(&past), past.created_at + TimeDelta::hours(hours));
        }
        assert_eq!(time_to_live(None), TimeDelta::hours(DEFAULT_TTL_HOURS));
    }

    #[test]
    fn inactive_is_never_current() {
        let now = Utc::now();
        let mut inactive = incident(IncidentType::Closure, TimeDelta::minutes(5), now);
        inactive.active = false;
        assert!(!is_current(&inactive, now));
    }

    #[test]
    fn down_vote_majority_retires_early() {
        let now = Utc::now();
        let mut disputed = incident(IncidentType::Accident, TimeDelta::minutes(5), now);

        disputed.votes = VoteTally::new(1, 3);
        assert!(!is_current(&disputed, now));

        disputed.votes = VoteTally::new(3, 3);
        assert!(is_current(&disputed, now));

        disputed.votes = VoteTally::new(0, 2);
        assert!(is_current(&disputed, now));
    }

    #[test]
    fn unknown_feed_type_uses_default_ttl() {
        let now = Utc::now();
        let mut map_incident = MapIncident::from(&incident(
            IncidentType::Hazard,
            TimeDelta::minutes(230),
            now,
        ));
        map_incident.incident_type = None;
        assert!(is_current(&map_incident, now));

        map_incident.created_at = now - TimeDelta::minutes(250);
        assert!(!is_current(&map_incident, now));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let now = Utc::now();
        let fresh = incident(IncidentType::Traffic, TimeDelta::hours(1), now);
        assert_eq!(is_current(&fresh, now), is_current(&fresh, now));
    }
}
