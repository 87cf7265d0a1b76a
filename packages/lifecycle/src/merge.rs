//! Merging local incidents with the third-party traffic feed.
//!
//! Local incidents are authoritative and always kept. Feed incidents are
//! appended when they carry a usable id and location and their id is not
//! already taken. Deduplication is by identifier only: the same real-world
//! event reported by both sources under different ids shows up twice.

use std::collections::BTreeSet;

use road_watch_incident_models::{
    ExternalIncident, Incident, IncidentSource, MapIncident, VoteTally,
};

/// Merges `local` and `external` into one display list.
///
/// Ordering is local incidents first, then surviving feed incidents, each
/// in their original order. Callers sort afterwards if they need to.
#[must_use]
pub fn merge(local: &[Incident], external: &[ExternalIncident]) -> Vec<MapIncident> {
    let mut merged: Vec<MapIncident> = local.iter().map(MapIncident::from).collect();
    let mut seen: BTreeSet<String> = merged.iter().map(|i| i.id.clone()).collect();

    for incident in external {
        let Some(id) = incident
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            log::debug!("Skipping feed incident without an id");
            continue;
        };

        let Some(location) = incident.location else {
            log::debug!("Skipping feed incident {id}: no resolvable coordinates");
            continue;
        };

        if !seen.insert(id.to_string()) {
            log::debug!("Skipping feed incident {id}: id already present");
            continue;
        }

        merged.push(MapIncident {
            id: id.to_string(),
            source: IncidentSource::External,
            incident_type: incident.incident_type,
            location,
            description: incident.description.clone().unwrap_or_default(),
            created_at: incident.observed_at,
            active: true,
            reliability: None,
            votes: VoteTally::default(),
        });
    }

    merged
}
