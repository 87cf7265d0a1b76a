//! Incident and vote queries.
//!
//! All statements are raw SQL through `query_raw_params()` since nearly
//! every one touches a `PostGIS` geography column. Vote counts are always
//! computed from `incident_votes` in the same statement that reads the
//! incident, so a row and its tally come from one snapshot.

use chrono::{DateTime, NaiveDateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use road_watch_incident_models::{
    GeoPoint, Incident, IncidentType, NearbyIncident, NewIncident, VoteDirection, VoteTally,
    Voter,
};
use road_watch_lifecycle::reliability;
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

/// Columns selected for every incident read. Expects `incidents i` left
/// joined with `incident_votes v` and grouped by `i.id`.
const INCIDENT_COLUMNS: &str = "i.id, i.type, i.description, i.created_at, i.reported_by,
                i.active, i.reliability_score,
                ST_X(i.location::geometry) AS longitude,
                ST_Y(i.location::geometry) AS latitude,
                COUNT(v.id) FILTER (WHERE v.is_confirmed) AS up_votes,
                COUNT(v.id) FILTER (WHERE NOT v.is_confirmed) AS down_votes";

/// Inserts a new incident.
///
/// The store assigns the id and creation time; the incident starts active
/// with a reliability score of `1.0` and no votes.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub async fn create_incident(
    db: &dyn Database,
    incident: &NewIncident,
) -> Result<Incident, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO incidents (type, location, description, reported_by)
             VALUES (
                 $1,
                 ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography,
                 $4, $5
             )
             RETURNING id, created_at, active, reliability_score",
            &[
                DatabaseValue::String(incident.incident_type.to_string()),
                DatabaseValue::Real64(incident.location.longitude()),
                DatabaseValue::Real64(incident.location.latitude()),
                DatabaseValue::String(incident.description.clone()),
                incident
                    .reported_by
                    .as_ref()
                    .map_or(DatabaseValue::Null, |r| DatabaseValue::String(r.clone())),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "Insert returned no row".to_string(),
    })?;

    let id: i64 = row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse incident id: {e}"),
    })?;
    let created_at: NaiveDateTime = row.to_value("created_at").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse created_at: {e}"),
    })?;

    log::debug!(
        "Created {} incident {id} at {:?}",
        incident.incident_type,
        incident.location.to_array()
    );

    Ok(Incident {
        id,
        incident_type: incident.incident_type,
        location: incident.location,
        description: incident.description.clone(),
        created_at: to_utc(created_at),
        reported_by: incident.reported_by.clone(),
        active: active_from_row(row)?,
        reliability_score: row.to_value("reliability_score").unwrap_or(1.0),
        votes: VoteTally::default(),
    })
}

/// Returns all active incidents with their vote tallies, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be decoded.
pub async fn list_active_incidents(db: &dyn Database) -> Result<Vec<Incident>, DbError> {
    let sql = format!(
        "SELECT {INCIDENT_COLUMNS}
         FROM incidents i
         LEFT JOIN incident_votes v ON v.incident_id = i.id
         WHERE i.active = TRUE
         GROUP BY i.id
         ORDER BY i.created_at DESC, i.id DESC"
    );

    let rows = db.query_raw_params(&sql, &[]).await?;
    rows.iter().map(incident_from_row).collect()
}

/// Returns active incidents within `radius_meters` of `center`, nearest
/// first.
///
/// Distances are computed on the `geography` type, i.e. on the WGS84
/// spheroid.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be decoded.
pub async fn find_nearby(
    db: &dyn Database,
    center: GeoPoint,
    radius_meters: f64,
) -> Result<Vec<NearbyIncident>, DbError> {
    let sql = format!(
        "SELECT {INCIDENT_COLUMNS},
                ST_Distance(
                    i.location,
                    ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography
                ) AS distance
         FROM incidents i
         LEFT JOIN incident_votes v ON v.incident_id = i.id
         WHERE i.active = TRUE
           AND ST_DWithin(
               i.location,
               ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
               $3
           )
         GROUP BY i.id
         ORDER BY distance ASC, i.id ASC"
    );

    let rows = db
        .query_raw_params(
            &sql,
            &[
                DatabaseValue::Real64(center.longitude()),
                DatabaseValue::Real64(center.latitude()),
                DatabaseValue::Real64(radius_meters),
            ],
        )
        .await?;

    rows.iter()
        .map(|row| {
            Ok(NearbyIncident {
                incident: incident_from_row(row)?,
                distance_meters: row.to_value("distance").unwrap_or(0.0),
            })
        })
        .collect()
}

/// Fetches a single incident (active or not) with its tally.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the row cannot be decoded.
pub async fn get_incident(db: &dyn Database, incident_id: i64) -> Result<Option<Incident>, DbError> {
    let sql = format!(
        "SELECT {INCIDENT_COLUMNS}
         FROM incidents i
         LEFT JOIN incident_votes v ON v.incident_id = i.id
         WHERE i.id = $1
         GROUP BY i.id"
    );

    let rows = db
        .query_raw_params(&sql, &[DatabaseValue::Int64(incident_id)])
        .await?;

    rows.first().map(incident_from_row).transpose()
}

/// Counts the up and down votes for an incident.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn vote_tally(db: &dyn Database, incident_id: i64) -> Result<VoteTally, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) FILTER (WHERE is_confirmed) AS up_votes,
                    COUNT(*) FILTER (WHERE NOT is_confirmed) AS down_votes
             FROM incident_votes
             WHERE incident_id = $1",
            &[DatabaseValue::Int64(incident_id)],
        )
        .await?;

    rows.first()
        .map_or_else(|| Ok(VoteTally::default()), tally_from_row)
}

/// Upserts a vote and returns the incident's tally afterwards.
///
/// An identified voter's previous vote on the same incident is
/// overwritten. Anonymous votes are stored as `NULL` voters, which the
/// unique index treats as distinct, so every anonymous vote counts.
///
/// Callers hold the incident row lock (see [`cast_vote`]), so the tally
/// reflects exactly the votes committed before this one.
async fn record_vote(
    db: &dyn Database,
    incident_id: i64,
    voter: &Voter,
    is_confirmed: bool,
) -> Result<VoteTally, DbError> {
    db.exec_raw_params(
        "INSERT INTO incident_votes (incident_id, user_id, is_confirmed)
         VALUES ($1, $2, $3)
         ON CONFLICT (incident_id, user_id) DO UPDATE SET
             is_confirmed = EXCLUDED.is_confirmed,
             updated_at = (NOW() AT TIME ZONE 'UTC')",
        &[
            DatabaseValue::Int64(incident_id),
            voter
                .id()
                .map_or(DatabaseValue::Null, |id| DatabaseValue::String(id.to_string())),
            DatabaseValue::Bool(is_confirmed),
        ],
    )
    .await?;

    vote_tally(db, incident_id).await
}

/// Persists a recomputed reliability score and active flag.
///
/// Only the vote path calls this; there is no endpoint that writes scores
/// directly.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row was updated.
pub async fn set_reliability(
    db: &dyn Database,
    incident_id: i64,
    score: f64,
    active: bool,
) -> Result<(), DbError> {
    let updated = db
        .exec_raw_params(
            "UPDATE incidents SET reliability_score = $2, active = $3 WHERE id = $1",
            &[
                DatabaseValue::Int64(incident_id),
                DatabaseValue::Real64(score),
                DatabaseValue::Bool(active),
            ],
        )
        .await?;

    if updated == 0 {
        return Err(DbError::NotFound { incident_id });
    }

    Ok(())
}

/// Records a vote and recomputes reliability in one transaction.
///
/// The incident row is locked first, so concurrent votes on the same
/// incident serialize and each recomputation sees the tally it just
/// wrote. Any failure rolls the whole sequence back. Deactivation is
/// sticky: an inactive incident never becomes active again.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the incident doesn't exist, or another
/// [`DbError`] if any step fails.
pub async fn cast_vote(
    db: &dyn Database,
    incident_id: i64,
    voter: &Voter,
    direction: VoteDirection,
) -> Result<Incident, DbError> {
    let txn = db.begin_transaction().await?;

    match apply_vote(txn.as_ref(), incident_id, voter, direction).await {
        Ok(incident) => {
            txn.commit().await?;
            Ok(incident)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                log::error!("Failed to roll back vote on incident {incident_id}: {rollback_err}");
            }
            Err(e)
        }
    }
}

async fn apply_vote(
    db: &dyn Database,
    incident_id: i64,
    voter: &Voter,
    direction: VoteDirection,
) -> Result<Incident, DbError> {
    let was_active = lock_incident(db, incident_id).await?;
    let tally = record_vote(db, incident_id, voter, direction.is_confirmed()).await?;
    let outcome = reliability::evaluate(was_active, tally);

    set_reliability(db, incident_id, outcome.score, outcome.active).await?;

    if was_active && !outcome.active {
        log::info!(
            "Incident {incident_id} deactivated (up={}, down={}, score={:.2})",
            tally.up,
            tally.down,
            outcome.score
        );
    }

    get_incident(db, incident_id)
        .await?
        .ok_or(DbError::NotFound { incident_id })
}

/// Takes a row lock on the incident and returns its current active flag.
async fn lock_incident(db: &dyn Database, incident_id: i64) -> Result<bool, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT active FROM incidents WHERE id = $1 FOR UPDATE",
            &[DatabaseValue::Int64(incident_id)],
        )
        .await?;

    let row = rows.first().ok_or(DbError::NotFound { incident_id })?;
    active_from_row(row)
}

/// Decodes the `active` column. A missing or undecodable flag is an error,
/// never a default, since treating it as active would undo a deactivation.
fn active_from_row(row: &Row) -> Result<bool, DbError> {
    row.to_value("active").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse active flag: {e}"),
    })
}

fn incident_from_row(row: &Row) -> Result<Incident, DbError> {
    let id: i64 = row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse incident id: {e}"),
    })?;

    let type_name: String = row.to_value("type").unwrap_or_default();
    let incident_type = type_name
        .parse::<IncidentType>()
        .map_err(|_| DbError::Conversion {
            message: format!("Unknown incident type {type_name:?} on incident {id}"),
        })?;

    let longitude: f64 = row.to_value("longitude").unwrap_or(f64::NAN);
    let latitude: f64 = row.to_value("latitude").unwrap_or(f64::NAN);
    let location = GeoPoint::new(longitude, latitude).map_err(|e| DbError::Conversion {
        message: format!("Incident {id}: {e}"),
    })?;

    let created_at: NaiveDateTime = row.to_value("created_at").unwrap_or_default();

    Ok(Incident {
        id,
        incident_type,
        location,
        description: row.to_value("description").unwrap_or_default(),
        created_at: to_utc(created_at),
        reported_by: row.to_value("reported_by").unwrap_or(None),
        active: active_from_row(row)?,
        reliability_score: row.to_value("reliability_score").unwrap_or(1.0),
        votes: tally_from_row(row)?,
    })
}

fn tally_from_row(row: &Row) -> Result<VoteTally, DbError> {
    let count = |column: &str| -> Result<u32, DbError> {
        let value: i64 = row.to_value(column).unwrap_or(0);
        u32::try_from(value).map_err(|_| DbError::Conversion {
            message: format!("Vote count {value} out of range for {column}"),
        })
    };

    Ok(VoteTally::new(count("up_votes")?, count("down_votes")?))
}

fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(columns: Vec<(&str, DatabaseValue)>) -> Row {
        Row {
            columns: columns
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    #[test]
    fn active_flag_is_read_as_stored() {
        let inactive = row(vec![("active", DatabaseValue::Bool(false))]);
        assert!(!active_from_row(&inactive).unwrap());

        let active = row(vec![("active", DatabaseValue::Bool(true))]);
        assert!(active_from_row(&active).unwrap());
    }

    #[test]
    fn missing_active_flag_is_an_error() {
        let without_flag = row(vec![("id", DatabaseValue::Int64(1))]);
        assert!(matches!(
            active_from_row(&without_flag),
            Err(DbError::Conversion { .. })
        ));
    }

    #[test]
    fn tally_reads_counts() {
        let counts = row(vec![
            ("up_votes", DatabaseValue::Int64(2)),
            ("down_votes", DatabaseValue::Int64(5)),
        ]);
        assert_eq!(tally_from_row(&counts).unwrap(), VoteTally::new(2, 5));

        let negative = row(vec![
            ("up_votes", DatabaseValue::Int64(-1)),
            ("down_votes", DatabaseValue::Int64(0)),
        ]);
        assert!(matches!(
            tally_from_row(&negative),
            Err(DbError::Conversion { .. })
        ));
    }
}
