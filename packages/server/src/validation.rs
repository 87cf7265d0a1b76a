//! Request validation.
//!
//! Everything here runs before the store is touched, so a rejected request
//! never causes a partial mutation.

use road_watch_incident_models::{BoundingBox, GeoPoint, IncidentType, NewIncident, VoteDirection};
use road_watch_server_models::{CreateIncidentRequest, FeedQueryParams};
use serde_json::Value;

use crate::error::ApiError;

/// Default search radius in kilometers.
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// Search radius ceiling in kilometers. Larger radii are clamped to it.
pub const MAX_RADIUS_KM: f64 = 100.0;

/// Validates a create request into a [`NewIncident`].
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if the type is missing or unknown, or
/// the location is not a valid `[longitude, latitude]` pair.
pub fn new_incident(
    request: CreateIncidentRequest,
    reported_by: Option<String>,
) -> Result<NewIncident, ApiError> {
    Ok(NewIncident {
        incident_type: incident_type(request.incident_type.as_deref())?,
        location: location(request.location.as_ref())?,
        description: request.description.unwrap_or_default().trim().to_string(),
        reported_by,
    })
}

/// # Errors
///
/// Returns [`ApiError::Validation`] if `raw` is missing or not one of the
/// known incident types.
pub fn incident_type(raw: Option<&str>) -> Result<IncidentType, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("type is required".to_string()))?;

    raw.to_ascii_lowercase().parse().map_err(|_| {
        let allowed: Vec<&str> = IncidentType::all().iter().map(AsRef::as_ref).collect();
        ApiError::Validation(format!(
            "invalid type {raw:?}, expected one of {}",
            allowed.join(", ")
        ))
    })
}

/// Validates a `[longitude, latitude]` array.
///
/// Unlike [`GeoPoint::from_json`], which accepts any known coordinate
/// shape, the API contract is strictly a two-element numeric array.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if the value is missing, not a
/// two-element array of numbers, or out of range.
pub fn location(raw: Option<&Value>) -> Result<GeoPoint, ApiError> {
    let invalid = || ApiError::Validation("location must be [longitude, latitude]".to_string());

    let items = raw.and_then(Value::as_array).ok_or_else(invalid)?;
    let [longitude, latitude] = items.as_slice() else {
        return Err(invalid());
    };

    let longitude = longitude.as_f64().ok_or_else(invalid)?;
    let latitude = latitude.as_f64().ok_or_else(invalid)?;

    GeoPoint::new(longitude, latitude).map_err(|e| ApiError::Validation(e.to_string()))
}

/// # Errors
///
/// Returns [`ApiError::Validation`] unless `raw` is `up` or `down`.
pub fn vote_direction(raw: Option<&str>) -> Result<VoteDirection, ApiError> {
    raw.map(str::trim)
        .and_then(|s| s.to_ascii_lowercase().parse().ok())
        .ok_or_else(|| ApiError::Validation("vote type must be \"up\" or \"down\"".to_string()))
}

/// # Errors
///
/// Returns [`ApiError::Validation`] if either coordinate is missing or out
/// of range.
pub fn query_point(longitude: Option<f64>, latitude: Option<f64>) -> Result<GeoPoint, ApiError> {
    let (Some(longitude), Some(latitude)) = (longitude, latitude) else {
        return Err(ApiError::Validation(
            "longitude and latitude are required".to_string(),
        ));
    };

    GeoPoint::new(longitude, latitude).map_err(|e| ApiError::Validation(e.to_string()))
}

/// Converts an optional radius in kilometers to meters, clamped to
/// [`MAX_RADIUS_KM`].
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if the radius is not a positive number.
pub fn radius_meters(radius_km: Option<f64>) -> Result<f64, ApiError> {
    let radius_km = radius_km.unwrap_or(DEFAULT_RADIUS_KM);

    if radius_km.is_nan() || radius_km <= 0.0 {
        return Err(ApiError::Validation(
            "radius must be a positive number of km".to_string(),
        ));
    }

    if radius_km > MAX_RADIUS_KM {
        log::debug!("Clamping search radius {radius_km} km to {MAX_RADIUS_KM} km");
        return Ok(MAX_RADIUS_KM * 1000.0);
    }

    Ok(radius_km * 1000.0)
}

/// Resolves the area for a merged feed request.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if neither a valid `bbox` nor a valid
/// center point is given.
pub fn feed_area(params: &FeedQueryParams) -> Result<BoundingBox, ApiError> {
    if let Some(bbox) = params.bbox.as_deref() {
        return BoundingBox::parse(bbox).ok_or_else(|| {
            ApiError::Validation("bbox must be west,south,east,north".to_string())
        });
    }

    let center = query_point(params.longitude, params.latitude)?;
    Ok(BoundingBox::around(center, radius_meters(params.radius)?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn incident_type_required_and_known() {
        assert!(matches!(incident_type(None), Err(ApiError::Validation(_))));
        assert!(matches!(incident_type(Some(" ")), Err(ApiError::Validation(_))));
        assert!(matches!(
            incident_type(Some("roadworks")),
            Err(ApiError::Validation(_))
        ));
        assert_eq!(incident_type(Some("Police")).unwrap(), IncidentType::Police);
    }

    #[test]
    fn location_must_be_pair() {
        assert!(location(None).is_err());
        assert!(location(Some(&json!([2.35]))).is_err());
        assert!(location(Some(&json!([2.35, 48.85, 10.0]))).is_err());
        assert!(location(Some(&json!({"lng": 2.35, "lat": 48.85}))).is_err());
        assert!(location(Some(&json!(["2.35", "48.85"]))).is_err());
        assert!(location(Some(&json!([200.0, 48.85]))).is_err());

        let point = location(Some(&json!([2.35, 48.85]))).unwrap();
        assert_eq!(point.to_array(), [2.35, 48.85]);
    }

    #[test]
    fn vote_direction_values() {
        assert_eq!(vote_direction(Some("up")).unwrap(), VoteDirection::Up);
        assert_eq!(vote_direction(Some("DOWN")).unwrap(), VoteDirection::Down);
        assert!(vote_direction(Some("maybe")).is_err());
        assert!(vote_direction(None).is_err());
    }

    #[test]
    fn radius_defaults_and_bounds() {
        assert!((radius_meters(None).unwrap() - 5_000.0).abs() < f64::EPSILON);
        assert!((radius_meters(Some(0.5)).unwrap() - 500.0).abs() < f64::EPSILON);
        assert!(radius_meters(Some(0.0)).is_err());
        assert!(radius_meters(Some(-1.0)).is_err());
        assert!(radius_meters(Some(f64::NAN)).is_err());
    }

    #[test]
    fn large_radius_is_clamped() {
        let max_meters = MAX_RADIUS_KM * 1000.0;
        assert!((radius_meters(Some(500.0)).unwrap() - max_meters).abs() < f64::EPSILON);
        assert!((radius_meters(Some(f64::INFINITY)).unwrap() - max_meters).abs() < f64::EPSILON);
        assert!((radius_meters(Some(100.0)).unwrap() - max_meters).abs() < f64::EPSILON);
    }

    #[test]
    fn feed_area_from_bbox_or_center() {
        let from_bbox = feed_area(&FeedQueryParams {
            bbox: Some("2.3,48.8,2.4,48.9".to_string()),
            ..FeedQueryParams::default()
        })
        .unwrap();
        assert_eq!(from_bbox, BoundingBox::new(2.3, 48.8, 2.4, 48.9));

        let from_center = feed_area(&FeedQueryParams {
            longitude: Some(2.35),
            latitude: Some(48.85),
            radius: Some(1.0),
            ..FeedQueryParams::default()
        })
        .unwrap();
        assert!(from_center.contains(GeoPoint::new(2.35, 48.85).unwrap()));

        assert!(feed_area(&FeedQueryParams::default()).is_err());
        assert!(
            feed_area(&FeedQueryParams {
                bbox: Some("nope".to_string()),
                ..FeedQueryParams::default()
            })
            .is_err()
        );
    }

    #[test]
    fn new_incident_trims_description() {
        let incident = new_incident(
            CreateIncidentRequest {
                incident_type: Some("hazard".to_string()),
                location: Some(json!([2.35, 48.85])),
                description: Some("  debris on lane 2 ".to_string()),
            },
            Some("user-1".to_string()),
        )
        .unwrap();
        assert_eq!(incident.description, "debris on lane 2");
        assert_eq!(incident.reported_by.as_deref(), Some("user-1"));
    }
}
