//! Geographic point and bounding box utilities.
//!
//! Incident coordinates arrive in several shapes: `[lon, lat]` arrays from
//! the mobile client, `GeoJSON` geometries from the traffic feed, objects
//! with `latitude`/`longitude` (or `lat`/`lng`) keys, and WKT strings from
//! `PostGIS`. Everything is normalized into a [`GeoPoint`], which always
//! serializes as `[longitude, latitude]`.

use geo::{Destination, Geodesic, Point};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A WGS84 point, always ordered `[longitude, latitude]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 2]", try_from = "[f64; 2]")]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

/// Error returned when a coordinate pair is not a valid WGS84 location.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error(
    "invalid location [{longitude}, {latitude}]: expected longitude in -180..180 and latitude in -90..90"
)]
pub struct InvalidLocationError {
    /// The rejected longitude.
    pub longitude: f64,
    /// The rejected latitude.
    pub latitude: f64,
}

impl GeoPoint {
    /// Creates a point from a longitude and latitude.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLocationError`] if either value is not finite or is
    /// outside the WGS84 range.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, InvalidLocationError> {
        if longitude.is_finite()
            && latitude.is_finite()
            && (-180.0..=180.0).contains(&longitude)
            && (-90.0..=90.0).contains(&latitude)
        {
            Ok(Self {
                longitude,
                latitude,
            })
        } else {
            Err(InvalidLocationError {
                longitude,
                latitude,
            })
        }
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(self) -> f64 {
        self.longitude
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(self) -> f64 {
        self.latitude
    }

    /// Returns the canonical `[longitude, latitude]` pair.
    #[must_use]
    pub const fn to_array(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Converts into a `geo` point (x = longitude, y = latitude).
    #[must_use]
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Normalizes any of the supported coordinate representations.
    ///
    /// Accepted shapes:
    ///
    /// * `[lon, lat]` (extra elements such as altitude are ignored)
    /// * `GeoJSON` geometries or anything with a `coordinates` member; for
    ///   line and polygon geometries the first vertex is used
    /// * Features with a `geometry` member
    /// * Objects keyed `longitude`/`latitude`, `lng`/`lat`, `lon`/`lat` or
    ///   `x`/`y`
    /// * WKT `POINT(lon lat)`, optionally prefixed with `SRID=4326;`
    ///
    /// Numbers encoded as strings are accepted. Returns `None` when nothing
    /// resolvable is found or the coordinates are out of range.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Self::from_coordinates(items),
            Value::Object(map) => {
                if let Some(coordinates) = map.get("coordinates") {
                    return coordinates
                        .as_array()
                        .and_then(|items| Self::from_coordinates(items));
                }
                if let Some(geometry) = map.get("geometry") {
                    return Self::from_json(geometry);
                }
                let longitude = ["longitude", "lng", "lon", "x"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(as_number))?;
                let latitude = ["latitude", "lat", "y"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(as_number))?;
                Self::new(longitude, latitude).ok()
            }
            Value::String(s) => Self::parse_wkt(s),
            _ => None,
        }
    }

    /// Parses a WKT `POINT(lon lat)` string.
    #[must_use]
    pub fn parse_wkt(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s
            .split_once(';')
            .filter(|(prefix, _)| prefix.to_ascii_uppercase().starts_with("SRID="))
            .map_or(s, |(_, rest)| rest.trim());

        let upper = s.to_ascii_uppercase();
        let body = upper.strip_prefix("POINT")?.trim();
        let inner = body.strip_prefix('(')?.strip_suffix(')')?;

        let mut parts = inner.split_whitespace();
        let longitude: f64 = parts.next()?.parse().ok()?;
        let latitude: f64 = parts.next()?.parse().ok()?;
        Self::new(longitude, latitude).ok()
    }

    fn from_coordinates(items: &[Value]) -> Option<Self> {
        match items.first()? {
            // Nested rings/lines: descend into the first vertex.
            Value::Array(first) => Self::from_coordinates(first),
            first => {
                let longitude = as_number(first)?;
                let latitude = as_number(items.get(1)?)?;
                Self::new(longitude, latitude).ok()
            }
        }
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(point: GeoPoint) -> Self {
        point.to_array()
    }
}

impl TryFrom<[f64; 2]> for GeoPoint {
    type Error = InvalidLocationError;

    fn try_from([longitude, latitude]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(longitude, latitude)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Returns the smallest box that covers a circle of `radius_meters`
    /// around `center`.
    ///
    /// Edges are found with geodesic destination points due north, south,
    /// east and west of the center. A circle that reaches a pole or the
    /// antimeridian is clamped to the full latitude/longitude range on that
    /// side.
    #[must_use]
    pub fn around(center: GeoPoint, radius_meters: f64) -> Self {
        let origin = center.to_point();
        let lon = center.longitude();
        let lat = center.latitude();

        let north = Geodesic.destination(origin, 0.0, radius_meters);
        let east = Geodesic.destination(origin, 90.0, radius_meters);
        let south = Geodesic.destination(origin, 180.0, radius_meters);
        let west = Geodesic.destination(origin, 270.0, radius_meters);

        let north = if north.y() >= lat { north.y() } else { 90.0 };
        let south = if south.y() <= lat { south.y() } else { -90.0 };
        let crosses_pole = north >= 90.0 || south <= -90.0;

        let (west, east) = if crosses_pole || east.x() < lon || west.x() > lon {
            (-180.0, 180.0)
        } else {
            (west.x(), east.x())
        };

        Self::new(west, south.max(-90.0), east, north.min(90.0))
    }

    /// Parses a `"west,south,east,north"` string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<f64> = s.split(',').filter_map(|p| p.trim().parse().ok()).collect();
        match parts[..] {
            [west, south, east, north]
                if parts.iter().all(|v| v.is_finite()) && south <= north =>
            {
                Some(Self::new(west, south, east, north))
            }
            _ => None,
        }
    }

    /// Formats as `"west,south,east,north"`, the shape feed providers expect.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }

    /// Whether the box contains `point` (edges inclusive).
    ///
    /// A box with `west > east` crosses the antimeridian and covers the
    /// longitudes east of `west` and west of `east`.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        let lon = point.longitude();
        let within_lon = if self.west <= self.east {
            (self.west..=self.east).contains(&lon)
        } else {
            lon >= self.west || lon <= self.east
        };

        within_lon && (self.south..=self.north).contains(&point.latitude())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert!(GeoPoint::new(181.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -90.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(f64::INFINITY, 0.0).is_err());
        assert!(GeoPoint::new(-180.0, 90.0).is_ok());
    }

    #[test]
    fn normalizes_supported_shapes() {
        let expected = GeoPoint::new(2.35, 48.85).unwrap();
        let shapes = [
            json!([2.35, 48.85]),
            json!(["2.35", "48.85"]),
            json!([2.35, 48.85, 35.0]),
            json!({"type": "Point", "coordinates": [2.35, 48.85]}),
            json!({"type": "LineString", "coordinates": [[2.35, 48.85], [2.36, 48.86]]}),
            json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}}),
            json!({"longitude": 2.35, "latitude": 48.85}),
            json!({"lng": 2.35, "lat": 48.85}),
            json!({"lon": "2.35", "lat": "48.85"}),
            json!({"x": 2.35, "y": 48.85}),
            json!("POINT(2.35 48.85)"),
            json!("SRID=4326;POINT (2.35 48.85)"),
        ];
        for shape in &shapes {
            assert_eq!(GeoPoint::from_json(shape), Some(expected), "shape {shape}");
        }
    }

    #[test]
    fn unresolvable_shapes_are_none() {
        for shape in [
            json!(null),
            json!([]),
            json!([2.35]),
            json!({"coordinates": null}),
            json!({"lat": 48.85}),
            json!("LINESTRING(0 0, 1 1)"),
            json!([200.0, 10.0]),
            json!(true),
        ] {
            assert_eq!(GeoPoint::from_json(&shape), None, "shape {shape}");
        }
    }

    #[test]
    fn serializes_as_lon_lat_array() {
        let point = GeoPoint::new(-87.6278, 41.8827).unwrap();
        assert_eq!(serde_json::to_value(point).unwrap(), json!([-87.6278, 41.8827]));

        let parsed: GeoPoint = serde_json::from_value(json!([-87.6278, 41.8827])).unwrap();
        assert_eq!(parsed, point);
        assert!(serde_json::from_value::<GeoPoint>(json!([0.0, 95.0])).is_err());
    }

    #[test]
    fn bounding_box_covers_radius() {
        let center = GeoPoint::new(2.35, 48.85).unwrap();
        let bbox = BoundingBox::around(center, 5_000.0);

        assert!(bbox.contains(center));
        // ~4.5km north and east stay inside, ~6km north does not.
        assert!(bbox.contains(GeoPoint::new(2.35, 48.89).unwrap()));
        assert!(bbox.contains(GeoPoint::new(2.41, 48.85).unwrap()));
        assert!(!bbox.contains(GeoPoint::new(2.35, 48.91).unwrap()));
        // One degree of latitude is ~111km, so 5km is ~0.045 degrees.
        assert!((bbox.north - bbox.south - 0.09).abs() < 0.005);
    }

    #[test]
    fn bounding_box_near_pole_is_clamped() {
        let center = GeoPoint::new(10.0, 89.99).unwrap();
        let bbox = BoundingBox::around(center, 10_000.0);
        assert!((bbox.north - 90.0).abs() < f64::EPSILON);
        assert!((bbox.west - -180.0).abs() < f64::EPSILON);
        assert!((bbox.east - 180.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bounding_box_query_string_roundtrip() {
        let bbox = BoundingBox::new(-87.7, 41.8, -87.6, 41.9);
        assert_eq!(BoundingBox::parse(&bbox.to_query_string()), Some(bbox));
        assert_eq!(BoundingBox::parse("1,2,3"), None);
        assert_eq!(BoundingBox::parse("0,10,1,5"), None);
    }

    #[test]
    fn bounding_box_across_antimeridian() {
        let bbox = BoundingBox::parse("170,-10,-170,10").unwrap();

        assert!(bbox.contains(GeoPoint::new(178.0, -1.0).unwrap()));
        assert!(bbox.contains(GeoPoint::new(-175.0, 5.0).unwrap()));
        assert!(bbox.contains(GeoPoint::new(180.0, 0.0).unwrap()));
        assert!(!bbox.contains(GeoPoint::new(0.0, 0.0).unwrap()));
        assert!(!bbox.contains(GeoPoint::new(178.0, 20.0).unwrap()));
    }

    #[test]
    fn invalid_location_message() {
        let err = GeoPoint::new(200.0, 10.0).unwrap_err();
        assert!((err.longitude - 200.0).abs() < f64::EPSILON);
        assert!(err.to_string().starts_with("invalid location [200, 10]"));
    }
}
