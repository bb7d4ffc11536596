//! GeoJSON payloads bound to overlay sources
//!
//! Only the subset the overlays exchange with the backend is modelled: point
//! features for every fetched overlay and line strings for route paths.

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::MapError;

/// Geographic position in degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    fn from_position(position: [f64; 2]) -> Self {
        Self::new(position[0], position[1])
    }

    fn to_position(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point([f64; 2]),
    LineString(Vec<[f64; 2]>),
}

impl Geometry {
    pub fn point(at: LngLat) -> Self {
        Self::Point(at.to_position())
    }

    pub fn line(path: &[LngLat]) -> Self {
        Self::LineString(path.iter().map(|p| p.to_position()).collect())
    }

    pub fn point_position(&self) -> Option<LngLat> {
        match self {
            Self::Point(position) => Some(LngLat::from_position(*position)),
            Self::LineString(_) => None,
        }
    }

    /// Anchor used for popups: the point itself, or the first vertex of a line
    pub fn anchor(&self) -> Option<LngLat> {
        match self {
            Self::Point(position) => Some(LngLat::from_position(*position)),
            Self::LineString(path) => path.first().copied().map(LngLat::from_position),
        }
    }
}

/// Feature identifier as sent by the backend (any JSON number or a string)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Number(Number),
    Text(String),
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    pub geometry: Geometry,
    #[serde(default, deserialize_with = "nullable_properties")]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn point(id: impl Into<String>, at: LngLat) -> Self {
        Self {
            id: Some(FeatureId::Text(id.into())),
            geometry: Geometry::point(at),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Stable identifier: the feature id, else an `id` property
    pub fn stable_id(&self) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(id.to_string());
        }
        match self.properties.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn nullable_properties<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Features this crate cannot model (polygons, missing geometry) are
/// dropped one by one when decoding; the rest of the collection survives.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    #[serde(default, deserialize_with = "usable_features")]
    pub features: Vec<Feature>,
}

fn usable_features<'de, D>(deserializer: D) -> Result<Vec<Feature>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = raw.len();
    let features: Vec<Feature> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(feature) => Some(feature),
            Err(e) => {
                debug!("skipping feature: {e}");
                None
            }
        })
        .collect();
    if features.len() < total {
        debug!("kept {} of {total} features", features.len());
    }
    Ok(features)
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Decode a backend response: either a bare `FeatureCollection` or a
/// `{ success, data }` envelope wrapping one.
pub fn parse_payload(bytes: &[u8]) -> Result<FeatureCollection, MapError> {
    let value: Value = serde_json::from_slice(bytes)?;

    let Some(success) = value.get("success") else {
        return Ok(serde_json::from_value(value)?);
    };

    if !success.as_bool().unwrap_or(false) {
        return Err(MapError::Unsuccessful);
    }

    match value.get("data") {
        None | Some(Value::Null) => Ok(FeatureCollection::default()),
        Some(data) => Ok(FeatureCollection::deserialize(data)?),
    }
}
