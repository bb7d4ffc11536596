//! Click payloads handed to popup and panel consumers

use log::debug;
use serde_json::{Map, Value};

use crate::geojson::{Feature, LngLat};

/// What a popup receives when a feature is clicked
#[derive(Clone, Debug, PartialEq)]
pub struct ClickEvent {
    /// Name of the overlay the feature belongs to
    pub overlay: &'static str,
    pub feature_id: Option<String>,
    pub properties: Map<String, Value>,
    pub coordinates: LngLat,
}

impl ClickEvent {
    /// Build the payload for a clicked feature. Point features report their
    /// own coordinates; anything else reports where the pointer was.
    pub fn from_feature(
        overlay: &'static str,
        feature: &Feature,
        pointer: LngLat,
        nested: &[&str],
    ) -> Self {
        let mut properties = feature.properties.clone();
        coerce_properties(&mut properties, nested);
        let coordinates = feature.geometry.point_position().unwrap_or(pointer);
        Self {
            overlay,
            feature_id: feature.stable_id(),
            properties,
            coordinates,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// Replace stringified JSON sub-structures named in `nested` with their
/// parsed value. Engines flatten arrays and objects to strings when they
/// hand features back; values that do not parse stay as the raw string.
pub fn coerce_properties(properties: &mut Map<String, Value>, nested: &[&str]) {
    for key in nested {
        let Some(Value::String(raw)) = properties.get(*key) else {
            continue;
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ (Value::Array(_) | Value::Object(_))) => {
                properties.insert(key.to_string(), parsed);
            }
            Ok(_) => {}
            Err(e) => debug!("leaving {key} unparsed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::Geometry;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn stringified_arrays_are_parsed() {
        let mut p = props(json!({ "activeHours": "[7, 8, 17]", "name": "[not json" }));
        coerce_properties(&mut p, &["activeHours", "name"]);
        assert_eq!(p["activeHours"], json!([7, 8, 17]));
        assert_eq!(p["name"], "[not json");
    }

    #[test]
    fn malformed_value_stays_raw() {
        let mut p = props(json!({ "peakHours": "{oops" }));
        coerce_properties(&mut p, &["peakHours"]);
        assert_eq!(p["peakHours"], "{oops");
    }

    #[test]
    fn scalars_in_strings_are_not_coerced() {
        let mut p = props(json!({ "methods": "42", "hourlyDistribution": [1, 2] }));
        coerce_properties(&mut p, &["methods", "hourlyDistribution"]);
        assert_eq!(p["methods"], "42");
        assert_eq!(p["hourlyDistribution"], json!([1, 2]));
    }

    #[test]
    fn line_features_report_pointer_position() {
        let feature = Feature {
            id: None,
            geometry: Geometry::line(&[LngLat::new(0.0, 0.0), LngLat::new(1.0, 1.0)]),
            properties: props(json!({ "id": 9, "stopCount": "14" })),
        };
        let event = ClickEvent::from_feature("route-preview", &feature, LngLat::new(0.5, 0.5), &[]);
        assert_eq!(event.coordinates, LngLat::new(0.5, 0.5));
        assert_eq!(event.feature_id.as_deref(), Some("9"));
        assert_eq!(event.number("stopCount"), Some(14.0));
    }
}
