//! Speed-trap markers coloured by detection method and sized by stop count

use serde_json::json;

use super::{OverlayKind, layer_id, source_id};
use crate::geojson::FeatureCollection;
use crate::layers::LayerSetSpec;
use crate::map::engine::{LayerKind, LayerSpec, MapEngine};
use crate::style::{self, DEFAULT_DETECTION_COLOR, DETECTION_COLORS};

/// Image name looked up on the engine before falling back to circles
pub const ICON: &str = "speed-trap";

const NAME: &str = "speed-traps";
const COUNT: &str = "stopCount";
const METHOD: &str = "detectionMethod";
/// Markers double in size between zoom 8 and 16
const ZOOM_SCALE: &[(f64, f64)] = &[(8.0, 1.0), (16.0, 2.0)];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpeedTrapFilters {
    pub year: Option<i32>,
    pub min_stops: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SpeedTraps;

impl SpeedTraps {
    /// The backend is inconsistent about case ("Radar", "radar")
    fn method_color() -> serde_json::Value {
        let method = style::downcase(style::get(METHOD));
        style::match_table(method, DETECTION_COLORS, DEFAULT_DETECTION_COLOR)
    }

    fn glow(source: &str) -> LayerSpec {
        LayerSpec::new(layer_id(NAME, "glow"), LayerKind::Circle, source)
            .paint(
                "circle-radius",
                style::zoom_and_count_scaled(
                    COUNT,
                    ZOOM_SCALE,
                    &[(1.0, 10.0), (50.0, 16.0), (200.0, 24.0)],
                ),
            )
            .paint("circle-color", Self::method_color())
            .paint("circle-opacity", 0.25)
            .paint("circle-blur", 0.6)
    }

    fn icon(source: &str) -> LayerSpec {
        LayerSpec::new(layer_id(NAME, "main"), LayerKind::Symbol, source)
            .layout("icon-image", ICON)
            .layout(
                "icon-size",
                style::interpolate_linear(
                    style::get_or(COUNT, 0),
                    &style::stops(&[(1.0, 0.6), (50.0, 0.9), (200.0, 1.2)]),
                ),
            )
            .layout("icon-allow-overlap", true)
            .paint("icon-color", Self::method_color())
    }

    fn circle(source: &str) -> LayerSpec {
        LayerSpec::new(layer_id(NAME, "main"), LayerKind::Circle, source)
            .paint(
                "circle-radius",
                style::zoom_and_count_scaled(
                    COUNT,
                    ZOOM_SCALE,
                    &[(1.0, 4.0), (50.0, 7.0), (200.0, 10.0)],
                ),
            )
            .paint("circle-color", Self::method_color())
            .paint("circle-stroke-color", "#ffffff")
            .paint("circle-stroke-width", 1.5)
    }

    fn label(source: &str) -> LayerSpec {
        LayerSpec::new(layer_id(NAME, "label"), LayerKind::Symbol, source)
            .layout("text-field", json!(["to-string", style::get_or(COUNT, 0)]))
            .layout("text-size", 11)
            .layout("text-offset", json!(["literal", [0, 1.6]]))
            .paint("text-color", "#ffffff")
            .paint("text-halo-color", Self::method_color())
            .paint("text-halo-width", 1.5)
            .minzoom(12.0)
    }
}

impl OverlayKind for SpeedTraps {
    type Filters = SpeedTrapFilters;

    fn name(&self) -> &'static str {
        NAME
    }

    fn layer_set(&self, engine: &dyn MapEngine) -> LayerSetSpec {
        let source = source_id(NAME);
        let main = if engine.has_image(ICON) {
            Self::icon(&source)
        } else {
            Self::circle(&source)
        };
        let plain = LayerSpec::new(layer_id(NAME, "main"), LayerKind::Circle, &source)
            .paint("circle-radius", 6)
            .paint("circle-color", DEFAULT_DETECTION_COLOR);

        LayerSetSpec::new(&source, vec![Self::glow(&source), main, Self::label(&source)])
            .with_fallback(vec![plain])
    }

    fn endpoint(&self) -> Option<&'static str> {
        Some("api/speed-traps")
    }

    fn query(&self, filters: &SpeedTrapFilters) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(year) = filters.year {
            query.push(("year", year.to_string()));
        }
        if let Some(min) = filters.min_stops {
            query.push(("minStops", min.to_string()));
        }
        query
    }

    /// Empty responses leave the markers in place so they do not vanish
    /// while panning across sparse regions
    fn accepts(&self, data: &FeatureCollection) -> bool {
        !data.is_empty()
    }

    fn nested_properties(&self) -> &'static [&'static str] {
        &["activeHours", "peakHours", "methods"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::retained::RetainedMap;
    use image::RgbaImage;

    #[test]
    fn circle_main_layer_without_icon() {
        let engine = RetainedMap::default();
        let spec = SpeedTraps.layer_set(&engine);
        assert_eq!(spec.layers[1].kind, LayerKind::Circle);
        assert_eq!(
            spec.layer_ids(),
            vec!["speed-traps-glow", "speed-traps-main", "speed-traps-label"]
        );
    }

    #[test]
    fn symbol_main_layer_with_registered_icon() {
        let mut engine = RetainedMap::default();
        engine.add_image(ICON, RgbaImage::new(4, 4)).unwrap();
        let spec = SpeedTraps.layer_set(&engine);
        assert_eq!(spec.layers[1].kind, LayerKind::Symbol);
        assert_eq!(spec.layers[1].layout["icon-image"], ICON);
    }

    #[test]
    fn glow_and_label_share_method_colors() {
        let spec = SpeedTraps.layer_set(&RetainedMap::default());
        let expected = SpeedTraps::method_color();
        assert_eq!(spec.layers[0].paint["circle-color"], expected);
        assert_eq!(spec.layers[2].paint["text-halo-color"], expected);
    }

    #[test]
    fn method_color_matches_lowercased_method() {
        let expr = SpeedTraps::method_color();
        let items = expr.as_array().unwrap();
        assert_eq!(items[1], serde_json::json!(["downcase", ["get", "detectionMethod"]]));
        assert!(DETECTION_COLORS.iter().all(|(key, _)| key.chars().all(|c| !c.is_uppercase())));
    }

    #[test]
    fn query_only_includes_set_filters() {
        let filters = SpeedTrapFilters {
            year: Some(2024),
            min_stops: None,
        };
        assert_eq!(SpeedTraps.query(&filters), vec![("year", "2024".to_string())]);
    }
}
