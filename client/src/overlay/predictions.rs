//! Risk predictions: a heatmap at low zoom that cross-fades into individual
//! circles as the user zooms in

use serde_json::json;

use super::{OverlayKind, layer_id, source_id};
use crate::layers::LayerSetSpec;
use crate::map::engine::{LayerKind, LayerSpec, MapEngine};
use crate::style;

const NAME: &str = "predictions";
const RISK: &str = "risk";

/// Zoom window over which the heatmap hands over to the circle layer
pub const FADE_START: f64 = 12.0;
pub const FADE_END: f64 = 14.0;

/// Hour of day (0-23) and day of week (0-6, Sunday first) to predict for
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PredictionFilters {
    hour: u8,
    day: u8,
}

impl PredictionFilters {
    /// Out-of-range values are clamped
    pub fn new(hour: u8, day: u8) -> Self {
        Self {
            hour: hour.min(23),
            day: day.min(6),
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn day(&self) -> u8 {
        self.day
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Predictions;

fn risk_color() -> serde_json::Value {
    style::interpolate_linear(
        style::get_or(RISK, 0),
        &[(0.0, json!("#22c55e")), (0.5, json!("#eab308")), (1.0, json!("#dc2626"))],
    )
}

impl OverlayKind for Predictions {
    type Filters = PredictionFilters;

    fn name(&self) -> &'static str {
        NAME
    }

    fn layer_set(&self, _engine: &dyn MapEngine) -> LayerSetSpec {
        let source = source_id(NAME);
        let weight = style::interpolate_linear(
            style::get_or(RISK, 0),
            &style::stops(&[(0.0, 0.0), (1.0, 1.0)]),
        );
        let heat = LayerSpec::new(layer_id(NAME, "heat"), LayerKind::Heatmap, &source)
            .paint("heatmap-weight", weight)
            .paint("heatmap-intensity", style::by_zoom(&[(6.0, 1.0), (FADE_END, 3.0)]))
            .paint("heatmap-radius", style::by_zoom(&[(6.0, 8.0), (FADE_END, 30.0)]))
            .paint(
                "heatmap-color",
                style::interpolate_linear(
                    json!(["heatmap-density"]),
                    &[
                        (0.0, json!("rgba(0,0,0,0)")),
                        (0.3, json!("#22c55e")),
                        (0.6, json!("#eab308")),
                        (1.0, json!("#dc2626")),
                    ],
                ),
            )
            .paint("heatmap-opacity", style::zoom_fade(FADE_START, FADE_END, false));
        let points = LayerSpec::new(layer_id(NAME, "points"), LayerKind::Circle, &source)
            .paint("circle-radius", style::by_zoom(&[(FADE_START, 4.0), (18.0, 10.0)]))
            .paint("circle-color", risk_color())
            .paint("circle-opacity", style::zoom_fade(FADE_START, FADE_END, true))
            .paint("circle-stroke-color", "#ffffff")
            .paint("circle-stroke-width", 1);
        // Renderers without heatmap support only get the circles
        let plain = LayerSpec::new(layer_id(NAME, "points"), LayerKind::Circle, &source)
            .paint("circle-radius", 6)
            .paint("circle-color", "#eab308")
            .paint("circle-opacity", 0.8);

        LayerSetSpec::new(&source, vec![heat, points]).with_fallback(vec![plain])
    }

    fn interactive_layer(&self) -> String {
        layer_id(NAME, "points")
    }

    fn endpoint(&self) -> Option<&'static str> {
        Some("api/predictions")
    }

    fn query(&self, filters: &PredictionFilters) -> Vec<(&'static str, String)> {
        vec![("hour", filters.hour.to_string()), ("day", filters.day.to_string())]
    }

    fn nested_properties(&self) -> &'static [&'static str] {
        &["hourlyDistribution", "methods", "factors"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::FeatureCollection;
    use crate::layers::{LayerSetStatus, ensure_layer_set};
    use crate::map::engine::Visibility;
    use crate::map::retained::RetainedMap;

    #[test]
    fn filters_are_clamped() {
        let filters = PredictionFilters::new(30, 9);
        assert_eq!((filters.hour(), filters.day()), (23, 6));
    }

    #[test]
    fn layers_cross_fade_over_the_same_zoom_window() {
        let spec = Predictions.layer_set(&RetainedMap::default());
        let fade = |fade_in| style::zoom_fade(FADE_START, FADE_END, fade_in);
        assert_eq!(spec.layers[0].paint["heatmap-opacity"], fade(false));
        assert_eq!(spec.layers[1].paint["circle-opacity"], fade(true));
    }

    #[test]
    fn heatmap_refusal_falls_back_to_circles() {
        let mut engine = RetainedMap::default();
        engine.reject_kind(LayerKind::Heatmap);
        let spec = Predictions.layer_set(&engine);

        let status =
            ensure_layer_set(&mut engine, &spec, FeatureCollection::default, Visibility::Visible)
                .unwrap();

        assert_eq!(status, LayerSetStatus::CreatedFallback);
        assert_eq!(engine.layer_ids(), vec!["predictions-points"]);
    }
}
