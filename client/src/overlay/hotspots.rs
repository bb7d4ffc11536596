//! Enforcement hotspots, shaded by how many stops cluster there

use serde_json::{Value, json};

use super::{OverlayKind, layer_id, source_id};
use crate::layers::LayerSetSpec;
use crate::map::engine::{LayerKind, LayerSpec, MapEngine};
use crate::style;

const NAME: &str = "hotspots";
const COUNT: &str = "count";
const ZOOM_SCALE: &[(f64, f64)] = &[(6.0, 1.0), (14.0, 2.5)];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HotspotFilters {
    pub year: Option<i32>,
    pub min_count: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Hotspots;

fn severity_color() -> Value {
    style::interpolate_linear(
        style::get_or(COUNT, 0),
        &[(1.0, json!("#fde047")), (25.0, json!("#f97316")), (100.0, json!("#dc2626"))],
    )
}

impl OverlayKind for Hotspots {
    type Filters = HotspotFilters;

    fn name(&self) -> &'static str {
        NAME
    }

    fn layer_set(&self, _engine: &dyn MapEngine) -> LayerSetSpec {
        let source = source_id(NAME);
        let glow = LayerSpec::new(layer_id(NAME, "glow"), LayerKind::Circle, &source)
            .paint(
                "circle-radius",
                style::zoom_and_count_scaled(COUNT, ZOOM_SCALE, &[(1.0, 12.0), (100.0, 28.0)]),
            )
            .paint("circle-color", severity_color())
            .paint("circle-opacity", 0.2)
            .paint("circle-blur", 0.8);
        let main = LayerSpec::new(layer_id(NAME, "main"), LayerKind::Circle, &source)
            .paint(
                "circle-radius",
                style::zoom_and_count_scaled(COUNT, ZOOM_SCALE, &[(1.0, 5.0), (100.0, 12.0)]),
            )
            .paint("circle-color", severity_color())
            .paint("circle-stroke-color", "#111827")
            .paint("circle-stroke-width", 1);
        let label = LayerSpec::new(layer_id(NAME, "label"), LayerKind::Symbol, &source)
            .layout("text-field", json!(["to-string", style::get_or(COUNT, 0)]))
            .layout("text-size", 10)
            .paint("text-color", "#111827")
            .minzoom(11.0);
        let plain = LayerSpec::new(layer_id(NAME, "main"), LayerKind::Circle, &source)
            .paint("circle-radius", 8)
            .paint("circle-color", "#f97316");

        LayerSetSpec::new(&source, vec![glow, main, label]).with_fallback(vec![plain])
    }

    fn endpoint(&self) -> Option<&'static str> {
        Some("api/hotspots")
    }

    fn query(&self, filters: &HotspotFilters) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(year) = filters.year {
            query.push(("year", year.to_string()));
        }
        if let Some(min) = filters.min_count {
            query.push(("minCount", min.to_string()));
        }
        query
    }

    fn nested_properties(&self) -> &'static [&'static str] {
        &["peakHours", "methods", "hourlyDistribution"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::retained::RetainedMap;

    #[test]
    fn severity_ramp_is_monotonic() {
        let ramp = severity_color();
        let stops: Vec<f64> = ramp.as_array().unwrap()[3..]
            .iter()
            .step_by(2)
            .filter_map(Value::as_f64)
            .collect();
        assert_eq!(stops, vec![1.0, 25.0, 100.0]);
    }

    #[test]
    fn label_only_shows_when_zoomed_in() {
        let spec = Hotspots.layer_set(&RetainedMap::default());
        assert_eq!(spec.layers[2].minzoom, Some(11.0));
    }
}
