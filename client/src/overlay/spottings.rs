//! Car spottings posted by the community

use super::{OverlayKind, layer_id, source_id};
use crate::layers::LayerSetSpec;
use crate::map::engine::{LayerKind, LayerSpec, MapEngine};
use crate::style;

pub const ICON: &str = "car-spotting";

const NAME: &str = "spottings";
const ACCENT: &str = "#14b8a6";

/// Inclusive date range as `YYYY-MM-DD` strings, passed through verbatim
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpottingFilters {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Spottings;

impl OverlayKind for Spottings {
    type Filters = SpottingFilters;

    fn name(&self) -> &'static str {
        NAME
    }

    fn layer_set(&self, engine: &dyn MapEngine) -> LayerSetSpec {
        let source = source_id(NAME);
        let glow = LayerSpec::new(layer_id(NAME, "glow"), LayerKind::Circle, &source)
            .paint("circle-radius", style::by_zoom(&[(8.0, 8.0), (16.0, 18.0)]))
            .paint("circle-color", ACCENT)
            .paint("circle-opacity", 0.25)
            .paint("circle-blur", 0.5);
        let main = if engine.has_image(ICON) {
            LayerSpec::new(layer_id(NAME, "main"), LayerKind::Symbol, &source)
                .layout("icon-image", ICON)
                .layout("icon-size", style::by_zoom(&[(8.0, 0.5), (16.0, 1.0)]))
                .layout("icon-allow-overlap", true)
        } else {
            LayerSpec::new(layer_id(NAME, "main"), LayerKind::Circle, &source)
                .paint("circle-radius", style::by_zoom(&[(8.0, 4.0), (16.0, 8.0)]))
                .paint("circle-color", ACCENT)
                .paint("circle-stroke-color", "#ffffff")
                .paint("circle-stroke-width", 1.5)
        };
        let label = LayerSpec::new(layer_id(NAME, "label"), LayerKind::Symbol, &source)
            .layout("text-field", style::get_or("make", ""))
            .layout("text-size", 11)
            .layout("text-anchor", "top")
            .paint("text-color", "#ffffff")
            .paint("text-halo-color", ACCENT)
            .paint("text-halo-width", 1)
            .minzoom(14.0);
        let plain = LayerSpec::new(layer_id(NAME, "main"), LayerKind::Circle, &source)
            .paint("circle-radius", 6)
            .paint("circle-color", ACCENT);

        LayerSetSpec::new(&source, vec![glow, main, label]).with_fallback(vec![plain])
    }

    fn endpoint(&self) -> Option<&'static str> {
        Some("api/spottings")
    }

    fn query(&self, filters: &SpottingFilters) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(from) = &filters.from {
            query.push(("from", from.clone()));
        }
        if let Some(to) = &filters.to {
            query.push(("to", to.clone()));
        }
        query
    }

    fn nested_properties(&self) -> &'static [&'static str] {
        &["photos", "tags"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::retained::RetainedMap;

    #[test]
    fn date_range_maps_to_query() {
        let filters = SpottingFilters {
            from: Some("2025-01-01".into()),
            to: Some("2025-01-31".into()),
        };
        assert_eq!(
            Spottings.query(&filters),
            vec![("from", "2025-01-01".to_string()), ("to", "2025-01-31".to_string())]
        );
        assert!(Spottings.query(&SpottingFilters::default()).is_empty());
    }

    #[test]
    fn falls_back_to_circles_without_icon() {
        let spec = Spottings.layer_set(&RetainedMap::default());
        assert_eq!(spec.layers[1].kind, LayerKind::Circle);
    }
}
