//! Enforcement patterns discovered by the clustering jobs

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{OverlayKind, layer_id, source_id};
use crate::layers::LayerSetSpec;
use crate::map::engine::{LayerKind, LayerSpec, MapEngine};
use crate::style::{self, DEFAULT_PATTERN_COLOR, PATTERN_COLORS};

const NAME: &str = "patterns";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Stops concentrated in the same hours across many locations
    TimeCluster,
    /// Locations dominated by one detection method
    MethodZone,
    /// End-of-month spikes
    QuotaEffect,
    /// Locations active on specific weekdays
    DayPattern,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeCluster => "time_cluster",
            Self::MethodZone => "method_zone",
            Self::QuotaEffect => "quota_effect",
            Self::DayPattern => "day_pattern",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatternFilters {
    pub pattern_id: Option<String>,
    pub pattern_type: Option<PatternType>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Patterns;

impl OverlayKind for Patterns {
    type Filters = PatternFilters;

    fn name(&self) -> &'static str {
        NAME
    }

    fn layer_set(&self, _engine: &dyn MapEngine) -> LayerSetSpec {
        let source = source_id(NAME);
        let color =
            style::match_table(style::get("patternType"), PATTERN_COLORS, DEFAULT_PATTERN_COLOR);
        let confidence = style::interpolate_linear(
            style::get_or("confidence", 0.5),
            &style::stops(&[(0.5, 0.45), (0.95, 0.95)]),
        );

        let glow = LayerSpec::new(layer_id(NAME, "glow"), LayerKind::Circle, &source)
            .paint("circle-radius", style::by_zoom(&[(8.0, 10.0), (16.0, 26.0)]))
            .paint("circle-color", color.clone())
            .paint("circle-opacity", 0.2)
            .paint("circle-blur", 0.7);
        let main = LayerSpec::new(layer_id(NAME, "main"), LayerKind::Circle, &source)
            .paint("circle-radius", style::by_zoom(&[(8.0, 4.0), (16.0, 10.0)]))
            .paint("circle-color", color)
            .paint("circle-opacity", confidence)
            .paint("circle-stroke-color", "#0f172a")
            .paint("circle-stroke-width", 1);
        let label = LayerSpec::new(layer_id(NAME, "label"), LayerKind::Symbol, &source)
            .layout("text-field", style::get_or("name", ""))
            .layout("text-size", 11)
            .layout("text-anchor", "top")
            .paint("text-color", "#e2e8f0")
            .minzoom(13.0);
        let plain = LayerSpec::new(layer_id(NAME, "main"), LayerKind::Circle, &source)
            .paint("circle-radius", 6)
            .paint("circle-color", DEFAULT_PATTERN_COLOR);

        LayerSetSpec::new(&source, vec![glow, main, label]).with_fallback(vec![plain])
    }

    fn endpoint(&self) -> Option<&'static str> {
        Some("api/patterns")
    }

    fn query(&self, filters: &PatternFilters) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(id) = &filters.pattern_id {
            query.push(("patternId", id.clone()));
        }
        if let Some(kind) = filters.pattern_type {
            query.push(("type", kind.to_string()));
        }
        query
    }

    fn nested_properties(&self) -> &'static [&'static str] {
        &["peak_hours", "peakHours", "hourlyDistribution", "methods"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pattern_types_use_wire_names() {
        assert_eq!(serde_json::to_value(PatternType::QuotaEffect).unwrap(), json!("quota_effect"));
        let parsed: PatternType = serde_json::from_value(json!("day_pattern")).unwrap();
        assert_eq!(parsed, PatternType::DayPattern);
    }

    #[test]
    fn every_pattern_type_has_a_color() {
        for kind in [
            PatternType::TimeCluster,
            PatternType::MethodZone,
            PatternType::QuotaEffect,
            PatternType::DayPattern,
        ] {
            assert!(PATTERN_COLORS.iter().any(|(key, _)| *key == kind.as_str()));
        }
    }

    #[test]
    fn selected_pattern_goes_into_query() {
        let filters = PatternFilters {
            pattern_id: Some("time_cluster_3".into()),
            pattern_type: Some(PatternType::TimeCluster),
        };
        assert_eq!(
            Patterns.query(&filters),
            vec![("patternId", "time_cluster_3".to_string()), ("type", "time_cluster".to_string())]
        );
    }
}
