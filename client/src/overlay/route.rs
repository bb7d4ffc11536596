//! Route lines drawn from host-supplied paths: the preview of a planned
//! route and the path recorded during a drive

use super::{OverlayKind, layer_id, source_id};
use crate::geojson::{Feature, FeatureCollection, Geometry, LngLat};
use crate::layers::LayerSetSpec;
use crate::map::engine::{LayerKind, LayerSpec, MapEngine};
use crate::style;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteKind {
    Preview,
    Recorded,
}

#[derive(Clone, Copy, Debug)]
pub struct RouteLine {
    kind: RouteKind,
}

impl RouteLine {
    pub fn preview() -> Self {
        Self { kind: RouteKind::Preview }
    }

    pub fn recorded() -> Self {
        Self { kind: RouteKind::Recorded }
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    fn color(&self) -> &'static str {
        match self.kind {
            RouteKind::Preview => "#3b82f6",
            RouteKind::Recorded => "#22c55e",
        }
    }

    /// One line feature through `path`. Fewer than two points yields an
    /// empty collection since a line needs two vertices.
    pub fn path(path: &[LngLat]) -> FeatureCollection {
        if path.len() < 2 {
            return FeatureCollection::default();
        }
        FeatureCollection::new(vec![Feature {
            id: None,
            geometry: Geometry::line(path),
            properties: Default::default(),
        }])
    }
}

impl OverlayKind for RouteLine {
    type Filters = ();

    fn name(&self) -> &'static str {
        match self.kind {
            RouteKind::Preview => "route-preview",
            RouteKind::Recorded => "route-recorded",
        }
    }

    fn layer_set(&self, _engine: &dyn MapEngine) -> LayerSetSpec {
        let name = self.name();
        let source = source_id(name);
        let width = |base: f64| style::by_zoom(&[(8.0, base), (16.0, base * 2.5)]);

        let casing = LayerSpec::new(layer_id(name, "casing"), LayerKind::Line, &source)
            .layout("line-join", "round")
            .layout("line-cap", "round")
            .paint("line-color", "#0f172a")
            .paint("line-width", width(6.0))
            .paint("line-opacity", 0.6);
        let mut main = LayerSpec::new(layer_id(name, "main"), LayerKind::Line, &source)
            .layout("line-join", "round")
            .layout("line-cap", "round")
            .paint("line-color", self.color())
            .paint("line-width", width(3.0));
        if self.kind == RouteKind::Preview {
            main = main.paint("line-dasharray", serde_json::json!(["literal", [2, 1]]));
        }
        let plain = LayerSpec::new(layer_id(name, "main"), LayerKind::Line, &source)
            .paint("line-color", self.color())
            .paint("line-width", 4);

        LayerSetSpec::new(&source, vec![casing, main]).with_fallback(vec![plain])
    }
}
