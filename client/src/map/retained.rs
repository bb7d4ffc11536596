//! Retained-mode engine
//!
//! Keeps sources, layers, images, handlers and markers in memory and answers
//! hit tests through the Web-Mercator camera. It enforces the same contract
//! errors a GPU-backed engine raises (duplicate ids, missing sources, source
//! still in use, unsupported expressions), which makes it the engine used by
//! headless hosts and by the test suite.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use image::RgbaImage;
use log::debug;
use serde_json::Value;

use super::camera::{MapCamera, ScreenPoint, Viewport};
use super::engine::{
    Cursor, DragHandler, EngineMarkerId, EventHandler, EventKind, HandlerId, LayerKind, LayerSpec,
    MapEngine, MapEvent, MarkerOptions, MarkerStyle, RenderedFeature,
};
use crate::config::MapConfig;
use crate::error::MapError;
use crate::geojson::{FeatureCollection, Geometry, LngLat};

/// Expression operators understood by default
pub const KNOWN_OPERATORS: &[&str] = &[
    "get", "has", "literal", "match", "case", "coalesce", "step", "interpolate", "linear",
    "exponential", "zoom", "heatmap-density", "to-number", "to-string", "to-color", "rgba", "rgb",
    "concat", "downcase", "number-format", "==", "!=", ">", ">=", "<", "<=", "all", "any", "!",
    "+", "-", "*", "/", "min", "max",
];

struct Subscription {
    id: HandlerId,
    kind: EventKind,
    layer: String,
    handler: EventHandler,
}

pub struct StoredMarker {
    pub position: LngLat,
    pub style: MarkerStyle,
    pub draggable: bool,
    on_drag_end: Option<DragHandler>,
}

/// Counters exposed for assertions about engine churn
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EngineStats {
    pub sources_added: usize,
    pub layers_added: usize,
    pub data_updates: usize,
    pub markers_added: usize,
}

pub struct RetainedMap {
    camera: MapCamera,
    hit_radius: f32,
    sources: HashMap<String, FeatureCollection>,
    /// Bottom to top
    layers: Vec<LayerSpec>,
    images: HashMap<String, (u32, u32)>,
    subscriptions: Vec<Subscription>,
    markers: BTreeMap<u64, StoredMarker>,
    next_id: u64,
    cursor: Cursor,
    hovered: HashSet<String>,
    dragging: Option<EngineMarkerId>,
    supported_operators: HashSet<String>,
    rejected_kinds: HashSet<LayerKind>,
    stats: EngineStats,
}

impl RetainedMap {
    pub fn new(camera: MapCamera) -> Self {
        Self {
            camera,
            hit_radius: 12.0,
            sources: HashMap::new(),
            layers: Vec::new(),
            images: HashMap::new(),
            subscriptions: Vec::new(),
            markers: BTreeMap::new(),
            next_id: 1,
            cursor: Cursor::Default,
            hovered: HashSet::new(),
            dragging: None,
            supported_operators: KNOWN_OPERATORS.iter().map(|op| op.to_string()).collect(),
            rejected_kinds: HashSet::new(),
            stats: EngineStats::default(),
        }
    }

    /// Engine with the pointer tolerance taken from `config`
    pub fn from_config(camera: MapCamera, config: &MapConfig) -> Self {
        Self::new(camera).with_hit_radius(config.hit_radius_px)
    }

    pub fn with_hit_radius(mut self, radius: f32) -> Self {
        self.hit_radius = radius;
        self
    }

    /// Limit the expression operators accepted in paint/layout/filter values
    pub fn restrict_operators(&mut self, operators: &[&str]) {
        self.supported_operators = operators.iter().map(|op| op.to_string()).collect();
    }

    /// Refuse every layer of `kind` (e.g. a renderer without heatmap support)
    pub fn reject_kind(&mut self, kind: LayerKind) {
        self.rejected_kinds.insert(kind);
    }

    pub fn camera(&self) -> &MapCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut MapCamera {
        &mut self.camera
    }

    pub fn source_data(&self, id: &str) -> Option<&FeatureCollection> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// Layer ids bottom to top
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.id.as_str()).collect()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn handler_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn marker(&self, id: EngineMarkerId) -> Option<&StoredMarker> {
        self.markers.get(&id.0)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn is_dragging(&self, id: EngineMarkerId) -> bool {
        self.dragging == Some(id)
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_expressions(&self, layer: &LayerSpec) -> Result<(), MapError> {
        let values = layer
            .paint
            .values()
            .chain(layer.layout.values())
            .chain(layer.filter.iter());
        for value in values {
            if let Some(operator) = self.unsupported_operator(value) {
                return Err(MapError::UnsupportedExpression {
                    layer: layer.id.clone(),
                    operator,
                });
            }
        }
        Ok(())
    }

    fn unsupported_operator(&self, value: &Value) -> Option<String> {
        let Value::Array(items) = value else {
            return None;
        };
        if let Some(Value::String(operator)) = items.first() {
            if !self.supported_operators.contains(operator) {
                return Some(operator.clone());
            }
            if operator == "literal" {
                return None;
            }
        }
        items.iter().find_map(|item| self.unsupported_operator(item))
    }

    fn is_visible(layer: &LayerSpec) -> bool {
        layer.layout.get("visibility").and_then(Value::as_str) != Some("none")
    }

    fn hits_on_layer(&self, layer: &LayerSpec, point: ScreenPoint) -> Vec<RenderedFeature> {
        if layer.kind == LayerKind::Heatmap || !Self::is_visible(layer) {
            return Vec::new();
        }
        if layer.minzoom.is_some_and(|min| self.camera.zoom < min) {
            return Vec::new();
        }
        let Some(source) = self.sources.get(&layer.source) else {
            return Vec::new();
        };

        source
            .features
            .iter()
            .filter(|feature| self.geometry_hit(&feature.geometry, point))
            .map(|feature| RenderedFeature {
                layer_id: layer.id.clone(),
                source_id: layer.source.clone(),
                feature: feature.clone(),
            })
            .collect()
    }

    fn geometry_hit(&self, geometry: &Geometry, point: ScreenPoint) -> bool {
        match geometry {
            Geometry::Point([lng, lat]) => {
                let at = self.camera.project(LngLat::new(*lng, *lat));
                at.distance(&point) <= self.hit_radius
            }
            Geometry::LineString(path) => path.windows(2).any(|segment| {
                let a = self.camera.project(LngLat::new(segment[0][0], segment[0][1]));
                let b = self.camera.project(LngLat::new(segment[1][0], segment[1][1]));
                segment_distance(point, a, b) <= self.hit_radius
            }),
        }
    }

    /// Handlers to invoke for a pointer event, collected so they can run after
    /// the engine borrow is released
    fn targets(
        &self,
        kind: EventKind,
        layers: &[String],
        point: ScreenPoint,
    ) -> Vec<(EventHandler, MapEvent)> {
        let lng_lat = self.camera.unproject(point);
        let mut targets = Vec::new();
        for layer_id in layers {
            let features = self
                .layer(layer_id)
                .map(|layer| self.hits_on_layer(layer, point))
                .unwrap_or_default();
            for sub in &self.subscriptions {
                if sub.kind == kind && &sub.layer == layer_id {
                    targets.push((
                        sub.handler.clone(),
                        MapEvent {
                            kind,
                            layer_id: layer_id.clone(),
                            point,
                            lng_lat,
                            features: features.clone(),
                        },
                    ));
                }
            }
        }
        targets
    }

    fn layers_hit(&self, point: ScreenPoint) -> Vec<String> {
        self.layers
            .iter()
            .rev()
            .filter(|layer| !self.hits_on_layer(layer, point).is_empty())
            .map(|layer| layer.id.clone())
            .collect()
    }
}

fn segment_distance(p: ScreenPoint, a: ScreenPoint, b: ScreenPoint) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return p.distance(&a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    p.distance(&ScreenPoint::new(a.x + t * dx, a.y + t * dy))
}

impl Default for RetainedMap {
    fn default() -> Self {
        Self::new(MapCamera::default())
    }
}

impl MapEngine for RetainedMap {
    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError> {
        if self.sources.contains_key(id) {
            return Err(MapError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), data);
        self.stats.sources_added += 1;
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError> {
        let slot = self
            .sources
            .get_mut(id)
            .ok_or_else(|| MapError::UnknownSource(id.to_string()))?;
        *slot = data;
        self.stats.data_updates += 1;
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), MapError> {
        if let Some(layer) = self.layers.iter().find(|layer| layer.source == id) {
            return Err(MapError::SourceInUse {
                source_id: id.to_string(),
                layer: layer.id.clone(),
            });
        }
        self.sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MapError::UnknownSource(id.to_string()))
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), MapError> {
        if self.has_layer(&layer.id) {
            return Err(MapError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(MapError::MissingSource {
                layer: layer.id,
                source_id: layer.source,
            });
        }
        if self.rejected_kinds.contains(&layer.kind) {
            return Err(MapError::RejectedLayer {
                layer: layer.id,
                kind: layer.kind.as_str(),
            });
        }
        self.check_expressions(&layer)?;

        debug!("engine: add layer {} ({})", layer.id, layer.kind.as_str());
        self.layers.push(layer);
        self.stats.layers_added += 1;
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), MapError> {
        let index = self
            .layers
            .iter()
            .position(|layer| layer.id == id)
            .ok_or_else(|| MapError::UnknownLayer(id.to_string()))?;
        self.layers.remove(index);
        self.hovered.remove(id);
        Ok(())
    }

    fn set_layout_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Value,
    ) -> Result<(), MapError> {
        let spec = self
            .layers
            .iter_mut()
            .find(|spec| spec.id == layer)
            .ok_or_else(|| MapError::UnknownLayer(layer.to_string()))?;
        spec.layout.insert(name.to_string(), value);
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Value,
    ) -> Result<(), MapError> {
        let spec = self
            .layers
            .iter_mut()
            .find(|spec| spec.id == layer)
            .ok_or_else(|| MapError::UnknownLayer(layer.to_string()))?;
        spec.paint.insert(name.to_string(), value);
        Ok(())
    }

    fn has_image(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    fn add_image(&mut self, name: &str, image: RgbaImage) -> Result<(), MapError> {
        self.images.insert(name.to_string(), image.dimensions());
        Ok(())
    }

    fn bounds(&self) -> Viewport {
        self.camera.bounds()
    }

    fn zoom(&self) -> f64 {
        self.camera.zoom
    }

    fn query_rendered_features(
        &self,
        point: ScreenPoint,
        layers: &[String],
    ) -> Vec<RenderedFeature> {
        self.layers
            .iter()
            .rev()
            .filter(|layer| layers.is_empty() || layers.contains(&layer.id))
            .flat_map(|layer| self.hits_on_layer(layer, point))
            .collect()
    }

    fn pan_by(&mut self, dx: f32, dy: f32) {
        self.camera.pan(dx, dy);
    }

    fn fly_to(&mut self, center: LngLat, zoom: Option<f64>) {
        self.camera.fly_to(center, zoom);
    }

    fn on(&mut self, kind: EventKind, layer: &str, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_id());
        self.subscriptions.push(Subscription {
            id,
            kind,
            layer: layer.to_string(),
            handler,
        });
        id
    }

    fn off(&mut self, id: HandlerId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        self.subscriptions.len() != before
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    fn add_marker(&mut self, options: MarkerOptions) -> EngineMarkerId {
        let id = self.next_id();
        self.markers.insert(
            id,
            StoredMarker {
                position: options.position,
                style: options.style,
                draggable: options.draggable,
                on_drag_end: options.on_drag_end,
            },
        );
        self.stats.markers_added += 1;
        EngineMarkerId(id)
    }

    fn set_marker_position(&mut self, id: EngineMarkerId, at: LngLat) -> Result<(), MapError> {
        let marker = self.markers.get_mut(&id.0).ok_or(MapError::UnknownMarker(id.0))?;
        marker.position = at;
        Ok(())
    }

    fn set_marker_style(&mut self, id: EngineMarkerId, style: MarkerStyle) -> Result<(), MapError> {
        let marker = self.markers.get_mut(&id.0).ok_or(MapError::UnknownMarker(id.0))?;
        marker.style = style;
        Ok(())
    }

    fn remove_marker(&mut self, id: EngineMarkerId) -> Result<(), MapError> {
        self.markers.remove(&id.0).ok_or(MapError::UnknownMarker(id.0))?;
        if self.dragging == Some(id) {
            debug!("engine: marker {id} removed mid-drag");
            self.dragging = None;
        }
        Ok(())
    }
}

/// Deliver a click at `point`. Returns the number of handlers invoked.
pub fn click(map: &Rc<RefCell<RetainedMap>>, point: ScreenPoint) -> usize {
    let targets = {
        let engine = map.borrow();
        let layers = engine.layers_hit(point);
        engine.targets(EventKind::Click, &layers, point)
    };
    invoke(targets)
}

/// Click on a layer id regardless of what is rendered there. Handlers still
/// only fire while they are subscribed.
pub fn click_layer(map: &Rc<RefCell<RetainedMap>>, layer: &str, point: ScreenPoint) -> usize {
    let targets = map
        .borrow()
        .targets(EventKind::Click, &[layer.to_string()], point);
    invoke(targets)
}

/// Move the pointer to `point`, firing enter/leave handlers for layers whose
/// hover state changed. Returns the number of handlers invoked.
pub fn move_pointer(map: &Rc<RefCell<RetainedMap>>, point: ScreenPoint) -> usize {
    let targets = {
        let mut engine = map.borrow_mut();
        let now: HashSet<String> = engine.layers_hit(point).into_iter().collect();
        let entered: Vec<String> = now.difference(&engine.hovered).cloned().collect();
        let left: Vec<String> = engine.hovered.difference(&now).cloned().collect();
        engine.hovered = now;

        // Leaves first so a move between layers ends on the entered one
        let mut targets = engine.targets(EventKind::MouseLeave, &left, point);
        targets.extend(engine.targets(EventKind::MouseEnter, &entered, point));
        targets
    };
    invoke(targets)
}

fn invoke(targets: Vec<(EventHandler, MapEvent)>) -> usize {
    let count = targets.len();
    for (handler, event) in targets {
        handler(&event);
    }
    count
}

/// Start a drag gesture on a draggable marker
pub fn begin_drag(map: &Rc<RefCell<RetainedMap>>, id: EngineMarkerId) -> bool {
    let mut engine = map.borrow_mut();
    let draggable = engine.markers.get(&id.0).is_some_and(|marker| marker.draggable);
    if draggable {
        engine.dragging = Some(id);
    }
    draggable
}

/// Finish the active drag at `to`, firing the marker's drag-end callback.
/// Returns false when the gesture was lost (marker removed or never dragged).
pub fn end_drag(map: &Rc<RefCell<RetainedMap>>, id: EngineMarkerId, to: LngLat) -> bool {
    let handler = {
        let mut engine = map.borrow_mut();
        if engine.dragging != Some(id) {
            return false;
        }
        engine.dragging = None;
        let Some(marker) = engine.markers.get_mut(&id.0) else {
            return false;
        };
        marker.position = to;
        marker.on_drag_end.clone()
    };
    if let Some(handler) = handler {
        handler(to);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::Feature;
    use serde_json::json;
    use std::cell::Cell;

    fn map() -> RetainedMap {
        RetainedMap::new(MapCamera::new(LngLat::new(-97.7431, 30.2672), 12.0, 800, 600))
    }

    fn circle(id: &str, source: &str) -> LayerSpec {
        LayerSpec::new(id, LayerKind::Circle, source).paint("circle-radius", 6)
    }

    #[test]
    fn layer_requires_existing_source() {
        let mut engine = map();
        let err = engine.add_layer(circle("a", "missing")).unwrap_err();
        assert!(matches!(err, MapError::MissingSource { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut engine = map();
        engine.add_source("s", FeatureCollection::default()).unwrap();
        assert!(matches!(
            engine.add_source("s", FeatureCollection::default()),
            Err(MapError::DuplicateSource(_))
        ));
        engine.add_layer(circle("a", "s")).unwrap();
        assert!(matches!(engine.add_layer(circle("a", "s")), Err(MapError::DuplicateLayer(_))));
    }

    #[test]
    fn source_in_use_cannot_be_removed() {
        let mut engine = map();
        engine.add_source("s", FeatureCollection::default()).unwrap();
        engine.add_layer(circle("a", "s")).unwrap();
        assert!(matches!(engine.remove_source("s"), Err(MapError::SourceInUse { .. })));
        engine.remove_layer("a").unwrap();
        engine.remove_source("s").unwrap();
        assert!(!engine.has_source("s"));
    }

    #[test]
    fn restricted_operators_reject_layers() {
        let mut engine = map();
        engine.restrict_operators(&["get"]);
        engine.add_source("s", FeatureCollection::default()).unwrap();
        let layer = circle("a", "s").paint(
            "circle-radius",
            json!(["interpolate", ["linear"], ["zoom"], 10, 4, 16, 12]),
        );
        let err = engine.add_layer(layer).unwrap_err();
        assert!(matches!(
            err,
            MapError::UnsupportedExpression { operator, .. } if operator == "interpolate"
        ));
    }

    #[test]
    fn literal_contents_are_not_validated() {
        let mut engine = map();
        engine.add_source("s", FeatureCollection::default()).unwrap();
        let layer = circle("a", "s").layout("text-font", json!(["literal", ["Open Sans Bold"]]));
        engine.add_layer(layer).unwrap();
    }

    #[test]
    fn query_hits_point_near_pointer_only_when_visible() {
        let mut engine = map();
        let at = LngLat::new(-97.7431, 30.2672);
        engine
            .add_source("s", FeatureCollection::new(vec![Feature::point("f1", at)]))
            .unwrap();
        engine.add_layer(circle("a", "s")).unwrap();

        let screen = engine.camera().project(at);
        let hits = engine.query_rendered_features(ScreenPoint::new(screen.x + 5.0, screen.y), &[]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].layer_id, "a");

        let far = engine.query_rendered_features(ScreenPoint::new(screen.x + 50.0, screen.y), &[]);
        assert!(far.is_empty());

        engine.set_layout_property("a", "visibility", json!("none")).unwrap();
        assert!(engine.query_rendered_features(screen, &[]).is_empty());
    }

    #[test]
    fn click_dispatch_runs_outside_the_borrow() {
        let at = LngLat::new(-97.7431, 30.2672);
        let engine = Rc::new(RefCell::new(map()));
        {
            let mut e = engine.borrow_mut();
            e.add_source("s", FeatureCollection::new(vec![Feature::point("f1", at)])).unwrap();
            e.add_layer(circle("a", "s")).unwrap();
        }
        let reentrant = engine.clone();
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        engine.borrow_mut().on(
            EventKind::Click,
            "a",
            Rc::new(move |event: &MapEvent| {
                assert_eq!(event.features.len(), 1);
                reentrant.borrow_mut().set_cursor(Cursor::Pointer);
                counter.set(counter.get() + 1);
            }),
        );

        let screen = engine.borrow().camera().project(at);
        assert_eq!(click(&engine, screen), 1);
        assert_eq!(seen.get(), 1);
        assert_eq!(engine.borrow().cursor(), Cursor::Pointer);
    }

    #[test]
    fn pointer_move_fires_enter_then_leave() {
        let at = LngLat::new(-97.7431, 30.2672);
        let engine = Rc::new(RefCell::new(map()));
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let mut e = engine.borrow_mut();
            e.add_source("s", FeatureCollection::new(vec![Feature::point("f1", at)])).unwrap();
            e.add_layer(circle("a", "s")).unwrap();
            for kind in [EventKind::MouseEnter, EventKind::MouseLeave] {
                let log = log.clone();
                e.on(kind, "a", Rc::new(move |event: &MapEvent| log.borrow_mut().push(event.kind)));
            }
        }
        let screen = engine.borrow().camera().project(at);

        move_pointer(&engine, screen);
        move_pointer(&engine, ScreenPoint::new(screen.x + 1.0, screen.y));
        move_pointer(&engine, ScreenPoint::new(0.0, 0.0));

        assert_eq!(*log.borrow(), vec![EventKind::MouseEnter, EventKind::MouseLeave]);
    }

    #[test]
    fn moving_between_layers_leaves_before_entering() {
        let at = LngLat::new(-97.7431, 30.2672);
        let east = LngLat::new(at.lng + 0.01, at.lat);
        let engine = Rc::new(RefCell::new(map()));
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let mut e = engine.borrow_mut();
            for (layer, source, point) in [("a", "s1", at), ("b", "s2", east)] {
                e.add_source(source, FeatureCollection::new(vec![Feature::point(layer, point)]))
                    .unwrap();
                e.add_layer(circle(layer, source)).unwrap();
                for kind in [EventKind::MouseEnter, EventKind::MouseLeave] {
                    let log = log.clone();
                    e.on(
                        kind,
                        layer,
                        Rc::new(move |event: &MapEvent| {
                            log.borrow_mut().push((event.layer_id.clone(), event.kind))
                        }),
                    );
                }
            }
        }
        let first = engine.borrow().camera().project(at);
        let second = engine.borrow().camera().project(east);

        move_pointer(&engine, first);
        move_pointer(&engine, second);

        assert_eq!(
            *log.borrow(),
            vec![
                ("a".to_string(), EventKind::MouseEnter),
                ("a".to_string(), EventKind::MouseLeave),
                ("b".to_string(), EventKind::MouseEnter),
            ]
        );
    }

    #[test]
    fn hit_radius_comes_from_config() {
        let at = LngLat::new(-97.7431, 30.2672);
        let camera = MapCamera::new(at, 12.0, 800, 600);
        let tight = MapConfig {
            hit_radius_px: 2.0,
            ..MapConfig::default()
        };

        for (config, expected) in [(MapConfig::default(), 1), (tight, 0)] {
            let mut engine = RetainedMap::from_config(camera.clone(), &config);
            engine
                .add_source("s", FeatureCollection::new(vec![Feature::point("f1", at)]))
                .unwrap();
            engine.add_layer(circle("a", "s")).unwrap();
            let screen = engine.camera().project(at);
            let near = ScreenPoint::new(screen.x + 5.0, screen.y);
            assert_eq!(engine.query_rendered_features(near, &[]).len(), expected);
        }
    }

    #[test]
    fn line_geometry_is_hit_along_segments() {
        let mut engine = map();
        let a = LngLat::new(-97.76, 30.2672);
        let b = LngLat::new(-97.72, 30.2672);
        engine
            .add_source(
                "route",
                FeatureCollection::new(vec![Feature {
                    id: None,
                    geometry: Geometry::line(&[a, b]),
                    properties: Default::default(),
                }]),
            )
            .unwrap();
        engine.add_layer(LayerSpec::new("route-line", LayerKind::Line, "route")).unwrap();

        let mid = engine.camera().project(LngLat::new(-97.74, 30.2672));
        assert_eq!(engine.query_rendered_features(mid, &[]).len(), 1);
    }

    #[test]
    fn removing_marker_mid_drag_loses_the_gesture() {
        let engine = Rc::new(RefCell::new(map()));
        let id = engine.borrow_mut().add_marker(MarkerOptions {
            position: LngLat::new(0.0, 0.0),
            style: MarkerStyle {
                role: crate::map::engine::MarkerRole::Waypoint,
                selected: false,
                label: None,
            },
            draggable: true,
            on_drag_end: None,
        });

        assert!(begin_drag(&engine, id));
        engine.borrow_mut().remove_marker(id).unwrap();
        assert!(!end_drag(&engine, id, LngLat::new(1.0, 1.0)));
    }
}
