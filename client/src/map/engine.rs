//! The map rendering engine capability
//!
//! The engine is opaque: overlays only hand it declarative layer specs and
//! replace the data bound to a source. Everything that rasterizes lives on
//! the other side of this trait.

use std::fmt;
use std::rc::Rc;

use image::RgbaImage;
use serde::Serialize;
use serde_json::{Map, Value};

use super::camera::{ScreenPoint, Viewport};
use crate::error::MapError;
use crate::geojson::{Feature, FeatureCollection, LngLat};

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Circle,
    Symbol,
    Heatmap,
    Line,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Symbol => "symbol",
            Self::Heatmap => "heatmap",
            Self::Line => "line",
        }
    }
}

/// Declarative layer definition bound to one source
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub paint: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<f64>,
}

impl LayerSpec {
    pub fn new(id: impl Into<String>, kind: LayerKind, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            paint: Map::new(),
            layout: Map::new(),
            filter: None,
            minzoom: None,
        }
    }

    pub fn paint(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.paint.insert(name.to_string(), value.into());
        self
    }

    pub fn layout(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.layout.insert(name.to_string(), value.into());
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn minzoom(mut self, zoom: f64) -> Self {
        self.minzoom = Some(zoom);
        self
    }
}

/// Layout `visibility` values
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Visibility {
    Visible,
    None,
}

impl Visibility {
    pub fn from_flag(visible: bool) -> Self {
        if visible { Self::Visible } else { Self::None }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::None => "none",
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum EventKind {
    Click,
    MouseEnter,
    MouseLeave,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cursor {
    Default,
    Pointer,
}

/// Feature as rendered by a specific layer
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFeature {
    pub layer_id: String,
    pub source_id: String,
    pub feature: Feature,
}

/// Pointer event delivered to layer-scoped handlers
#[derive(Clone, Debug)]
pub struct MapEvent {
    pub kind: EventKind,
    pub layer_id: String,
    pub point: ScreenPoint,
    pub lng_lat: LngLat,
    /// Features under the pointer on `layer_id`, topmost first
    pub features: Vec<RenderedFeature>,
}

pub type EventHandler = Rc<dyn Fn(&MapEvent)>;

/// Subscription returned by [`MapEngine::on`]
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct HandlerId(pub u64);

/// Engine-side identity of a marker object
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct EngineMarkerId(pub u64);

impl fmt::Display for EngineMarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MarkerRole {
    Waypoint,
    Start,
    End,
    User,
    Police,
}

/// Decorative state of a marker
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerStyle {
    pub role: MarkerRole,
    pub selected: bool,
    pub label: Option<String>,
}

pub type DragHandler = Rc<dyn Fn(LngLat)>;

pub struct MarkerOptions {
    pub position: LngLat,
    pub style: MarkerStyle,
    pub draggable: bool,
    pub on_drag_end: Option<DragHandler>,
}

/// Primitives every overlay relies on. Implementations must make the
/// existence checks cheap since overlays call them on every trigger.
pub trait MapEngine {
    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError>;
    /// Replace the data bound to a source; the engine re-renders from it
    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError>;
    fn remove_source(&mut self, id: &str) -> Result<(), MapError>;

    fn has_layer(&self, id: &str) -> bool;
    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), MapError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), MapError>;
    fn set_layout_property(&mut self, layer: &str, name: &str, value: Value)
    -> Result<(), MapError>;
    fn set_paint_property(&mut self, layer: &str, name: &str, value: Value) -> Result<(), MapError>;

    fn has_image(&self, name: &str) -> bool;
    fn add_image(&mut self, name: &str, image: RgbaImage) -> Result<(), MapError>;

    fn bounds(&self) -> Viewport;
    fn zoom(&self) -> f64;
    fn query_rendered_features(&self, point: ScreenPoint, layers: &[String])
    -> Vec<RenderedFeature>;
    fn pan_by(&mut self, dx: f32, dy: f32);
    fn fly_to(&mut self, center: LngLat, zoom: Option<f64>);

    fn on(&mut self, kind: EventKind, layer: &str, handler: EventHandler) -> HandlerId;
    fn off(&mut self, id: HandlerId) -> bool;
    fn set_cursor(&mut self, cursor: Cursor);

    fn add_marker(&mut self, options: MarkerOptions) -> EngineMarkerId;
    fn set_marker_position(&mut self, id: EngineMarkerId, at: LngLat) -> Result<(), MapError>;
    fn set_marker_style(&mut self, id: EngineMarkerId, style: MarkerStyle) -> Result<(), MapError>;
    fn remove_marker(&mut self, id: EngineMarkerId) -> Result<(), MapError>;
}
