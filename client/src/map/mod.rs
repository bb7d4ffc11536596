//! Map surface: camera math, the engine capability and the shared handle

pub mod camera;
pub mod engine;
pub mod handle;
pub mod images;
pub mod projection;
pub mod retained;

pub use camera::{MapCamera, ScreenPoint, Viewport};
pub use engine::{
    Cursor, EngineMarkerId, EventHandler, EventKind, LayerKind, LayerSpec, MapEngine, MapEvent,
    MarkerOptions, MarkerRole, MarkerStyle, RenderedFeature, Visibility,
};
pub use handle::{MapHandle, MapProvider, SharedEngine, WeakMapHandle};
pub use retained::RetainedMap;
