//! Viewport-synchronized overlays
//!
//! Every fetched overlay runs the same state machine:
//!
//! ```text
//! Uninitialized --ready--> LayersReady <--fetch--> DataLoaded
//!       ^                        |                     |
//!       +---- engine replaced ---+---------------------+
//!                      any state --teardown--> TornDown
//! ```
//!
//! Only the ready transition and explicit viewport or filter triggers touch
//! the layer set. Click callbacks go through a [`CallbackCell`], so swapping
//! them never tears anything down. Visibility is orthogonal to the state.

pub mod hotspots;
pub mod live;
pub mod markers;
pub mod patterns;
pub mod predictions;
pub mod route;
pub mod speed_traps;
pub mod spottings;
pub mod waypoints;


pub use hotspots::{HotspotFilters, Hotspots};
pub use live::{LiveKind, LivePosition, LivePositions};
pub use markers::{MarkerDrag, MarkerLayer, MarkerSpec, ReconcileStats};
pub use patterns::{PatternFilters, PatternType, Patterns};
pub use predictions::{PredictionFilters, Predictions};
pub use route::{RouteKind, RouteLine};
pub use speed_traps::{SpeedTrapFilters, SpeedTraps};
pub use spottings::{SpottingFilters, Spottings};
pub use waypoints::{Waypoint, WaypointEditor};

use std::fmt::Debug;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, info, warn};
use url::Url;
use web_time::Instant;

use crate::config::MapConfig;
use crate::events::ClickEvent;
use crate::geojson::FeatureCollection;
use crate::layers::{
    Binding, CallbackCell, Debouncer, FetchOutcome, FetchRequest, FetchSlot, Fetcher, HandlerSet,
    LayerSetSpec, ensure_layer_set, remove_layer_set, set_visibility,
};
use crate::map::camera::Viewport;
use crate::map::engine::{Cursor, EventKind, MapEngine, MapEvent, Visibility};
use crate::map::handle::{MapHandle, WeakMapHandle};

/// Source id for an overlay name
pub fn source_id(name: &str) -> String {
    format!("{name}-source")
}

/// Layer id for one role (glow, main, label, ...) of an overlay
pub fn layer_id(name: &str, role: &str) -> String {
    format!("{name}-{role}")
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OverlayState {
    Uninitialized,
    LayersReady,
    DataLoaded,
    TornDown,
}

impl OverlayState {
    pub fn has_layers(&self) -> bool {
        matches!(self, Self::LayersReady | Self::DataLoaded)
    }
}

/// Counters for one overlay
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OverlayStats {
    pub setups: usize,
    pub fetches: usize,
    pub applied: usize,
    /// Responses deliberately not applied (see [`OverlayKind::accepts`])
    pub ignored: usize,
    pub failures: usize,
}

/// What distinguishes one overlay from another
pub trait OverlayKind {
    type Filters: Clone + Debug + Default + PartialEq;

    /// Unique prefix for the overlay's source and layer ids
    fn name(&self) -> &'static str;

    /// Layers to create. Called once per engine; `engine` tells whether icon
    /// images are registered.
    fn layer_set(&self, engine: &dyn MapEngine) -> LayerSetSpec;

    /// Layer that receives click and hover handlers
    fn interactive_layer(&self) -> String {
        layer_id(self.name(), "main")
    }

    /// Backend path relative to the API base; `None` for host-supplied data
    fn endpoint(&self) -> Option<&'static str> {
        None
    }

    /// Query parameters besides `bbox`
    fn query(&self, _filters: &Self::Filters) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Whether a successful response replaces the current dataset
    fn accepts(&self, _data: &FeatureCollection) -> bool {
        true
    }

    /// Properties that arrive as stringified JSON in click payloads
    fn nested_properties(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Shared by every overlay on one page
#[derive(Clone)]
pub struct OverlayContext {
    pub api_base: Url,
    pub fetcher: Rc<dyn Fetcher>,
    pub debounce: Duration,
    pub bind_delay: Duration,
}

impl OverlayContext {
    pub fn new(config: &MapConfig, fetcher: Rc<dyn Fetcher>) -> Self {
        Self {
            api_base: config.api_base.clone(),
            fetcher,
            debounce: config.debounce(),
            bind_delay: config.handler_bind_delay(),
        }
    }
}

pub struct Overlay<K: OverlayKind> {
    kind: K,
    context: OverlayContext,
    handle: Option<WeakMapHandle>,
    layer_set: Option<LayerSetSpec>,
    state: OverlayState,
    filters: K::Filters,
    visible: bool,
    data: FeatureCollection,
    slot: FetchSlot,
    debounce: Debouncer,
    handlers: HandlerSet,
    on_click: CallbackCell<ClickEvent>,
    /// Pointer is over the interactive layer
    hovered: Rc<Cell<bool>>,
    /// Epoch on which layer creation failed for good
    failed_epoch: Option<u64>,
    stats: OverlayStats,
}

impl<K: OverlayKind> Overlay<K> {
    pub fn new(kind: K, context: OverlayContext) -> Self {
        Self {
            slot: FetchSlot::new(kind.name()),
            debounce: Debouncer::new(context.debounce),
            handlers: HandlerSet::new(context.bind_delay),
            kind,
            context,
            handle: None,
            layer_set: None,
            state: OverlayState::Uninitialized,
            filters: K::Filters::default(),
            visible: true,
            data: FeatureCollection::default(),
            on_click: CallbackCell::new(),
            hovered: Rc::default(),
            failed_epoch: None,
            stats: OverlayStats::default(),
        }
    }

    pub fn with_filters(mut self, filters: K::Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// The dataset currently bound to the source
    pub fn data(&self) -> &FeatureCollection {
        &self.data
    }

    pub fn filters(&self) -> &K::Filters {
        &self.filters
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn stats(&self) -> OverlayStats {
        self.stats
    }

    /// Layer set created on the current engine, if any
    pub fn layer_set(&self) -> Option<&LayerSetSpec> {
        self.layer_set.as_ref()
    }

    pub fn handlers_bound(&self) -> bool {
        self.handlers.is_bound()
    }

    /// Bind to an engine. Re-attaching to the same surface only retries
    /// setup; attaching to a different one releases everything held on the
    /// previous engine first.
    pub fn attach(&mut self, handle: &MapHandle, now: Instant) {
        if self.state == OverlayState::TornDown {
            debug!("{}: ignoring attach after teardown", self.name());
            return;
        }
        let same_surface = self.handle.as_ref().is_some_and(|current| current.points_to(handle));
        if !same_surface {
            self.detach();
            self.handle = Some(handle.downgrade());
        }
        self.setup(handle, now);
    }

    /// Drive pending work: setup once the engine is ready, delivered fetch
    /// results, the settled debounce and delayed handler binding.
    pub fn update(&mut self, now: Instant) {
        if self.state == OverlayState::TornDown {
            return;
        }
        let Some(handle) = self.live_handle() else {
            if self.state != OverlayState::Uninitialized {
                debug!("{}: engine went away", self.name());
                self.detach();
            }
            return;
        };

        if self.state == OverlayState::Uninitialized {
            self.setup(&handle, now);
            if self.state == OverlayState::Uninitialized {
                return;
            }
        }

        if let Some(outcome) = self.slot.poll() {
            self.apply(&handle, outcome);
        }
        if self.debounce.poll(now) {
            self.refresh(&handle);
        }
        self.bind_handlers(&handle, now);
    }

    /// The viewport moved; the fetch runs once the movement settles
    pub fn viewport_changed(&mut self, now: Instant) {
        if self.state.has_layers() && self.kind.endpoint().is_some() {
            self.debounce.signal(now);
        }
    }

    /// Change the query filters. Takes effect immediately when layers exist,
    /// otherwise with the first fetch.
    pub fn set_filters(&mut self, filters: K::Filters) {
        if filters == self.filters {
            return;
        }
        self.filters = filters;
        if !self.state.has_layers() {
            return;
        }
        self.debounce.cancel();
        if let Some(handle) = self.live_handle() {
            self.refresh(&handle);
        }
    }

    /// Toggle layer visibility. Never fetches and never touches the source.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        let (Some(spec), Some(handle)) = (&self.layer_set, self.live_handle()) else {
            return;
        };
        let visibility = Visibility::from_flag(visible);
        if let Err(e) = handle
            .with_engine(|engine| set_visibility(engine, spec, visibility))
            .and_then(|result| result)
        {
            warn!("{}: could not change visibility: {e}", self.name());
        }
    }

    /// Replace the click callback. Engine handlers stay bound.
    pub fn on_click(&self, callback: impl FnMut(&ClickEvent) + 'static) {
        self.on_click.set(callback);
    }

    pub fn clear_click(&self) {
        self.on_click.clear();
    }

    /// Bind host-supplied data (static overlays such as routes)
    pub fn set_data(&mut self, data: FeatureCollection) {
        if let (Some(spec), Some(handle)) = (&self.layer_set, self.live_handle()) {
            let payload = data.clone();
            match handle
                .with_engine(|engine| engine.set_source_data(&spec.source_id, payload))
                .and_then(|result| result)
            {
                Ok(()) => self.state = OverlayState::DataLoaded,
                Err(e) => warn!("{}: could not bind data: {e}", self.name()),
            }
        }
        self.data = data;
    }

    /// Cancel outstanding work and remove handlers, layers and source
    pub fn teardown(&mut self) {
        if self.state == OverlayState::TornDown {
            return;
        }
        self.detach();
        self.state = OverlayState::TornDown;
        debug!("{}: torn down", self.name());
    }

    fn live_handle(&self) -> Option<MapHandle> {
        self.handle.as_ref()?.upgrade()
    }

    /// Release everything held on the current engine
    fn detach(&mut self) {
        self.slot.cancel();
        self.debounce.cancel();
        self.handlers.release();
        if self.hovered.replace(false) {
            if let Some(handle) = self.live_handle() {
                if let Err(e) = handle.with_engine(|engine| engine.set_cursor(Cursor::Default)) {
                    debug!("{}: cursor not reset: {e}", self.name());
                }
            }
        }

        if let (Some(spec), Some(handle)) = (self.layer_set.take(), self.live_handle()) {
            if let Err(e) = handle
                .with_engine(|engine| remove_layer_set(engine, &spec))
                .and_then(|result| result)
            {
                warn!("{}: incomplete layer removal: {e}", self.name());
            }
        }

        self.failed_epoch = None;
        if self.state != OverlayState::TornDown {
            self.state = OverlayState::Uninitialized;
        }
    }

    fn setup(&mut self, handle: &MapHandle, now: Instant) {
        if self.state != OverlayState::Uninitialized
            || !handle.is_ready()
            || self.failed_epoch == Some(handle.epoch())
        {
            return;
        }

        let kind = &self.kind;
        let data = &self.data;
        let visibility = Visibility::from_flag(self.visible);
        let created = handle.with_engine(|engine| {
            let spec = kind.layer_set(engine);
            ensure_layer_set(engine, &spec, || data.clone(), visibility)
                .map(|status| (spec, status))
        });

        match created {
            Ok(Ok((spec, status))) => {
                debug!("{}: layers ready ({status:?})", self.name());
                self.layer_set = Some(spec.settled(status));
                self.state = if self.kind.endpoint().is_none() && !self.data.is_empty() {
                    OverlayState::DataLoaded
                } else {
                    OverlayState::LayersReady
                };
                self.stats.setups += 1;
                self.handlers.schedule(now);
                self.refresh(handle);
            }
            Ok(Err(e)) => {
                info!("{}: overlay disabled on this map: {e}", self.name());
                self.failed_epoch = Some(handle.epoch());
            }
            Err(e) => debug!("{}: setup deferred: {e}", self.name()),
        }
    }

    /// Fetch for the current viewport and filters, superseding any
    /// outstanding request
    fn refresh(&mut self, handle: &MapHandle) {
        let Some(endpoint) = self.kind.endpoint() else {
            return;
        };
        let Some(spec) = &self.layer_set else {
            return;
        };

        let data = &self.data;
        let visibility = Visibility::from_flag(self.visible);
        if let Err(e) = handle
            .with_engine(|engine| ensure_layer_set(engine, spec, || data.clone(), visibility))
            .and_then(|result| result)
        {
            warn!("{}: layers unavailable, skipping fetch: {e}", self.name());
            return;
        }

        let url = match handle.bounds() {
            Ok(viewport) => self.request_url(endpoint, &viewport),
            Err(e) => {
                debug!("{}: no viewport: {e}", self.name());
                return;
            }
        };
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                warn!("{}: bad request url for {endpoint}: {e}", self.name());
                return;
            }
        };

        let request = FetchRequest {
            overlay: self.kind.name(),
            url,
        };
        let fetcher = Rc::clone(&self.context.fetcher);
        self.slot.start(|token, reply| fetcher.fetch(request, token, reply));
        self.stats.fetches += 1;
    }

    fn request_url(&self, endpoint: &str, viewport: &Viewport) -> Result<Url, url::ParseError> {
        let mut url = self.context.api_base.join(endpoint)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("bbox", &viewport.to_bbox_param());
            for (key, value) in self.kind.query(&self.filters) {
                pairs.append_pair(key, &value);
            }
        }
        Ok(url)
    }

    fn apply(&mut self, handle: &MapHandle, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Loaded(data) => {
                if !self.kind.accepts(&data) {
                    let kept = self.data.len();
                    debug!("{}: response ignored, keeping {kept} features", self.name());
                    self.stats.ignored += 1;
                    return;
                }
                let Some(spec) = &self.layer_set else {
                    return;
                };
                let payload = data.clone();
                match handle
                    .with_engine(|engine| engine.set_source_data(&spec.source_id, payload))
                    .and_then(|result| result)
                {
                    Ok(()) => {
                        debug!("{}: {} features", self.name(), data.len());
                        self.data = data;
                        self.state = OverlayState::DataLoaded;
                        self.stats.applied += 1;
                    }
                    Err(e) => warn!("{}: could not bind fetched data: {e}", self.name()),
                }
            }
            FetchOutcome::Failed(reason) => {
                warn!("{}: fetch failed: {reason}", self.name());
                self.stats.failures += 1;
            }
            FetchOutcome::Aborted => debug!("{}: fetch aborted", self.name()),
        }
    }

    fn bind_handlers(&mut self, handle: &MapHandle, now: Instant) {
        let name = self.kind.name();
        let layer = self.kind.interactive_layer();
        let nested = self.kind.nested_properties();
        let callback = self.on_click.clone();
        let hovered = Rc::clone(&self.hovered);
        let weak = handle.downgrade();
        self.handlers.bind_if_due(now, handle, || {
            pointer_bindings(name, layer, nested, callback, hovered, weak)
        });
    }
}

impl<K: OverlayKind> Drop for Overlay<K> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Click routes the topmost feature to the callback; hover only swaps the
/// cursor. Handlers keep a weak handle so the engine never owns itself.
fn pointer_bindings(
    name: &'static str,
    layer: String,
    nested: &'static [&'static str],
    callback: CallbackCell<ClickEvent>,
    hovered: Rc<Cell<bool>>,
    handle: WeakMapHandle,
) -> Vec<Binding> {
    let cursor = |over: bool, cursor: Cursor| {
        let handle = handle.clone();
        let hovered = Rc::clone(&hovered);
        Rc::new(move |_: &MapEvent| {
            hovered.set(over);
            if let Err(e) = handle.with_engine(|engine| engine.set_cursor(cursor)) {
                debug!("{name}: cursor unchanged: {e}");
            }
        })
    };

    vec![
        Binding {
            kind: EventKind::Click,
            layer: layer.clone(),
            handler: Rc::new(move |event: &MapEvent| {
                let Some(hit) = event.features.first() else {
                    return;
                };
                let click = ClickEvent::from_feature(name, &hit.feature, event.lng_lat, nested);
                callback.invoke(&click);
            }),
        },
        Binding {
            kind: EventKind::MouseEnter,
            layer: layer.clone(),
            handler: cursor(true, Cursor::Pointer),
        },
        Binding {
            kind: EventKind::MouseLeave,
            layer,
            handler: cursor(false, Cursor::Default),
        },
    ]
}
