//! Individually owned markers reconciled by id
//!
//! Unlike fetched overlays, whose data is swapped wholesale, markers can be
//! mid-drag when new data arrives. Ids present on both sides are updated in
//! place so the engine object, and any gesture on it, survives.

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use log::{debug, warn};

use crate::error::MapError;
use crate::geojson::LngLat;
use crate::layers::CallbackCell;
use crate::map::engine::{EngineMarkerId, MapEngine, MarkerOptions, MarkerStyle};
use crate::map::handle::{MapHandle, WeakMapHandle};

/// Desired state of one marker
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerSpec {
    pub id: String,
    pub position: LngLat,
    pub style: MarkerStyle,
    pub draggable: bool,
}

/// Delivered when the user drops a draggable marker
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerDrag {
    pub id: String,
    pub position: LngLat,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

struct LiveMarker {
    engine_id: EngineMarkerId,
    position: LngLat,
    style: MarkerStyle,
}

pub struct MarkerLayer {
    name: &'static str,
    handle: Option<WeakMapHandle>,
    live: BTreeMap<String, LiveMarker>,
    on_drag_end: CallbackCell<MarkerDrag>,
}

impl MarkerLayer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: None,
            live: BTreeMap::new(),
            on_drag_end: CallbackCell::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Bind to an engine. Markers created on a previous engine are removed
    /// from it if it is still alive and recreated on the next reconcile.
    pub fn attach(&mut self, handle: &MapHandle) {
        if self.handle.as_ref().is_some_and(|current| current.points_to(handle)) {
            return;
        }
        self.clear();
        self.live.clear();
        self.handle = Some(handle.downgrade());
    }

    /// Replace the drag-end callback. Existing markers pick it up.
    pub fn on_drag_end(&self, callback: impl FnMut(&MarkerDrag) + 'static) {
        self.on_drag_end.set(callback);
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.live.keys().map(String::as_str)
    }

    pub fn engine_id(&self, id: &str) -> Option<EngineMarkerId> {
        self.live.get(id).map(|marker| marker.engine_id)
    }

    /// Bring the engine's markers in line with `desired`. Duplicate ids keep
    /// their first occurrence. Does nothing until the engine is ready.
    pub fn reconcile(&mut self, desired: &[MarkerSpec]) -> ReconcileStats {
        let Some(handle) = self.handle.as_ref().and_then(WeakMapHandle::upgrade) else {
            return ReconcileStats::default();
        };
        if !handle.is_ready() {
            return ReconcileStats::default();
        }

        let name = self.name;
        let live = &mut self.live;
        let drag = &self.on_drag_end;
        let result = handle.with_engine(|engine| {
            let mut stats = ReconcileStats::default();
            let mut wanted = HashSet::new();

            for spec in desired {
                if !wanted.insert(spec.id.as_str()) {
                    debug!("{name}: duplicate marker id {}", spec.id);
                }
            }

            let stale: Vec<String> =
                live.keys().filter(|id| !wanted.contains(id.as_str())).cloned().collect();
            for id in stale {
                if let Some(marker) = live.remove(&id) {
                    forget(engine, name, marker.engine_id);
                    stats.removed += 1;
                }
            }

            let mut seen = HashSet::new();
            for spec in desired.iter().filter(|spec| seen.insert(spec.id.as_str())) {
                match live.get_mut(&spec.id) {
                    Some(marker) => match update(engine, marker, spec) {
                        Ok(true) => stats.updated += 1,
                        Ok(false) => {}
                        Err(e) => {
                            debug!("{name}: recreating marker {}: {e}", spec.id);
                            let created = create(engine, spec, drag);
                            live.insert(spec.id.clone(), created);
                            stats.created += 1;
                        }
                    },
                    None => {
                        let created = create(engine, spec, drag);
                        live.insert(spec.id.clone(), created);
                        stats.created += 1;
                    }
                }
            }
            stats
        });

        match result {
            Ok(stats) => stats,
            Err(e) => {
                warn!("{}: markers not reconciled: {e}", self.name);
                ReconcileStats::default()
            }
        }
    }

    /// Remove every marker from the engine
    pub fn clear(&mut self) -> usize {
        if self.live.is_empty() {
            return 0;
        }
        let Some(handle) = self.handle.as_ref().and_then(WeakMapHandle::upgrade) else {
            // Markers died with their engine
            self.live.clear();
            return 0;
        };

        let name = self.name;
        let live = std::mem::take(&mut self.live);
        let count = live.len();
        if let Err(e) = handle.with_engine(|engine| {
            for marker in live.values() {
                forget(engine, name, marker.engine_id);
            }
        }) {
            warn!("{name}: could not remove {count} markers: {e}");
            return 0;
        }
        count
    }
}

impl Drop for MarkerLayer {
    fn drop(&mut self) {
        self.clear();
    }
}

fn create(
    engine: &mut dyn MapEngine,
    spec: &MarkerSpec,
    drag: &CallbackCell<MarkerDrag>,
) -> LiveMarker {
    let on_drag_end = spec.draggable.then(|| {
        let drag = drag.clone();
        let id = spec.id.clone();
        Rc::new(move |position: LngLat| {
            drag.invoke(&MarkerDrag { id: id.clone(), position });
        }) as Rc<dyn Fn(LngLat)>
    });
    let engine_id = engine.add_marker(MarkerOptions {
        position: spec.position,
        style: spec.style.clone(),
        draggable: spec.draggable,
        on_drag_end,
    });
    LiveMarker {
        engine_id,
        position: spec.position,
        style: spec.style.clone(),
    }
}

/// Apply position and style changes in place; returns whether anything changed
fn update(
    engine: &mut dyn MapEngine,
    marker: &mut LiveMarker,
    spec: &MarkerSpec,
) -> Result<bool, MapError> {
    let mut changed = false;
    if marker.position != spec.position {
        engine.set_marker_position(marker.engine_id, spec.position)?;
        marker.position = spec.position;
        changed = true;
    }
    if marker.style != spec.style {
        engine.set_marker_style(marker.engine_id, spec.style.clone())?;
        marker.style = spec.style.clone();
        changed = true;
    }
    Ok(changed)
}

fn forget(engine: &mut dyn MapEngine, name: &str, id: EngineMarkerId) {
    if let Err(e) = engine.remove_marker(id) {
        debug!("{name}: marker {id} already gone: {e}");
    }
}
