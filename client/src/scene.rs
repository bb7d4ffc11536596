//! Map scene owning the engine provider and every overlay bound to it

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};
use web_time::Instant;

use crate::geojson::LngLat;
use crate::map::engine::MapEngine;
use crate::map::handle::{MapHandle, MapProvider, SharedEngine};
use crate::overlay::{LivePositions, Overlay, OverlayKind, WaypointEditor};

/// What the scene needs from an overlay to drive it each frame
pub trait OverlayDriver {
    fn name(&self) -> &'static str;
    fn attach(&mut self, handle: &MapHandle, now: Instant);
    fn update(&mut self, now: Instant);
    fn viewport_changed(&mut self, now: Instant);
    fn set_visible(&mut self, visible: bool);
    fn teardown(&mut self);
}

impl<K: OverlayKind + 'static> OverlayDriver for Overlay<K> {
    fn name(&self) -> &'static str {
        Overlay::name(self)
    }

    fn attach(&mut self, handle: &MapHandle, now: Instant) {
        Overlay::attach(self, handle, now);
    }

    fn update(&mut self, now: Instant) {
        Overlay::update(self, now);
    }

    fn viewport_changed(&mut self, now: Instant) {
        Overlay::viewport_changed(self, now);
    }

    fn set_visible(&mut self, visible: bool) {
        Overlay::set_visible(self, visible);
    }

    fn teardown(&mut self) {
        Overlay::teardown(self);
    }
}

impl OverlayDriver for WaypointEditor {
    fn name(&self) -> &'static str {
        self.markers().name()
    }

    fn attach(&mut self, handle: &MapHandle, _now: Instant) {
        WaypointEditor::attach(self, handle);
    }

    fn update(&mut self, _now: Instant) {
        // Attached before the engine was ready
        if self.markers().len() != self.len() {
            self.sync();
        }
    }

    fn viewport_changed(&mut self, _now: Instant) {}

    fn set_visible(&mut self, visible: bool) {
        WaypointEditor::set_visible(self, visible);
    }

    fn teardown(&mut self) {
        self.clear();
    }
}

impl OverlayDriver for LivePositions {
    fn name(&self) -> &'static str {
        self.markers().name()
    }

    fn attach(&mut self, handle: &MapHandle, _now: Instant) {
        LivePositions::attach(self, handle);
    }

    fn update(&mut self, _now: Instant) {
        if self.markers().len() != self.positions().len() {
            self.sync();
        }
    }

    fn viewport_changed(&mut self, _now: Instant) {}

    fn set_visible(&mut self, visible: bool) {
        LivePositions::set_visible(self, visible);
    }

    fn teardown(&mut self) {
        self.clear();
    }
}

type SharedDriver = Rc<RefCell<dyn OverlayDriver>>;

/// Integrated map scene
///
/// Hosts call [`MapScene::update`] once per frame and forward camera
/// movement through [`MapScene::viewport_changed`] (or the pan and fly
/// helpers, which do both).
pub struct MapScene {
    provider: MapProvider,
    drivers: Vec<SharedDriver>,
}

impl MapScene {
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            provider: MapProvider::new(engine),
            drivers: Vec::new(),
        }
    }

    pub fn handle(&self) -> &MapHandle {
        self.provider.handle()
    }

    /// The engine finished loading its style
    pub fn mark_ready(&self, now: Instant) {
        self.provider.handle().mark_ready();
        self.update(now);
    }

    /// Register an overlay and bind it to the current engine. The returned
    /// handle stays valid for filter changes and callbacks.
    pub fn add<D: OverlayDriver + 'static>(&mut self, driver: D, now: Instant) -> Rc<RefCell<D>> {
        let driver = Rc::new(RefCell::new(driver));
        driver.borrow_mut().attach(self.provider.handle(), now);
        self.drivers.push(driver.clone());
        driver
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Swap the engine and re-attach every overlay to it
    pub fn replace_engine(&mut self, engine: SharedEngine, now: Instant) {
        let handle = self.provider.replace(engine).clone();
        self.for_each(|driver| driver.attach(&handle, now));
    }

    /// Drive every overlay (call each frame)
    pub fn update(&self, now: Instant) {
        self.for_each(|driver| driver.update(now));
    }

    pub fn viewport_changed(&self, now: Instant) {
        self.for_each(|driver| driver.viewport_changed(now));
    }

    /// Pan the map by a pixel delta
    pub fn pan(&self, dx: f32, dy: f32, now: Instant) {
        self.move_camera(|engine| engine.pan_by(dx, dy), now);
    }

    pub fn fly_to(&self, center: LngLat, zoom: Option<f64>, now: Instant) {
        self.move_camera(|engine| engine.fly_to(center, zoom), now);
    }

    /// Show or hide the overlay registered under `name`
    pub fn set_visible(&self, name: &str, visible: bool) -> bool {
        let found = self.drivers.iter().find(|d| d.try_borrow().is_ok_and(|d| d.name() == name));
        let Some(driver) = found else {
            return false;
        };
        match driver.try_borrow_mut() {
            Ok(mut driver) => {
                driver.set_visible(visible);
                true
            }
            Err(_) => false,
        }
    }

    /// Tear down every overlay and forget them
    pub fn teardown_all(&mut self) {
        self.for_each(|driver| driver.teardown());
        self.drivers.clear();
    }

    fn move_camera(&self, f: impl FnOnce(&mut dyn MapEngine), now: Instant) {
        match self.provider.handle().with_engine(f) {
            Ok(()) => self.viewport_changed(now),
            Err(e) => warn!("camera unchanged: {e}"),
        }
    }

    /// Overlays already borrowed (a callback re-entering the scene) are
    /// skipped for this pass
    fn for_each(&self, mut f: impl FnMut(&mut dyn OverlayDriver)) {
        for driver in &self.drivers {
            match driver.try_borrow_mut() {
                Ok(mut driver) => f(&mut *driver),
                Err(_) => debug!("scene: overlay busy, skipped"),
            }
        }
    }
}

impl Drop for MapScene {
    fn drop(&mut self) {
        self.teardown_all();
    }
}
