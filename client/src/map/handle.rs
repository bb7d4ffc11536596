//! Shared handle to the map engine
//!
//! The provider owns the only strong reference; overlays hold a
//! [`WeakMapHandle`] so they never keep an engine alive after the page has
//! swapped it out.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::debug;

use super::camera::Viewport;
use super::engine::MapEngine;
use crate::error::MapError;

pub type SharedEngine = Rc<RefCell<dyn MapEngine>>;

struct MapSurface {
    engine: SharedEngine,
    ready: Cell<bool>,
    epoch: u64,
}

/// Strong handle to the current engine instance
#[derive(Clone)]
pub struct MapHandle {
    surface: Rc<MapSurface>,
}

impl MapHandle {
    pub fn new(engine: SharedEngine, epoch: u64) -> Self {
        Self {
            surface: Rc::new(MapSurface {
                engine,
                ready: Cell::new(false),
                epoch,
            }),
        }
    }

    /// The engine finished loading its style
    pub fn mark_ready(&self) {
        if !self.surface.ready.replace(true) {
            debug!("map surface {} ready", self.surface.epoch);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.surface.ready.get()
    }

    /// Identity of the engine instance behind this handle
    pub fn epoch(&self) -> u64 {
        self.surface.epoch
    }

    pub fn downgrade(&self) -> WeakMapHandle {
        WeakMapHandle {
            surface: Rc::downgrade(&self.surface),
            epoch: self.surface.epoch,
        }
    }

    /// Run `f` with mutable engine access. Fails instead of panicking when
    /// the engine is already borrowed further up the stack.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut dyn MapEngine) -> R) -> Result<R, MapError> {
        let mut engine = self
            .surface
            .engine
            .try_borrow_mut()
            .map_err(|_| MapError::EngineBusy)?;
        Ok(f(&mut *engine))
    }

    pub fn bounds(&self) -> Result<Viewport, MapError> {
        self.with_engine(|engine| engine.bounds())
    }

    pub fn zoom(&self) -> Result<f64, MapError> {
        self.with_engine(|engine| engine.zoom())
    }
}

/// Non-owning handle kept by overlays
#[derive(Clone)]
pub struct WeakMapHandle {
    surface: Weak<MapSurface>,
    epoch: u64,
}

impl WeakMapHandle {
    pub fn upgrade(&self) -> Option<MapHandle> {
        self.surface.upgrade().map(|surface| MapHandle { surface })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether this weak handle refers to the same surface as `handle`
    pub fn points_to(&self, handle: &MapHandle) -> bool {
        std::ptr::eq(self.surface.as_ptr(), Rc::as_ptr(&handle.surface))
    }

    /// Convenience for callbacks: run `f` if the engine is still attached
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut dyn MapEngine) -> R) -> Result<R, MapError> {
        self.upgrade().ok_or(MapError::EngineGone)?.with_engine(f)
    }
}

/// Owner of the current engine instance
pub struct MapProvider {
    current: MapHandle,
}

impl MapProvider {
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            current: MapHandle::new(engine, 0),
        }
    }

    pub fn handle(&self) -> &MapHandle {
        &self.current
    }

    /// Swap in a new engine (e.g. after navigating away from and back to the
    /// map). The previous handle is dropped, so overlays bound to it see
    /// their weak handle go dead.
    pub fn replace(&mut self, engine: SharedEngine) -> &MapHandle {
        let epoch = self.current.epoch() + 1;
        debug!("replacing map surface {} with {}", self.current.epoch(), epoch);
        self.current = MapHandle::new(engine, epoch);
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::retained::RetainedMap;

    fn engine() -> SharedEngine {
        Rc::new(RefCell::new(RetainedMap::default()))
    }

    #[test]
    fn starts_not_ready() {
        let provider = MapProvider::new(engine());
        assert!(!provider.handle().is_ready());
        provider.handle().mark_ready();
        assert!(provider.handle().is_ready());
    }

    #[test]
    fn replacing_the_engine_kills_weak_handles() {
        let mut provider = MapProvider::new(engine());
        let weak = provider.handle().downgrade();
        assert!(weak.upgrade().is_some());

        let next = provider.replace(engine()).clone();

        assert!(weak.upgrade().is_none());
        assert!(matches!(weak.with_engine(|_| ()), Err(MapError::EngineGone)));
        assert!(!weak.points_to(&next));
        assert!(next.downgrade().points_to(&next));
        assert_eq!(next.epoch(), 1);
    }

    #[test]
    fn reentrant_access_is_reported_not_panicking() {
        let provider = MapProvider::new(engine());
        let handle = provider.handle().clone();
        let nested = provider
            .handle()
            .with_engine(|_| handle.with_engine(|_| ()))
            .unwrap();
        assert!(matches!(nested, Err(MapError::EngineBusy)));
    }
}
