//! Pointer handler installation with guaranteed teardown
//!
//! Engine handlers never capture overlay callbacks directly. They call
//! through a [`CallbackCell`], so the host can swap the callback logic at any
//! time without the layers being unbound, rebound or recreated.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, warn};
use web_time::Instant;

use crate::error::MapError;
use crate::map::engine::{EventHandler, EventKind, HandlerId};
use crate::map::handle::{MapHandle, WeakMapHandle};

type Callback<T> = Box<dyn FnMut(&T)>;

/// Long-lived reference cell holding the current callback
pub struct CallbackCell<T> {
    inner: Rc<RefCell<Option<Callback<T>>>>,
}

impl<T> Clone for CallbackCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for CallbackCell<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(None)),
        }
    }
}

impl<T> CallbackCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the callback. Existing engine bindings pick it up immediately.
    pub fn set(&self, callback: impl FnMut(&T) + 'static) {
        *self.inner.borrow_mut() = Some(Box::new(callback));
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().take();
    }

    /// Call the current callback; returns whether one ran
    pub fn invoke(&self, value: &T) -> bool {
        let Ok(mut slot) = self.inner.try_borrow_mut() else {
            debug!("callback re-entered, skipping nested invocation");
            return false;
        };
        match slot.as_mut() {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }
}

/// One layer-scoped subscription to install
pub struct Binding {
    pub kind: EventKind,
    pub layer: String,
    pub handler: EventHandler,
}

/// Subscribe every binding. All layers must already exist; nothing is
/// installed otherwise.
pub fn install_handlers(
    handle: &MapHandle,
    bindings: Vec<Binding>,
) -> Result<HandlerGuard, MapError> {
    let ids = handle.with_engine(|engine| {
        if let Some(missing) = bindings.iter().find(|b| !engine.has_layer(&b.layer)) {
            return Err(MapError::UnknownLayer(missing.layer.clone()));
        }
        Ok(bindings
            .into_iter()
            .map(|b| engine.on(b.kind, &b.layer, b.handler))
            .collect::<Vec<_>>())
    })??;

    Ok(HandlerGuard {
        handle: handle.downgrade(),
        ids,
    })
}

/// Unsubscribes its handlers on [`HandlerGuard::teardown`] or drop
pub struct HandlerGuard {
    handle: WeakMapHandle,
    ids: Vec<HandlerId>,
}

impl HandlerGuard {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Remove every subscription; returns how many the engine still had
    pub fn teardown(mut self) -> usize {
        self.unbind()
    }

    fn unbind(&mut self) -> usize {
        if self.ids.is_empty() {
            return 0;
        }
        let ids = std::mem::take(&mut self.ids);
        match self
            .handle
            .with_engine(|engine| ids.iter().filter(|id| engine.off(**id)).count())
        {
            Ok(removed) => removed,
            // The engine went away and took its handlers with it
            Err(MapError::EngineGone) => 0,
            Err(e) => {
                warn!("could not unbind {} handlers: {e}", ids.len());
                0
            }
        }
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        self.unbind();
    }
}

/// Handler installation for one overlay, bound a short delay after its
/// layers were created
pub struct HandlerSet {
    delay: Duration,
    due: Option<Instant>,
    guard: Option<HandlerGuard>,
}

impl HandlerSet {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            due: None,
            guard: None,
        }
    }

    /// Arm binding after layer creation; no-op while already bound
    pub fn schedule(&mut self, now: Instant) {
        if self.guard.is_none() && self.due.is_none() {
            self.due = Some(now + self.delay);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.guard.is_some()
    }

    /// Install the handlers produced by `build` once the delay has elapsed.
    /// A binding that names a layer the engine does not know yet stays armed
    /// and is retried on the next call.
    pub fn bind_if_due(
        &mut self,
        now: Instant,
        handle: &MapHandle,
        build: impl FnOnce() -> Vec<Binding>,
    ) -> bool {
        match self.due {
            Some(due) if self.guard.is_none() && now >= due => {}
            _ => return false,
        }

        match install_handlers(handle, build()) {
            Ok(guard) => {
                debug!("bound {} handlers", guard.len());
                self.guard = Some(guard);
                self.due = None;
                true
            }
            Err(e) => {
                debug!("handler binding deferred: {e}");
                false
            }
        }
    }

    /// Unbind everything and disarm any pending binding
    pub fn release(&mut self) -> usize {
        self.due = None;
        self.guard.take().map_or(0, HandlerGuard::teardown)
    }
}
