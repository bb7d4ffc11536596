//! Editable route waypoints shown as draggable markers

use std::cell::RefCell;
use std::rc::Rc;

use super::markers::{MarkerDrag, MarkerLayer, MarkerSpec, ReconcileStats};
use super::route::RouteLine;
use crate::geojson::{FeatureCollection, LngLat};
use crate::layers::CallbackCell;
use crate::map::engine::{MarkerRole, MarkerStyle};
use crate::map::handle::MapHandle;

#[derive(Clone, Debug, PartialEq)]
pub struct Waypoint {
    pub id: String,
    pub position: LngLat,
    pub label: Option<String>,
}

/// Ordered waypoints; the first renders as the start, the last as the end
pub struct WaypointEditor {
    markers: MarkerLayer,
    waypoints: Rc<RefCell<Vec<Waypoint>>>,
    selected: Option<String>,
    visible: bool,
    next_id: u64,
    on_change: CallbackCell<Vec<Waypoint>>,
}

impl Default for WaypointEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl WaypointEditor {
    pub fn new() -> Self {
        let markers = MarkerLayer::new("waypoints");
        let waypoints: Rc<RefCell<Vec<Waypoint>>> = Rc::default();
        let on_change: CallbackCell<Vec<Waypoint>> = CallbackCell::new();

        let list = Rc::clone(&waypoints);
        let notify = on_change.clone();
        markers.on_drag_end(move |drag: &MarkerDrag| {
            let snapshot = {
                let mut list = list.borrow_mut();
                let Some(waypoint) = list.iter_mut().find(|w| w.id == drag.id) else {
                    return;
                };
                waypoint.position = drag.position;
                list.clone()
            };
            notify.invoke(&snapshot);
        });

        Self {
            markers,
            waypoints,
            selected: None,
            visible: true,
            next_id: 1,
            on_change,
        }
    }

    pub fn attach(&mut self, handle: &MapHandle) {
        self.markers.attach(handle);
        self.sync();
    }

    /// Called with the full list whenever a drag moves a waypoint
    pub fn on_change(&self, callback: impl FnMut(&Vec<Waypoint>) + 'static) {
        self.on_change.set(callback);
    }

    pub fn waypoints(&self) -> Vec<Waypoint> {
        self.waypoints.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.waypoints.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.borrow().is_empty()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn markers(&self) -> &MarkerLayer {
        &self.markers
    }

    /// Append a waypoint and return its id
    pub fn add(&mut self, position: LngLat) -> String {
        let id = format!("wp-{}", self.next_id);
        self.next_id += 1;
        self.waypoints.borrow_mut().push(Waypoint {
            id: id.clone(),
            position,
            label: None,
        });
        self.sync();
        id
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let removed = {
            let mut list = self.waypoints.borrow_mut();
            let before = list.len();
            list.retain(|w| w.id != id);
            list.len() != before
        };
        if removed {
            if self.selected.as_deref() == Some(id) {
                self.selected = None;
            }
            self.sync();
        }
        removed
    }

    pub fn move_to(&mut self, id: &str, position: LngLat) -> bool {
        let moved = match self.waypoints.borrow_mut().iter_mut().find(|w| w.id == id) {
            Some(waypoint) => {
                waypoint.position = position;
                true
            }
            None => false,
        };
        if moved {
            self.sync();
        }
        moved
    }

    /// Highlight one waypoint, or none
    pub fn select(&mut self, id: Option<&str>) {
        let id = id.filter(|id| self.waypoints.borrow().iter().any(|w| w.id == *id));
        self.selected = id.map(str::to_string);
        self.sync();
    }

    /// Replace the whole list, e.g. when a saved route is loaded
    pub fn set_waypoints(&mut self, waypoints: Vec<Waypoint>) {
        if self
            .selected
            .as_ref()
            .is_some_and(|selected| !waypoints.iter().any(|w| &w.id == selected))
        {
            self.selected = None;
        }
        *self.waypoints.borrow_mut() = waypoints;
        self.sync();
    }

    /// Line through the waypoints, for a [`RouteLine`] preview
    pub fn route(&self) -> FeatureCollection {
        let path: Vec<LngLat> = self.waypoints.borrow().iter().map(|w| w.position).collect();
        RouteLine::path(&path)
    }

    /// Hidden waypoints keep their data; only the markers go away
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.sync();
    }

    /// Push the current list to the engine
    pub fn sync(&mut self) -> ReconcileStats {
        if !self.visible {
            self.markers.clear();
            return ReconcileStats::default();
        }
        let specs = self.marker_specs();
        self.markers.reconcile(&specs)
    }

    pub fn clear(&mut self) {
        self.waypoints.borrow_mut().clear();
        self.selected = None;
        self.markers.clear();
    }

    fn marker_specs(&self) -> Vec<MarkerSpec> {
        let list = self.waypoints.borrow();
        let last = list.len().saturating_sub(1);
        list.iter()
            .enumerate()
            .map(|(index, waypoint)| {
                let role = match index {
                    0 => MarkerRole::Start,
                    i if i == last => MarkerRole::End,
                    _ => MarkerRole::Waypoint,
                };
                let label = waypoint.label.clone().or_else(|| match role {
                    MarkerRole::Waypoint => Some(index.to_string()),
                    _ => None,
                });
                MarkerSpec {
                    id: waypoint.id.clone(),
                    position: waypoint.position,
                    style: MarkerStyle {
                        role,
                        selected: self.selected.as_deref() == Some(waypoint.id.as_str()),
                        label,
                    },
                    draggable: true,
                }
            })
            .collect()
    }
}
