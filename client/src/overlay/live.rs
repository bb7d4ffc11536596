//! Live positions of the current user, friends and reported police

use super::markers::{MarkerLayer, MarkerSpec, ReconcileStats};
use crate::geojson::LngLat;
use crate::map::engine::{MarkerRole, MarkerStyle};
use crate::map::handle::MapHandle;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LiveKind {
    User,
    Police,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LivePosition {
    pub id: String,
    pub position: LngLat,
    pub kind: LiveKind,
    pub label: Option<String>,
}

/// Not draggable; positions are reconciled by id as updates stream in
pub struct LivePositions {
    markers: MarkerLayer,
    positions: Vec<LivePosition>,
    /// Highlighted as "you"
    own_id: Option<String>,
    visible: bool,
}

impl Default for LivePositions {
    fn default() -> Self {
        Self::new()
    }
}

impl LivePositions {
    pub fn new() -> Self {
        Self {
            markers: MarkerLayer::new("live-positions"),
            positions: Vec::new(),
            own_id: None,
            visible: true,
        }
    }

    pub fn with_own_id(mut self, id: impl Into<String>) -> Self {
        self.own_id = Some(id.into());
        self
    }

    pub fn attach(&mut self, handle: &MapHandle) {
        self.markers.attach(handle);
        self.sync();
    }

    pub fn positions(&self) -> &[LivePosition] {
        &self.positions
    }

    pub fn markers(&self) -> &MarkerLayer {
        &self.markers
    }

    /// Replace the known positions
    pub fn set_positions(&mut self, positions: Vec<LivePosition>) -> ReconcileStats {
        self.positions = positions;
        self.sync()
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.sync();
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.markers.clear();
    }

    /// Push the current positions to the engine
    pub fn sync(&mut self) -> ReconcileStats {
        if !self.visible {
            self.markers.clear();
            return ReconcileStats::default();
        }
        let specs: Vec<MarkerSpec> = self
            .positions
            .iter()
            .map(|live| MarkerSpec {
                id: live.id.clone(),
                position: live.position,
                style: MarkerStyle {
                    role: match live.kind {
                        LiveKind::User => MarkerRole::User,
                        LiveKind::Police => MarkerRole::Police,
                    },
                    selected: self.own_id.as_deref() == Some(live.id.as_str()),
                    label: live.label.clone(),
                },
                draggable: false,
            })
            .collect();
        self.markers.reconcile(&specs)
    }
}
