//! Creation and removal of a source together with its dependent layers
//!
//! A layer set is either fully present on the engine or fully absent. Any
//! partial state created during a call is rolled back before it returns.

use log::{debug, error, warn};
use serde_json::json;

use crate::error::MapError;
use crate::geojson::FeatureCollection;
use crate::map::engine::{LayerSpec, MapEngine, Visibility};

/// One source plus the layers rendered from it
#[derive(Clone, Debug, PartialEq)]
pub struct LayerSetSpec {
    pub source_id: String,
    /// Bottom to top (glow, main, label)
    pub layers: Vec<LayerSpec>,
    /// Simpler definitions tried when the primary set is refused
    pub fallback: Option<Vec<LayerSpec>>,
}

impl LayerSetSpec {
    pub fn new(source_id: impl Into<String>, layers: Vec<LayerSpec>) -> Self {
        Self {
            source_id: source_id.into(),
            layers,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Vec<LayerSpec>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// The definition that ended up on the engine. After a fallback the
    /// primary layers are dropped so later ensures do not retry them.
    pub fn settled(mut self, status: LayerSetStatus) -> Self {
        if status == LayerSetStatus::CreatedFallback {
            if let Some(fallback) = self.fallback.take() {
                self.layers = fallback;
            }
        }
        self
    }

    /// Every layer id either definition may have created, bottom to top
    pub fn layer_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.layers.iter().map(|layer| layer.id.as_str()).collect();
        for layer in self.fallback.iter().flatten() {
            if !ids.contains(&layer.id.as_str()) {
                ids.push(layer.id.as_str());
            }
        }
        ids
    }
}

/// What [`ensure_layer_set`] had to do
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayerSetStatus {
    AlreadyPresent,
    Created,
    CreatedFallback,
}

/// Create the source and any missing layers of `spec`.
///
/// Presence is decided by asking the engine, so this stays correct when the
/// engine instance was swapped underneath the caller. Calling it again once
/// everything exists has no visible effect.
pub fn ensure_layer_set(
    engine: &mut dyn MapEngine,
    spec: &LayerSetSpec,
    initial_data: impl FnOnce() -> FeatureCollection,
    visibility: Visibility,
) -> Result<LayerSetStatus, MapError> {
    let added_source = if engine.has_source(&spec.source_id) {
        false
    } else {
        engine.add_source(&spec.source_id, initial_data())?;
        true
    };

    let primary_error = match add_missing(engine, &spec.layers, visibility) {
        Ok(0) if !added_source => return Ok(LayerSetStatus::AlreadyPresent),
        Ok(_) => return Ok(LayerSetStatus::Created),
        Err(e) => e,
    };

    if let Some(fallback) = &spec.fallback {
        warn!("{}: primary layers refused ({primary_error}), using fallback", spec.source_id);
        match add_missing(engine, fallback, visibility) {
            Ok(_) => return Ok(LayerSetStatus::CreatedFallback),
            Err(e) => error!("{}: fallback layers refused too: {e}", spec.source_id),
        }
    }

    if added_source {
        if let Err(e) = engine.remove_source(&spec.source_id) {
            error!("{}: could not roll back source: {e}", spec.source_id);
        }
    }
    Err(primary_error)
}

/// Add the layers not yet on the engine; on failure remove the ones this call
/// added, newest first.
fn add_missing(
    engine: &mut dyn MapEngine,
    layers: &[LayerSpec],
    visibility: Visibility,
) -> Result<usize, MapError> {
    let mut added: Vec<&str> = Vec::new();

    for layer in layers {
        if engine.has_layer(&layer.id) {
            continue;
        }
        let spec = layer.clone().layout("visibility", visibility.as_str());
        if let Err(e) = engine.add_layer(spec) {
            for id in added.iter().rev() {
                if let Err(rollback) = engine.remove_layer(id) {
                    debug!("rollback of {id} failed: {rollback}");
                }
            }
            return Err(e);
        }
        added.push(&layer.id);
    }

    Ok(added.len())
}

/// Remove layers top to bottom (label, main, glow) and then the source.
/// Ids that are already gone are skipped.
pub fn remove_layer_set(engine: &mut dyn MapEngine, spec: &LayerSetSpec) -> Result<(), MapError> {
    let mut first_error = None;

    for id in spec.layer_ids().into_iter().rev() {
        if engine.has_layer(id) {
            if let Err(e) = engine.remove_layer(id) {
                warn!("removing layer {id}: {e}");
                first_error.get_or_insert(e);
            }
        }
    }

    if engine.has_source(&spec.source_id) {
        if let Err(e) = engine.remove_source(&spec.source_id) {
            warn!("removing source {}: {e}", spec.source_id);
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Toggle the `visibility` layout property of every existing layer in the set.
/// Source data is left untouched.
pub fn set_visibility(
    engine: &mut dyn MapEngine,
    spec: &LayerSetSpec,
    visibility: Visibility,
) -> Result<(), MapError> {
    for id in spec.layer_ids() {
        if engine.has_layer(id) {
            engine.set_layout_property(id, "visibility", json!(visibility.as_str()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::engine::LayerKind;
    use crate::map::retained::RetainedMap;
    use crate::style;
    use rstest::rstest;

    fn spec() -> LayerSetSpec {
        LayerSetSpec::new(
            "traps-source",
            vec![
                LayerSpec::new("traps-glow", LayerKind::Circle, "traps-source").paint(
                    "circle-radius",
                    style::by_zoom(&[(10.0, 8.0), (16.0, 20.0)]),
                ),
                LayerSpec::new("traps-main", LayerKind::Circle, "traps-source")
                    .paint("circle-radius", 6),
                LayerSpec::new("traps-label", LayerKind::Symbol, "traps-source")
                    .layout("text-field", style::get("stopCount")),
            ],
        )
        .with_fallback(vec![
            LayerSpec::new("traps-main", LayerKind::Circle, "traps-source")
                .paint("circle-radius", 6),
        ])
    }

    fn ensure(engine: &mut RetainedMap, spec: &LayerSetSpec) -> Result<LayerSetStatus, MapError> {
        ensure_layer_set(engine, spec, FeatureCollection::default, Visibility::Visible)
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(10)]
    fn repeated_ensure_creates_exactly_one_of_each(#[case] calls: usize) {
        let mut engine = RetainedMap::default();
        let spec = spec();

        for _ in 0..calls {
            ensure(&mut engine, &spec).unwrap();
        }

        assert_eq!(engine.stats().sources_added, 1);
        assert_eq!(engine.stats().layers_added, 3);
        assert_eq!(engine.layer_ids(), vec!["traps-glow", "traps-main", "traps-label"]);
    }

    #[test]
    fn second_call_reports_already_present() {
        let mut engine = RetainedMap::default();
        let spec = spec();
        assert_eq!(ensure(&mut engine, &spec).unwrap(), LayerSetStatus::Created);
        assert_eq!(ensure(&mut engine, &spec).unwrap(), LayerSetStatus::AlreadyPresent);
    }

    #[test]
    fn unsupported_expression_falls_back_without_leftovers() {
        let mut engine = RetainedMap::default();
        engine.restrict_operators(&["get"]);

        let status = ensure(&mut engine, &spec()).unwrap();

        assert_eq!(status, LayerSetStatus::CreatedFallback);
        assert_eq!(engine.layer_ids(), vec!["traps-main"]);
    }

    #[test]
    fn settled_fallback_is_not_retried() {
        let mut engine = RetainedMap::default();
        engine.reject_kind(LayerKind::Symbol);
        let status = ensure(&mut engine, &spec()).unwrap();
        let settled = spec().settled(status);
        assert_eq!(settled.layer_ids(), vec!["traps-main"]);
        let added = engine.stats().layers_added;

        for _ in 0..5 {
            let status = ensure(&mut engine, &settled).unwrap();
            assert_eq!(status, LayerSetStatus::AlreadyPresent);
        }

        assert_eq!(engine.stats().layers_added, added);
        assert_eq!(engine.layer_ids(), vec!["traps-main"]);
    }

    #[test]
    fn settled_primary_keeps_its_fallback() {
        let settled = spec().settled(LayerSetStatus::Created);
        assert_eq!(settled, spec());
    }

    #[test]
    fn failing_fallback_leaves_engine_empty() {
        let mut engine = RetainedMap::default();
        engine.reject_kind(LayerKind::Circle);

        let result = ensure(&mut engine, &spec());

        assert!(result.is_err());
        assert!(engine.layer_ids().is_empty());
        assert!(!engine.has_source("traps-source"));
    }

    #[test]
    fn partial_state_is_completed_not_duplicated() {
        let mut engine = RetainedMap::default();
        let spec = spec();
        ensure(&mut engine, &spec).unwrap();
        engine.remove_layer("traps-label").unwrap();

        ensure(&mut engine, &spec).unwrap();

        assert_eq!(engine.stats().sources_added, 1);
        assert!(engine.has_layer("traps-label"));
    }

    #[test]
    fn removal_leaves_nothing_behind() {
        let mut engine = RetainedMap::default();
        let spec = spec();
        ensure(&mut engine, &spec).unwrap();

        remove_layer_set(&mut engine, &spec).unwrap();

        assert!(!engine.has_source("traps-source"));
        for id in spec.layer_ids() {
            assert!(!engine.has_layer(id));
        }
        // Second removal is a no-op
        remove_layer_set(&mut engine, &spec).unwrap();
    }

    #[test]
    fn visibility_only_touches_layout() {
        let mut engine = RetainedMap::default();
        let spec = spec();
        ensure(&mut engine, &spec).unwrap();
        let updates = engine.stats().data_updates;

        set_visibility(&mut engine, &spec, Visibility::None).unwrap();

        assert_eq!(engine.layer("traps-main").unwrap().layout["visibility"], "none");
        assert_eq!(engine.stats().data_updates, updates);
    }

    #[test]
    fn layers_are_created_with_requested_visibility() {
        let mut engine = RetainedMap::default();
        ensure_layer_set(&mut engine, &spec(), FeatureCollection::default, Visibility::None)
            .unwrap();
        assert_eq!(engine.layer("traps-glow").unwrap().layout["visibility"], "none");
    }
}
