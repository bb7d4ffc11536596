//! Expression builders and the shared colour tables

use serde_json::{Value, json};

/// Detection method colours for speed-trap markers and their halos
pub const DETECTION_COLORS: &[(&str, &str)] = &[
    ("radar", "#ef4444"),
    ("laser", "#f97316"),
    ("vascar", "#eab308"),
    ("patrol", "#3b82f6"),
    ("automated", "#a855f7"),
];

pub const DEFAULT_DETECTION_COLOR: &str = "#6b7280";

/// Pattern-type colours for discovered clusters
pub const PATTERN_COLORS: &[(&str, &str)] = &[
    ("time_cluster", "#06b6d4"),
    ("method_zone", "#f43f5e"),
    ("quota_effect", "#f59e0b"),
    ("day_pattern", "#8b5cf6"),
];

pub const DEFAULT_PATTERN_COLOR: &str = "#94a3b8";

/// `["get", name]`
pub fn get(property: &str) -> Value {
    json!(["get", property])
}

/// `["coalesce", ["get", name], fallback]` so missing properties do not
/// poison numeric expressions
pub fn get_or(property: &str, fallback: impl Into<Value>) -> Value {
    json!(["coalesce", ["get", property], fallback.into()])
}

/// `["downcase", input]`, for matching categories regardless of case
pub fn downcase(input: Value) -> Value {
    json!(["downcase", input])
}

pub fn zoom() -> Value {
    json!(["zoom"])
}

/// `["match", input, k1, v1, ..., fallback]` over a fixed table
pub fn match_table(input: Value, table: &[(&str, &str)], fallback: &str) -> Value {
    let mut expr = vec![json!("match"), input];
    for (key, value) in table {
        expr.push(json!(key));
        expr.push(json!(value));
    }
    expr.push(json!(fallback));
    Value::Array(expr)
}

/// Piecewise-linear interpolation. Stops must be strictly increasing in
/// their input value; anything else is rejected by real engines.
pub fn interpolate_linear(input: Value, stops: &[(f64, Value)]) -> Value {
    debug_assert!(is_monotonic(stops), "interpolation stops must increase");
    let mut expr = vec![json!("interpolate"), json!(["linear"]), input];
    for (at, value) in stops {
        expr.push(json!(at));
        expr.push(value.clone());
    }
    Value::Array(expr)
}

pub fn is_monotonic(stops: &[(f64, Value)]) -> bool {
    stops.windows(2).all(|pair| pair[0].0 < pair[1].0)
}

/// Numeric stops shorthand for [`interpolate_linear`]
pub fn stops(pairs: &[(f64, f64)]) -> Vec<(f64, Value)> {
    pairs.iter().map(|(at, value)| (*at, json!(value))).collect()
}

/// Numeric value interpolated over zoom
pub fn by_zoom(pairs: &[(f64, f64)]) -> Value {
    interpolate_linear(zoom(), &stops(pairs))
}

/// Size that grows with zoom and, at each zoom stop, with a count property.
/// Produces `interpolate(zoom, z1, interpolate(count, ...), z2, ...)`.
pub fn zoom_and_count_scaled(
    count_property: &str,
    zoom_stops: &[(f64, f64)],
    count_stops: &[(f64, f64)],
) -> Value {
    let per_zoom: Vec<(f64, Value)> = zoom_stops
        .iter()
        .map(|(z, scale)| {
            let scaled: Vec<(f64, f64)> =
                count_stops.iter().map(|(c, size)| (*c, size * scale)).collect();
            (*z, interpolate_linear(get_or(count_property, 0), &stops(&scaled)))
        })
        .collect();
    interpolate_linear(zoom(), &per_zoom)
}

/// Opacity that fades in (or out when `fade_in` is false) across a zoom window
pub fn zoom_fade(from_zoom: f64, to_zoom: f64, fade_in: bool) -> Value {
    let (start, end) = if fade_in { (0.0, 1.0) } else { (1.0, 0.0) };
    by_zoom(&[(from_zoom, start), (to_zoom, end)])
}
