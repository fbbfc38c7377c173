//! Conversions between the engine's floating-point seconds and the stored
//! integer-millisecond representation, and the half-open interval predicate
//! every overlap check goes through.

/// Engine timestamps arrive as seconds; storage is integer milliseconds,
/// rounded half away from zero.
pub fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

pub fn millis_to_seconds(millis: i64) -> f64 {
    millis as f64 / 1000.0
}

/// Recognizer confidence is stored as fixed-point: floor(score * 1000).
pub fn confidence_to_milli(score: f64) -> i64 {
    (score * 1000.0).floor() as i64
}

/// Half-open `[start, end)` semantics: an exact boundary touch
/// (`a_end == b_start`) is not an overlap.
pub fn overlaps(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    a_start < b_end && b_start < a_end
}

/// A word interval must lie within its parent segment's interval.
pub fn contained_in(inner_start: i64, inner_end: i64, outer_start: i64, outer_end: i64) -> bool {
    outer_start <= inner_start && inner_end <= outer_end
}
