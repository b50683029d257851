//! Cache key namespace.

/// Prefix shared by every key this service writes, so a shared Redis can be
/// inspected or flushed per service.
pub const KEY_PREFIX: &str = "vestige";

/// The one global aggregate window. Readers are not partitioned by player;
/// per-tenant views would need both this key and the window queries to take
/// a tenant parameter.
pub const WINDOW_KEY: &str = "vestige:window:v1";

/// Build a namespaced key from path segments.
pub fn namespaced(segments: &[&str]) -> String {
    let mut key = String::from(KEY_PREFIX);
    for segment in segments {
        key.push(':');
        key.push_str(segment);
    }
    key
}
