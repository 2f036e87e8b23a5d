//! Metric name derivation.
//!
//! Names are plain dot-joined strings. Request handler metrics live under
//! [`REQUEST_HANDLERS`]; ad-hoc metrics are namespaced by the application name.

use percent_encoding::percent_decode_str;

/// Namespace of the metrics emitted by the request hooks.
pub const REQUEST_HANDLERS: &str = "request_handlers";

/// Joins `base` and the optional `leaf` with dots.
///
/// Empty segments are kept, so the result always has one segment per input.
pub fn build(base: &[&str], leaf: Option<&str>) -> String {
    let mut name = base.join(".");
    if let Some(leaf) = leaf {
        if !base.is_empty() {
            name.push('.');
        }
        name.push_str(leaf);
    }
    name
}

/// `request_handlers.<endpoint>.<status>`
pub fn endpoint_metric(endpoint: &str, status: u16) -> String {
    build(&[REQUEST_HANDLERS, endpoint], Some(&status.to_string()))
}

/// `request_handlers.<path-segment>[.<status>]`
pub fn path_metric(path: &str, status: Option<u16>) -> String {
    let segment = path_segment(path);
    let status = status.map(|s| s.to_string());
    build(&[REQUEST_HANDLERS, &segment], status.as_deref())
}

/// Turns a raw request path into a single metric segment.
///
/// Percent-escapes are decoded first, then surrounding whitespace and slashes
/// are trimmed and every `/` or whitespace run becomes `-`.
pub fn path_segment(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let trimmed = decoded.trim().trim_matches('/');

    let mut segment = String::with_capacity(trimmed.len());
    let mut pending_dash = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            pending_dash = true;
            continue;
        }
        if pending_dash {
            segment.push('-');
            pending_dash = false;
        }
        if c == '/' {
            segment.push('-');
        } else {
            segment.push(c);
        }
    }
    segment
}

/// `<app>.<stat>`
pub fn app_metric(app_name: &str, stat: &str) -> String {
    build(&[app_name], Some(stat))
}
