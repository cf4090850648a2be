//! Core types and constants for schema resolution.

/// Path segment denoting "any element" of an array property.
pub const WILDCARD: &str = "*";

/// Prefix every registered property path carries (`/properties/Name/...`).
pub const PROPERTIES_PREFIX: &str = "/properties";

/// Maximum length of a reference visitation stack before the chain is cut.
pub const MAX_REFERENCE_DEPTH: usize = 32;

/// Maximum number of path-resolver steps that may run without consuming a segment.
pub const MAX_TRAVERSAL_DEPTH: usize = 64;

/// Maximum nesting depth the property transformers descend into.
pub const MAX_TRANSFORM_DEPTH: usize = 32;

/// Options for [`ResourceSchema::resolve_json_pointer_path`](crate::ResourceSchema::resolve_json_pointer_path).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathOptions {
    /// Drop results (and nested properties) whose path is registered read-only.
    pub exclude_read_only: bool,
    /// Return nothing for a branch when any segment cannot be matched.
    pub require_fully_resolved: bool,
    /// Emit the fragment at the end of the path with `oneOf`/`anyOf`/`allOf`
    /// intact instead of expanding it into candidates.
    pub preserve_composition: bool,
}

impl PathOptions {
    /// Create options with every flag off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set read-only exclusion.
    pub fn exclude_read_only(mut self, exclude: bool) -> Self {
        self.exclude_read_only = exclude;
        self
    }

    /// Set full-resolution mode.
    pub fn require_fully_resolved(mut self, require: bool) -> Self {
        self.require_fully_resolved = require;
        self
    }

    /// Keep composition keywords on terminal fragments.
    pub fn preserve_composition(mut self, preserve: bool) -> Self {
        self.preserve_composition = preserve;
        self
    }
}

/// Split a property path into unescaped segments.
///
/// Accepts `#/properties/A/B`, `/properties/A/B`, `properties/A/B` or `A/B`;
/// the `properties` prefix and empty segments are dropped.
pub fn path_segments(path: &str) -> Vec<String> {
    let trimmed = path.trim_start_matches('#');
    let trimmed = trimmed.trim_start_matches('/');
    let trimmed = trimmed
        .strip_prefix("properties")
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        .unwrap_or(trimmed);

    trimmed
        .split('/')
        .filter(|s| !s.is_empty())
        .map(unescape_segment)
        .collect()
}

/// Build the canonical `/properties/...` form of a segment list.
pub fn canonical_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = PROPERTIES_PREFIX.to_string();
    for segment in segments {
        path.push('/');
        path.push_str(&escape_segment(segment.as_ref()));
    }
    path
}

/// Unescape JSON Pointer encoding (`~1` = `/`, `~0` = `~`).
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Escape a key for use as a JSON Pointer segment.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
