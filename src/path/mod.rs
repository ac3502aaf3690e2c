//! Canonical key paths, backend-native key codecs and prefix relevance.
//!
//! The canonical key space is `/`-rooted, `/`-separated and case-preserving,
//! with no trailing slash except the root itself. Every adapter converts its
//! native representation to canonical form at the boundary; everything above
//! the adapters speaks canonical paths only.

mod flatten;

pub use flatten::flatten;

#[cfg(test)]
mod codec_test;
#[cfg(test)]
mod flatten_test;

/// True iff `path` starts with at least one member of `prefixes` as a
/// literal string prefix.
///
/// This is not segment-aware: `/ab` matches the candidate `/abc`. Watch
/// loops accept the occasional false positive in exchange for a check that
/// is identical across every backend.
pub fn matches_any(
    path: &str,
    prefixes: &[String],
) -> bool {
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}

/// Relevance test used by the watch loops: the interest prefixes when the
/// caller supplied any, otherwise the native subscription prefix. An empty
/// fallback matches everything.
pub(crate) fn is_relevant(
    path: &str,
    interest: &[String],
    fallback: &str,
) -> bool {
    if interest.is_empty() {
        return fallback.is_empty() || path.starts_with(fallback);
    }
    matches_any(path, interest)
}

/// Codec for dot-delimited native keys (NATS subjects).
///
/// Bijective for keys whose segments contain neither separator; keys that
/// embed the backend's own separator in user data are out of scope.
pub mod dotted {
    /// `database.hosts.0` -> `/database/hosts/0`
    pub fn to_canonical(native: &str) -> String {
        format!("/{native}").replace('.', "/")
    }

    /// `/database/hosts/0` -> `database.hosts.0`
    pub fn to_native(canonical: &str) -> String {
        canonical.trim_start_matches('/').replace('/', ".")
    }

    /// Canonical prefix -> native subject filter covering everything below
    /// it. The empty prefix and the root subscribe to the whole bucket.
    ///
    /// `/database` -> `database.>`, `/` -> `>`
    pub fn watch_subject(prefix: &str) -> String {
        let native = to_native(prefix);
        if native.is_empty() {
            return ">".to_string();
        }
        format!("{native}.>")
    }
}

/// Codec for environment-variable names.
pub mod env_names {
    /// `/foo/bar/test` -> `FOO_BAR_TEST`
    pub fn to_native(canonical: &str) -> String {
        canonical
            .trim_start_matches('/')
            .replace('/', "_")
            .to_uppercase()
    }

    /// `FOO_BAR_TEST` -> `/foo/bar/test`
    pub fn to_canonical(native: &str) -> String {
        format!("/{}", native.to_lowercase().replace('_', "/"))
    }
}
