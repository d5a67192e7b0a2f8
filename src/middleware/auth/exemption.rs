//! Paths that bypass authentication.
//!
//! Matching policy: every entry is a segment-boundary prefix of the
//! normalized request path. `/static` exempts `/static` and `/static/app.js`,
//! never `/staticfoo`. The root entry `/` exempts only `/` itself.
//! Entries and paths are normalized the same way before comparison.

/// Strip trailing slashes; the empty path and `/` both normalize to `/`.
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExemptionSet {
    prefixes: Vec<String>,
}

impl ExemptionSet {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prefixes: Vec<String> = Vec::new();
        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() {
                continue;
            }
            let normalized = if path.starts_with('/') {
                normalize_path(path).to_string()
            } else {
                normalize_path(&format!("/{path}")).to_string()
            };
            if !prefixes.contains(&normalized) {
                prefixes.push(normalized);
            }
        }
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Whether `path` may be served without an authenticated identity.
    pub fn is_exempt(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.prefixes.iter().any(|prefix| matches_prefix(prefix, path))
    }
}

fn matches_prefix(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
