use once_cell::sync::Lazy;
use regex::Regex;

static UNIQUE_SNAPSHOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)-(\d{8}\.\d{6}-\d+)(.*)$").unwrap());
static NON_UNIQUE_SNAPSHOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)-(SNAPSHOT)(.*)$").unwrap());

/// Grouping key for a file inside a `-SNAPSHOT` version directory.
///
/// Unique snapshots (`app-1.0-20231020.120000-1.jar`, including classifier
/// forms like `…-1-sources.jar`) key on `artifact-version-timestamp-build`;
/// non-unique snapshots key on `artifact-version-SNAPSHOT`; anything else
/// falls back to the name up to its first dot.
pub fn snapshot_version(name: &str) -> String {
    if let Some(m) = UNIQUE_SNAPSHOT.captures(name) {
        return format!("{}-{}", &m[1], &m[2]);
    }
    if let Some(m) = NON_UNIQUE_SNAPSHOT.captures(name) {
        return format!("{}-{}", &m[1], &m[2]);
    }
    match name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name.to_string(),
    }
}
