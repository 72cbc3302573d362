use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;

use crate::error::MirrorResult;

pub fn write_json_pretty(path: &Path, value: &Value) -> MirrorResult<()> {
    ensure_parent_dir(path)?;
    let mut raw = serde_json::to_string_pretty(value)?;
    raw.push('\n');
    fs::write(path, raw)?;
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> MirrorResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

/// Absolute form of `path` for manifests and reports; left as-is if the
/// working directory cannot be read.
pub fn abs_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// File-name-safe slug: `chrome:searchBar` becomes `chrome-searchbar`.
pub fn slugify(input: &str) -> String {
    let slug: String = input
        .chars()
        .filter_map(|ch| match ch.to_ascii_lowercase() {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            c if c.is_ascii_whitespace() || c == ':' => Some('-'),
            _ => None,
        })
        .collect();
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

/// Directory and file stamp, millisecond resolution so back-to-back runs differ.
pub fn timestamp_compact() -> String {
    Utc::now().format("%Y%m%d-%H%M%S-%3f").to_string()
}

pub fn timestamp_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Whether `program` resolves to a file on `PATH`.
pub fn command_exists(program: &str) -> bool {
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn writes_json_pretty_into_missing_dirs() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a").join("b.json");
        write_json_pretty(&target, &json!({"ok": true})).unwrap();
        let raw = fs::read_to_string(&target).unwrap();
        assert!(raw.contains("\n  \"ok\": true"));
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn slugify_handles_action_ids_and_queries() {
        assert_eq!(slugify("chrome:searchBar"), "chrome-searchbar");
        assert_eq!(slugify("New York"), "new-york");
        assert_eq!(slugify("???"), "item");
    }

    #[test]
    fn relative_paths_become_absolute() {
        assert!(abs_path(Path::new("out/x.png")).is_absolute());
        assert_eq!(abs_path(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn missing_programs_are_not_found() {
        assert!(!command_exists("definitely-not-a-real-tool-4821"));
    }
}
