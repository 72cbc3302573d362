//! Versioned calibration profile: load/validate at one boundary, persist with
//! a timestamped snapshot of whatever was there before.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MirrorError, MirrorResult};
use crate::geometry::{parse_tap_sequence, AbsPoint, Region, RelPoint, WindowBounds};
use crate::util::{ensure_parent_dir, timestamp_iso};

/// Older or newer schemas are refused outright; there is no migration path.
pub const PROFILE_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseCoordinatePoint {
    pub rel_x: f64,
    pub rel_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_y: Option<i64>,
}

impl BaseCoordinatePoint {
    pub fn captured(rel: RelPoint, abs: AbsPoint) -> Self {
        Self {
            rel_x: rel.x,
            rel_y: rel.y,
            abs_x: Some(abs.x),
            abs_y: Some(abs.y),
        }
    }

    pub fn rel(&self) -> RelPoint {
        RelPoint::new(self.rel_x, self.rel_y)
    }

    fn check(&self, field: &str) -> MirrorResult<()> {
        for (axis, value) in [("relX", self.rel_x), ("relY", self.rel_y)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MirrorError::InvalidProfile {
                    field: format!("{field}.{axis}"),
                    reason: format!("{value} is outside 0..1"),
                });
            }
        }
        Ok(())
    }
}

pub type AppActionPoints = BTreeMap<String, BTreeMap<String, BaseCoordinatePoint>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePoints {
    pub home_search_button: BaseCoordinatePoint,
    pub launch_result_tap: BaseCoordinatePoint,
    pub app_search_steps: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_action_points: Option<AppActionPoints>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseCoordinatesProfile {
    pub version: u64,
    pub generated_at: String,
    pub mirror_window: WindowBounds,
    pub content_region: Region,
    pub points: ProfilePoints,
}

impl BaseCoordinatesProfile {
    pub fn action_point(&self, app: &str, action: &str) -> Option<&BaseCoordinatePoint> {
        self.points
            .app_action_points
            .as_ref()
            .and_then(|apps| apps.get(app))
            .and_then(|actions| actions.get(action))
    }

    /// Numeric and syntactic invariants; the first failure names its field.
    pub fn validate(&self) -> MirrorResult<()> {
        if self.version == 0 {
            return Err(invalid("version", "must be a positive integer"));
        }
        if self.version != PROFILE_VERSION {
            return Err(MirrorError::UnsupportedProfileVersion {
                found: self.version,
                supported: PROFILE_VERSION,
            });
        }
        if chrono::DateTime::parse_from_rfc3339(&self.generated_at).is_err() {
            return Err(invalid("generatedAt", "not an RFC 3339 timestamp"));
        }
        if self.mirror_window.validate().is_err() {
            return Err(invalid("mirrorWindow", "x2/y2 must exceed x1/y1"));
        }
        if self.content_region.validate().is_err() {
            return Err(invalid("contentRegion", "width and height must be positive"));
        }
        self.points
            .home_search_button
            .check("points.homeSearchButton")?;
        self.points
            .launch_result_tap
            .check("points.launchResultTap")?;
        for (app, raw) in &self.points.app_search_steps {
            let field = format!("points.appSearchSteps.{app}");
            let steps = parse_tap_sequence(raw).map_err(|err| invalid(&field, &err.to_string()))?;
            if let Some(bad) = steps.iter().find(|p| !p.is_within_unit()) {
                return Err(invalid(
                    &field,
                    &format!("step ({}, {}) is outside 0..1", bad.x, bad.y),
                ));
            }
        }
        if let Some(apps) = &self.points.app_action_points {
            for (app, actions) in apps {
                for (action, point) in actions {
                    point.check(&format!("points.appActionPoints.{app}.{action}"))?;
                }
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> MirrorError {
    MirrorError::InvalidProfile {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Returns a copy with `points.appActionPoints[app][action]` replaced and a
/// fresh `generatedAt`; nothing else changes.
pub fn upsert_action_point(
    profile: &BaseCoordinatesProfile,
    app: &str,
    action: &str,
    point: BaseCoordinatePoint,
) -> BaseCoordinatesProfile {
    let mut next = profile.clone();
    next.points
        .app_action_points
        .get_or_insert_with(BTreeMap::new)
        .entry(app.to_string())
        .or_default()
        .insert(action.to_string(), point);
    next.generated_at = timestamp_iso();
    next
}

/// Parses raw profile JSON into the typed profile, checking structure field by
/// field so that errors name the path that failed.
pub fn parse_profile(raw: &str, path: &Path) -> MirrorResult<BaseCoordinatesProfile> {
    let value: Value = serde_json::from_str(raw).map_err(|err| MirrorError::MissingProfile {
        path: path.to_path_buf(),
        reason: format!("unparsable JSON: {err}"),
    })?;
    let root = value
        .as_object()
        .ok_or_else(|| invalid("<root>", "expected a JSON object"))?;

    let version = match root.get("version") {
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|v| *v > 0)
            .ok_or_else(|| invalid("version", "must be a positive integer"))?,
        Some(_) => return Err(invalid("version", "must be a positive integer")),
        None => return Err(invalid("version", "missing")),
    };
    if version != PROFILE_VERSION {
        return Err(MirrorError::UnsupportedProfileVersion {
            found: version,
            supported: PROFILE_VERSION,
        });
    }

    let points = object_field(root, "points", "points")?;
    let profile = BaseCoordinatesProfile {
        version,
        generated_at: typed_field(root, "generatedAt", "generatedAt")?,
        mirror_window: typed_field(root, "mirrorWindow", "mirrorWindow")?,
        content_region: typed_field(root, "contentRegion", "contentRegion")?,
        points: ProfilePoints {
            home_search_button: typed_field(points, "homeSearchButton", "points.homeSearchButton")?,
            launch_result_tap: typed_field(points, "launchResultTap", "points.launchResultTap")?,
            app_search_steps: typed_field(points, "appSearchSteps", "points.appSearchSteps")?,
            app_action_points: match points.get("appActionPoints") {
                None | Some(Value::Null) => None,
                Some(v) => Some(typed(v, "points.appActionPoints")?),
            },
        },
    };
    profile.validate()?;
    Ok(profile)
}

fn object_field<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> MirrorResult<&'a Map<String, Value>> {
    obj.get(key)
        .ok_or_else(|| invalid(path, "missing"))?
        .as_object()
        .ok_or_else(|| invalid(path, "expected an object"))
}

fn typed_field<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> MirrorResult<T> {
    let value = obj.get(key).ok_or_else(|| invalid(path, "missing"))?;
    typed(value, path)
}

fn typed<T: DeserializeOwned>(value: &Value, path: &str) -> MirrorResult<T> {
    T::deserialize(value).map_err(|err| invalid(path, &err.to_string()))
}

/// File-backed profile with a process-lifetime cache.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    cache: Option<BaseCoordinatesProfile>,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&mut self) -> MirrorResult<BaseCoordinatesProfile> {
        if let Some(profile) = &self.cache {
            return Ok(profile.clone());
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| MirrorError::MissingProfile {
            path: self.path.clone(),
            reason: err.to_string(),
        })?;
        let profile = parse_profile(&raw, &self.path)?;
        tracing::debug!(path = %self.path.display(), generated_at = %profile.generated_at, "calibration profile loaded");
        self.cache = Some(profile.clone());
        Ok(profile)
    }

    /// Writes the profile, first moving any existing file aside to a
    /// timestamped snapshot. Returns the snapshot path when one was made.
    pub fn persist(&mut self, profile: &BaseCoordinatesProfile) -> MirrorResult<Option<PathBuf>> {
        profile.validate()?;
        ensure_parent_dir(&self.path)?;

        let snapshot = if self.path.exists() {
            let target = snapshot_path_for(&self.path, &timestamp_iso());
            fs::rename(&self.path, &target)?;
            tracing::info!(snapshot = %target.display(), "previous calibration profile backed up");
            Some(target)
        } else {
            None
        };

        let raw = serde_json::to_string_pretty(profile)?;
        fs::write(&self.path, raw)?;
        tracing::info!(path = %self.path.display(), "calibration profile written");
        self.cache = Some(profile.clone());
        Ok(snapshot)
    }
}

/// `<stem>.snapshot-<timestamp with ':' replaced>.json` beside the profile; a
/// numeric suffix keeps two snapshots in the same instant from colliding.
pub fn snapshot_path_for(path: &Path, timestamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("base-coordinates")
        .to_string();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stamp = timestamp.replace(':', "-");
    let mut candidate = parent.join(format!("{stem}.snapshot-{stamp}.json"));
    let mut n = 1;
    while candidate.exists() {
        candidate = parent.join(format!("{stem}.snapshot-{stamp}-{n}.json"));
        n += 1;
    }
    candidate
}

/// Fresh profile for a full calibration pass.
pub fn new_profile(
    mirror_window: WindowBounds,
    content_region: Region,
    home_search_button: BaseCoordinatePoint,
    launch_result_tap: BaseCoordinatePoint,
) -> BaseCoordinatesProfile {
    BaseCoordinatesProfile {
        version: PROFILE_VERSION,
        generated_at: timestamp_iso(),
        mirror_window,
        content_region,
        points: ProfilePoints {
            home_search_button,
            launch_result_tap,
            app_search_steps: BTreeMap::new(),
            app_action_points: None,
        },
    }
}

#[cfg(test)]
pub(crate) fn sample_profile() -> BaseCoordinatesProfile {
    let mut profile = new_profile(
        WindowBounds { x1: 100, y1: 100, x2: 500, y2: 700 },
        Region { x: 110, y: 148, width: 380, height: 542 },
        BaseCoordinatePoint {
            rel_x: 0.5,
            rel_y: 0.91,
            abs_x: Some(300),
            abs_y: Some(641),
        },
        BaseCoordinatePoint {
            rel_x: 0.3,
            rel_y: 0.2,
            abs_x: None,
            abs_y: None,
        },
    );
    profile
        .points
        .app_search_steps
        .insert("chrome".to_string(), "0.5,0.08".to_string());
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persisted_profile_loads_deep_equal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("base-coordinates.json");
        let profile = upsert_action_point(
            &sample_profile(),
            "chrome",
            "searchBar",
            BaseCoordinatePoint {
                rel_x: 0.1 + 0.2,
                rel_y: 1.0 / 3.0,
                abs_x: Some(224),
                abs_y: Some(328),
            },
        );

        let mut writer = ProfileStore::new(&path);
        assert!(writer.persist(&profile).unwrap().is_none());

        let mut reader = ProfileStore::new(&path);
        let first = reader.load().unwrap();
        assert_eq!(first, profile);

        let mut rewriter = ProfileStore::new(&path);
        rewriter.persist(&first).unwrap();
        let second = ProfileStore::new(&path).load().unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn persist_backs_up_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("base-coordinates.json");
        let mut store = ProfileStore::new(&path);
        store.persist(&sample_profile()).unwrap();
        let original = fs::read_to_string(&path).unwrap();

        let updated = upsert_action_point(
            &sample_profile(),
            "safari",
            "searchBar",
            BaseCoordinatePoint {
                rel_x: 0.5,
                rel_y: 0.1,
                abs_x: None,
                abs_y: None,
            },
        );
        let snapshot = store.persist(&updated).unwrap().expect("snapshot created");

        let name = snapshot.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("base-coordinates.snapshot-"));
        assert!(name.ends_with(".json"));
        assert!(!name.contains(':'));
        assert_eq!(fs::read_to_string(&snapshot).unwrap(), original);
        assert_eq!(store.load().unwrap(), updated);
    }

    #[test]
    fn snapshot_paths_never_collide() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.json");
        let first = snapshot_path_for(&path, "2026-01-02T03:04:05Z");
        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "p.snapshot-2026-01-02T03-04-05Z.json"
        );
        fs::write(&first, "{}").unwrap();
        let second = snapshot_path_for(&path, "2026-01-02T03:04:05Z");
        assert_ne!(first, second);
    }

    #[test]
    fn missing_and_unparsable_files_ask_for_calibration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = ProfileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, MirrorError::MissingProfile { .. }));
        assert!(err.remediation().unwrap().contains("calibrate-all"));

        fs::write(&path, "{not json").unwrap();
        let err = ProfileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, MirrorError::MissingProfile { .. }));
    }

    fn profile_json() -> Value {
        serde_json::to_value(sample_profile()).unwrap()
    }

    fn field_of(err: MirrorError) -> String {
        match err {
            MirrorError::InvalidProfile { field, .. } => field,
            other => panic!("expected InvalidProfile, got {other}"),
        }
    }

    #[test]
    fn rejects_unknown_versions_without_migration() {
        let mut value = profile_json();
        value["version"] = serde_json::json!(2);
        let err = parse_profile(&value.to_string(), Path::new("p.json")).unwrap_err();
        assert!(matches!(
            err,
            MirrorError::UnsupportedProfileVersion { found: 2, supported: 1 }
        ));

        value["version"] = serde_json::json!(0);
        let err = parse_profile(&value.to_string(), Path::new("p.json")).unwrap_err();
        assert_eq!(field_of(err), "version");

        value["version"] = serde_json::json!("1");
        let err = parse_profile(&value.to_string(), Path::new("p.json")).unwrap_err();
        assert_eq!(field_of(err), "version");
    }

    #[test]
    fn names_first_offending_field() {
        let mut value = profile_json();
        value["points"]["homeSearchButton"]["relY"] = serde_json::json!(1.2);
        let err = parse_profile(&value.to_string(), Path::new("p.json")).unwrap_err();
        assert_eq!(field_of(err), "points.homeSearchButton.relY");

        let mut value = profile_json();
        value["points"]["appSearchSteps"]["chrome"] = serde_json::json!("0.5;0.1");
        let err = parse_profile(&value.to_string(), Path::new("p.json")).unwrap_err();
        assert_eq!(field_of(err), "points.appSearchSteps.chrome");

        let mut value = profile_json();
        value["points"]
            .as_object_mut()
            .unwrap()
            .remove("launchResultTap");
        let err = parse_profile(&value.to_string(), Path::new("p.json")).unwrap_err();
        assert_eq!(field_of(err), "points.launchResultTap");

        let mut value = profile_json();
        value["mirrorWindow"]["x2"] = serde_json::json!(50);
        let err = parse_profile(&value.to_string(), Path::new("p.json")).unwrap_err();
        assert_eq!(field_of(err), "mirrorWindow");

        let mut value = profile_json();
        value["points"]["appActionPoints"] =
            serde_json::json!({"chrome": {"searchBar": {"relX": -0.1, "relY": 0.4}}});
        let err = parse_profile(&value.to_string(), Path::new("p.json")).unwrap_err();
        assert_eq!(field_of(err), "points.appActionPoints.chrome.searchBar.relX");
    }

    #[test]
    fn upsert_touches_only_the_target_point() {
        let mut base = sample_profile();
        base.generated_at = "2020-01-01T00:00:00+00:00".to_string();
        let point = BaseCoordinatePoint {
            rel_x: 0.4,
            rel_y: 0.6,
            abs_x: None,
            abs_y: None,
        };
        let next = upsert_action_point(&base, "youtube", "dismissMenu", point.clone());

        assert_eq!(next.action_point("youtube", "dismissMenu"), Some(&point));
        assert_ne!(next.generated_at, base.generated_at);
        assert_eq!(next.points.home_search_button, base.points.home_search_button);
        assert_eq!(next.points.app_search_steps, base.points.app_search_steps);
        assert_eq!(next.mirror_window, base.mirror_window);
        assert!(base.points.app_action_points.is_none());
    }
}
