//! Per-character search capture: launch an app to its search field, type the
//! query one character at a time and screenshot the mirror after each one.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::MirrorResult;
use crate::orchestrator::{ensure_calibrated, LaunchReport, Orchestrator};
use crate::profile::BaseCoordinatesProfile;
use crate::util::{abs_path, slugify, timestamp_compact, timestamp_iso, write_json_pretty};

#[derive(Debug, Clone, Serialize)]
pub struct CaptureFrame {
    pub index: usize,
    /// Query text typed so far; empty for the baseline frame.
    pub prefix: String,
    pub image_path: PathBuf,
    pub captured_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureManifest {
    pub app: String,
    pub query: String,
    pub created_at: String,
    pub launch: LaunchReport,
    pub frames: Vec<CaptureFrame>,
    pub manifest_path: PathBuf,
}

fn frame_name(index: usize, prefix: &str) -> String {
    if prefix.is_empty() {
        format!("{index:02}-empty.png")
    } else {
        format!("{index:02}-{}.png", slugify(prefix))
    }
}

/// Runs the capture loop into `<out_dir>/captures/<app>/<timestamp>/`.
/// Calibration is checked before any UI is touched.
pub async fn capture_query(
    orch: &mut Orchestrator<'_>,
    profile: &BaseCoordinatesProfile,
    app: &str,
    query: &str,
    out_dir: &Path,
) -> MirrorResult<CaptureManifest> {
    ensure_calibrated(profile, app)?;
    let launch = orch.launch_to_search(app).await?;
    let run_dir = out_dir
        .join("captures")
        .join(slugify(app))
        .join(timestamp_compact());

    let mut frames = Vec::with_capacity(query.chars().count() + 1);
    frames.push(capture_frame(orch, &run_dir, 0, String::new()).await?);

    let mut prefix = String::new();
    for (idx, ch) in query.chars().enumerate() {
        orch.type_char(ch, "capture-type").await?;
        prefix.push(ch);
        orch.settle().await;
        frames.push(capture_frame(orch, &run_dir, idx + 1, prefix.clone()).await?);
    }

    let manifest_path = run_dir.join("manifest.json");
    let manifest = CaptureManifest {
        app: launch.app.clone(),
        query: query.to_string(),
        created_at: timestamp_iso(),
        launch,
        frames,
        manifest_path: abs_path(&manifest_path),
    };
    write_json_pretty(&manifest_path, &serde_json::to_value(&manifest)?)?;
    tracing::info!(
        app,
        frames = manifest.frames.len(),
        manifest = %manifest_path.display(),
        "capture run complete"
    );
    Ok(manifest)
}

async fn capture_frame(
    orch: &Orchestrator<'_>,
    run_dir: &Path,
    index: usize,
    prefix: String,
) -> MirrorResult<CaptureFrame> {
    orch.ensure_focus("capture-frame").await?;
    let region = orch.current_region().await?;
    let path = run_dir.join(frame_name(index, &prefix));
    orch.bridge().capture_region(&region, &path).await?;
    tracing::debug!(index, prefix = %prefix, path = %path.display(), "frame captured");
    Ok(CaptureFrame {
        index,
        prefix,
        image_path: abs_path(&path),
        captured_at: timestamp_iso(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use crate::orchestrator::PointBook;
    use crate::profile::sample_profile;
    use crate::testing::{test_settings, ScriptedBridge};
    use tempfile::tempdir;

    #[test]
    fn frame_names_are_ordered_and_slugged() {
        assert_eq!(frame_name(0, ""), "00-empty.png");
        assert_eq!(frame_name(3, "New"), "03-new.png");
        assert_eq!(frame_name(4, "New "), "04-new-.png");
    }

    #[tokio::test]
    async fn captures_one_frame_per_character_plus_baseline() {
        let dir = tempdir().unwrap();
        let bridge = ScriptedBridge::new();
        let settings = test_settings();
        let profile = sample_profile();
        let book = PointBook::from_profile(Some(&profile)).unwrap();
        let mut orch = Orchestrator::new(&bridge, &settings, book);

        let manifest = capture_query(&mut orch, &profile, "chrome", "cat", dir.path())
            .await
            .unwrap();

        assert_eq!(manifest.frames.len(), 4);
        assert_eq!(bridge.captures().len(), 4);
        assert_eq!(manifest.frames[3].prefix, "cat");
        assert!(manifest.frames.iter().all(|f| f.image_path.exists()));
        assert!(manifest.manifest_path.exists());
        assert!(bridge.typed().ends_with("cat"));
        let raw = std::fs::read_to_string(&manifest.manifest_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["frames"].as_array().unwrap().len(), 4);
        assert_eq!(parsed["launch"]["app"], "chrome");
    }

    #[tokio::test]
    async fn missing_calibration_fails_before_touching_ui() {
        let dir = tempdir().unwrap();
        let bridge = ScriptedBridge::new();
        let settings = test_settings();
        let profile = sample_profile();
        let mut orch = Orchestrator::new(&bridge, &settings, PointBook::default());

        let err = capture_query(&mut orch, &profile, "youtube", "cat", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::MissingCalibration { .. }));
        assert_eq!(bridge.call_count(), 0);
    }
}
