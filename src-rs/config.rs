use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, MirrorResult};
use crate::geometry::Insets;

pub const CONFIG_ENV: &str = "MIRROR_CAPTURE_CONFIG";
pub const OUT_DIR_ENV: &str = "MIRROR_CAPTURE_OUT_DIR";
pub const PROFILE_ENV: &str = "MIRROR_CAPTURE_PROFILE";
pub const SETTLE_ENV: &str = "MIRROR_CAPTURE_SETTLE_MS";
const DEFAULT_CONFIG_FILE: &str = "mirror-capture.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mirror: MirrorSettings,
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub launch: LaunchSettings,
    #[serde(default)]
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSettings {
    /// Host processes that may own the mirror window, tried in order.
    #[serde(default = "default_process_candidates")]
    pub process_candidates: Vec<String>,
    #[serde(default)]
    pub insets: Insets,
    #[serde(default = "default_display_scale")]
    pub display_scale: u32,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            process_candidates: default_process_candidates(),
            insets: Insets::default(),
            display_scale: default_display_scale(),
        }
    }
}

fn default_process_candidates() -> Vec<String> {
    vec!["iPhone Mirroring".to_string()]
}

fn default_display_scale() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Pause between navigation steps; 0 disables the pause, not the step.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_focus_retries")]
    pub focus_retries: u32,
    #[serde(default = "default_focus_backoff_ms")]
    pub focus_backoff_ms: u64,
    #[serde(default = "default_telemetry_tick_ms")]
    pub telemetry_tick_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            focus_retries: default_focus_retries(),
            focus_backoff_ms: default_focus_backoff_ms(),
            telemetry_tick_ms: default_telemetry_tick_ms(),
        }
    }
}

fn default_settle_ms() -> u64 {
    350
}

fn default_focus_retries() -> u32 {
    3
}

fn default_focus_backoff_ms() -> u64 {
    120
}

fn default_telemetry_tick_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSettings {
    #[serde(default = "default_true")]
    pub use_shortcuts: bool,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            use_shortcuts: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Defaults to `<out_dir>/base-coordinates.json`.
    #[serde(default)]
    pub profile: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            profile: None,
        }
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".mirror-capture")
}

impl Settings {
    pub fn profile_path(&self) -> PathBuf {
        self.paths
            .profile
            .clone()
            .unwrap_or_else(|| self.paths.out_dir.join("base-coordinates.json"))
    }

    pub fn validate(&self) -> MirrorResult<()> {
        let fail = |key: &str, reason: &str| MirrorError::InvalidProfile {
            field: format!("config.{key}"),
            reason: reason.to_string(),
        };
        if self.mirror.display_scale == 0 {
            return Err(fail("mirror.display_scale", "must be at least 1"));
        }
        if self.mirror.process_candidates.iter().all(|c| c.trim().is_empty()) {
            return Err(fail("mirror.process_candidates", "must name at least one process"));
        }
        if self.timing.focus_retries == 0 {
            return Err(fail("timing.focus_retries", "must be at least 1"));
        }
        if self.timing.telemetry_tick_ms == 0 {
            return Err(fail("timing.telemetry_tick_ms", "must be positive"));
        }
        Ok(())
    }

    fn apply_env(&mut self) -> MirrorResult<()> {
        if let Some(dir) = non_empty_env(OUT_DIR_ENV) {
            self.paths.out_dir = PathBuf::from(dir);
        }
        if let Some(profile) = non_empty_env(PROFILE_ENV) {
            self.paths.profile = Some(PathBuf::from(profile));
        }
        if let Some(raw) = non_empty_env(SETTLE_ENV) {
            self.timing.settle_ms = raw.trim().parse().map_err(|_| MirrorError::InvalidProfile {
                field: SETTLE_ENV.to_string(),
                reason: format!("`{raw}` is not a whole number of milliseconds"),
            })?;
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = non_empty_env(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

pub fn parse_settings(raw: &str) -> MirrorResult<Settings> {
    let settings: Settings = toml::from_str(raw)?;
    Ok(settings)
}

/// File (explicit, env, or `./mirror-capture.toml`) → env overrides → validation.
pub fn load_settings(explicit: Option<&Path>) -> MirrorResult<Settings> {
    let mut settings = match resolve_config_path(explicit) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let settings = parse_settings(&raw)?;
            tracing::debug!(path = %path.display(), "settings loaded");
            settings
        }
        None => Settings::default(),
    };
    settings.apply_env()?;
    settings.validate()?;
    Ok(settings)
}
