use std::path::PathBuf;

use thiserror::Error;

use crate::geometry::{Region, WindowBounds};

/// Coarse classification used for retry and exit-code decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Geometry,
    TransientUi,
    LaunchExhausted,
    OperatorCanceled,
    Host,
    Io,
}

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("calibration profile missing or unreadable at {}: {reason}", path.display())]
    MissingProfile { path: PathBuf, reason: String },

    #[error("invalid calibration profile field `{field}`: {reason}")]
    InvalidProfile { field: String, reason: String },

    #[error("unsupported calibration profile version {found} (this build reads version {supported} only)")]
    UnsupportedProfileVersion { found: u64, supported: u64 },

    #[error("invalid tap sequence token `{token}` in \"{raw}\"")]
    InvalidTapSequence { token: String, raw: String },

    #[error("circular prerequisite detected at action `{member}`")]
    CircularPrerequisite { member: String },

    #[error("unknown calibration action `{0}`")]
    UnknownAction(String),

    #[error("unknown app `{0}`")]
    UnknownApp(String),

    #[error("app `{app}` requires calibration point `{action}` before this run")]
    MissingCalibration { app: String, action: String },

    #[error(
        "captured point for `{action}` lies outside the content region: \
         abs=({abs_x},{abs_y}) rel=({rel_x:.4},{rel_y:.4}) region={region:?}"
    )]
    PointOutOfRegion {
        action: String,
        abs_x: i64,
        abs_y: i64,
        rel_x: f64,
        rel_y: f64,
        region: Region,
    },

    #[error("invalid window bounds {bounds:?}: {reason}")]
    InvalidBounds { bounds: WindowBounds, reason: String },

    #[error("degenerate content region {0:?} (zero width or height)")]
    DegenerateRegion(Region),

    #[error("coordinate ({x}, {y}) cannot be converted to integer pixels")]
    NonIntegerConversion { x: f64, y: f64 },

    #[error("mirror window not found (tried {candidates:?}, then the frontmost window)")]
    WindowNotFound { candidates: Vec<String> },

    #[error("{step}: {message} (frontmost process: {})", frontmost.as_deref().unwrap_or("unknown"))]
    TransientUi {
        step: String,
        message: String,
        frontmost: Option<String>,
    },

    #[error("launch of `{app}` exhausted every path (attempts: {}); last error: {last_error}", attempts.join(", "))]
    LaunchExhausted {
        app: String,
        attempts: Vec<String>,
        last_error: String,
    },

    #[error("host command `{command}` failed: {message}")]
    Host { command: String, message: String },

    #[error("canceled by user")]
    OperatorCanceled,

    #[error("operator flagged step `{step}` as failed")]
    OperatorFlagged { step: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MirrorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingProfile { .. }
            | Self::InvalidProfile { .. }
            | Self::UnsupportedProfileVersion { .. }
            | Self::InvalidTapSequence { .. }
            | Self::CircularPrerequisite { .. }
            | Self::UnknownAction(_)
            | Self::UnknownApp(_)
            | Self::MissingCalibration { .. }
            | Self::PointOutOfRegion { .. }
            | Self::TomlDe(_) => ErrorKind::Configuration,
            Self::InvalidBounds { .. }
            | Self::DegenerateRegion(_)
            | Self::NonIntegerConversion { .. } => ErrorKind::Geometry,
            Self::TransientUi { .. } | Self::WindowNotFound { .. } => ErrorKind::TransientUi,
            Self::LaunchExhausted { .. } => ErrorKind::LaunchExhausted,
            Self::OperatorCanceled | Self::OperatorFlagged { .. } => ErrorKind::OperatorCanceled,
            Self::Host { .. } => ErrorKind::Host,
            Self::Io(_) | Self::Json(_) | Self::Image(_) => ErrorKind::Io,
        }
    }

    /// Only UI hiccups inside a single attempt are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransientUi | ErrorKind::Host)
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::OperatorCanceled)
    }

    /// Command the operator should run to fix a configuration problem.
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::MissingProfile { .. }
            | Self::InvalidProfile { .. }
            | Self::UnsupportedProfileVersion { .. } => {
                Some("run `mirror-capture calibrate-all` to regenerate the profile".to_string())
            }
            Self::InvalidTapSequence { .. } => Some(
                "fix the tap sequence (\"x,y;x,y\" fractions) or re-run `mirror-capture calibrate-all`"
                    .to_string(),
            ),
            Self::CircularPrerequisite { member } => Some(format!(
                "remove the prerequisite cycle through `{member}` in the action catalog"
            )),
            Self::UnknownAction(_) => {
                Some("run `mirror-capture actions` to list calibratable actions".to_string())
            }
            Self::UnknownApp(_) => {
                Some("run `mirror-capture actions` to list supported apps".to_string())
            }
            Self::MissingCalibration { action, .. } => {
                Some(format!("run `mirror-capture calibrate {action}`"))
            }
            Self::PointOutOfRegion { action, .. } => Some(format!(
                "hover inside the mirrored screen and re-run `mirror-capture calibrate {action}`"
            )),
            Self::WindowNotFound { .. } => Some(
                "open the mirroring app, or add its process name to [mirror].process_candidates"
                    .to_string(),
            ),
            _ => None,
        }
    }
}

pub type MirrorResult<T> = Result<T, MirrorError>;
