//! Interactive checkpoint driver layered on the workflow hooks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;

use crate::error::{MirrorError, MirrorResult};
use crate::orchestrator::probe_window;
use crate::overlay::annotate_tap;
use crate::prompt::Confirmation;
use crate::util::{abs_path, slugify, timestamp_compact, timestamp_iso, write_json_pretty};
use crate::workflow::{CalibrationHooks, CapturedPoint, StepInfo, StepIo};

const REPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Before,
    After,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

/// Pauses before and after every step, screenshots both moments and writes a
/// failure report when a step is flagged or errors out.
pub struct CheckpointDriver {
    run_dir: PathBuf,
    reports_dir: PathBuf,
    shots: Vec<PathBuf>,
    report: Option<PathBuf>,
}

impl CheckpointDriver {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            run_dir: out_dir.join("checkpoints").join(timestamp_compact()),
            reports_dir: out_dir.join("reports"),
            shots: Vec::new(),
            report: None,
        }
    }

    pub fn screenshots(&self) -> &[PathBuf] {
        &self.shots
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report.as_deref()
    }

    fn shot_path(&self, step: &StepInfo, phase: Phase) -> PathBuf {
        let rand = rand::thread_rng().gen_range(1000..9999);
        self.run_dir.join(format!(
            "{:02}-{}-{}-{rand}.png",
            step.index + 1,
            slugify(step.action),
            phase.as_str()
        ))
    }

    /// Screenshot failures are logged, not fatal: the step itself still ran.
    async fn screenshot(&mut self, step: &StepInfo, phase: Phase, io: &mut StepIo<'_>) -> Option<PathBuf> {
        let path = self.shot_path(step, phase);
        let result: MirrorResult<()> = async {
            let (_, region) = probe_window(io.bridge, io.settings).await?;
            io.bridge.capture_region(&region, &path).await
        }
        .await;
        match result {
            Ok(()) => {
                tracing::debug!(action = step.action, phase = phase.as_str(), path = %path.display(), "checkpoint screenshot");
                self.shots.push(path.clone());
                Some(path)
            }
            Err(err) => {
                tracing::warn!(action = step.action, phase = phase.as_str(), error = %err, "checkpoint screenshot failed");
                None
            }
        }
    }

    async fn ask(&self, step: &StepInfo, message: String, io: &mut StepIo<'_>) -> MirrorResult<()> {
        match io.console.confirm(&message).await? {
            Confirmation::Proceed => Ok(()),
            Confirmation::Flagged => Err(MirrorError::OperatorFlagged {
                step: step.action.to_string(),
            }),
        }
    }

    async fn write_report(
        &mut self,
        step: &StepInfo,
        error: &MirrorError,
        io: &mut StepIo<'_>,
    ) -> MirrorResult<PathBuf> {
        let frontmost = io.bridge.frontmost_process_name().await;
        let probe = match probe_window(io.bridge, io.settings).await {
            Ok((bounds, region)) => json!({
                "frontmost_process": frontmost,
                "window_bounds": bounds,
                "content_region": region,
            }),
            Err(err) => json!({
                "frontmost_process": frontmost,
                "error": err.to_string(),
            }),
        };
        let payload = json!({
            "report_version": REPORT_VERSION,
            "created_at": timestamp_iso(),
            "last_step": {
                "id": step.action,
                "label": step.label,
                "index": step.index + 1,
                "total": step.total,
            },
            "runtime_context": step.context,
            "probe": probe,
            "error": {
                "kind": error.kind(),
                "message": error.to_string(),
                "remediation": error.remediation(),
            },
            "checkpoints": self
                .shots
                .iter()
                .map(|p| abs_path(p).display().to_string())
                .collect::<Vec<String>>(),
        });
        let path = self
            .reports_dir
            .join(format!("calibration-failure-{}.json", timestamp_compact()));
        write_json_pretty(&path, &payload)?;
        Ok(path)
    }
}

#[async_trait]
impl CalibrationHooks for CheckpointDriver {
    async fn before_step(&mut self, step: &StepInfo, io: &mut StepIo<'_>) -> MirrorResult<()> {
        self.screenshot(step, Phase::Before, io).await;
        let message = format!(
            "[{}/{}] {} ({}) in context {}: ready to capture?",
            step.index + 1,
            step.total,
            step.action,
            step.label,
            step.context
                .current_context
                .map(|c| c.as_str())
                .unwrap_or("unknown")
        );
        self.ask(step, message, io).await
    }

    async fn after_step(
        &mut self,
        step: &StepInfo,
        point: &CapturedPoint,
        io: &mut StepIo<'_>,
    ) -> MirrorResult<()> {
        if let Some(path) = self.screenshot(step, Phase::After, io).await {
            if let Err(err) = annotate_tap(&path, &path, point.rel, step.action) {
                tracing::warn!(path = %path.display(), error = %err, "checkpoint annotation failed");
            }
        }
        let message = format!(
            "[{}/{}] {} tapped at ({}, {}): did it land correctly?",
            step.index + 1,
            step.total,
            step.action,
            point.abs.x,
            point.abs.y
        );
        self.ask(step, message, io).await
    }

    async fn on_step_error(&mut self, step: &StepInfo, error: &MirrorError, io: &mut StepIo<'_>) {
        if error.is_cancellation() {
            return;
        }
        match self.write_report(step, error, io).await {
            Ok(path) => {
                tracing::error!(report = %path.display(), "calibration failure report written");
                self.report = Some(path);
            }
            Err(err) => tracing::error!(error = %err, "failure report could not be written"),
        }
    }
}
