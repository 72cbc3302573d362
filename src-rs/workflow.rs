//! Calibration workflow engine.
//!
//! Both entry points capture points the same way: focus, region, operator
//! sample, fraction check. The full pass walks the catalog in prerequisite
//! order, navigating with the orchestrator between actions, and persists one
//! aggregate profile at the end. Interactive behaviour around each step is
//! supplied through [`CalibrationHooks`].

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::bridge::HostBridge;
use crate::catalog::{
    calibration_order, find_action, flow_for, ActionCalibrationDefinition, BasePoint,
    ACTION_CATALOG, HOME_SEARCH_BUTTON, LAUNCH_RESULT_TAP, SYSTEM_APP,
};
use crate::config::Settings;
use crate::error::{MirrorError, MirrorResult};
use crate::geometry::{format_tap_sequence, to_relative, AbsPoint, Region, RelPoint, WindowBounds};
use crate::orchestrator::{probe_window, Orchestrator, PointBook, RuntimeAppContext};
use crate::profile::{
    new_profile, upsert_action_point, BaseCoordinatePoint, BaseCoordinatesProfile, ProfileStore,
};
use crate::prompt::{OperatorConsole, SampleRequest};
use crate::util::timestamp_iso;

#[derive(Debug, Clone, Serialize)]
pub struct StepInfo {
    pub index: usize,
    pub total: usize,
    pub action: &'static str,
    pub label: &'static str,
    pub context: RuntimeAppContext,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CapturedPoint {
    pub abs: AbsPoint,
    pub rel: RelPoint,
    pub region: Region,
}

/// What hooks may touch while a step is paused.
pub struct StepIo<'a> {
    pub bridge: &'a dyn HostBridge,
    pub settings: &'a Settings,
    pub console: &'a mut dyn OperatorConsole,
}

#[async_trait]
pub trait CalibrationHooks: Send {
    async fn before_step(&mut self, _step: &StepInfo, _io: &mut StepIo<'_>) -> MirrorResult<()> {
        Ok(())
    }

    async fn after_step(
        &mut self,
        _step: &StepInfo,
        _point: &CapturedPoint,
        _io: &mut StepIo<'_>,
    ) -> MirrorResult<()> {
        Ok(())
    }

    /// Called once with the error that is about to abort the run.
    async fn on_step_error(&mut self, _step: &StepInfo, _error: &MirrorError, _io: &mut StepIo<'_>) {}
}

/// Unattended runs.
pub struct NoopHooks;

impl CalibrationHooks for NoopHooks {}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationOutcome {
    pub action: &'static str,
    pub point: CapturedPoint,
    pub profile_path: PathBuf,
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationRun {
    pub captured: Vec<(&'static str, CapturedPoint)>,
    pub profile_path: PathBuf,
    pub snapshot: Option<PathBuf>,
}

/// Focus, region, operator sample, then the `[0,1]` check.
pub async fn capture_point(
    orch: &Orchestrator<'_>,
    console: &mut dyn OperatorConsole,
    def: &ActionCalibrationDefinition,
) -> MirrorResult<CapturedPoint> {
    orch.ensure_focus(def.id).await?;
    let region = orch.current_region().await?;
    let request = SampleRequest {
        action: def.id,
        label: def.label,
        region,
    };
    let abs = console.sample_point(orch.bridge(), &request).await?;
    let rel = to_relative(abs, &region)?;
    if !rel.is_within_unit() {
        return Err(MirrorError::PointOutOfRegion {
            action: def.id.to_string(),
            abs_x: abs.x,
            abs_y: abs.y,
            rel_x: rel.x,
            rel_y: rel.y,
            region,
        });
    }
    tracing::info!(action = def.id, rel_x = rel.x, rel_y = rel.y, abs_x = abs.x, abs_y = abs.y, "point captured");
    Ok(CapturedPoint { abs, rel, region })
}

/// Base points replace their dedicated fields; everything else is upserted
/// under `appActionPoints[app][action]`.
pub fn merge_point(
    profile: &BaseCoordinatesProfile,
    def: &ActionCalibrationDefinition,
    point: &CapturedPoint,
) -> BaseCoordinatesProfile {
    let stored = BaseCoordinatePoint::captured(point.rel, point.abs);
    match def.base_point() {
        Some(base) => {
            let mut next = profile.clone();
            match base {
                BasePoint::HomeSearchButton => next.points.home_search_button = stored,
                BasePoint::LaunchResultTap => next.points.launch_result_tap = stored,
            }
            next.generated_at = timestamp_iso();
            next
        }
        None => upsert_action_point(profile, def.for_app, def.action_name(), stored),
    }
}

/// Recalibrates one action in an existing profile.
pub async fn calibrate_single(
    store: &mut ProfileStore,
    orch: &Orchestrator<'_>,
    console: &mut dyn OperatorConsole,
    action: &str,
) -> MirrorResult<CalibrationOutcome> {
    let def = find_action(action)?;
    let profile = store.load()?;
    let point = capture_point(orch, console, def).await?;
    let next = merge_point(&profile, def, &point);
    let snapshot = store.persist(&next)?;
    Ok(CalibrationOutcome {
        action: def.id,
        point,
        profile_path: store.path().to_path_buf(),
        snapshot,
    })
}

/// Full pass over the catalog. A missing or unreadable existing profile is
/// tolerated: this is how such a profile gets repaired.
pub async fn calibrate_all(
    store: &mut ProfileStore,
    orch: &mut Orchestrator<'_>,
    console: &mut dyn OperatorConsole,
    hooks: &mut dyn CalibrationHooks,
) -> MirrorResult<CalibrationRun> {
    let order = calibration_order(ACTION_CATALOG)?;
    let existing = match store.load() {
        Ok(profile) => Some(profile),
        Err(err) => {
            tracing::warn!(error = %err, "existing profile unusable; starting from scratch");
            None
        }
    };
    let book = PointBook::from_profile(existing.as_ref()).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "existing points ignored");
        PointBook::default()
    });
    *orch.book_mut() = book;

    let total = order.len();
    let mut captured: Vec<(&'static ActionCalibrationDefinition, CapturedPoint)> =
        Vec::with_capacity(total);
    let mut last_step = None;
    for (index, def) in order.into_iter().enumerate() {
        let mut step = StepInfo {
            index,
            total,
            action: def.id,
            label: def.label,
            context: orch.context().clone(),
        };
        tracing::info!(step = index + 1, total, action = def.id, context = %def.target_context(), "calibration step");
        match run_step(orch, console, hooks, def, &mut step).await {
            Ok(point) => {
                captured.push((def, point));
                last_step = Some(step);
            }
            Err(err) => {
                tracing::error!(action = def.id, error = %err, "calibration step failed; aborting run");
                return Err(report_failure(orch, console, hooks, &step, err).await);
            }
        }
    }

    let snapshot = match persist_aggregate(store, orch, existing.as_ref(), &captured).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::error!(error = %err, "aggregate profile not saved; aborting run");
            return Err(match &last_step {
                Some(step) => report_failure(orch, console, hooks, step, err).await,
                None => err,
            });
        }
    };
    Ok(CalibrationRun {
        captured: captured.iter().map(|(def, point)| (def.id, *point)).collect(),
        profile_path: store.path().to_path_buf(),
        snapshot,
    })
}

/// Hands `err` to the hooks and passes it back for the caller to return.
async fn report_failure(
    orch: &Orchestrator<'_>,
    console: &mut dyn OperatorConsole,
    hooks: &mut dyn CalibrationHooks,
    step: &StepInfo,
    err: MirrorError,
) -> MirrorError {
    let mut io = StepIo {
        bridge: orch.bridge(),
        settings: orch.settings(),
        console,
    };
    hooks.on_step_error(step, &err, &mut io).await;
    err
}

async fn persist_aggregate(
    store: &mut ProfileStore,
    orch: &Orchestrator<'_>,
    existing: Option<&BaseCoordinatesProfile>,
    captured: &[(&'static ActionCalibrationDefinition, CapturedPoint)],
) -> MirrorResult<Option<PathBuf>> {
    let (window, region) = probe_window(orch.bridge(), orch.settings()).await?;
    let profile = aggregate_profile(existing, window, region, captured)?;
    store.persist(&profile)
}

async fn run_step(
    orch: &mut Orchestrator<'_>,
    console: &mut dyn OperatorConsole,
    hooks: &mut dyn CalibrationHooks,
    def: &'static ActionCalibrationDefinition,
    step: &mut StepInfo,
) -> MirrorResult<CapturedPoint> {
    let app = (def.for_app != SYSTEM_APP).then_some(def.for_app);
    orch.ensure_context(def.target_context(), app, Some(def.id)).await?;
    if let Some(query) = def.seed_query {
        orch.enter_seed_query(query).await?;
    }
    step.context = orch.context().clone();

    let mut io = StepIo {
        bridge: orch.bridge(),
        settings: orch.settings(),
        console: &mut *console,
    };
    hooks.before_step(step, &mut io).await?;

    let point = capture_point(orch, &mut *console, def).await?;
    orch.book_mut().record(def, point.rel);

    // live confirmation tap
    orch.tap(point.rel, def.id).await?;
    orch.settle().await;
    let landed = match def.lands_in {
        Some(context) => {
            let app = if def.for_app == SYSTEM_APP {
                orch.context().current_app.clone()
            } else {
                Some(def.for_app.to_string())
            };
            RuntimeAppContext {
                current_app: app,
                current_context: Some(context),
            }
        }
        None => RuntimeAppContext::default(),
    };
    orch.set_context(landed);

    let mut io = StepIo {
        bridge: orch.bridge(),
        settings: orch.settings(),
        console: &mut *console,
    };
    hooks.after_step(step, &point, &mut io).await?;
    Ok(point)
}

/// Base points and per-app entries carried over, then overwritten by what this
/// pass captured. A captured search action also replaces the app's stored
/// tap sequence so it cannot shadow the new point.
fn aggregate_profile(
    existing: Option<&BaseCoordinatesProfile>,
    window: WindowBounds,
    region: Region,
    captured: &[(&'static ActionCalibrationDefinition, CapturedPoint)],
) -> MirrorResult<BaseCoordinatesProfile> {
    let base = |which: BasePoint| -> MirrorResult<BaseCoordinatePoint> {
        captured
            .iter()
            .find(|(def, _)| def.base_point() == Some(which))
            .map(|(_, p)| BaseCoordinatePoint::captured(p.rel, p.abs))
            .or_else(|| {
                existing.map(|e| match which {
                    BasePoint::HomeSearchButton => e.points.home_search_button.clone(),
                    BasePoint::LaunchResultTap => e.points.launch_result_tap.clone(),
                })
            })
            .ok_or_else(|| MirrorError::MissingCalibration {
                app: SYSTEM_APP.to_string(),
                action: match which {
                    BasePoint::HomeSearchButton => HOME_SEARCH_BUTTON,
                    BasePoint::LaunchResultTap => LAUNCH_RESULT_TAP,
                }
                .to_string(),
            })
    };

    let mut profile = new_profile(
        window,
        region,
        base(BasePoint::HomeSearchButton)?,
        base(BasePoint::LaunchResultTap)?,
    );
    if let Some(existing) = existing {
        profile.points.app_search_steps = existing.points.app_search_steps.clone();
        profile.points.app_action_points = existing.points.app_action_points.clone();
    }
    for (def, point) in captured {
        if def.base_point().is_some() {
            continue;
        }
        profile
            .points
            .app_action_points
            .get_or_insert_with(Default::default)
            .entry(def.for_app.to_string())
            .or_default()
            .insert(
                def.action_name().to_string(),
                BaseCoordinatePoint::captured(point.rel, point.abs),
            );
        if flow_for(def.for_app).is_ok_and(|flow| flow.search_action == def.id) {
            profile
                .points
                .app_search_steps
                .insert(def.for_app.to_string(), format_tap_sequence(&[point.rel]));
        }
    }
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ActionContext;
    use crate::profile::sample_profile;
    use crate::testing::{test_settings, ScriptedBridge, ScriptedConsole};
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingHooks {
        events: Vec<String>,
        contexts: Vec<(String, RuntimeAppContext)>,
    }

    #[async_trait]
    impl CalibrationHooks for RecordingHooks {
        async fn before_step(&mut self, step: &StepInfo, _io: &mut StepIo<'_>) -> MirrorResult<()> {
            self.events.push(format!("before:{}", step.action));
            self.contexts.push((step.action.to_string(), step.context.clone()));
            Ok(())
        }

        async fn after_step(
            &mut self,
            step: &StepInfo,
            _point: &CapturedPoint,
            _io: &mut StepIo<'_>,
        ) -> MirrorResult<()> {
            self.events.push(format!("after:{}", step.action));
            Ok(())
        }

        async fn on_step_error(&mut self, step: &StepInfo, error: &MirrorError, _io: &mut StepIo<'_>) {
            self.events.push(format!("error:{}:{}", step.action, error.is_cancellation()));
        }
    }

    #[tokio::test]
    async fn single_action_merges_into_existing_profile() {
        let dir = tempdir().unwrap();
        let mut store = ProfileStore::new(dir.path().join("base-coordinates.json"));
        store.persist(&sample_profile()).unwrap();

        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(452, 202)]);
        let settings = test_settings();
        let orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::default();

        let outcome = calibrate_single(&mut store, &orch, &mut console, "youtube:dismissMenu")
            .await
            .unwrap();

        assert!(outcome.snapshot.is_some());
        let mut reloaded = ProfileStore::new(store.path());
        let profile = reloaded.load().unwrap();
        let point = profile.action_point("youtube", "dismissMenu").unwrap();
        assert_eq!(point.abs_x, Some(452));
        assert!((point.rel_x - 0.9).abs() < 1e-9);
        assert_eq!(profile.points.home_search_button, sample_profile().points.home_search_button);
    }

    #[tokio::test]
    async fn base_point_calibration_replaces_dedicated_field() {
        let dir = tempdir().unwrap();
        let mut store = ProfileStore::new(dir.path().join("base-coordinates.json"));
        store.persist(&sample_profile()).unwrap();

        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(300, 582)]);
        let settings = test_settings();
        let orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::default();

        calibrate_single(&mut store, &orch, &mut console, HOME_SEARCH_BUTTON)
            .await
            .unwrap();
        let profile = store.load().unwrap();
        assert_eq!(profile.points.home_search_button.abs_y, Some(582));
        assert!(profile.points.app_action_points.is_none());
    }

    #[tokio::test]
    async fn out_of_region_point_is_rejected_and_nothing_written() {
        let dir = tempdir().unwrap();
        let mut store = ProfileStore::new(dir.path().join("base-coordinates.json"));
        store.persist(&sample_profile()).unwrap();

        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(50, 641)]);
        let settings = test_settings();
        let orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::default();

        let err = calibrate_single(&mut store, &orch, &mut console, "chrome:searchBar")
            .await
            .unwrap_err();
        match &err {
            MirrorError::PointOutOfRegion { action, abs_x, rel_x, .. } => {
                assert_eq!(action, "chrome:searchBar");
                assert_eq!(*abs_x, 50);
                assert!(*rel_x < 0.0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.remediation().unwrap().contains("calibrate chrome:searchBar"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn single_action_requires_a_profile() {
        let dir = tempdir().unwrap();
        let mut store = ProfileStore::new(dir.path().join("missing.json"));
        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(300, 641)]);
        let settings = test_settings();
        let orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::default();

        let err = calibrate_single(&mut store, &orch, &mut console, "chrome:searchBar")
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::MissingProfile { .. }));
    }

    #[tokio::test]
    async fn full_pass_walks_catalog_and_persists_once() {
        let dir = tempdir().unwrap();
        let mut store = ProfileStore::new(dir.path().join("base-coordinates.json"));
        let mut stale = sample_profile();
        stale
            .points
            .app_search_steps
            .insert("legacy-app".to_string(), "0.1,0.1".to_string());
        store.persist(&stale).unwrap();

        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(300, 641)]);
        let settings = test_settings();
        let mut orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::default();
        let mut hooks = RecordingHooks::default();

        let run = calibrate_all(&mut store, &mut orch, &mut console, &mut hooks)
            .await
            .unwrap();

        assert_eq!(run.captured.len(), ACTION_CATALOG.len());
        assert!(run.snapshot.is_some());
        assert_eq!(hooks.events.len(), ACTION_CATALOG.len() * 2);
        assert_eq!(hooks.events[0], format!("before:{HOME_SEARCH_BUTTON}"));
        assert_eq!(hooks.events[1], format!("after:{HOME_SEARCH_BUTTON}"));

        // chrome:searchBar is reached through the launch-result tap, not a relaunch
        let (_, chrome_ctx) = hooks
            .contexts
            .iter()
            .find(|(id, _)| id == "chrome:searchBar")
            .unwrap();
        assert!(chrome_ctx.is_at(Some("chrome"), ActionContext::AppActive));

        let mut reloaded = ProfileStore::new(store.path());
        let profile = reloaded.load().unwrap();
        assert_eq!(profile.points.home_search_button.abs_y, Some(641));
        assert!(profile.action_point("amazon", "homeIcon").is_some());
        assert!(profile.action_point("chrome", "clearQueryButton").is_some());
        assert_eq!(profile.points.app_search_steps["chrome"], "0.5,0.9096");
        assert_eq!(profile.points.app_search_steps["legacy-app"], "0.1,0.1");
        assert!(profile.points.app_search_steps.contains_key("youtube"));
        // one live tap per action at the captured point
        assert!(bridge.clicks_at(AbsPoint::new(300, 641)) >= ACTION_CATALOG.len());
        assert_eq!(console.samples(), ACTION_CATALOG.len());
    }

    #[tokio::test]
    async fn full_pass_tolerates_missing_profile() {
        let dir = tempdir().unwrap();
        let mut store = ProfileStore::new(dir.path().join("fresh").join("base-coordinates.json"));
        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(300, 641)]);
        let settings = test_settings();
        let mut orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::default();

        let run = calibrate_all(&mut store, &mut orch, &mut console, &mut NoopHooks)
            .await
            .unwrap();
        assert!(run.snapshot.is_none());
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn cancellation_aborts_run_without_persisting() {
        let dir = tempdir().unwrap();
        let mut store = ProfileStore::new(dir.path().join("base-coordinates.json"));
        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(300, 641)]);
        let settings = test_settings();
        let mut orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::cancel_on_sample(3);
        let mut hooks = RecordingHooks::default();

        let err = calibrate_all(&mut store, &mut orch, &mut console, &mut hooks)
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(hooks.events.last().unwrap(), "error:chrome:searchBar:true");
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn captured_search_bar_is_used_for_focusing_search() {
        let dir = tempdir().unwrap();
        let mut store = ProfileStore::new(dir.path().join("base-coordinates.json"));
        store.persist(&sample_profile()).unwrap();

        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(300, 400)]);
        let settings = test_settings();
        let orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::default();

        calibrate_single(&mut store, &orch, &mut console, "chrome:searchBar")
            .await
            .unwrap();

        let profile = ProfileStore::new(store.path()).load().unwrap();
        assert_eq!(profile.points.app_search_steps["chrome"], "0.5,0.08");
        let stored = profile.action_point("chrome", "searchBar").unwrap().rel();
        let book = PointBook::from_profile(Some(&profile)).unwrap();
        assert_eq!(
            book.search_steps(flow_for("chrome").unwrap()).unwrap(),
            Some(vec![stored])
        );
    }

    /// Bridge call count at every hook event.
    struct CallMarks<'b> {
        bridge: &'b ScriptedBridge,
        marks: Vec<(String, usize)>,
        contexts: Vec<(String, RuntimeAppContext)>,
    }

    impl CallMarks<'_> {
        fn at(&self, event: &str) -> usize {
            self.marks.iter().find(|(e, _)| e == event).map(|(_, n)| *n).unwrap()
        }
    }

    #[async_trait]
    impl CalibrationHooks for CallMarks<'_> {
        async fn before_step(&mut self, step: &StepInfo, _io: &mut StepIo<'_>) -> MirrorResult<()> {
            self.marks.push((format!("before:{}", step.action), self.bridge.call_count()));
            self.contexts.push((step.action.to_string(), step.context.clone()));
            Ok(())
        }

        async fn after_step(
            &mut self,
            step: &StepInfo,
            _point: &CapturedPoint,
            _io: &mut StepIo<'_>,
        ) -> MirrorResult<()> {
            self.marks.push((format!("after:{}", step.action), self.bridge.call_count()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn query_dependent_steps_start_from_a_typed_query() {
        let dir = tempdir().unwrap();
        let mut store = ProfileStore::new(dir.path().join("base-coordinates.json"));
        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(300, 641)]);
        let settings = test_settings();
        let mut orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::default();
        let mut hooks = CallMarks {
            bridge: &bridge,
            marks: Vec::new(),
            contexts: Vec::new(),
        };

        calibrate_all(&mut store, &mut orch, &mut console, &mut hooks)
            .await
            .unwrap();

        let seeded: Vec<&ActionCalibrationDefinition> = ACTION_CATALOG
            .iter()
            .filter(|def| def.seed_query.is_some())
            .collect();
        assert!(seeded.iter().any(|def| def.id == "chrome:firstSuggestion"));
        assert!(seeded.iter().any(|def| def.id == "chrome:clearQueryButton"));
        for def in &seeded {
            let (_, ctx) = hooks.contexts.iter().find(|(id, _)| id == def.id).unwrap();
            assert!(ctx.is_at(Some(def.for_app), def.target_context()), "{}", def.id);
        }
        assert_eq!(
            bridge.typed().matches(crate::catalog::SEED_QUERY).count(),
            seeded.len()
        );
        // the clear button is captured in a freshly filled field
        let between = hooks.at("before:chrome:clearQueryButton")
            - hooks.at("after:chrome:firstSuggestion");
        assert!(between > 0);
    }

    #[tokio::test]
    async fn failed_save_is_reported_to_hooks() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let mut store = ProfileStore::new(blocker.join("base-coordinates.json"));
        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(300, 641)]);
        let settings = test_settings();
        let mut orch = Orchestrator::new(&bridge, &settings, PointBook::default());
        let mut console = ScriptedConsole::default();
        let mut hooks = RecordingHooks::default();

        let err = calibrate_all(&mut store, &mut orch, &mut console, &mut hooks)
            .await
            .unwrap_err();

        assert!(!err.is_cancellation());
        let last = calibration_order(ACTION_CATALOG).unwrap().last().unwrap().id;
        assert_eq!(hooks.events.len(), ACTION_CATALOG.len() * 2 + 1);
        assert_eq!(hooks.events.last().unwrap(), &format!("error:{last}:false"));
    }
}
