//! App-launch orchestrator.
//!
//! Reaching "search field focused" inside an app is a sequence of attempts,
//! each described by a [`LaunchAttempt`] so the plan is loggable data. An
//! attempt walks `idle → home → search-entry → query-typed → submitted →
//! confirmed`; any failure aborts only that attempt. When every search-based
//! attempt is exhausted, the home-screen icon is tapped exactly once.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::bridge::{HostBridge, Modifier};
use crate::catalog::{
    find_action, flow_for, ActionCalibrationDefinition, ActionContext, AppFlowDefinition,
    BasePoint, LaunchStyle, PostLaunchAction, SearchSubmitMode, APP_FLOWS, HOME_GESTURE_FROM,
    HOME_GESTURE_TO, LEGACY_HOME_SEARCH_BUTTON, LEGACY_LAUNCH_RESULT_TAP,
};
use crate::config::Settings;
use crate::error::{MirrorError, MirrorResult};
use crate::geometry::{
    content_region_from, parse_tap_sequence, to_absolute, AbsPoint, Region, RelPoint, WindowBounds,
};
use crate::profile::BaseCoordinatesProfile;

/// Where the orchestrator believes the mirrored UI is. Reset per command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeAppContext {
    pub current_app: Option<String>,
    pub current_context: Option<ActionContext>,
}

impl RuntimeAppContext {
    pub fn at(app: Option<&str>, context: ActionContext) -> Self {
        Self {
            current_app: app.map(ToString::to_string),
            current_context: Some(context),
        }
    }

    pub fn is_at(&self, app: Option<&str>, context: ActionContext) -> bool {
        if self.current_context != Some(context) {
            return false;
        }
        match app {
            Some(app) => self.current_app.as_deref() == Some(app),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptMode {
    ShortcutPreferred,
    TapOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptReason {
    Preferred,
    ShortcutsDisabled,
    TapOnlyFlow,
    DeterministicFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaunchAttempt {
    pub number: u32,
    pub mode: AttemptMode,
    pub reason: AttemptReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchPhase {
    Idle,
    Home,
    SearchEntry,
    QueryTyped,
    Submitted,
    Confirmed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub attempt: LaunchAttempt,
    pub reached: LaunchPhase,
    pub shortcut_used: bool,
    pub succeeded: bool,
    /// A success that was not trusted and led to another attempt.
    pub superseded: bool,
    pub error: Option<String>,
}

impl AttemptRecord {
    fn new(attempt: LaunchAttempt) -> Self {
        Self {
            attempt,
            reached: LaunchPhase::Idle,
            shortcut_used: false,
            succeeded: false,
            superseded: false,
            error: None,
        }
    }

    fn summary(&self) -> String {
        let status = if self.succeeded { "superseded" } else { "failed" };
        format!(
            "#{} {:?} {status} at {:?}",
            self.attempt.number, self.attempt.mode, self.reached
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "via", rename_all = "kebab-case")]
pub enum LaunchPath {
    Search { attempt: u32, mode: AttemptMode },
    HomeIcon { point: AbsPoint },
}

#[derive(Debug, Clone, Serialize)]
pub struct LaunchReport {
    pub app: String,
    pub attempts: Vec<AttemptRecord>,
    pub icon_fallback_used: bool,
    pub path: Option<LaunchPath>,
}

/// Attempt plan for a flow, before any outcome is known.
pub fn plan_attempts(flow: &AppFlowDefinition, use_shortcuts: bool) -> Vec<LaunchAttempt> {
    let attempt = |number, mode, reason| LaunchAttempt {
        number,
        mode,
        reason,
    };
    match flow.launch_style {
        LaunchStyle::LegacyIconOnly => Vec::new(),
        LaunchStyle::SearchIconOnly => {
            vec![attempt(1, AttemptMode::TapOnly, AttemptReason::TapOnlyFlow)]
        }
        LaunchStyle::Shortcut if !use_shortcuts => {
            vec![attempt(1, AttemptMode::TapOnly, AttemptReason::ShortcutsDisabled)]
        }
        LaunchStyle::Shortcut => vec![
            attempt(1, AttemptMode::ShortcutPreferred, AttemptReason::Preferred),
            attempt(2, AttemptMode::TapOnly, AttemptReason::DeterministicFallback),
        ],
    }
}

/// Search opened by shortcut plus Enter-to-submit has proven unreliable, so
/// such a success is re-done deterministically before anything depends on it.
pub fn requires_deterministic_recheck(
    attempt: &LaunchAttempt,
    shortcut_used: bool,
    submit_mode: SearchSubmitMode,
) -> bool {
    attempt.mode == AttemptMode::ShortcutPreferred
        && shortcut_used
        && submit_mode == SearchSubmitMode::Enter
}

/// Fractional points available for navigation: calibrated values first,
/// legacy constants otherwise.
#[derive(Debug, Clone, Default)]
pub struct PointBook {
    home_search_button: Option<RelPoint>,
    launch_result_tap: Option<RelPoint>,
    app_search_steps: BTreeMap<String, Vec<RelPoint>>,
    actions: HashMap<String, RelPoint>,
}

impl PointBook {
    pub fn from_profile(profile: Option<&BaseCoordinatesProfile>) -> MirrorResult<Self> {
        let mut book = Self::default();
        let Some(profile) = profile else {
            return Ok(book);
        };
        book.home_search_button = Some(profile.points.home_search_button.rel());
        book.launch_result_tap = Some(profile.points.launch_result_tap.rel());
        for (app, raw) in &profile.points.app_search_steps {
            book.app_search_steps
                .insert(app.clone(), parse_tap_sequence(raw)?);
        }
        if let Some(apps) = &profile.points.app_action_points {
            for (app, actions) in apps {
                for (action, point) in actions {
                    book.actions.insert(format!("{app}:{action}"), point.rel());
                }
            }
        }
        Ok(book)
    }

    pub fn record(&mut self, def: &ActionCalibrationDefinition, point: RelPoint) {
        match def.base_point() {
            Some(BasePoint::HomeSearchButton) => self.home_search_button = Some(point),
            Some(BasePoint::LaunchResultTap) => self.launch_result_tap = Some(point),
            None => {
                self.actions.insert(def.id.to_string(), point);
            }
        }
    }

    pub fn home_search_button(&self) -> RelPoint {
        self.home_search_button.unwrap_or(LEGACY_HOME_SEARCH_BUTTON)
    }

    pub fn launch_result_tap(&self) -> RelPoint {
        self.launch_result_tap.unwrap_or(LEGACY_LAUNCH_RESULT_TAP)
    }

    pub fn action(&self, id: &str) -> Option<RelPoint> {
        self.actions.get(id).copied()
    }

    /// Calibrated search action, else the stored tap sequence, else the
    /// catalog's legacy sequence.
    pub fn search_steps(&self, flow: &AppFlowDefinition) -> MirrorResult<Option<Vec<RelPoint>>> {
        if let Some(point) = self.action(flow.search_action) {
            return Ok(Some(vec![point]));
        }
        if let Some(steps) = self.app_search_steps.get(flow.app) {
            return Ok(Some(steps.clone()));
        }
        match find_action(flow.search_action)?.fallback_tap_steps {
            Some(raw) => Ok(Some(parse_tap_sequence(raw)?)),
            None => Ok(None),
        }
    }

    pub fn icon(&self, flow: &AppFlowDefinition) -> RelPoint {
        flow.icon_action
            .and_then(|id| self.action(id))
            .unwrap_or(flow.legacy_icon)
    }
}

/// Eager pre-flight check: every point a capture run for `app` relies on must
/// be calibrated before the run starts.
pub fn ensure_calibrated(profile: &BaseCoordinatesProfile, app: &str) -> MirrorResult<()> {
    let flow = flow_for(app)?;
    for def in flow.required_actions() {
        let satisfied = profile.action_point(flow.app, def.action_name()).is_some()
            || (def.id == flow.search_action
                && profile.points.app_search_steps.contains_key(flow.app));
        if !satisfied {
            return Err(MirrorError::MissingCalibration {
                app: flow.app.to_string(),
                action: def.id.to_string(),
            });
        }
    }
    Ok(())
}

fn required_app(app: Option<&str>) -> MirrorResult<&str> {
    app.ok_or_else(|| MirrorError::UnknownApp("<none>".to_string()))
}

/// Live window bounds and the content region derived from them.
pub async fn probe_window(
    bridge: &dyn HostBridge,
    settings: &Settings,
) -> MirrorResult<(WindowBounds, Region)> {
    let bounds = bridge
        .query_window_bounds(&settings.mirror.process_candidates)
        .await?;
    let region = content_region_from(bounds, settings.mirror.insets, settings.mirror.display_scale)?;
    Ok((bounds, region))
}

pub struct Orchestrator<'a> {
    bridge: &'a dyn HostBridge,
    settings: &'a Settings,
    use_shortcuts: bool,
    book: PointBook,
    context: RuntimeAppContext,
    cancel: CancellationToken,
}

impl<'a> Orchestrator<'a> {
    pub fn new(bridge: &'a dyn HostBridge, settings: &'a Settings, book: PointBook) -> Self {
        Self {
            bridge,
            settings,
            use_shortcuts: settings.launch.use_shortcuts,
            book,
            context: RuntimeAppContext::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Shares the operator's interrupt; once canceled, the next step boundary
    /// fails with [`MirrorError::OperatorCanceled`].
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn bridge(&self) -> &'a dyn HostBridge {
        self.bridge
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    pub fn context(&self) -> &RuntimeAppContext {
        &self.context
    }

    pub fn set_context(&mut self, context: RuntimeAppContext) {
        self.context = context;
    }

    pub fn book_mut(&mut self) -> &mut PointBook {
        &mut self.book
    }

    fn preferred_mode(&self) -> AttemptMode {
        if self.use_shortcuts {
            AttemptMode::ShortcutPreferred
        } else {
            AttemptMode::TapOnly
        }
    }

    /// Recomputed on every call; the window may have moved since the last one.
    pub async fn current_region(&self) -> MirrorResult<Region> {
        probe_window(self.bridge, self.settings).await.map(|(_, region)| region)
    }

    pub async fn settle(&self) {
        self.pause(self.settings.timing.settle_ms).await;
    }

    /// Settle-class pause; skipped entirely when settling is disabled.
    async fn pause(&self, ms: u64) {
        if self.settings.timing.settle_ms > 0 {
            self.sleep_cancelable(ms).await;
        }
    }

    /// Returns early once the interrupt fires.
    async fn sleep_cancelable(&self, ms: u64) {
        if ms > 0 {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }

    fn check_canceled(&self, step: &str) -> MirrorResult<()> {
        if self.cancel.is_cancelled() {
            tracing::info!(step, "interrupt received; unwinding");
            return Err(MirrorError::OperatorCanceled);
        }
        Ok(())
    }

    /// Verifies the mirror host is frontmost, re-activating it with linear
    /// backoff. Focus can be stolen at any moment, so this is never cached.
    pub async fn ensure_focus(&self, step: &str) -> MirrorResult<String> {
        self.check_canceled(step)?;
        let candidates = &self.settings.mirror.process_candidates;
        let retries = self.settings.timing.focus_retries.max(1);
        let mut frontmost = None;
        for attempt in 1..=retries {
            frontmost = self.bridge.frontmost_process_name().await;
            if let Some(name) = frontmost.as_deref() {
                if candidates.iter().any(|c| c == name) {
                    if attempt > 1 {
                        tracing::debug!(step, attempt, process = name, "mirror focus re-acquired");
                    }
                    return Ok(name.to_string());
                }
            }
            tracing::debug!(step, attempt, frontmost = ?frontmost, "mirror not frontmost; activating");
            for candidate in candidates {
                if self.bridge.activate_process(candidate).await {
                    break;
                }
            }
            let backoff = self
                .settings
                .timing
                .focus_backoff_ms
                .saturating_mul(u64::from(attempt));
            self.sleep_cancelable(backoff).await;
            self.check_canceled(step)?;
        }
        frontmost = self.bridge.frontmost_process_name().await.or(frontmost);
        if let Some(name) = frontmost.as_deref() {
            if candidates.iter().any(|c| c == name) {
                return Ok(name.to_string());
            }
        }
        Err(MirrorError::TransientUi {
            step: step.to_string(),
            message: format!("mirror host not frontmost after {retries} activation attempts"),
            frontmost,
        })
    }

    pub async fn tap(&self, rel: RelPoint, step: &str) -> MirrorResult<AbsPoint> {
        self.ensure_focus(step).await?;
        let region = self.current_region().await?;
        let abs = to_absolute(rel, &region)?;
        tracing::trace!(step, rel_x = rel.x, rel_y = rel.y, abs_x = abs.x, abs_y = abs.y, "tap");
        self.bridge
            .click_at(abs)
            .await
            .map_err(|err| MirrorError::Host {
                command: format!("{step}: click at ({}, {}) in region {region:?}", abs.x, abs.y),
                message: err.to_string(),
            })?;
        self.ensure_focus(step).await?;
        Ok(abs)
    }

    /// Unconfirmed keystrokes are re-sent up to `focus_retries` times, with
    /// focus re-checked and a linear backoff between tries.
    async fn keystroke(&self, key: &str, modifiers: &[Modifier], step: &str) -> MirrorResult<()> {
        let retries = self.settings.timing.focus_retries.max(1);
        for attempt in 1..=retries {
            self.ensure_focus(step).await?;
            if self.bridge.send_keystroke(key, modifiers).await {
                self.ensure_focus(step).await?;
                return Ok(());
            }
            tracing::debug!(step, key, attempt, retries, "keystroke not confirmed");
            if attempt < retries {
                let backoff = self
                    .settings
                    .timing
                    .focus_backoff_ms
                    .saturating_mul(u64::from(attempt));
                self.sleep_cancelable(backoff).await;
            }
        }
        Err(MirrorError::TransientUi {
            step: step.to_string(),
            message: format!("keystroke {modifiers:?}+{key} not confirmed after {retries} tries"),
            frontmost: self.bridge.frontmost_process_name().await,
        })
    }

    pub async fn type_text(&self, text: &str, step: &str) -> MirrorResult<()> {
        self.ensure_focus(step).await?;
        for ch in text.chars() {
            self.type_char(ch, step).await?;
        }
        Ok(())
    }

    /// Types one character and confirms focus afterwards.
    pub async fn type_char(&self, ch: char, step: &str) -> MirrorResult<()> {
        self.bridge.type_character(ch).await?;
        self.ensure_focus(step).await?;
        Ok(())
    }

    async fn go_home(&self, mode: AttemptMode) -> MirrorResult<()> {
        if mode == AttemptMode::ShortcutPreferred {
            match self.keystroke("1", &[Modifier::Command], "go-home").await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(error = %err, "home shortcut failed; using home gesture");
                }
                Err(err) => return Err(err),
            }
        }
        self.ensure_focus("go-home").await?;
        let region = self.current_region().await?;
        let from = to_absolute(HOME_GESTURE_FROM, &region)?;
        let to = to_absolute(HOME_GESTURE_TO, &region)?;
        self.bridge.drag_from(from, to).await?;
        self.ensure_focus("go-home").await?;
        Ok(())
    }

    /// Opens home search. Returns whether the shortcut path was used.
    async fn open_search_entry(&self, mode: AttemptMode) -> MirrorResult<bool> {
        if mode == AttemptMode::ShortcutPreferred {
            match self.keystroke("3", &[Modifier::Command], "open-search").await {
                Ok(()) => return Ok(true),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(error = %err, "search shortcut failed; tapping search button");
                }
                Err(err) => return Err(err),
            }
        }
        self.tap(self.book.home_search_button(), "open-search").await?;
        Ok(false)
    }

    async fn clear_field(&self) -> MirrorResult<()> {
        self.keystroke("a", &[Modifier::Command], "clear-field").await?;
        self.keystroke("delete", &[], "clear-field").await
    }

    async fn submit(&self, flow: &AppFlowDefinition) -> MirrorResult<()> {
        match flow.submit_mode {
            SearchSubmitMode::Enter => self.keystroke("return", &[], "submit").await,
            SearchSubmitMode::TapResult => self
                .tap(self.book.launch_result_tap(), "submit")
                .await
                .map(|_| ()),
        }
    }

    async fn run_attempt(&self, flow: &AppFlowDefinition, record: &mut AttemptRecord) -> MirrorResult<()> {
        let mode = record.attempt.mode;
        self.ensure_focus("attempt-start").await?;

        self.go_home(mode).await?;
        record.reached = LaunchPhase::Home;
        self.settle().await;

        record.shortcut_used = self.open_search_entry(mode).await?;
        record.reached = LaunchPhase::SearchEntry;
        self.settle().await;

        self.clear_field().await?;
        self.type_text(flow.search_query, "type-app-name").await?;
        record.reached = LaunchPhase::QueryTyped;
        self.settle().await;

        self.submit(flow).await?;
        record.reached = LaunchPhase::Submitted;
        self.settle().await;

        self.ensure_focus("confirm-launch").await?;
        record.reached = LaunchPhase::Confirmed;
        Ok(())
    }

    async fn launch_via_icon(&self, flow: &AppFlowDefinition) -> MirrorResult<AbsPoint> {
        self.ensure_focus("icon-fallback").await?;
        self.go_home(self.preferred_mode()).await?;
        self.settle().await;
        let point = self.tap(self.book.icon(flow), "icon-fallback").await?;
        self.settle().await;
        self.ensure_focus("confirm-icon-launch").await?;
        Ok(point)
    }

    /// Drives the mirrored UI into `app`, leaving the context at `app-active`.
    pub async fn launch_app(&mut self, app: &str) -> MirrorResult<LaunchReport> {
        let flow = flow_for(app)?;
        let plan = plan_attempts(flow, self.use_shortcuts);
        let mut report = LaunchReport {
            app: flow.app.to_string(),
            attempts: Vec::with_capacity(plan.len()),
            icon_fallback_used: false,
            path: None,
        };
        self.context = RuntimeAppContext::default();

        for (idx, attempt) in plan.iter().enumerate() {
            let has_next = idx + 1 < plan.len();
            tracing::info!(
                app = flow.app,
                attempt = attempt.number,
                mode = ?attempt.mode,
                reason = ?attempt.reason,
                "launch attempt starting"
            );
            let mut record = AttemptRecord::new(*attempt);
            match self.run_attempt(flow, &mut record).await {
                Ok(()) => {
                    record.succeeded = true;
                    if has_next
                        && requires_deterministic_recheck(attempt, record.shortcut_used, flow.submit_mode)
                    {
                        tracing::warn!(
                            app = flow.app,
                            attempt = attempt.number,
                            "shortcut search with enter-submit succeeded; forcing a deterministic tap-only attempt"
                        );
                        record.superseded = true;
                        report.attempts.push(record);
                        self.settle().await;
                        continue;
                    }
                    tracing::info!(app = flow.app, attempt = attempt.number, mode = ?attempt.mode, "launch confirmed");
                    report.attempts.push(record);
                    report.path = Some(LaunchPath::Search {
                        attempt: attempt.number,
                        mode: attempt.mode,
                    });
                    self.context = RuntimeAppContext::at(Some(flow.app), ActionContext::AppActive);
                    return Ok(report);
                }
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        app = flow.app,
                        attempt = attempt.number,
                        mode = ?attempt.mode,
                        reached = ?record.reached,
                        error = %err,
                        "launch attempt failed; settling before next path"
                    );
                    record.error = Some(err.to_string());
                    report.attempts.push(record);
                    self.settle().await;
                }
            }
        }

        tracing::info!(
            app = flow.app,
            style = ?flow.launch_style,
            "falling back to home-screen icon"
        );
        report.icon_fallback_used = true;
        match self.launch_via_icon(flow).await {
            Ok(point) => {
                report.path = Some(LaunchPath::HomeIcon { point });
                self.context = RuntimeAppContext::at(Some(flow.app), ActionContext::AppActive);
                Ok(report)
            }
            Err(err) if err.is_cancellation() => Err(err),
            Err(err) => {
                tracing::error!(app = flow.app, error = %err, "home-screen icon fallback failed");
                let mut attempts: Vec<String> = report.attempts.iter().map(AttemptRecord::summary).collect();
                attempts.push("home-icon failed".to_string());
                Err(MirrorError::LaunchExhausted {
                    app: flow.app.to_string(),
                    attempts,
                    last_error: err.to_string(),
                })
            }
        }
    }

    /// Flow-declared steps after launch. `skip_action` is left untouched so
    /// that the point being recalibrated is still on screen.
    pub async fn run_post_launch(
        &mut self,
        flow: &AppFlowDefinition,
        skip_action: Option<&str>,
    ) -> MirrorResult<()> {
        for step in flow.post_launch {
            match step {
                PostLaunchAction::Wait { ms } => self.pause(*ms).await,
                PostLaunchAction::TapCalibrated { action } => {
                    if skip_action == Some(*action) {
                        tracing::debug!(action, "post-launch tap skipped while calibrating it");
                        continue;
                    }
                    match self.book.action(action) {
                        Some(point) => {
                            self.tap(point, action).await?;
                            self.settle().await;
                        }
                        None => {
                            tracing::warn!(app = flow.app, action, "post-launch point not calibrated yet; skipping")
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn focus_app_search(&mut self, flow: &AppFlowDefinition) -> MirrorResult<()> {
        let steps = self
            .book
            .search_steps(flow)?
            .ok_or_else(|| MirrorError::MissingCalibration {
                app: flow.app.to_string(),
                action: flow.search_action.to_string(),
            })?;
        for point in steps {
            self.tap(point, "focus-app-search").await?;
            self.settle().await;
        }
        self.context = RuntimeAppContext::at(Some(flow.app), ActionContext::SearchFocused);
        Ok(())
    }

    /// Full path used by capture runs: launch, post-launch steps, search field.
    pub async fn launch_to_search(&mut self, app: &str) -> MirrorResult<LaunchReport> {
        let flow = flow_for(app)?;
        let report = self.launch_app(flow.app).await?;
        self.run_post_launch(flow, None).await?;
        self.focus_app_search(flow).await?;
        Ok(report)
    }

    /// Launches `flow.app` unless it is already in the foreground.
    async fn reach_app(&mut self, flow: &AppFlowDefinition, skip_action: Option<&str>) -> MirrorResult<()> {
        if self.context.is_at(Some(flow.app), ActionContext::AppActive) {
            return Ok(());
        }
        let report = self.launch_app(flow.app).await?;
        tracing::debug!(app = flow.app, path = ?report.path, "app launched for calibration");
        self.run_post_launch(flow, skip_action).await?;
        self.context = RuntimeAppContext::at(Some(flow.app), ActionContext::AppActive);
        Ok(())
    }

    /// Replaces whatever the focused field holds with `query`.
    pub async fn enter_seed_query(&mut self, query: &str) -> MirrorResult<()> {
        self.clear_field().await?;
        self.type_text(query, "seed-query").await?;
        self.settle().await;
        Ok(())
    }

    /// Navigates to `target` unless the runtime context says we are already there.
    pub async fn ensure_context(
        &mut self,
        target: ActionContext,
        app: Option<&str>,
        skip_action: Option<&str>,
    ) -> MirrorResult<()> {
        if self.context.is_at(app, target) {
            tracing::debug!(context = %target, app = ?app, "already in required context");
            return Ok(());
        }
        tracing::info!(context = %target, app = ?app, "navigating to required context");
        match target {
            ActionContext::Home => {
                self.ensure_focus("navigate-home").await?;
                self.go_home(self.preferred_mode()).await?;
                self.settle().await;
                self.context = RuntimeAppContext::at(None, ActionContext::Home);
            }
            ActionContext::SearchEntry => {
                let flow = match app {
                    Some(app) => flow_for(app)?,
                    None => APP_FLOWS
                        .first()
                        .ok_or_else(|| MirrorError::UnknownApp("<none>".to_string()))?,
                };
                let mode = self.preferred_mode();
                self.ensure_focus("navigate-search-entry").await?;
                self.go_home(mode).await?;
                self.settle().await;
                self.open_search_entry(mode).await?;
                self.settle().await;
                self.clear_field().await?;
                self.type_text(flow.search_query, "navigate-search-entry").await?;
                self.settle().await;
                self.context = RuntimeAppContext::at(Some(flow.app), ActionContext::SearchEntry);
            }
            ActionContext::AppActive => {
                let flow = flow_for(required_app(app)?)?;
                self.reach_app(flow, skip_action).await?;
            }
            ActionContext::SearchFocused => {
                let flow = flow_for(required_app(app)?)?;
                self.reach_app(flow, skip_action).await?;
                self.focus_app_search(flow).await?;
            }
            ActionContext::Custom => {
                let flow = flow_for(required_app(app)?)?;
                if !self.context.is_at(Some(flow.app), ActionContext::SearchFocused) {
                    self.reach_app(flow, skip_action).await?;
                    self.focus_app_search(flow).await?;
                }
                self.context = RuntimeAppContext::at(Some(flow.app), ActionContext::Custom);
            }
        }
        Ok(())
    }
}
