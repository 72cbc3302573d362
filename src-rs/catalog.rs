//! Static catalog of calibratable actions and per-app launch flows.
//!
//! App differences live here as data; the orchestrator has no per-app branches.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{MirrorError, MirrorResult};
use crate::geometry::RelPoint;

pub const SYSTEM_APP: &str = "system";
pub const HOME_SEARCH_BUTTON: &str = "system:homeSearchButton";
pub const LAUNCH_RESULT_TAP: &str = "system:launchResultTap";

/// Used when no calibrated point exists yet.
pub const LEGACY_HOME_SEARCH_BUTTON: RelPoint = RelPoint { x: 0.5, y: 0.80 };
pub const LEGACY_LAUNCH_RESULT_TAP: RelPoint = RelPoint { x: 0.5, y: 0.22 };
/// Swipe up from the bottom edge to go home without a shortcut.
/// Query used to bring up suggestions and a filled field during calibration.
pub const SEED_QUERY: &str = "weather";

pub const HOME_GESTURE_FROM: RelPoint = RelPoint { x: 0.5, y: 0.995 };
pub const HOME_GESTURE_TO: RelPoint = RelPoint { x: 0.5, y: 0.55 };

/// Where the mirrored UI has to be before an action can be captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionContext {
    Home,
    SearchEntry,
    AppActive,
    SearchFocused,
    /// App search field focused and holding the seed query.
    Custom,
}

impl ActionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::SearchEntry => "search-entry",
            Self::AppActive => "app-active",
            Self::SearchFocused => "search-focused",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile fields that live outside `appActionPoints`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasePoint {
    HomeSearchButton,
    LaunchResultTap,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionCalibrationDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub for_app: &'static str,
    pub fallback_tap_steps: Option<&'static str>,
    pub required_for_capture: bool,
    pub auto_navigate_to: Option<ActionContext>,
    pub prerequisites: &'static [&'static str],
    /// Context the UI is in after tapping the point; `None` means unknown.
    pub lands_in: Option<ActionContext>,
    /// Typed into the app's focused search field before capture, for targets
    /// that only exist while a query is showing.
    pub seed_query: Option<&'static str>,
}

impl ActionCalibrationDefinition {
    pub fn action_name(&self) -> &'static str {
        self.id.split_once(':').map(|(_, a)| a).unwrap_or(self.id)
    }

    pub fn target_context(&self) -> ActionContext {
        self.auto_navigate_to.unwrap_or(if self.for_app == SYSTEM_APP {
            ActionContext::Home
        } else {
            ActionContext::AppActive
        })
    }

    pub fn base_point(&self) -> Option<BasePoint> {
        match self.id {
            HOME_SEARCH_BUTTON => Some(BasePoint::HomeSearchButton),
            LAUNCH_RESULT_TAP => Some(BasePoint::LaunchResultTap),
            _ => None,
        }
    }
}

pub static ACTION_CATALOG: &[ActionCalibrationDefinition] = &[
    ActionCalibrationDefinition {
        id: HOME_SEARCH_BUTTON,
        label: "Search pill on the home screen",
        for_app: SYSTEM_APP,
        fallback_tap_steps: Some("0.5,0.8"),
        required_for_capture: true,
        auto_navigate_to: Some(ActionContext::Home),
        prerequisites: &[],
        // search opens empty; search-entry implies a typed query
        lands_in: None,
        seed_query: None,
    },
    ActionCalibrationDefinition {
        id: LAUNCH_RESULT_TAP,
        label: "Top hit in home search results",
        for_app: SYSTEM_APP,
        fallback_tap_steps: Some("0.5,0.22"),
        required_for_capture: true,
        auto_navigate_to: Some(ActionContext::SearchEntry),
        prerequisites: &[HOME_SEARCH_BUTTON],
        lands_in: Some(ActionContext::AppActive),
        seed_query: None,
    },
    ActionCalibrationDefinition {
        id: "chrome:searchBar",
        label: "Chrome address/search bar",
        for_app: "chrome",
        fallback_tap_steps: Some("0.5,0.075"),
        required_for_capture: true,
        auto_navigate_to: Some(ActionContext::AppActive),
        prerequisites: &[HOME_SEARCH_BUTTON, LAUNCH_RESULT_TAP],
        lands_in: Some(ActionContext::SearchFocused),
        seed_query: None,
    },
    ActionCalibrationDefinition {
        id: "chrome:firstSuggestion",
        label: "First Chrome autocomplete suggestion",
        for_app: "chrome",
        fallback_tap_steps: None,
        required_for_capture: false,
        auto_navigate_to: Some(ActionContext::SearchFocused),
        prerequisites: &["chrome:searchBar"],
        lands_in: None,
        seed_query: Some(SEED_QUERY),
    },
    ActionCalibrationDefinition {
        id: "chrome:clearQueryButton",
        label: "Clear (x) button inside a filled Chrome search field",
        for_app: "chrome",
        fallback_tap_steps: None,
        required_for_capture: false,
        auto_navigate_to: Some(ActionContext::Custom),
        prerequisites: &["chrome:searchBar"],
        lands_in: Some(ActionContext::SearchFocused),
        seed_query: Some(SEED_QUERY),
    },
    ActionCalibrationDefinition {
        id: "safari:searchBar",
        label: "Safari bottom address bar",
        for_app: "safari",
        fallback_tap_steps: Some("0.5,0.93"),
        required_for_capture: true,
        auto_navigate_to: Some(ActionContext::AppActive),
        prerequisites: &[HOME_SEARCH_BUTTON, LAUNCH_RESULT_TAP],
        lands_in: Some(ActionContext::SearchFocused),
        seed_query: None,
    },
    ActionCalibrationDefinition {
        id: "youtube:dismissMenu",
        label: "Close button of the YouTube startup menu",
        for_app: "youtube",
        fallback_tap_steps: None,
        required_for_capture: true,
        auto_navigate_to: Some(ActionContext::AppActive),
        prerequisites: &[HOME_SEARCH_BUTTON, LAUNCH_RESULT_TAP],
        lands_in: Some(ActionContext::AppActive),
        seed_query: None,
    },
    ActionCalibrationDefinition {
        id: "youtube:searchBar",
        label: "YouTube magnifier icon",
        for_app: "youtube",
        fallback_tap_steps: Some("0.82,0.07"),
        required_for_capture: true,
        auto_navigate_to: Some(ActionContext::AppActive),
        prerequisites: &["youtube:dismissMenu"],
        lands_in: Some(ActionContext::SearchFocused),
        seed_query: None,
    },
    ActionCalibrationDefinition {
        id: "amazon:homeIcon",
        label: "Amazon icon on the home screen",
        for_app: "amazon",
        fallback_tap_steps: None,
        required_for_capture: true,
        auto_navigate_to: Some(ActionContext::Home),
        prerequisites: &[],
        lands_in: Some(ActionContext::AppActive),
        seed_query: None,
    },
    ActionCalibrationDefinition {
        id: "amazon:searchBar",
        label: "Amazon search field",
        for_app: "amazon",
        fallback_tap_steps: Some("0.5,0.11"),
        required_for_capture: true,
        auto_navigate_to: Some(ActionContext::AppActive),
        prerequisites: &["amazon:homeIcon"],
        lands_in: Some(ActionContext::SearchFocused),
        seed_query: None,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchStyle {
    /// Home/search via host shortcuts, tap fallback, icon as last resort.
    Shortcut,
    /// Search flow driven by taps only.
    SearchIconOnly,
    /// Skip search entirely and tap the home-screen icon.
    LegacyIconOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchSubmitMode {
    Enter,
    TapResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostLaunchAction {
    TapCalibrated { action: &'static str },
    Wait { ms: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct AppFlowDefinition {
    pub app: &'static str,
    /// Text typed into home search to find the app.
    pub search_query: &'static str,
    pub launch_style: LaunchStyle,
    pub submit_mode: SearchSubmitMode,
    pub post_launch: &'static [PostLaunchAction],
    /// Calibrated home-screen icon, if the catalog defines one.
    pub icon_action: Option<&'static str>,
    pub legacy_icon: RelPoint,
    pub search_action: &'static str,
}

impl AppFlowDefinition {
    /// Catalog entries that must be calibrated before a capture run.
    pub fn required_actions(&self) -> impl Iterator<Item = &'static ActionCalibrationDefinition> + '_ {
        ACTION_CATALOG
            .iter()
            .filter(move |def| def.for_app == self.app && def.required_for_capture)
    }
}

pub static APP_FLOWS: &[AppFlowDefinition] = &[
    AppFlowDefinition {
        app: "chrome",
        search_query: "Chrome",
        launch_style: LaunchStyle::Shortcut,
        submit_mode: SearchSubmitMode::Enter,
        post_launch: &[],
        icon_action: None,
        legacy_icon: RelPoint { x: 0.375, y: 0.86 },
        search_action: "chrome:searchBar",
    },
    AppFlowDefinition {
        app: "safari",
        search_query: "Safari",
        launch_style: LaunchStyle::Shortcut,
        submit_mode: SearchSubmitMode::TapResult,
        post_launch: &[],
        icon_action: None,
        legacy_icon: RelPoint { x: 0.625, y: 0.86 },
        search_action: "safari:searchBar",
    },
    AppFlowDefinition {
        app: "youtube",
        search_query: "YouTube",
        launch_style: LaunchStyle::SearchIconOnly,
        submit_mode: SearchSubmitMode::TapResult,
        post_launch: &[
            PostLaunchAction::Wait { ms: 600 },
            PostLaunchAction::TapCalibrated {
                action: "youtube:dismissMenu",
            },
        ],
        icon_action: None,
        legacy_icon: RelPoint { x: 0.125, y: 0.36 },
        search_action: "youtube:searchBar",
    },
    AppFlowDefinition {
        app: "amazon",
        search_query: "Amazon",
        launch_style: LaunchStyle::LegacyIconOnly,
        submit_mode: SearchSubmitMode::TapResult,
        post_launch: &[],
        icon_action: Some("amazon:homeIcon"),
        legacy_icon: RelPoint { x: 0.375, y: 0.36 },
        search_action: "amazon:searchBar",
    },
];

pub fn find_action(id: &str) -> MirrorResult<&'static ActionCalibrationDefinition> {
    ACTION_CATALOG
        .iter()
        .find(|def| def.id == id)
        .ok_or_else(|| MirrorError::UnknownAction(id.to_string()))
}

pub fn flow_for(app: &str) -> MirrorResult<&'static AppFlowDefinition> {
    APP_FLOWS
        .iter()
        .find(|flow| flow.app.eq_ignore_ascii_case(app))
        .ok_or_else(|| MirrorError::UnknownApp(app.to_string()))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Orders the catalog so every action follows all of its prerequisites.
/// Ties keep catalog order.
pub fn calibration_order(
    catalog: &[ActionCalibrationDefinition],
) -> MirrorResult<Vec<&ActionCalibrationDefinition>> {
    let by_id: HashMap<&str, &ActionCalibrationDefinition> =
        catalog.iter().map(|def| (def.id, def)).collect();
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(catalog.len());

    fn visit<'a>(
        def: &'a ActionCalibrationDefinition,
        by_id: &HashMap<&str, &'a ActionCalibrationDefinition>,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<&'a ActionCalibrationDefinition>,
    ) -> MirrorResult<()> {
        match marks.get(def.id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(MirrorError::CircularPrerequisite {
                    member: def.id.to_string(),
                })
            }
            None => {}
        }
        marks.insert(def.id, Mark::Visiting);
        for prereq in def.prerequisites {
            let next = by_id
                .get(prereq)
                .ok_or_else(|| MirrorError::UnknownAction(prereq.to_string()))?;
            visit(next, by_id, marks, order)?;
        }
        marks.insert(def.id, Mark::Done);
        order.push(def);
        Ok(())
    }

    for def in catalog {
        visit(def, &by_id, &mut marks, &mut order)?;
    }
    Ok(order)
}
