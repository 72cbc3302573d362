//! Scripted host bridge for unit tests. Records every call and fails on demand.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use crate::bridge::{HostBridge, Modifier};
use crate::config::Settings;
use crate::error::{MirrorError, MirrorResult};
use crate::geometry::{AbsPoint, Region, WindowBounds};
use crate::prompt::{Confirmation, OperatorConsole, SampleRequest};

const MIRROR_PROCESS: &str = "iPhone Mirroring";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Bounds,
    Keystroke { key: String, modifiers: Vec<Modifier>, ok: bool },
    Click(AbsPoint),
    Drag(AbsPoint, AbsPoint),
    Type(char),
    Capture(Region, PathBuf),
    Activate(String),
    Mouse,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    fail_keys: HashSet<String>,
    flaky_keys: HashMap<String, u32>,
    fail_clicks: bool,
    fail_typing: bool,
    focus_stolen_for: u32,
    focus_lost: bool,
    mouse: VecDeque<AbsPoint>,
}

#[derive(Debug)]
pub struct ScriptedBridge {
    pub bounds: WindowBounds,
    state: Mutex<State>,
}

impl ScriptedBridge {
    /// Window 100,100 → 500,700; with default insets the content region is
    /// 110,148 380x542.
    pub fn new() -> Self {
        Self {
            bounds: WindowBounds { x1: 100, y1: 100, x2: 500, y2: 700 },
            state: Mutex::new(State::default()),
        }
    }

    fn with(self, f: impl FnOnce(&mut State)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn failing_keys(self, keys: &[&str]) -> Self {
        self.with(|s| s.fail_keys.extend(keys.iter().map(|k| k.to_string())))
    }

    /// `key` fails for its next `n` presses, then goes through.
    pub fn flaky_key(self, key: &str, n: u32) -> Self {
        self.with(|s| {
            s.flaky_keys.insert(key.to_string(), n);
        })
    }

    pub fn failing_clicks(self) -> Self {
        self.with(|s| s.fail_clicks = true)
    }

    pub fn failing_typing(self) -> Self {
        self.with(|s| s.fail_typing = true)
    }

    /// Another app is frontmost for the next `n` focus queries.
    pub fn focus_stolen(self, n: u32) -> Self {
        self.with(|s| s.focus_stolen_for = n)
    }

    pub fn focus_lost(self) -> Self {
        self.with(|s| s.focus_lost = true)
    }

    pub fn mouse_positions(self, points: &[AbsPoint]) -> Self {
        self.with(|s| s.mouse.extend(points.iter().copied()))
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn clicks(&self) -> Vec<AbsPoint> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Click(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn clicks_at(&self, point: AbsPoint) -> usize {
        self.clicks().into_iter().filter(|p| *p == point).count()
    }

    pub fn typed(&self) -> String {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Type(ch) => Some(ch),
                _ => None,
            })
            .collect()
    }

    pub fn activations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Activate(_)))
            .count()
    }

    pub fn captures(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Capture(_, path) => Some(path),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl HostBridge for ScriptedBridge {
    async fn query_window_bounds(&self, _candidates: &[String]) -> MirrorResult<WindowBounds> {
        self.record(Call::Bounds);
        Ok(self.bounds)
    }

    async fn send_keystroke(&self, key: &str, modifiers: &[Modifier]) -> bool {
        let ok = {
            let mut state = self.state.lock().unwrap();
            let flaky = match state.flaky_keys.get_mut(key) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            };
            !flaky && !state.fail_keys.contains(key)
        };
        self.record(Call::Keystroke {
            key: key.to_string(),
            modifiers: modifiers.to_vec(),
            ok,
        });
        ok
    }

    async fn click_at(&self, point: AbsPoint) -> MirrorResult<()> {
        self.record(Call::Click(point));
        if self.state.lock().unwrap().fail_clicks {
            return Err(MirrorError::Host {
                command: "click".to_string(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn drag_from(&self, from: AbsPoint, to: AbsPoint) -> MirrorResult<()> {
        self.record(Call::Drag(from, to));
        Ok(())
    }

    async fn type_character(&self, ch: char) -> MirrorResult<()> {
        self.record(Call::Type(ch));
        if self.state.lock().unwrap().fail_typing {
            return Err(MirrorError::TransientUi {
                step: "type".to_string(),
                message: "scripted failure".to_string(),
                frontmost: None,
            });
        }
        Ok(())
    }

    async fn capture_region(&self, region: &Region, out: &Path) -> MirrorResult<()> {
        self.record(Call::Capture(*region, out.to_path_buf()));
        crate::util::ensure_parent_dir(out)?;
        let img = RgbaImage::from_pixel(
            region.width.max(1) as u32,
            region.height.max(1) as u32,
            Rgba([236, 236, 236, 255]),
        );
        img.save(out)?;
        Ok(())
    }

    async fn frontmost_process_name(&self) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        if state.focus_lost {
            return Some("Finder".to_string());
        }
        if state.focus_stolen_for > 0 {
            state.focus_stolen_for -= 1;
            return Some("Finder".to_string());
        }
        Some(MIRROR_PROCESS.to_string())
    }

    async fn activate_process(&self, name: &str) -> bool {
        self.record(Call::Activate(name.to_string()));
        !self.state.lock().unwrap().focus_lost
    }

    async fn mouse_position(&self) -> MirrorResult<AbsPoint> {
        self.record(Call::Mouse);
        let mut state = self.state.lock().unwrap();
        let point = if state.mouse.len() > 1 {
            state.mouse.pop_front()
        } else {
            state.mouse.front().copied()
        };
        point.ok_or_else(|| MirrorError::Host {
            command: "mouse".to_string(),
            message: "no scripted pointer position".to_string(),
        })
    }
}

/// Operator stand-in: samples take the bridge's scripted pointer, confirmations
/// come from a queue (default proceed).
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    confirmations: VecDeque<Confirmation>,
    cancel_on_sample: Option<usize>,
    samples: usize,
    pub prompts: Vec<String>,
}

impl ScriptedConsole {
    /// The `n`th sample (1-based) is canceled as if Ctrl-C was pressed.
    pub fn cancel_on_sample(n: usize) -> Self {
        Self {
            cancel_on_sample: Some(n),
            ..Self::default()
        }
    }

    pub fn with_confirmations(confirmations: &[Confirmation]) -> Self {
        Self {
            confirmations: confirmations.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }
}

#[async_trait]
impl OperatorConsole for ScriptedConsole {
    async fn sample_point(
        &mut self,
        bridge: &dyn HostBridge,
        request: &SampleRequest<'_>,
    ) -> MirrorResult<AbsPoint> {
        self.samples += 1;
        self.prompts.push(format!("sample:{}", request.action));
        if self.cancel_on_sample == Some(self.samples) {
            return Err(MirrorError::OperatorCanceled);
        }
        bridge.mouse_position().await
    }

    async fn confirm(&mut self, message: &str) -> MirrorResult<Confirmation> {
        self.prompts.push(message.to_string());
        Ok(self.confirmations.pop_front().unwrap_or(Confirmation::Proceed))
    }
}

/// Defaults with every delay disabled.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.timing.settle_ms = 0;
    settings.timing.focus_backoff_ms = 0;
    settings.timing.telemetry_tick_ms = 5;
    settings
}
