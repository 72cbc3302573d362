//! Host automation bridge: the only place that talks to the window manager,
//! keyboard, pointer and screenshot tools.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use wait_timeout::ChildExt;

use crate::error::{MirrorError, MirrorResult};
use crate::geometry::{AbsPoint, Region, WindowBounds};
use crate::util::command_exists;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Command,
    Shift,
    Option,
    Control,
}

impl Modifier {
    fn applescript(&self) -> &'static str {
        match self {
            Self::Command => "command down",
            Self::Shift => "shift down",
            Self::Option => "option down",
            Self::Control => "control down",
        }
    }
}

/// Capabilities the core needs from the host. Keystrokes report `false`
/// when delivery could not be confirmed; everything else fails loudly.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Tries each candidate process in order, then the frontmost window.
    async fn query_window_bounds(&self, candidates: &[String]) -> MirrorResult<WindowBounds>;
    async fn send_keystroke(&self, key: &str, modifiers: &[Modifier]) -> bool;
    async fn click_at(&self, point: AbsPoint) -> MirrorResult<()>;
    async fn drag_from(&self, from: AbsPoint, to: AbsPoint) -> MirrorResult<()>;
    async fn type_character(&self, ch: char) -> MirrorResult<()>;
    async fn capture_region(&self, region: &Region, out: &Path) -> MirrorResult<()>;
    async fn frontmost_process_name(&self) -> Option<String>;
    async fn activate_process(&self, name: &str) -> bool;
    async fn mouse_position(&self) -> MirrorResult<AbsPoint>;
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryDiagnostic {
    pub ok: bool,
    pub attempts: u32,
    pub error_code: Option<String>,
    pub message: Option<String>,
}

impl QueryDiagnostic {
    fn success(attempts: u32) -> Self {
        Self {
            ok: true,
            attempts,
            error_code: None,
            message: None,
        }
    }

    fn failure(attempts: u32, failure: &ToolFailure) -> Self {
        Self {
            ok: false,
            attempts,
            error_code: Some(failure.code().to_string()),
            message: Some(failure.message("osascript")),
        }
    }

    fn unsupported(what: &str) -> Self {
        Self {
            ok: false,
            attempts: 0,
            error_code: Some("unsupported_platform".to_string()),
            message: Some(format!("{what} requires macOS")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowProbe {
    pub bounds: Option<WindowBounds>,
    pub title: Option<String>,
    pub selected_index: Option<usize>,
    pub candidate_count: usize,
    pub usable_count: usize,
    pub selection_mode: String,
    pub diagnostics: QueryDiagnostic,
}

#[derive(Debug, Clone)]
pub struct WindowCandidate {
    pub index: usize,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub title: Option<String>,
}

const MIN_USABLE_WINDOW_WIDTH: i64 = 160;
const MIN_USABLE_WINDOW_HEIGHT: i64 = 280;
const MIN_USABLE_WINDOW_AREA: i64 = 60_000;

/// macOS bridge over `osascript` (System Events), `cliclick` and
/// `screencapture`. Core coordinates are device pixels; this converts them to
/// screen points using `display_scale`.
#[derive(Debug, Clone)]
pub struct MacHostBridge {
    display_scale: i64,
    timeout_ms: u64,
}

impl MacHostBridge {
    pub fn new(display_scale: u32) -> Self {
        Self {
            display_scale: i64::from(display_scale.max(1)),
            timeout_ms: 450,
        }
    }

    fn to_points(&self, point: AbsPoint) -> (i64, i64) {
        (point.x / self.display_scale, point.y / self.display_scale)
    }

    async fn osascript(&self, script: String, args: Vec<String>, attempts: u32) -> (Option<String>, QueryDiagnostic) {
        let timeout_ms = self.timeout_ms;
        blocking(move || run_osascript_with_retry(&script, &args, attempts, 120, timeout_ms))
            .await
            .unwrap_or_else(|err| {
                (
                    None,
                    QueryDiagnostic {
                        ok: false,
                        attempts: 0,
                        error_code: Some("join_failed".to_string()),
                        message: Some(err.to_string()),
                    },
                )
            })
    }

    async fn cliclick(&self, args: Vec<String>) -> MirrorResult<String> {
        if !cfg!(target_os = "macos") {
            return Err(unsupported("cliclick"));
        }
        let timeout_ms = self.timeout_ms.max(1_000);
        blocking(move || run_tool("cliclick", &args, timeout_ms)).await?
    }

    async fn probe(&self, process: &str) -> WindowProbe {
        let (raw, diag) = self
            .osascript(WINDOW_LIST_SCRIPT.to_string(), vec![process.to_string()], 3)
            .await;
        window_probe_from(raw.as_deref(), diag)
    }
}

#[async_trait]
impl HostBridge for MacHostBridge {
    async fn query_window_bounds(&self, candidates: &[String]) -> MirrorResult<WindowBounds> {
        if !cfg!(target_os = "macos") {
            return Err(unsupported("window queries"));
        }
        for candidate in candidates {
            let probe = self.probe(candidate).await;
            if let Some(bounds) = probe.bounds {
                tracing::trace!(
                    process = %candidate,
                    mode = %probe.selection_mode,
                    candidates = probe.candidate_count,
                    usable = probe.usable_count,
                    ?bounds,
                    "mirror window probed"
                );
                return Ok(bounds);
            }
            tracing::debug!(
                process = %candidate,
                code = ?probe.diagnostics.error_code,
                message = ?probe.diagnostics.message,
                "window candidate unavailable"
            );
        }
        if let Some(front) = self.frontmost_process_name().await {
            let probe = self.probe(&front).await;
            if let Some(bounds) = probe.bounds {
                tracing::warn!(process = %front, "using frontmost window as mirror host");
                return Ok(bounds);
            }
        }
        Err(MirrorError::WindowNotFound {
            candidates: candidates.to_vec(),
        })
    }

    async fn send_keystroke(&self, key: &str, modifiers: &[Modifier]) -> bool {
        let script = keystroke_script(key, modifiers);
        let (stdout, diag) = self.osascript(script, Vec::new(), 1).await;
        let ok = matches!(stdout.as_deref(), Some("ok"));
        if !ok {
            tracing::debug!(key, ?modifiers, stdout = ?stdout, code = ?diag.error_code, "keystroke not confirmed");
        }
        ok
    }

    async fn click_at(&self, point: AbsPoint) -> MirrorResult<()> {
        let (x, y) = self.to_points(point);
        self.cliclick(vec![format!("c:{x},{y}")]).await.map(|_| ())
    }

    async fn drag_from(&self, from: AbsPoint, to: AbsPoint) -> MirrorResult<()> {
        let (fx, fy) = self.to_points(from);
        let (tx, ty) = self.to_points(to);
        self.cliclick(vec![
            format!("dd:{fx},{fy}"),
            format!("m:{tx},{ty}"),
            format!("du:{tx},{ty}"),
        ])
        .await
        .map(|_| ())
    }

    async fn type_character(&self, ch: char) -> MirrorResult<()> {
        let script = keystroke_script(&ch.to_string(), &[]);
        let (stdout, diag) = self.osascript(script, Vec::new(), 1).await;
        match stdout.as_deref() {
            Some("ok") => Ok(()),
            other => Err(MirrorError::Host {
                command: format!("osascript keystroke {ch:?}"),
                message: other
                    .map(ToString::to_string)
                    .or(diag.message)
                    .unwrap_or_else(|| "no output".to_string()),
            }),
        }
    }

    async fn capture_region(&self, region: &Region, out: &Path) -> MirrorResult<()> {
        if !cfg!(target_os = "macos") {
            return Err(unsupported("screencapture"));
        }
        crate::util::ensure_parent_dir(out)?;
        let scale = self.display_scale;
        let rect = format!(
            "{},{},{},{}",
            region.x / scale,
            region.y / scale,
            region.width / scale,
            region.height / scale
        );
        let args = vec![
            "-x".to_string(),
            "-R".to_string(),
            rect,
            out.display().to_string(),
        ];
        let out: PathBuf = out.to_path_buf();
        blocking(move || run_tool("screencapture", &args, 10_000)).await??;
        if !out.exists() {
            return Err(MirrorError::Host {
                command: "screencapture".to_string(),
                message: format!("no file written at {}", out.display()),
            });
        }
        Ok(())
    }

    async fn frontmost_process_name(&self) -> Option<String> {
        if !cfg!(target_os = "macos") {
            return None;
        }
        self.osascript(
            "tell application \"System Events\" to get name of first process whose frontmost is true"
                .to_string(),
            Vec::new(),
            1,
        )
        .await
        .0
    }

    async fn activate_process(&self, name: &str) -> bool {
        if !cfg!(target_os = "macos") {
            return false;
        }
        let escaped = name.replace('"', "\\\"");
        let script = format!("try\ntell application \"{escaped}\" to activate\nreturn \"ok\"\non error errMsg number errNum\nreturn \"err:\" & errNum & \":\" & errMsg\nend try");
        let (stdout, _) = self.osascript(script, Vec::new(), 1).await;
        matches!(stdout.as_deref(), Some("ok"))
    }

    async fn mouse_position(&self) -> MirrorResult<AbsPoint> {
        let raw = self.cliclick(vec!["p".to_string()]).await?;
        let (x, y) = parse_pointer(&raw).ok_or_else(|| MirrorError::Host {
            command: "cliclick p".to_string(),
            message: format!("unexpected pointer output: {raw:?}"),
        })?;
        Ok(AbsPoint::new(x * self.display_scale, y * self.display_scale))
    }
}

async fn blocking<T, F>(f: F) -> MirrorResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| MirrorError::Host {
            command: "spawn_blocking".to_string(),
            message: err.to_string(),
        })
}

fn unsupported(what: &str) -> MirrorError {
    let diag = QueryDiagnostic::unsupported(what);
    MirrorError::Host {
        command: what.to_string(),
        message: diag.message.unwrap_or_default(),
    }
}

fn keystroke_script(key: &str, modifiers: &[Modifier]) -> String {
    let using = if modifiers.is_empty() {
        String::new()
    } else {
        let names: Vec<&str> = modifiers.iter().map(Modifier::applescript).collect();
        format!(" using {{{}}}", names.join(", "))
    };
    let action = match key {
        "return" | "enter" => format!("key code 36{using}"),
        "delete" | "backspace" => format!("key code 51{using}"),
        "escape" => format!("key code 53{using}"),
        other => {
            let escaped = other.replace('\\', "\\\\").replace('"', "\\\"");
            format!("keystroke \"{escaped}\"{using}")
        }
    };
    format!("try\ntell application \"System Events\" to {action}\nreturn \"ok\"\non error errMsg number errNum\nreturn \"err:\" & errNum & \":\" & errMsg\nend try")
}

/// `cliclick p` prints `x,y`, sometimes with fractional parts.
pub fn parse_pointer(raw: &str) -> Option<(i64, i64)> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (x, y) = line.split_once(',')?;
    let x = x.trim().parse::<f64>().ok()?.round() as i64;
    let y = y.trim().parse::<f64>().ok()?.round() as i64;
    Some((x, y))
}

/// Why one external command produced no usable output.
#[derive(Debug)]
enum ToolFailure {
    Missing,
    Spawn(std::io::Error),
    Timeout(u64),
    Exit { code: i32, stderr: String },
    EmptyOutput,
}

impl ToolFailure {
    fn code(&self) -> &'static str {
        match self {
            Self::Missing => "tool_missing",
            Self::Spawn(_) => "spawn_failed",
            Self::Timeout(_) => "timeout",
            Self::Exit { .. } => "nonzero_exit",
            Self::EmptyOutput => "empty_output",
        }
    }

    fn message(&self, program: &str) -> String {
        match self {
            Self::Missing => format!("`{program}` not found on PATH"),
            Self::Spawn(err) => err.to_string(),
            Self::Timeout(ms) => format!("timed out after {ms}ms"),
            Self::Exit { code, stderr } if stderr.is_empty() => format!("exited with status {code}"),
            Self::Exit { stderr, .. } => stderr.clone(),
            Self::EmptyOutput => "succeeded without output".to_string(),
        }
    }

    fn into_host_error(self, program: &str, args: &[String]) -> MirrorError {
        MirrorError::Host {
            command: format!("{program} {}", args.join(" ")).trim_end().to_string(),
            message: self.message(program),
        }
    }
}

fn reap(mut child: std::process::Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Runs `program` once under a timeout and returns its trimmed stdout.
fn exec(program: &str, args: &[String], timeout_ms: u64) -> Result<String, ToolFailure> {
    if !command_exists(program) {
        return Err(ToolFailure::Missing);
    }
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(ToolFailure::Spawn)?;
    match child.wait_timeout(Duration::from_millis(timeout_ms)) {
        Ok(Some(_)) => {}
        Ok(None) => {
            reap(child);
            return Err(ToolFailure::Timeout(timeout_ms));
        }
        Err(err) => {
            reap(child);
            return Err(ToolFailure::Spawn(err));
        }
    }
    let output = child.wait_with_output().map_err(ToolFailure::Spawn)?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() {
        return Err(ToolFailure::Exit {
            code: output.status.code().unwrap_or(1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(stdout)
}

fn run_tool(program: &str, args: &[String], timeout_ms: u64) -> MirrorResult<String> {
    exec(program, args, timeout_ms).map_err(|failure| failure.into_host_error(program, args))
}

/// Retries an AppleScript with linear backoff. Empty output counts as a
/// failure: every script here returns a value.
fn run_osascript_with_retry(
    script: &str,
    args: &[String],
    attempts: u32,
    delay_ms: u64,
    timeout_ms: u64,
) -> (Option<String>, QueryDiagnostic) {
    if !cfg!(target_os = "macos") {
        return (None, QueryDiagnostic::unsupported("osascript"));
    }
    let mut argv = vec!["-e".to_string(), script.to_string()];
    if !args.is_empty() {
        argv.push("--".to_string());
        argv.extend(args.iter().cloned());
    }

    let max_attempts = attempts.max(1);
    let mut last = ToolFailure::EmptyOutput;
    for attempt in 1..=max_attempts {
        let outcome = exec("osascript", &argv, timeout_ms).and_then(|out| {
            if out.is_empty() {
                Err(ToolFailure::EmptyOutput)
            } else {
                Ok(out)
            }
        });
        match outcome {
            Ok(out) => return (Some(out), QueryDiagnostic::success(attempt)),
            Err(failure) => {
                tracing::trace!(attempt, max_attempts, code = failure.code(), "osascript attempt failed");
                last = failure;
            }
        }
        if attempt < max_attempts {
            let backoff = delay_ms.saturating_mul(u64::from(attempt)).max(10);
            thread::sleep(Duration::from_millis(backoff));
        }
    }
    (None, QueryDiagnostic::failure(max_attempts, &last))
}

const WINDOW_LIST_SCRIPT: &str = r#"
on cleanText(v)
  try
    set t to v as text
  on error
    set t to ""
  end try
  set AppleScript's text item delimiters to {return, linefeed, tab}
  set parts to text items of t
  set AppleScript's text item delimiters to " "
  set clean to parts as text
  set AppleScript's text item delimiters to ""
  return clean
end cleanText

on run argv
  set procName to item 1 of argv
  tell application "System Events"
    if not (exists process procName) then
      error "process_not_found"
    end if
    tell process procName
      set linesOut to {}
      set idx to 0
      repeat with winRef in windows
        set idx to idx + 1
        try
          set p to position of winRef
          set s to size of winRef
          set wt to ""
          try
            set wt to name of winRef
          end try
          set end of linesOut to (idx as text) & tab & (item 1 of p as text) & tab & (item 2 of p as text) & tab & (item 1 of s as text) & tab & (item 2 of s as text) & tab & my cleanText(wt)
        end try
      end repeat
      if (count of linesOut) is 0 then
        error "no_window_bounds"
      end if
      set AppleScript's text item delimiters to linefeed
      set outText to linesOut as text
      set AppleScript's text item delimiters to ""
      return outText
    end tell
  end tell
end run
"#;

fn window_probe_from(raw: Option<&str>, diag: QueryDiagnostic) -> WindowProbe {
    let mut probe = WindowProbe {
        bounds: None,
        title: None,
        selected_index: None,
        candidate_count: 0,
        usable_count: 0,
        selection_mode: "none".to_string(),
        diagnostics: diag.clone(),
    };
    let Some(lines) = raw else {
        return probe;
    };

    let candidates = parse_window_candidates(lines);
    if candidates.is_empty() {
        probe.diagnostics = QueryDiagnostic {
            ok: false,
            attempts: diag.attempts,
            error_code: Some("window_bounds_parse_failed".to_string()),
            message: Some("window bounds output was present but parse failed".to_string()),
        };
        return probe;
    }

    probe.candidate_count = candidates.len();
    let (selected, mode, usable_count) = select_window_candidate(&candidates);
    probe.bounds = Some(WindowBounds::from_origin_size(
        selected.x, selected.y, selected.w, selected.h,
    ));
    probe.title = selected.title.clone();
    probe.selected_index = Some(selected.index);
    probe.selection_mode = mode.to_string();
    probe.usable_count = usable_count;
    probe
}

pub fn parse_window_candidates(raw: &str) -> Vec<WindowCandidate> {
    let mut items = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parts: Vec<&str> = trimmed.split('\t').collect();
        if parts.len() < 5 {
            continue;
        }
        let index = match parts[0].trim().parse::<usize>() {
            Ok(v) if v > 0 => v,
            _ => continue,
        };
        let mut nums = [0i64; 4];
        let mut parsed = true;
        for (slot, part) in nums.iter_mut().zip(&parts[1..5]) {
            match part.trim().parse::<f64>() {
                Ok(v) => *slot = v.round() as i64,
                Err(_) => {
                    parsed = false;
                    break;
                }
            }
        }
        let [x, y, w, h] = nums;
        if !parsed || w <= 0 || h <= 0 {
            continue;
        }
        let title = parts
            .get(5)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(ToString::to_string);
        items.push(WindowCandidate {
            index,
            x,
            y,
            w,
            h,
            title,
        });
    }
    items
}

/// Largest usable window wins; a phone mirror is tall and narrow, so the
/// thresholds favour portrait windows over toolbars and popovers.
pub fn select_window_candidate(
    candidates: &[WindowCandidate],
) -> (&WindowCandidate, &'static str, usize) {
    fn area(candidate: &WindowCandidate) -> i64 {
        candidate.w.saturating_mul(candidate.h)
    }

    fn cmp_window(a: &WindowCandidate, b: &WindowCandidate) -> std::cmp::Ordering {
        area(b)
            .cmp(&area(a))
            .then_with(|| b.h.cmp(&a.h))
            .then_with(|| a.index.cmp(&b.index))
    }

    let is_usable = |candidate: &WindowCandidate| {
        candidate.w >= MIN_USABLE_WINDOW_WIDTH
            && candidate.h >= MIN_USABLE_WINDOW_HEIGHT
            && area(candidate) >= MIN_USABLE_WINDOW_AREA
    };

    let mut usable: Vec<&WindowCandidate> = candidates.iter().filter(|c| is_usable(c)).collect();
    usable.sort_by(|a, b| cmp_window(a, b));
    let usable_count = usable.len();
    if let Some(candidate) = usable.first().copied() {
        return (candidate, "largest_usable", usable_count);
    }

    let mut all: Vec<&WindowCandidate> = candidates.iter().collect();
    all.sort_by(|a, b| cmp_window(a, b));
    match all.first().copied() {
        Some(candidate) => (candidate, "largest_any", usable_count),
        None => (&candidates[0], "window_1", usable_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_window_candidates_reads_tsv_rows() {
        let raw = "1\t0\t38\t330\t720.4\tiPhone Mirroring\n2\t8\t8\t30\t23\tTiny\nbad\trow";
        let parsed = parse_window_candidates(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].index, 1);
        assert_eq!(parsed[0].h, 720);
        assert_eq!(parsed[0].title.as_deref(), Some("iPhone Mirroring"));
        assert_eq!(parsed[1].w, 30);
    }

    fn candidate(index: usize, w: i64, h: i64) -> WindowCandidate {
        WindowCandidate {
            index,
            x: 10,
            y: 10,
            w,
            h,
            title: None,
        }
    }

    #[test]
    fn selects_largest_usable_window() {
        let windows = vec![candidate(1, 30, 23), candidate(2, 330, 720), candidate(3, 400, 800)];
        let (selected, mode, usable) = select_window_candidate(&windows);
        assert_eq!(selected.index, 3);
        assert_eq!(mode, "largest_usable");
        assert_eq!(usable, 2);
    }

    #[test]
    fn falls_back_to_largest_any_window() {
        let windows = vec![candidate(1, 30, 23), candidate(2, 120, 90)];
        let (selected, mode, usable) = select_window_candidate(&windows);
        assert_eq!(selected.index, 2);
        assert_eq!(mode, "largest_any");
        assert_eq!(usable, 0);
    }

    #[test]
    fn window_listing_selects_largest_usable_window() {
        let raw = "1\t100\t100\t400\t600\tMirror\n2\t0\t0\t120\t40\tToolbar";
        let probe = window_probe_from(Some(raw), QueryDiagnostic::success(1));
        assert_eq!(
            probe.bounds,
            Some(WindowBounds { x1: 100, y1: 100, x2: 500, y2: 700 })
        );
        assert_eq!(probe.selection_mode, "largest_usable");
        assert_eq!(probe.usable_count, 1);
        assert_eq!(probe.title.as_deref(), Some("Mirror"));

        let small = window_probe_from(Some("1\t5\t5\t150\t200\tPopover"), QueryDiagnostic::success(1));
        assert_eq!(small.selection_mode, "largest_any");
        assert_eq!(small.usable_count, 0);
    }

    #[test]
    fn keystroke_script_maps_named_keys_and_modifiers() {
        let script = keystroke_script("3", &[Modifier::Command]);
        assert!(script.contains("keystroke \"3\" using {command down}"));
        assert!(keystroke_script("return", &[]).contains("key code 36"));
        assert!(keystroke_script("\"", &[]).contains("keystroke \"\\\"\""));
    }

    #[test]
    fn tool_failures_become_host_errors() {
        let err = ToolFailure::Timeout(450).into_host_error("cliclick", &["p".to_string()]);
        match err {
            MirrorError::Host { command, message } => {
                assert_eq!(command, "cliclick p");
                assert_eq!(message, "timed out after 450ms");
            }
            other => panic!("unexpected error: {other}"),
        }
        let exit = ToolFailure::Exit { code: 2, stderr: String::new() };
        assert_eq!(exit.code(), "nonzero_exit");
        assert_eq!(exit.message("screencapture"), "exited with status 2");
        let diag = QueryDiagnostic::failure(3, &ToolFailure::EmptyOutput);
        assert_eq!(diag.attempts, 3);
        assert_eq!(diag.error_code.as_deref(), Some("empty_output"));
    }

    #[test]
    fn missing_tool_is_reported_by_name() {
        let err = run_tool("definitely-not-a-real-tool-4821", &[], 100).unwrap_err();
        assert!(err.to_string().contains("definitely-not-a-real-tool-4821"));
    }

    #[test]
    fn parses_pointer_output() {
        assert_eq!(parse_pointer("512,384\n"), Some((512, 384)));
        assert_eq!(parse_pointer("512.6, 10.2"), Some((513, 10)));
        assert_eq!(parse_pointer("nope"), None);
    }
}
