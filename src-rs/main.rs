use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use mirror_capture::bridge::MacHostBridge;
use mirror_capture::capture::capture_query;
use mirror_capture::catalog::{calibration_order, ACTION_CATALOG, APP_FLOWS};
use mirror_capture::checkpoint::CheckpointDriver;
use mirror_capture::config::{load_settings, Settings};
use mirror_capture::geometry::{to_absolute, to_relative, AbsPoint, RelPoint};
use mirror_capture::orchestrator::{probe_window, Orchestrator, PointBook};
use mirror_capture::profile::ProfileStore;
use mirror_capture::prompt::TelemetryPrompt;
use mirror_capture::workflow::{calibrate_all, calibrate_single, NoopHooks};
use mirror_capture::MirrorError;

#[derive(Parser, Debug)]
#[command(
    name = "mirror-capture",
    version,
    about = "Calibrate a mirrored phone window, launch apps into search and capture per-keystroke results"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Settings file (default: $MIRROR_CAPTURE_CONFIG or ./mirror-capture.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Never use host keyboard shortcuts; navigate by calibrated taps only
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    no_shortcuts: bool,
    /// Pause between navigation steps in milliseconds (0 disables the pause)
    #[arg(long, global = true)]
    settle_ms: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print supported commands in JSON
    Commands,
    /// Print calibratable actions in calibration order, plus app flows
    Actions,
    /// Print the live mirror window bounds and content region
    Region(RegionArgs),
    /// Convert a fractional point to absolute pixels against the live region
    #[command(name = "to-abs")]
    ToAbs(ToAbsArgs),
    /// Convert absolute pixels to fractions of the live region
    #[command(name = "to-rel")]
    ToRel(ToRelArgs),
    /// Load, validate and print the calibration profile
    Profile(ProfileArgs),
    /// Recalibrate one action (`app:action`) in the existing profile
    Calibrate(CalibrateArgs),
    /// Calibrate every catalog action in prerequisite order
    #[command(name = "calibrate-all")]
    CalibrateAll(CalibrateAllArgs),
    /// Launch an app and focus its search field
    Launch(LaunchArgs),
    /// Type a query one character at a time, capturing the screen after each
    Capture(CaptureArgs),
}

#[derive(Args, Debug)]
struct RegionArgs {
    /// Print JSON instead of a one-line summary
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct ToAbsArgs {
    #[arg(allow_negative_numbers = true)]
    rel_x: f64,
    #[arg(allow_negative_numbers = true)]
    rel_y: f64,
}

#[derive(Args, Debug)]
struct ToRelArgs {
    #[arg(allow_negative_numbers = true)]
    abs_x: i64,
    #[arg(allow_negative_numbers = true)]
    abs_y: i64,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    /// Only report whether the profile is valid
    #[arg(long, action = ArgAction::SetTrue)]
    validate_only: bool,
}

#[derive(Args, Debug)]
struct CalibrateArgs {
    /// Catalog action id, e.g. chrome:searchBar
    action: String,
}

#[derive(Args, Debug)]
struct CalibrateAllArgs {
    /// Pause for confirmation around every step, with screenshots and failure reports
    #[arg(long, action = ArgAction::SetTrue)]
    checkpoints: bool,
    /// Run without checkpoint pauses (default)
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "checkpoints")]
    unattended: bool,
}

#[derive(Args, Debug)]
struct LaunchArgs {
    app: String,
}

#[derive(Args, Debug)]
struct CaptureArgs {
    app: String,
    query: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        let mirror = err.downcast_ref::<MirrorError>();
        if let Some(hint) = mirror.and_then(MirrorError::remediation) {
            eprintln!("hint: {hint}");
        }
        let code = if mirror.is_some_and(MirrorError::is_cancellation) {
            130
        } else {
            1
        };
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Commands => return print_commands(),
        Commands::Actions => return print_actions(),
        _ => {}
    }

    let mut settings = load_settings(cli.config.as_deref())?;
    if cli.no_shortcuts {
        settings.launch.use_shortcuts = false;
    }
    if let Some(ms) = cli.settle_ms {
        settings.timing.settle_ms = ms;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(dispatch(cli.command, settings));
    // drops the stdin reader thread, if a prompt left one parked
    runtime.shutdown_background();
    result
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// First Ctrl-C trips the token so the run unwinds as a cancellation; a
/// second one exits straight away.
fn watch_interrupts(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("interrupt received; canceling");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

async fn dispatch(command: Commands, settings: Settings) -> Result<()> {
    let bridge = MacHostBridge::new(settings.mirror.display_scale);
    let cancel = CancellationToken::new();
    watch_interrupts(cancel.clone());
    match command {
        Commands::Commands | Commands::Actions => Ok(()),
        Commands::Region(args) => command_region(&bridge, &settings, args).await,
        Commands::ToAbs(args) => command_to_abs(&bridge, &settings, args).await,
        Commands::ToRel(args) => command_to_rel(&bridge, &settings, args).await,
        Commands::Profile(args) => command_profile(&settings, args),
        Commands::Calibrate(args) => command_calibrate(&bridge, &settings, &cancel, args).await,
        Commands::CalibrateAll(args) => command_calibrate_all(&bridge, &settings, &cancel, args).await,
        Commands::Launch(args) => command_launch(&bridge, &settings, &cancel, args).await,
        Commands::Capture(args) => command_capture(&bridge, &settings, &cancel, args).await,
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_commands() -> Result<()> {
    let rows = vec![
        json!({"name": "actions", "description": "List calibratable actions in prerequisite order and per-app flows."}),
        json!({"name": "region", "description": "Probe the mirror window and print its content region."}),
        json!({"name": "to-abs", "description": "Convert a fractional point to absolute pixels."}),
        json!({"name": "to-rel", "description": "Convert absolute pixels to region fractions."}),
        json!({"name": "profile", "description": "Load and validate the calibration profile."}),
        json!({"name": "calibrate", "description": "Recalibrate one action with the live telemetry prompt."}),
        json!({"name": "calibrate-all", "description": "Calibrate every action, optionally with checkpoints."}),
        json!({"name": "launch", "description": "Launch an app and focus its search field."}),
        json!({"name": "capture", "description": "Capture the screen after each typed query character."}),
    ];
    print_json(&json!({ "commands": rows }))
}

fn print_actions() -> Result<()> {
    let order = calibration_order(ACTION_CATALOG)?;
    let actions: Vec<Value> = order
        .iter()
        .enumerate()
        .map(|(idx, def)| {
            json!({
                "order": idx + 1,
                "id": def.id,
                "label": def.label,
                "app": def.for_app,
                "context": def.target_context(),
                "prerequisites": def.prerequisites,
                "lands_in": def.lands_in,
                "required_for_capture": def.required_for_capture,
                "fallback_tap_steps": def.fallback_tap_steps,
            })
        })
        .collect();
    print_json(&json!({ "actions": actions, "apps": APP_FLOWS }))
}

async fn command_region(bridge: &MacHostBridge, settings: &Settings, args: RegionArgs) -> Result<()> {
    let (bounds, region) = probe_window(bridge, settings).await?;
    if args.json {
        return print_json(&json!({
            "window_bounds": bounds,
            "content_region": region,
            "insets": settings.mirror.insets,
            "display_scale": settings.mirror.display_scale,
        }));
    }
    println!(
        "window {},{} -> {},{}  content {},{} {}x{}",
        bounds.x1, bounds.y1, bounds.x2, bounds.y2, region.x, region.y, region.width, region.height
    );
    Ok(())
}

async fn command_to_abs(bridge: &MacHostBridge, settings: &Settings, args: ToAbsArgs) -> Result<()> {
    let (_, region) = probe_window(bridge, settings).await?;
    let rel = RelPoint::new(args.rel_x, args.rel_y);
    let abs = to_absolute(rel, &region)?;
    print_json(&json!({
        "rel": rel,
        "abs": abs,
        "region": region,
        "in_region": rel.is_within_unit(),
    }))
}

async fn command_to_rel(bridge: &MacHostBridge, settings: &Settings, args: ToRelArgs) -> Result<()> {
    let (_, region) = probe_window(bridge, settings).await?;
    let abs = AbsPoint::new(args.abs_x, args.abs_y);
    let rel = to_relative(abs, &region)?;
    print_json(&json!({
        "abs": abs,
        "rel": rel,
        "region": region,
        "in_region": rel.is_within_unit(),
    }))
}

fn command_profile(settings: &Settings, args: ProfileArgs) -> Result<()> {
    let mut store = ProfileStore::new(settings.profile_path());
    let profile = store.load()?;
    if args.validate_only {
        println!(
            "ok: {} (version {}, generated {})",
            store.path().display(),
            profile.version,
            profile.generated_at
        );
        return Ok(());
    }
    print_json(&serde_json::to_value(&profile)?)
}

fn telemetry_prompt(
    settings: &Settings,
    cancel: &CancellationToken,
) -> TelemetryPrompt<tokio::io::BufReader<tokio::io::Stdin>> {
    TelemetryPrompt::stdin(
        Duration::from_millis(settings.timing.telemetry_tick_ms),
        cancel.clone(),
    )
}

async fn command_calibrate(
    bridge: &MacHostBridge,
    settings: &Settings,
    cancel: &CancellationToken,
    args: CalibrateArgs,
) -> Result<()> {
    let mut store = ProfileStore::new(settings.profile_path());
    let orch = Orchestrator::new(bridge, settings, PointBook::default()).with_cancel(cancel.clone());
    let mut console = telemetry_prompt(settings, cancel);
    let outcome = calibrate_single(&mut store, &orch, &mut console, &args.action).await?;
    print_json(&serde_json::to_value(&outcome)?)
}

async fn command_calibrate_all(
    bridge: &MacHostBridge,
    settings: &Settings,
    cancel: &CancellationToken,
    args: CalibrateAllArgs,
) -> Result<()> {
    let mut store = ProfileStore::new(settings.profile_path());
    let mut orch =
        Orchestrator::new(bridge, settings, PointBook::default()).with_cancel(cancel.clone());
    let mut console = telemetry_prompt(settings, cancel);

    if args.checkpoints && !args.unattended {
        let mut driver = CheckpointDriver::new(&settings.paths.out_dir);
        let result = calibrate_all(&mut store, &mut orch, &mut console, &mut driver).await;
        if let Some(report) = driver.report_path() {
            eprintln!("failure report: {}", report.display());
        }
        let run = result?;
        return print_json(&json!({
            "run": run,
            "checkpoints": driver.screenshots(),
        }));
    }

    let run = calibrate_all(&mut store, &mut orch, &mut console, &mut NoopHooks).await?;
    print_json(&serde_json::to_value(&run)?)
}

async fn command_launch(
    bridge: &MacHostBridge,
    settings: &Settings,
    cancel: &CancellationToken,
    args: LaunchArgs,
) -> Result<()> {
    let mut store = ProfileStore::new(settings.profile_path());
    let profile = match store.load() {
        Ok(profile) => Some(profile),
        Err(err) => {
            tracing::warn!(error = %err, "no usable profile; navigating with legacy points");
            None
        }
    };
    let book = PointBook::from_profile(profile.as_ref())?;
    let mut orch = Orchestrator::new(bridge, settings, book).with_cancel(cancel.clone());
    let report = orch.launch_to_search(&args.app).await?;
    print_json(&serde_json::to_value(&report)?)
}

async fn command_capture(
    bridge: &MacHostBridge,
    settings: &Settings,
    cancel: &CancellationToken,
    args: CaptureArgs,
) -> Result<()> {
    if args.query.is_empty() {
        bail!("query must not be empty");
    }
    let mut store = ProfileStore::new(settings.profile_path());
    let profile = store.load()?;
    let book = PointBook::from_profile(Some(&profile))?;
    let mut orch = Orchestrator::new(bridge, settings, book).with_cancel(cancel.clone());
    let manifest = capture_query(&mut orch, &profile, &args.app, &args.query, &settings.paths.out_dir)
        .await
        .with_context(|| format!("capture of `{}` in {} failed", args.query, args.app))?;
    print_json(&serde_json::to_value(&manifest)?)
}
