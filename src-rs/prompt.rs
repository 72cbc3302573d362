//! Operator console: the live telemetry prompt used to capture a point, and
//! yes/flag confirmations for checkpoints.
//!
//! Waiting on the operator is the only indefinite suspension in a run. It
//! listens for a line of input, a pointer-sampling tick and the run's
//! cancellation token at the same time; a cancelled token, `q` or end of input
//! become [`MirrorError::OperatorCanceled`].

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::bridge::HostBridge;
use crate::error::{MirrorError, MirrorResult};
use crate::geometry::{to_relative, AbsPoint, Region};

#[derive(Debug, Clone, Copy)]
pub struct SampleRequest<'a> {
    pub action: &'a str,
    pub label: &'a str,
    pub region: Region,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    Flagged,
}

#[async_trait]
pub trait OperatorConsole: Send {
    /// Blocks until the operator confirms the pointer is over the target.
    async fn sample_point(
        &mut self,
        bridge: &dyn HostBridge,
        request: &SampleRequest<'_>,
    ) -> MirrorResult<AbsPoint>;

    async fn confirm(&mut self, message: &str) -> MirrorResult<Confirmation>;
}

/// One telemetry line: absolute pointer, region-local offset, fraction and
/// whether the fraction is usable.
pub fn format_telemetry(abs: AbsPoint, region: &Region) -> String {
    let local = (abs.x - region.x, abs.y - region.y);
    match to_relative(abs, region) {
        Ok(rel) => format!(
            "abs=({},{}) local=({},{}) rel=({:.4},{:.4}) {}",
            abs.x,
            abs.y,
            local.0,
            local.1,
            rel.x,
            rel.y,
            if rel.is_within_unit() { "IN" } else { "OUT" }
        ),
        Err(err) => format!("abs=({},{}) local=({},{}) {err}", abs.x, abs.y, local.0, local.1),
    }
}

pub struct TelemetryPrompt<R> {
    lines: Lines<R>,
    tick: Duration,
    cancel: Option<CancellationToken>,
}

impl TelemetryPrompt<BufReader<Stdin>> {
    /// Reads stdin; `cancel` is the token the Ctrl-C watcher trips.
    pub fn stdin(tick: Duration, cancel: CancellationToken) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            tick,
            cancel: Some(cancel),
        }
    }
}

impl<R> TelemetryPrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Prompt over an arbitrary reader with no cancellation token.
    pub fn from_reader(reader: R, tick: Duration) -> Self {
        Self {
            lines: reader.lines(),
            tick,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    async fn read_line(&mut self) -> MirrorResult<String> {
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = interrupted(cancel.as_ref()) => Err(MirrorError::OperatorCanceled),
            line = self.lines.next_line() => match line? {
                Some(line) if is_quit(&line) => Err(MirrorError::OperatorCanceled),
                Some(line) => Ok(line),
                None => Err(MirrorError::OperatorCanceled),
            },
        }
    }
}

fn is_quit(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "q" | "quit")
}

async fn interrupted(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

fn render(line: &str) {
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "\r\x1b[2K{line}");
    let _ = err.flush();
}

fn end_render() {
    let _ = writeln!(std::io::stderr());
}

#[async_trait]
impl<R> OperatorConsole for TelemetryPrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn sample_point(
        &mut self,
        bridge: &dyn HostBridge,
        request: &SampleRequest<'_>,
    ) -> MirrorResult<AbsPoint> {
        eprintln!(
            "hover over {} [{}] and press Enter (q to cancel)",
            request.label, request.action
        );
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let cancel = self.cancel.clone();
        let interrupt_fut = interrupted(cancel.as_ref());
        tokio::pin!(interrupt_fut);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut interrupt_fut => break Err(MirrorError::OperatorCanceled),
                line = self.lines.next_line() => {
                    break match line {
                        Ok(Some(line)) if is_quit(&line) => Err(MirrorError::OperatorCanceled),
                        Ok(Some(_)) => bridge.mouse_position().await,
                        Ok(None) => Err(MirrorError::OperatorCanceled),
                        Err(err) => Err(err.into()),
                    };
                }
                _ = ticker.tick() => match bridge.mouse_position().await {
                    Ok(abs) => render(&format_telemetry(abs, &request.region)),
                    Err(err) => tracing::trace!(error = %err, "pointer sample failed"),
                },
            }
        };
        if let Ok(abs) = &outcome {
            render(&format_telemetry(*abs, &request.region));
        }
        end_render();
        outcome
    }

    async fn confirm(&mut self, message: &str) -> MirrorResult<Confirmation> {
        eprintln!("{message} [Enter = ok, f = flag failure, q = cancel]");
        let line = self.read_line().await?;
        if line.trim().eq_ignore_ascii_case("f") {
            Ok(Confirmation::Flagged)
        } else {
            Ok(Confirmation::Proceed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBridge;

    fn region() -> Region {
        Region { x: 110, y: 148, width: 380, height: 542 }
    }

    fn request() -> SampleRequest<'static> {
        SampleRequest {
            action: "chrome:searchBar",
            label: "Chrome address/search bar",
            region: region(),
        }
    }

    #[test]
    fn telemetry_flags_points_outside_region() {
        let inside = format_telemetry(AbsPoint::new(300, 641), &region());
        assert!(inside.contains("local=(190,493)"));
        assert!(inside.ends_with("IN"));
        let outside = format_telemetry(AbsPoint::new(50, 641), &region());
        assert!(outside.contains("rel=(-0.1579"));
        assert!(outside.ends_with("OUT"));
    }

    #[tokio::test]
    async fn enter_captures_current_pointer() {
        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(300, 641)]);
        let mut prompt = TelemetryPrompt::from_reader(&b"\n"[..], Duration::from_millis(5));
        let abs = prompt.sample_point(&bridge, &request()).await.unwrap();
        assert_eq!(abs, AbsPoint::new(300, 641));
    }

    #[tokio::test]
    async fn quit_and_end_of_input_cancel() {
        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(1, 1)]);
        let mut prompt = TelemetryPrompt::from_reader(&b"q\n"[..], Duration::from_millis(5));
        let err = prompt.sample_point(&bridge, &request()).await.unwrap_err();
        assert!(err.is_cancellation());

        let mut prompt = TelemetryPrompt::from_reader(&b""[..], Duration::from_millis(5));
        assert!(prompt.sample_point(&bridge, &request()).await.unwrap_err().is_cancellation());
    }

    #[tokio::test]
    async fn confirm_reads_flags() {
        let mut prompt = TelemetryPrompt::from_reader(&b"\nf\nq\n"[..], Duration::from_millis(5));
        assert_eq!(prompt.confirm("ok?").await.unwrap(), Confirmation::Proceed);
        assert_eq!(prompt.confirm("ok?").await.unwrap(), Confirmation::Flagged);
        assert!(prompt.confirm("ok?").await.unwrap_err().is_cancellation());
    }

    #[tokio::test]
    async fn cancelled_token_interrupts_a_waiting_prompt() {
        let bridge = ScriptedBridge::new().mouse_positions(&[AbsPoint::new(1, 1)]);
        let (_writer, reader) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let mut prompt = TelemetryPrompt::from_reader(BufReader::new(reader), Duration::from_millis(5))
            .with_cancel(cancel.clone());

        let trip = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trip.cancel();
        });
        let err = prompt.sample_point(&bridge, &request()).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(bridge.calls().contains(&crate::testing::Call::Mouse));

        // Later prompts in the same run stop at once.
        assert!(prompt.confirm("ok?").await.unwrap_err().is_cancellation());
    }
}
