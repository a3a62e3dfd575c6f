//! The 200 ms control loop.
//!
//! This task owns every piece of rig state: the automaton, the command
//! dispatcher, and the notice ring. Pending command lines are dispatched
//! first so mode changes land before the tick's power observation, then the
//! sense line is sampled and the automaton advanced. Freshly recorded
//! notices are rendered and queued for the USB console.

use core::fmt::Write;

use cycler_core::actuator::TogglePulse;
use cycler_core::automaton::{Automaton, TestSession, TICK_PERIOD};
use cycler_core::repl::commands::{CommandProcessor, LineOutcome};
use cycler_core::repl::status;
use cycler_core::sampling::SamplerConfig;
use cycler_core::telemetry::{MonotonicInstant, NoticeId, NoticeRecorder};
use embassy_time::{Duration, Instant, Ticker};

use crate::hw::{SenseAdc, SwitchOutput};
use crate::rig::{FirmwareInstant, LineReceiver, OutputLine, OutputSender};

#[embassy_executor::task]
pub async fn run(
    mut adc: SenseAdc<'static>,
    mut switch: SwitchOutput<'static>,
    lines: LineReceiver<'static>,
    output: OutputSender<'static>,
) -> ! {
    let mut automaton: Automaton<FirmwareInstant> =
        Automaton::new(SamplerConfig::default(), TogglePulse::default());
    let mut processor = CommandProcessor::new();
    let mut notices: NoticeRecorder<FirmwareInstant> = NoticeRecorder::new();
    let mut cursor: Option<NoticeId> = None;

    let tick_millis = u64::try_from(TICK_PERIOD.as_millis()).unwrap_or(200);
    let mut ticker = Ticker::every(Duration::from_millis(tick_millis));

    loop {
        while let Ok(line) = lines.try_receive() {
            let now = FirmwareInstant::from(Instant::now());
            let outcome =
                processor.handle_line(line.as_str(), now, &mut automaton, &mut switch, &mut notices);
            emit_outcome(&outcome, &automaton, &output);
        }

        let raw = adc.read();
        let now = FirmwareInstant::from(Instant::now());
        automaton.tick(now, raw, &mut switch, &mut notices);
        drain_notices(&mut cursor, &notices, &automaton, &output);

        ticker.next().await;
    }
}

fn drain_notices(
    cursor: &mut Option<NoticeId>,
    notices: &NoticeRecorder<FirmwareInstant>,
    automaton: &Automaton<FirmwareInstant>,
    output: &OutputSender<'static>,
) {
    let started_at = automaton.session().map(TestSession::started_at);
    for record in notices.records_since(*cursor) {
        *cursor = Some(record.id);
        let elapsed = started_at.map(|start| record.timestamp.saturating_duration_since(start));
        let mut line = OutputLine::new();
        if status::write_notice_line(&mut line, elapsed, record.notice).is_ok() {
            push_line(output, line);
        }
    }
}

fn emit_outcome(
    outcome: &LineOutcome<'_>,
    automaton: &Automaton<FirmwareInstant>,
    output: &OutputSender<'static>,
) {
    match outcome {
        LineOutcome::Done => {}
        LineOutcome::AwaitModeChoice { retry: false } => {
            for text in status::MODE_MENU {
                push_str(output, text);
            }
        }
        LineOutcome::AwaitModeChoice { retry: true } => {
            push_str(output, status::MODE_RETRY_PROMPT);
        }
        LineOutcome::AwaitCustomDelay { retry: false } => {
            push_str(output, status::CUSTOM_DELAY_PROMPT);
        }
        LineOutcome::AwaitCustomDelay { retry: true } => {
            push_str(output, status::CUSTOM_DELAY_RETRY_PROMPT);
        }
        LineOutcome::ShowDebug => {
            let snapshot = automaton.debug_snapshot();
            let mut line = OutputLine::new();
            if status::write_debug_report(&mut line, &snapshot).is_ok() {
                push_line(output, line);
            }
        }
        LineOutcome::Rejected(error) => {
            let mut line = OutputLine::new();
            let _ = write!(line, "Ignored: {error}");
            push_line(output, line);
        }
    }
}

fn push_str(output: &OutputSender<'static>, text: &str) {
    let mut line = OutputLine::new();
    if line.push_str(text).is_ok() {
        push_line(output, line);
    }
}

fn push_line(output: &OutputSender<'static>, line: OutputLine) {
    if output.try_send(line).is_err() {
        defmt::warn!("console: output backlog, dropping line");
    }
}
