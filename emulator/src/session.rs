//! Host-side session wiring the shared automaton to the simulated device
//! and a transcript log.
//!
//! The session owns the whole rig: command dispatcher, automaton, notice
//! ring, and the simulated device on the other end of the sense and switch
//! lines. The front-end only pushes completed command lines and the 200 ms
//! tick through it and prints whatever lines come back.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as StdInstant};

use cycler_core::actuator::{SwitchAction, SwitchDriver, TogglePulse};
use cycler_core::automaton::{Automaton, TestSession, TICK_PERIOD};
use cycler_core::repl::commands::{CommandProcessor, LineOutcome};
use cycler_core::repl::status;
use cycler_core::sampling::SamplerConfig;
use cycler_core::telemetry::{MonotonicInstant, NoticeId, NoticeRecorder};

use crate::device::{DeviceProfile, SimulatedDevice};

/// Monotonic wrapper satisfying the automaton's instant bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostInstant(StdInstant);

impl From<StdInstant> for HostInstant {
    fn from(value: StdInstant) -> Self {
        Self(value)
    }
}

impl core::ops::Add<Duration> for HostInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl MonotonicInstant for HostInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

/// Adapter handing the automaton's switch actions to the simulated device.
struct DeviceSwitch<'a> {
    device: &'a mut SimulatedDevice,
    now: StdInstant,
}

impl SwitchDriver for DeviceSwitch<'_> {
    fn apply(&mut self, action: SwitchAction) {
        match action {
            SwitchAction::AssertLow => self.device.press(self.now),
            SwitchAction::ReleaseHigh => self.device.release(self.now),
        }
    }
}

pub struct Session {
    processor: CommandProcessor,
    automaton: Automaton<HostInstant>,
    notices: NoticeRecorder<HostInstant>,
    device: SimulatedDevice,
    cursor: Option<NoticeId>,
    transcript: TranscriptLogger,
    started_at: StdInstant,
}

impl Session {
    pub fn new(profile: DeviceProfile, started_at: StdInstant) -> io::Result<Self> {
        Ok(Self {
            processor: CommandProcessor::new(),
            automaton: Automaton::new(SamplerConfig::default(), TogglePulse::default()),
            notices: NoticeRecorder::new(),
            device: SimulatedDevice::new(profile),
            cursor: None,
            transcript: TranscriptLogger::new(profile)?,
            started_at,
        })
    }

    /// The tick cadence the front-end should drive [`Session::tick`] at.
    pub fn tick_period(&self) -> Duration {
        TICK_PERIOD
    }

    /// Runs one automaton tick against the simulated device.
    pub fn tick(&mut self, now: StdInstant) -> io::Result<Vec<String>> {
        let raw = self.device.read_level(now);
        let mut switch = DeviceSwitch {
            device: &mut self.device,
            now,
        };
        self.automaton.tick(
            HostInstant(now),
            raw,
            &mut switch,
            &mut self.notices,
        );
        let lines = self.drain_notices();
        self.record_output(now, &lines)?;
        Ok(lines)
    }

    /// Feeds one completed command line through the dispatcher.
    pub fn handle_command(&mut self, line: &str, now: StdInstant) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        self.transcript
            .append_line(self.offset(now), TranscriptRole::Host, trimmed)?;

        let outcome = {
            let mut switch = DeviceSwitch {
                device: &mut self.device,
                now,
            };
            self.processor.handle_line(
                trimmed,
                HostInstant(now),
                &mut self.automaton,
                &mut switch,
                &mut self.notices,
            )
        };

        let mut lines = self.drain_notices();
        match outcome {
            LineOutcome::Done => {}
            LineOutcome::AwaitModeChoice { retry: false } => {
                lines.extend(status::MODE_MENU.iter().map(ToString::to_string));
            }
            LineOutcome::AwaitModeChoice { retry: true } => {
                lines.push(status::MODE_RETRY_PROMPT.to_string());
            }
            LineOutcome::AwaitCustomDelay { retry: false } => {
                lines.push(status::CUSTOM_DELAY_PROMPT.to_string());
            }
            LineOutcome::AwaitCustomDelay { retry: true } => {
                lines.push(status::CUSTOM_DELAY_RETRY_PROMPT.to_string());
            }
            LineOutcome::ShowDebug => {
                let snapshot = self.automaton.debug_snapshot();
                let mut line = String::new();
                status::write_debug_report(&mut line, &snapshot)
                    .expect("String never fails to write");
                lines.push(line);
            }
            LineOutcome::Rejected(error) => {
                lines.push(format!("Ignored: {error}"));
            }
        }

        self.record_output(now, &lines)?;
        Ok(lines)
    }

    /// Reaches past the switch and forces the device's power state, the way
    /// an operator pressing the front-panel button would.
    pub fn force_device_power(&mut self, powered: bool) {
        self.device.force_power(powered);
    }

    /// Returns `true` once the simulated device reports power.
    pub fn device_powered(&self) -> bool {
        self.device.is_powered()
    }

    fn drain_notices(&mut self) -> Vec<String> {
        let started_at = self.automaton.session().map(TestSession::started_at);
        let mut lines = Vec::new();
        for record in self.notices.records_since(self.cursor) {
            self.cursor = Some(record.id);
            let elapsed =
                started_at.map(|start| record.timestamp.saturating_duration_since(start));
            let mut line = String::new();
            status::write_notice_line(&mut line, elapsed, record.notice)
                .expect("String never fails to write");
            lines.push(line);
        }
        lines
    }

    fn record_output(&mut self, now: StdInstant, lines: &[String]) -> io::Result<()> {
        let offset = self.offset(now);
        for line in lines {
            self.transcript
                .append_line(offset, TranscriptRole::Rig, line)?;
        }
        Ok(())
    }

    fn offset(&self, now: StdInstant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: DeviceProfile) -> io::Result<Self> {
        let name = match profile {
            DeviceProfile::Normal => "logs/cycler-normal.log",
            DeviceProfile::Faulty => "logs/cycler-faulty.log",
        };
        let path = Path::new(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: DeviceProfile) -> io::Result<()> {
        writeln!(self.writer, "# power-cycler emulator transcript ({profile:?} device)")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Rig,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Rig => "RIG <",
        }
    }
}
