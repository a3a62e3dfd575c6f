//! The power-cycle test sequencer.
//!
//! [`Automaton`] owns every piece of mutable rig state: the debounce
//! sampler, the committed-state history, the check-protocol counters, the
//! optional test session, and any in-flight toggle pulse. All transitions
//! are serialized through [`Automaton::tick`], called once per
//! [`TICK_PERIOD`] by the embedding runtime, plus the command methods the
//! dispatcher invokes between ticks. Waits are deadline timestamps rather
//! than blocking delays, so `pause`, `resume`, and `stop` stay responsive
//! while a countdown or toggle is pending.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

use crate::actuator::{SwitchDriver, TogglePulse, ToggleProgress, ToggleRun};
use crate::sampling::{PowerHistory, PowerState, Sampler, SamplerConfig};
use crate::telemetry::{MonotonicInstant, Notice, NoticeRecorder};

/// Cadence at which the embedding runtime calls [`Automaton::tick`].
pub const TICK_PERIOD: Duration = Duration::from_millis(200);

/// Scheduled power-on delay for the S5 (soft-off) test mode.
pub const S5_DELAY: Duration = Duration::from_millis(30_000);
/// Scheduled power-on delay for the manual S3/S4 (sleep/hibernate) mode.
pub const MANUAL_S3_S4_DELAY: Duration = Duration::from_millis(60_000);
/// Scheduled power-on delay for the combination mode.
pub const COMBINATION_DELAY: Duration = Duration::from_millis(75_000);

/// Monotonic timestamp bound required by the automaton.
pub trait AutomatonInstant: Copy + Ord + Add<Duration, Output = Self> + MonotonicInstant {}

impl<T> AutomatonInstant for T where T: Copy + Ord + Add<Duration, Output = T> + MonotonicInstant {}

/// Test profile selected through the `new` wizard.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TestMode {
    S5,
    ManualS3S4,
    Combination,
    Custom,
}

impl TestMode {
    /// Deterministic index used for compact encodings.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            TestMode::S5 => 0,
            TestMode::ManualS3S4 => 1,
            TestMode::Combination => 2,
            TestMode::Custom => 3,
        }
    }

    /// Maps the wizard's numeric menu choice to a mode.
    #[must_use]
    pub const fn from_choice(choice: u32) -> Option<Self> {
        match choice {
            1 => Some(TestMode::S5),
            2 => Some(TestMode::ManualS3S4),
            3 => Some(TestMode::Combination),
            4 => Some(TestMode::Custom),
            _ => None,
        }
    }

    /// Returns the built-in power-on delay, or `None` for [`TestMode::Custom`].
    #[must_use]
    pub const fn fixed_delay(self) -> Option<Duration> {
        match self {
            TestMode::S5 => Some(S5_DELAY),
            TestMode::ManualS3S4 => Some(MANUAL_S3_S4_DELAY),
            TestMode::Combination => Some(COMBINATION_DELAY),
            TestMode::Custom => None,
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestMode::S5 => f.write_str("S5"),
            TestMode::ManualS3S4 => f.write_str("manual S3/S4"),
            TestMode::Combination => f.write_str("combination"),
            TestMode::Custom => f.write_str("custom"),
        }
    }
}

/// Active test configuration between a `new` and the next `stop`/`new`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TestSession<Instant> {
    mode: TestMode,
    delay: Duration,
    cycle: u32,
    started_at: Instant,
    paused: bool,
}

impl<Instant: Copy> TestSession<Instant> {
    fn new(mode: TestMode, delay: Duration, started_at: Instant) -> Self {
        Self {
            mode,
            delay,
            cycle: 1,
            started_at,
            paused: false,
        }
    }

    /// Returns the session's test mode.
    #[must_use]
    pub const fn mode(&self) -> TestMode {
        self.mode
    }

    /// Returns the scheduled power-on delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns the current cycle number (starts at 1).
    #[must_use]
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Returns the timestamp the session started at.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns `true` while the session is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Escalation counters for the power-on check protocol.
///
/// `step` is deliberately one field with two readings, preserved from the
/// rig's proven contract: before a toggle it counts committed off states
/// gating the pulse, after a toggle it counts committed states validating
/// that the device did not appear on before the pulse could explain it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct PowerCheck {
    step: u8,
    attempt_on: bool,
}

impl PowerCheck {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Read-only view of the automaton internals for the `debug` command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebugSnapshot<Instant> {
    pub mode: Option<TestMode>,
    pub paused: bool,
    pub cycle: Option<u32>,
    pub delay: Option<Duration>,
    pub check_step: u8,
    pub attempt_on: bool,
    pub countdown_armed: bool,
    pub toggle_in_flight: bool,
    pub power: PowerState,
    pub started_at: Option<Instant>,
}

/// The test-sequencing state machine.
pub struct Automaton<Instant> {
    sampler: Sampler,
    history: PowerHistory,
    check: PowerCheck,
    session: Option<TestSession<Instant>>,
    countdown_deadline: Option<Instant>,
    toggle: Option<ToggleRun<Instant>>,
    toggle_timing: TogglePulse,
}

impl<Instant> Automaton<Instant>
where
    Instant: AutomatonInstant,
{
    /// Creates an idle automaton with the provided calibrations.
    #[must_use]
    pub fn new(config: SamplerConfig, toggle_timing: TogglePulse) -> Self {
        Self {
            sampler: Sampler::new(config),
            history: PowerHistory::new(),
            check: PowerCheck::default(),
            session: None,
            countdown_deadline: None,
            toggle: None,
            toggle_timing,
        }
    }

    /// Returns the active session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&TestSession<Instant>> {
        self.session.as_ref()
    }

    /// Time elapsed since the active session started.
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.session
            .as_ref()
            .map(|session| now.saturating_duration_since(session.started_at))
    }

    /// Returns `true` while a toggle pulse or settle window is pending.
    #[must_use]
    pub fn toggle_in_flight(&self) -> bool {
        self.toggle.is_some()
    }

    /// Latest committed power state.
    #[must_use]
    pub fn power_state(&self) -> PowerState {
        self.history.current()
    }

    /// Starts a session, discarding any prior protocol state.
    ///
    /// Resets the sampler, the history, the check counters, and any armed
    /// countdown before the session is installed, so nothing left over from
    /// a previous run can fire into the new one. `delay` must be positive;
    /// the wizard guarantees that for custom sessions and the fixed modes
    /// carry built-in delays.
    pub fn start_session<const CAP: usize>(
        &mut self,
        mode: TestMode,
        delay: Duration,
        now: Instant,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) {
        debug_assert!(!delay.is_zero());
        self.sampler.reset();
        self.history.reset();
        self.check.reset();
        self.countdown_deadline = None;
        self.session = Some(TestSession::new(mode, delay, now));
        notices.record(Notice::Commencing(mode), now);
        notices.record(Notice::CycleStarted(1), now);
    }

    /// Tears the session down.
    ///
    /// The armed countdown is cancelled so no scheduled toggle can fire
    /// after the stop. Check counters and history keep their values; the
    /// reset on the next `start_session` is what guarantees a clean start.
    pub fn stop<const CAP: usize>(
        &mut self,
        now: Instant,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) {
        self.countdown_deadline = None;
        if self.session.take().is_some() {
            notices.record(Notice::Stopped, now);
        }
    }

    /// Pauses the session. Idempotent; a no-op without a session.
    pub fn pause<const CAP: usize>(
        &mut self,
        now: Instant,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) {
        if let Some(session) = self.session.as_mut()
            && !session.paused
        {
            session.paused = true;
            notices.record(Notice::Paused, now);
        }
    }

    /// Resumes a paused session. A no-op when not paused.
    pub fn resume<const CAP: usize>(
        &mut self,
        now: Instant,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) {
        if let Some(session) = self.session.as_mut()
            && session.paused
        {
            session.paused = false;
            notices.record(Notice::Resumed, now);
        }
    }

    /// Operator-commanded toggle, bypassing the check protocol.
    ///
    /// No confirmation is pending afterwards, so `attempt_on` stays clear.
    /// Refused while another pulse is in flight.
    pub fn manual_toggle<D: SwitchDriver, const CAP: usize>(
        &mut self,
        now: Instant,
        driver: &mut D,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) {
        if self.toggle.is_some() {
            notices.record(Notice::ToggleBusy, now);
            return;
        }

        notices.record(Notice::ManualToggle, now);
        self.toggle = Some(ToggleRun::start(now, self.toggle_timing, driver));
    }

    /// Captures the internal state for the `debug` command.
    #[must_use]
    pub fn debug_snapshot(&self) -> DebugSnapshot<Instant> {
        DebugSnapshot {
            mode: self.session.as_ref().map(TestSession::mode),
            paused: self.session.as_ref().is_some_and(TestSession::is_paused),
            cycle: self.session.as_ref().map(TestSession::cycle),
            delay: self.session.as_ref().map(TestSession::delay),
            check_step: self.check.step,
            attempt_on: self.check.attempt_on,
            countdown_armed: self.countdown_deadline.is_some(),
            toggle_in_flight: self.toggle.is_some(),
            power: self.history.current(),
            started_at: self.session.as_ref().map(TestSession::started_at),
        }
    }

    /// Advances the automaton by one tick.
    ///
    /// Order within a tick: poll the in-flight toggle, evaluate the
    /// countdown deadline, then fold the raw reading and dispatch the power
    /// handlers when a state commits. While a toggle or countdown is
    /// pending no reading is taken at all — the rig observed nothing during
    /// those windows and the check protocol depends on that. A paused
    /// session keeps sampling but skips the handlers.
    pub fn tick<D: SwitchDriver, const CAP: usize>(
        &mut self,
        now: Instant,
        raw: u16,
        driver: &mut D,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) {
        let toggle_pending = self.toggle.is_some();
        if let Some(run) = self.toggle.as_mut()
            && run.poll(now, driver) == ToggleProgress::Finished
        {
            self.toggle = None;
            notices.record(Notice::ToggleFinished, now);
        }

        let paused = self.session.as_ref().is_some_and(TestSession::is_paused);
        if !paused
            && let Some(deadline) = self.countdown_deadline
            && now >= deadline
        {
            self.countdown_deadline = None;
            self.check.step = 1;
        }

        if toggle_pending || self.countdown_deadline.is_some() {
            return;
        }

        let Some(state) = self.sampler.observe(raw) else {
            return;
        };
        self.history.push(state);

        if paused {
            return;
        }

        match state {
            PowerState::On => self.on_power_on(now, notices),
            PowerState::Off => self.on_power_off(now, driver, notices),
        }
    }

    fn on_power_on<const CAP: usize>(
        &mut self,
        now: Instant,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) {
        if !self.history.previous().is_on() {
            notices.record(Notice::BecameOn, now);
        }

        if self.check.attempt_on {
            self.check.attempt_on = false;
            if let Some(session) = self.session.as_mut() {
                session.cycle += 1;
                notices.record(Notice::CycleStarted(session.cycle), now);
            }
        }

        if self.check.step > 0 {
            self.check.step = (self.check.step + 1).min(2);
            if self.check.step == 2 {
                // The check sequence expected a continuously-off device; a
                // prior committed on state means something other than our
                // own toggle powered it.
                if self.history.previous().is_on() || self.history.previous_previous().is_on() {
                    notices.record(Notice::SpuriousPowerOn, now);
                    self.check.step = 0;
                }
            }
        }
    }

    fn on_power_off<D: SwitchDriver, const CAP: usize>(
        &mut self,
        now: Instant,
        driver: &mut D,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) {
        if self.history.previous().is_on() {
            notices.record(Notice::BecameOff, now);
        }

        if self.check.attempt_on {
            notices.record(Notice::FailedPowerOn, now);
            self.check.attempt_on = false;
        }

        let Some(session) = self.session.as_ref() else {
            return;
        };

        match self.check.step {
            2 => {
                notices.record(Notice::ToggleAttempt, now);
                self.toggle = Some(ToggleRun::start(now, self.toggle_timing, driver));
                self.check.step = 0;
                self.check.attempt_on = true;
            }
            0 => {
                let delay = session.delay();
                self.countdown_deadline = Some(now + delay);
                notices.record(Notice::PowerOnScheduled(delay), now);
            }
            _ => {
                self.check.step = 2;
            }
        }
    }
}
