//! Power switch actuation shared by firmware and host targets.
//!
//! The physical switch is driven through an active-low pulse: assert the
//! output for [`TOGGLE_PULSE`], release it, then hold off for
//! [`TOGGLE_SETTLE`] while the monitored device's supply stabilizes. The
//! original rig blocked its whole control loop for that window; here the
//! pulse is a [`ToggleRun`] state machine bounded by deadline timestamps and
//! polled once per tick, so command handling stays live while a toggle is in
//! flight.

use core::ops::Add;
use core::time::Duration;

/// Duration the switch output is held asserted during a toggle.
pub const TOGGLE_PULSE: Duration = Duration::from_millis(1_000);
/// Hold-off after releasing the switch before power state is trusted again.
pub const TOGGLE_SETTLE: Duration = Duration::from_millis(4_800);

/// Action applied to the switch output line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SwitchAction {
    AssertLow,
    ReleaseHigh,
}

/// Abstraction over the physical switch output.
pub trait SwitchDriver {
    /// Applies the requested action to the output line.
    fn apply(&mut self, action: SwitchAction);

    /// Returns the output line to its released state.
    fn release(&mut self) {
        self.apply(SwitchAction::ReleaseHigh);
    }
}

/// Switch driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSwitchDriver;

impl NoopSwitchDriver {
    /// Creates a new no-op switch driver.
    pub const fn new() -> Self {
        Self
    }
}

impl SwitchDriver for NoopSwitchDriver {
    fn apply(&mut self, _: SwitchAction) {}
}

/// Timing profile for one toggle pulse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TogglePulse {
    pulse: Duration,
    settle: Duration,
}

impl TogglePulse {
    /// Creates a profile with explicit pulse and settle windows.
    #[must_use]
    pub const fn new(pulse: Duration, settle: Duration) -> Self {
        Self { pulse, settle }
    }

    /// Returns the assert-low hold duration.
    #[must_use]
    pub const fn pulse(&self) -> Duration {
        self.pulse
    }

    /// Returns the post-release settle duration.
    #[must_use]
    pub const fn settle(&self) -> Duration {
        self.settle
    }

    /// Total wall-clock time a run occupies the switch.
    #[must_use]
    pub const fn total(&self) -> Duration {
        self.pulse.saturating_add(self.settle)
    }
}

impl Default for TogglePulse {
    fn default() -> Self {
        Self::new(TOGGLE_PULSE, TOGGLE_SETTLE)
    }
}

/// Phase of an in-flight toggle run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TogglePhase {
    Pulsing,
    Settling,
}

/// Progress reported by [`ToggleRun::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ToggleProgress {
    /// The pulse or settle window is still running.
    InFlight,
    /// The settle window elapsed; the run is over.
    Finished,
}

/// Deadline-driven state machine for a single toggle pulse.
///
/// Constructing a run asserts the output immediately; each `poll` advances
/// the phase once its deadline passes. Exactly one `Finished` is reported.
#[derive(Copy, Clone, Debug)]
pub struct ToggleRun<Instant> {
    phase: TogglePhase,
    deadline: Instant,
    timing: TogglePulse,
}

impl<Instant> ToggleRun<Instant>
where
    Instant: Copy + Ord + Add<Duration, Output = Instant>,
{
    /// Starts a run: asserts the switch and arms the pulse deadline.
    pub fn start<D: SwitchDriver>(now: Instant, timing: TogglePulse, driver: &mut D) -> Self {
        driver.apply(SwitchAction::AssertLow);
        Self {
            phase: TogglePhase::Pulsing,
            deadline: now + timing.pulse(),
            timing,
        }
    }

    /// Advances the run against the current time.
    pub fn poll<D: SwitchDriver>(&mut self, now: Instant, driver: &mut D) -> ToggleProgress {
        match self.phase {
            TogglePhase::Pulsing => {
                if now >= self.deadline {
                    driver.apply(SwitchAction::ReleaseHigh);
                    self.phase = TogglePhase::Settling;
                    // Anchor the settle window to the pulse deadline rather
                    // than the observing tick so total time does not drift.
                    self.deadline = self.deadline + self.timing.settle();
                }
                ToggleProgress::InFlight
            }
            TogglePhase::Settling => {
                if now >= self.deadline {
                    ToggleProgress::Finished
                } else {
                    ToggleProgress::InFlight
                }
            }
        }
    }

    /// Returns the deadline bounding the current phase.
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl Add<Duration> for MockInstant {
        type Output = Self;

        #[allow(clippy::cast_possible_truncation)]
        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + rhs.as_millis() as u64)
        }
    }

    #[derive(Default)]
    struct RecordingDriver {
        actions: heapless::Vec<SwitchAction, 8>,
    }

    impl SwitchDriver for RecordingDriver {
        fn apply(&mut self, action: SwitchAction) {
            self.actions.push(action).unwrap();
        }
    }

    #[test]
    fn start_asserts_the_switch() {
        let mut driver = RecordingDriver::default();
        let run = ToggleRun::start(MockInstant(0), TogglePulse::default(), &mut driver);
        assert_eq!(driver.actions.as_slice(), &[SwitchAction::AssertLow]);
        assert_eq!(run.deadline(), MockInstant(1_000));
    }

    #[test]
    fn pulse_releases_after_its_deadline() {
        let mut driver = RecordingDriver::default();
        let mut run = ToggleRun::start(MockInstant(0), TogglePulse::default(), &mut driver);

        assert_eq!(
            run.poll(MockInstant(999), &mut driver),
            ToggleProgress::InFlight
        );
        assert_eq!(driver.actions.len(), 1);

        assert_eq!(
            run.poll(MockInstant(1_000), &mut driver),
            ToggleProgress::InFlight
        );
        assert_eq!(
            driver.actions.as_slice(),
            &[SwitchAction::AssertLow, SwitchAction::ReleaseHigh]
        );
        assert_eq!(run.deadline(), MockInstant(5_800));
    }

    #[test]
    fn finishes_once_settle_elapses() {
        let mut driver = RecordingDriver::default();
        let mut run = ToggleRun::start(MockInstant(0), TogglePulse::default(), &mut driver);

        run.poll(MockInstant(1_100), &mut driver);
        assert_eq!(
            run.poll(MockInstant(5_799), &mut driver),
            ToggleProgress::InFlight
        );
        assert_eq!(
            run.poll(MockInstant(5_800), &mut driver),
            ToggleProgress::Finished
        );
        // No further output activity after the release.
        assert_eq!(driver.actions.len(), 2);
    }

    #[test]
    fn settle_window_anchors_to_pulse_deadline() {
        let mut driver = RecordingDriver::default();
        let timing = TogglePulse::new(Duration::from_millis(100), Duration::from_millis(200));
        let mut run = ToggleRun::start(MockInstant(0), timing, &mut driver);

        // A late tick observes the pulse deadline well after it passed.
        run.poll(MockInstant(150), &mut driver);
        assert_eq!(run.deadline(), MockInstant(300));
        assert_eq!(
            run.poll(MockInstant(300), &mut driver),
            ToggleProgress::Finished
        );
    }

    #[test]
    fn default_profile_matches_rig_timings() {
        let timing = TogglePulse::default();
        assert_eq!(timing.pulse(), Duration::from_millis(1_000));
        assert_eq!(timing.settle(), Duration::from_millis(4_800));
        assert_eq!(timing.total(), Duration::from_millis(5_800));
    }
}
