//! Notice catalog and bounded recording shared by firmware and host targets.
//!
//! Every observable event raised by the automaton becomes a [`Notice`]
//! recorded into a fixed-size ring with a monotonically increasing id.
//! Front-ends keep a cursor into the ring and render whatever arrived since
//! their last visit, so the core never needs to know how (or whether) a
//! given target prints text.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::automaton::TestMode;

/// Identifier assigned to each recorded notice.
pub type NoticeId = u32;

/// Total number of notices retained in memory.
pub const NOTICE_RING_CAPACITY: usize = 64;

/// Observable events raised by the test sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Notice {
    /// The monitored device transitioned off -> on.
    BecameOn,
    /// The monitored device transitioned on -> off.
    BecameOff,
    /// A confirmed power-on opened the numbered test cycle.
    CycleStarted(u32),
    /// The pre-toggle countdown was armed for the given delay.
    PowerOnScheduled(Duration),
    /// The check protocol commanded a toggle pulse.
    ToggleAttempt,
    /// The operator commanded a toggle pulse directly.
    ManualToggle,
    /// A toggle pulse finished its settle window.
    ToggleFinished,
    /// A toggle was refused because one is already in flight.
    ToggleBusy,
    /// The device appeared on before the rig's own toggle could explain it.
    SpuriousPowerOn,
    /// A toggle was issued but the device never registered on.
    FailedPowerOn,
    /// A new test session started in the given mode.
    Commencing(TestMode),
    /// The active session was stopped.
    Stopped,
    /// The active session was paused.
    Paused,
    /// The active session was resumed.
    Resumed,
}

impl Notice {
    const BECAME_ON_CODE: u16 = 0x0000;
    const BECAME_OFF_CODE: u16 = 0x0001;
    const CYCLE_STARTED_CODE: u16 = 0x0002;
    const POWER_SCHEDULED_CODE: u16 = 0x0003;
    const TOGGLE_ATTEMPT_CODE: u16 = 0x0004;
    const MANUAL_TOGGLE_CODE: u16 = 0x0005;
    const TOGGLE_FINISHED_CODE: u16 = 0x0006;
    const TOGGLE_BUSY_CODE: u16 = 0x0007;
    const SPURIOUS_CODE: u16 = 0x0008;
    const FAILED_CODE: u16 = 0x0009;
    const STOPPED_CODE: u16 = 0x000A;
    const PAUSED_CODE: u16 = 0x000B;
    const RESUMED_CODE: u16 = 0x000C;
    const COMMENCING_BASE: u16 = 0x0010;

    /// Encodes the notice into a compact transport-friendly discriminant.
    ///
    /// Payloads other than the test mode are not representable in the code;
    /// diagnostics transports that need them read the full record.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            Notice::BecameOn => Self::BECAME_ON_CODE,
            Notice::BecameOff => Self::BECAME_OFF_CODE,
            Notice::CycleStarted(_) => Self::CYCLE_STARTED_CODE,
            Notice::PowerOnScheduled(_) => Self::POWER_SCHEDULED_CODE,
            Notice::ToggleAttempt => Self::TOGGLE_ATTEMPT_CODE,
            Notice::ManualToggle => Self::MANUAL_TOGGLE_CODE,
            Notice::ToggleFinished => Self::TOGGLE_FINISHED_CODE,
            Notice::ToggleBusy => Self::TOGGLE_BUSY_CODE,
            Notice::SpuriousPowerOn => Self::SPURIOUS_CODE,
            Notice::FailedPowerOn => Self::FAILED_CODE,
            Notice::Stopped => Self::STOPPED_CODE,
            Notice::Paused => Self::PAUSED_CODE,
            Notice::Resumed => Self::RESUMED_CODE,
            Notice::Commencing(mode) => Self::COMMENCING_BASE + mode.as_index() as u16,
        }
    }

    /// Returns `true` when the notice reports a protocol error.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Notice::SpuriousPowerOn | Notice::FailedPowerOn)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::BecameOn => f.write_str("System is on"),
            Notice::BecameOff => f.write_str("System is off"),
            Notice::CycleStarted(cycle) => write!(f, "Starting cycle {cycle}"),
            Notice::PowerOnScheduled(delay) => {
                write!(f, "Power On in {} seconds", delay.as_secs())
            }
            Notice::ToggleAttempt => f.write_str("Toggling power switch"),
            Notice::ManualToggle => f.write_str("Manual power switch toggle"),
            Notice::ToggleFinished => f.write_str("Power switch released"),
            Notice::ToggleBusy => f.write_str("Toggle already in progress"),
            Notice::SpuriousPowerOn => {
                f.write_str("ERROR: system powered on outside of test control")
            }
            Notice::FailedPowerOn => f.write_str("ERROR: power on attempt failed"),
            Notice::Commencing(mode) => write!(f, "Commencing {mode} test"),
            Notice::Stopped => f.write_str("Test stopped"),
            Notice::Paused => f.write_str("Test paused"),
            Notice::Resumed => f.write_str("Test resumed"),
        }
    }
}

/// Trait implemented by monotonic instant wrappers used for notice stamping.
pub trait MonotonicInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Notice stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NoticeRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: NoticeId,
    pub timestamp: TInstant,
    pub notice: Notice,
}

/// Notice ring buffer type alias.
pub type NoticeRing<TInstant, const CAPACITY: usize = NOTICE_RING_CAPACITY> =
    HistoryBuf<NoticeRecord<TInstant>, CAPACITY>;

/// Records notices into a fixed-size ring buffer.
pub struct NoticeRecorder<TInstant, const CAPACITY: usize = NOTICE_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: NoticeRing<TInstant, CAPACITY>,
    next_id: NoticeId,
}

impl<TInstant, const CAPACITY: usize> NoticeRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + MonotonicInstant,
{
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_id: 0,
        }
    }

    /// Records a notice and returns its assigned id.
    pub fn record(&mut self, notice: Notice, timestamp: TInstant) -> NoticeId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        self.ring.write(NoticeRecord {
            id,
            timestamp,
            notice,
        });

        id
    }

    /// Returns an iterator over the recorded notices in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, NoticeRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the notices recorded after the provided cursor, oldest first.
    ///
    /// `None` as the cursor yields the entire retained history. Entries that
    /// fell off the ring before being drained are simply gone.
    pub fn records_since(
        &self,
        cursor: Option<NoticeId>,
    ) -> impl Iterator<Item = &NoticeRecord<TInstant>> {
        self.ring
            .oldest_ordered()
            .filter(move |record| cursor.is_none_or(|seen| record.id > seen))
    }

    /// Returns the most recent record, if any.
    pub fn latest(&self) -> Option<&NoticeRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<TInstant, const CAPACITY: usize> Default for NoticeRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + MonotonicInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MicrosInstant(u64);

    impl MonotonicInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn raw_codes_are_stable() {
        assert_eq!(Notice::BecameOn.to_raw(), 0x0000);
        assert_eq!(Notice::CycleStarted(7).to_raw(), 0x0002);
        assert_eq!(Notice::FailedPowerOn.to_raw(), 0x0009);
        assert_eq!(Notice::Commencing(TestMode::S5).to_raw(), 0x0010);
        assert_eq!(Notice::Commencing(TestMode::Custom).to_raw(), 0x0013);
    }

    #[test]
    fn error_classification() {
        assert!(Notice::SpuriousPowerOn.is_error());
        assert!(Notice::FailedPowerOn.is_error());
        assert!(!Notice::BecameOn.is_error());
    }

    #[test]
    fn record_assigns_monotonic_ids() {
        let mut recorder = NoticeRecorder::<MicrosInstant>::new();
        assert!(recorder.is_empty());

        let first = recorder.record(Notice::BecameOn, MicrosInstant(100));
        let second = recorder.record(Notice::BecameOff, MicrosInstant(200));
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.latest().unwrap().notice, Notice::BecameOff);
    }

    #[test]
    fn records_since_respects_cursor() {
        let mut recorder = NoticeRecorder::<MicrosInstant>::new();
        recorder.record(Notice::BecameOn, MicrosInstant(0));
        let seen = recorder.record(Notice::Paused, MicrosInstant(1));
        recorder.record(Notice::Resumed, MicrosInstant(2));
        recorder.record(Notice::Stopped, MicrosInstant(3));

        let fresh: heapless::Vec<Notice, 8> = recorder
            .records_since(Some(seen))
            .map(|record| record.notice)
            .collect();
        assert_eq!(fresh.as_slice(), &[Notice::Resumed, Notice::Stopped]);

        let all: heapless::Vec<Notice, 8> = recorder
            .records_since(None)
            .map(|record| record.notice)
            .collect();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn ring_drops_oldest_records() {
        let mut recorder = NoticeRecorder::<MicrosInstant, 4>::new();
        for index in 0..6 {
            recorder.record(Notice::CycleStarted(index), MicrosInstant(u64::from(index)));
        }

        assert_eq!(recorder.len(), 4);
        let oldest = recorder.oldest_first().next().unwrap();
        assert_eq!(oldest.notice, Notice::CycleStarted(2));
        assert_eq!(recorder.latest().unwrap().notice, Notice::CycleStarted(5));
    }
}
