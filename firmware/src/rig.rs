//! Shared rig surface bridging firmware tasks with `cycler-core`.

#![allow(dead_code)]

use core::ops::Add;
use core::time::Duration;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::Instant;

use cycler_core::telemetry::MonotonicInstant;

use crate::console::ConsoleLine;

/// Depth of the queue carrying assembled command lines into the rig task.
pub const LINE_QUEUE_DEPTH: usize = 4;

/// Depth of the queue carrying rendered output lines back to the console.
pub const OUTPUT_QUEUE_DEPTH: usize = 8;

/// Maximum length of one rendered output line (the `debug` report is the
/// longest line the rig produces).
pub const OUTPUT_LINE_LEN: usize = 160;

/// A rendered console output line.
pub type OutputLine = heapless::String<OUTPUT_LINE_LEN>;

#[cfg(target_os = "none")]
type RigMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type RigMutex = NoopRawMutex;

/// Queue used to hand completed command lines to the rig task.
pub type LineQueue = Channel<RigMutex, ConsoleLine, LINE_QUEUE_DEPTH>;

/// Convenience sender type alias for the line queue.
pub type LineSender<'a> = Sender<'a, RigMutex, ConsoleLine, LINE_QUEUE_DEPTH>;

/// Convenience receiver type alias for the line queue.
pub type LineReceiver<'a> = Receiver<'a, RigMutex, ConsoleLine, LINE_QUEUE_DEPTH>;

/// Queue carrying rendered console output toward the USB task.
pub type OutputQueue = Channel<RigMutex, OutputLine, OUTPUT_QUEUE_DEPTH>;

/// Convenience sender type alias for the output queue.
pub type OutputSender<'a> = Sender<'a, RigMutex, OutputLine, OUTPUT_QUEUE_DEPTH>;

/// Convenience receiver type alias for the output queue.
pub type OutputReceiver<'a> = Receiver<'a, RigMutex, OutputLine, OUTPUT_QUEUE_DEPTH>;

/// Embassy instant wrapper satisfying the automaton's timestamp bounds.
///
/// `cycler-core` works in `core::time::Duration`; Embassy's `Instant` adds
/// only its own `Duration`, so the arithmetic is bridged here.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Returns the wrapped Embassy instant.
    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0 + embassy_time::Duration::from_micros(micros))
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        Duration::from_micros(elapsed.as_micros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_core_durations() {
        let base = FirmwareInstant::from(Instant::from_micros(1_000));
        let later = base + Duration::from_millis(200);
        assert_eq!(later.into_embassy(), Instant::from_micros(201_000));
        assert!(later > base);
    }

    #[test]
    fn saturating_elapsed_never_underflows() {
        let early = FirmwareInstant::from(Instant::from_micros(500));
        let late = FirmwareInstant::from(Instant::from_micros(2_500));

        assert_eq!(
            late.saturating_duration_since(early),
            Duration::from_micros(2_000)
        );
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
    }
}
