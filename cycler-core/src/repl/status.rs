//! Shared text rendering for the operator console.
//!
//! The firmware and emulator both render notices and the `debug` report
//! through these helpers so the two front-ends stay word-for-word
//! identical. Lines are written through `core::fmt::Write`, keeping the
//! module usable from `no_std` targets.

use core::fmt::{self, Write};
use core::time::Duration;

use crate::automaton::DebugSnapshot;
use crate::telemetry::Notice;

/// Menu printed when the `new` wizard opens.
pub const MODE_MENU: &[&str] = &[
    "Select test mode:",
    "  1) S5 (30 second delay)",
    "  2) Manual S3/S4 (60 second delay)",
    "  3) Combination (75 second delay)",
    "  4) Custom delay",
];

/// Prompt repeated after an invalid mode choice.
pub const MODE_RETRY_PROMPT: &str = "Enter a number between 1 and 4:";

/// Prompt printed when a custom session needs its delay.
pub const CUSTOM_DELAY_PROMPT: &str = "Enter the power on delay in seconds:";

/// Prompt repeated after an invalid custom delay.
pub const CUSTOM_DELAY_RETRY_PROMPT: &str = "Delay must be a positive number of seconds:";

/// Writes the session-elapsed stamp, e.g. `[00:12:37]`.
pub fn write_elapsed_stamp<W: Write>(writer: &mut W, elapsed: Duration) -> fmt::Result {
    let total = elapsed.as_secs();
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    write!(writer, "[{hours:02}:{minutes:02}:{seconds:02}]")
}

/// Writes one notice line, stamped with the session elapsed time when a
/// session exists and bare otherwise.
pub fn write_notice_line<W: Write>(
    writer: &mut W,
    elapsed: Option<Duration>,
    notice: Notice,
) -> fmt::Result {
    if let Some(elapsed) = elapsed {
        write_elapsed_stamp(writer, elapsed)?;
        writer.write_char(' ')?;
    }
    write!(writer, "{notice}")
}

/// Writes the `debug` command's state line.
pub fn write_debug_report<W: Write, Instant: Copy>(
    writer: &mut W,
    snapshot: &DebugSnapshot<Instant>,
) -> fmt::Result {
    writer.write_str("state mode=")?;
    match snapshot.mode {
        Some(mode) => write!(writer, "{mode}")?,
        None => writer.write_str("none")?,
    }

    write!(writer, " paused={}", snapshot.paused)?;

    writer.write_str(" cycle=")?;
    match snapshot.cycle {
        Some(cycle) => write!(writer, "{cycle}")?,
        None => writer.write_str("n/a")?,
    }

    writer.write_str(" delay=")?;
    match snapshot.delay {
        Some(delay) => write_duration_short(writer, delay)?,
        None => writer.write_str("n/a")?,
    }

    write!(
        writer,
        " check-step={} attempt-on={}",
        snapshot.check_step, snapshot.attempt_on
    )?;

    writer.write_str(" countdown=")?;
    writer.write_str(if snapshot.countdown_armed {
        "armed"
    } else {
        "idle"
    })?;

    writer.write_str(" toggle=")?;
    writer.write_str(if snapshot.toggle_in_flight {
        "in-flight"
    } else {
        "idle"
    })?;

    writer.write_str(" power=")?;
    writer.write_str(if snapshot.power.is_on() { "on" } else { "off" })
}

fn write_duration_short<W: Write>(writer: &mut W, duration: Duration) -> fmt::Result {
    if duration >= Duration::from_secs(1) && duration.subsec_millis() == 0 {
        write!(writer, "{}s", duration.as_secs())
    } else {
        write!(writer, "{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::TestMode;
    use crate::sampling::PowerState;
    use heapless::String;

    fn render<F>(f: F) -> String<128>
    where
        F: FnOnce(&mut String<128>) -> fmt::Result,
    {
        let mut buffer = String::new();
        f(&mut buffer).expect("render should fit");
        buffer
    }

    #[test]
    fn elapsed_stamp_renders_hours_minutes_seconds() {
        let line = render(|w| write_elapsed_stamp(w, Duration::from_secs(0)));
        assert_eq!(line.as_str(), "[00:00:00]");

        let line = render(|w| write_elapsed_stamp(w, Duration::from_secs(3_723)));
        assert_eq!(line.as_str(), "[01:02:03]");

        let line = render(|w| write_elapsed_stamp(w, Duration::from_secs(45 * 60 + 9)));
        assert_eq!(line.as_str(), "[00:45:09]");
    }

    #[test]
    fn notice_line_includes_stamp_only_with_session() {
        let line = render(|w| {
            write_notice_line(w, Some(Duration::from_secs(61)), Notice::BecameOn)
        });
        assert_eq!(line.as_str(), "[00:01:01] System is on");

        let line = render(|w| write_notice_line(w, None, Notice::BecameOff));
        assert_eq!(line.as_str(), "System is off");
    }

    #[test]
    fn scheduled_notice_spells_out_seconds() {
        let line = render(|w| {
            write_notice_line(
                w,
                None,
                Notice::PowerOnScheduled(Duration::from_secs(30)),
            )
        });
        assert_eq!(line.as_str(), "Power On in 30 seconds");
    }

    #[test]
    fn debug_report_renders_running_session() {
        let snapshot = DebugSnapshot::<u64> {
            mode: Some(TestMode::S5),
            paused: false,
            cycle: Some(3),
            delay: Some(Duration::from_secs(30)),
            check_step: 1,
            attempt_on: false,
            countdown_armed: true,
            toggle_in_flight: false,
            power: PowerState::Off,
            started_at: Some(0),
        };

        let line = render(|w| write_debug_report(w, &snapshot));
        assert_eq!(
            line.as_str(),
            "state mode=S5 paused=false cycle=3 delay=30s check-step=1 \
             attempt-on=false countdown=armed toggle=idle power=off"
        );
    }

    #[test]
    fn debug_report_renders_idle_rig() {
        let snapshot = DebugSnapshot::<u64> {
            mode: None,
            paused: false,
            cycle: None,
            delay: None,
            check_step: 0,
            attempt_on: false,
            countdown_armed: false,
            toggle_in_flight: true,
            power: PowerState::On,
            started_at: None,
        };

        let line = render(|w| write_debug_report(w, &snapshot));
        assert_eq!(
            line.as_str(),
            "state mode=none paused=false cycle=n/a delay=n/a check-step=0 \
             attempt-on=false countdown=idle toggle=in-flight power=on"
        );
    }
}
