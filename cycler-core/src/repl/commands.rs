//! Console command dispatcher.
//!
//! [`CommandProcessor`] turns parsed lines into automaton operations. Most
//! commands apply immediately; `new` opens a short wizard that prompts for a
//! mode choice and, for custom sessions, a delay in seconds. The wizard is
//! an input-mode state machine rather than argument parsing because the
//! protocol prompts across lines: the mode number and the delay each arrive
//! on their own line.

use core::time::Duration;

use crate::actuator::SwitchDriver;
use crate::automaton::{Automaton, AutomatonInstant, TestMode};
use crate::telemetry::NoticeRecorder;

use super::grammar::{self, Command, Line, ParseError};

/// What the dispatcher expects on the next line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
enum InputMode {
    /// Expecting a command keyword.
    #[default]
    Idle,
    /// `new` was issued; expecting a mode choice `1`-`4`.
    SelectMode,
    /// Mode 4 was chosen; expecting a positive delay in seconds.
    CustomDelay,
}

/// Result of feeding one line through the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineOutcome<'a> {
    /// Line consumed; nothing further expected.
    Done,
    /// The wizard wants a mode choice. `retry` marks a repeated prompt
    /// after invalid input.
    AwaitModeChoice { retry: bool },
    /// The wizard wants a custom delay in seconds.
    AwaitCustomDelay { retry: bool },
    /// The `debug` command asked for a state report.
    ShowDebug,
    /// The line failed to parse and was ignored.
    Rejected(ParseError<'a>),
}

/// Maps console lines onto test sequencer transitions.
#[derive(Copy, Clone, Debug, Default)]
pub struct CommandProcessor {
    mode: InputMode,
}

impl CommandProcessor {
    /// Creates a dispatcher expecting a command.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: InputMode::Idle,
        }
    }

    /// Returns `true` while the `new` wizard is awaiting input.
    #[must_use]
    pub const fn in_wizard(&self) -> bool {
        !matches!(self.mode, InputMode::Idle)
    }

    /// Feeds one console line through the dispatcher.
    pub fn handle_line<'a, Instant, D, const CAP: usize>(
        &mut self,
        line: &'a str,
        now: Instant,
        automaton: &mut Automaton<Instant>,
        driver: &mut D,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) -> LineOutcome<'a>
    where
        Instant: AutomatonInstant,
        D: SwitchDriver,
    {
        let parsed = match grammar::parse(line) {
            Ok(parsed) => parsed,
            Err(error) => {
                return match self.mode {
                    // Wizard prompts swallow garbage and ask again.
                    InputMode::SelectMode => LineOutcome::AwaitModeChoice { retry: true },
                    InputMode::CustomDelay => LineOutcome::AwaitCustomDelay { retry: true },
                    InputMode::Idle => LineOutcome::Rejected(error),
                };
            }
        };

        match self.mode {
            InputMode::Idle => self.handle_command(parsed, now, automaton, driver, notices),
            InputMode::SelectMode => self.handle_mode_choice(parsed, now, automaton, notices),
            InputMode::CustomDelay => self.handle_custom_delay(parsed, now, automaton, notices),
        }
    }

    fn handle_command<'a, Instant, D, const CAP: usize>(
        &mut self,
        parsed: Line,
        now: Instant,
        automaton: &mut Automaton<Instant>,
        driver: &mut D,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) -> LineOutcome<'a>
    where
        Instant: AutomatonInstant,
        D: SwitchDriver,
    {
        match parsed {
            Line::Command(Command::Pause) => {
                automaton.pause(now, notices);
                LineOutcome::Done
            }
            Line::Command(Command::Resume) => {
                automaton.resume(now, notices);
                LineOutcome::Done
            }
            Line::Command(Command::New) => {
                self.mode = InputMode::SelectMode;
                LineOutcome::AwaitModeChoice { retry: false }
            }
            Line::Command(Command::Stop) => {
                automaton.stop(now, notices);
                LineOutcome::Done
            }
            Line::Command(Command::Toggle) => {
                automaton.manual_toggle(now, driver, notices);
                LineOutcome::Done
            }
            Line::Command(Command::Debug) => LineOutcome::ShowDebug,
            // A stray number or blank line outside the wizard is ignored.
            Line::Number(_) | Line::Empty => LineOutcome::Done,
        }
    }

    fn handle_mode_choice<'a, Instant, const CAP: usize>(
        &mut self,
        parsed: Line,
        now: Instant,
        automaton: &mut Automaton<Instant>,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) -> LineOutcome<'a>
    where
        Instant: AutomatonInstant,
    {
        let Line::Number(choice) = parsed else {
            return LineOutcome::AwaitModeChoice { retry: true };
        };

        let Some(mode) = TestMode::from_choice(choice) else {
            return LineOutcome::AwaitModeChoice { retry: true };
        };

        if let Some(delay) = mode.fixed_delay() {
            self.mode = InputMode::Idle;
            automaton.start_session(mode, delay, now, notices);
            LineOutcome::Done
        } else {
            self.mode = InputMode::CustomDelay;
            LineOutcome::AwaitCustomDelay { retry: false }
        }
    }

    fn handle_custom_delay<'a, Instant, const CAP: usize>(
        &mut self,
        parsed: Line,
        now: Instant,
        automaton: &mut Automaton<Instant>,
        notices: &mut NoticeRecorder<Instant, CAP>,
    ) -> LineOutcome<'a>
    where
        Instant: AutomatonInstant,
    {
        let Line::Number(seconds) = parsed else {
            return LineOutcome::AwaitCustomDelay { retry: true };
        };

        if seconds == 0 {
            return LineOutcome::AwaitCustomDelay { retry: true };
        }

        self.mode = InputMode::Idle;
        automaton.start_session(
            TestMode::Custom,
            Duration::from_secs(u64::from(seconds)),
            now,
            notices,
        );
        LineOutcome::Done
    }
}
