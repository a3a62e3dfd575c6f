//! Session lifecycle scenarios: the `new` wizard, pause/resume semantics,
//! and the rendered console output around them.

use core::ops::Add;
use core::time::Duration;

use cycler_core::actuator::{NoopSwitchDriver, TogglePulse};
use cycler_core::automaton::{
    Automaton, TestMode, COMBINATION_DELAY, MANUAL_S3_S4_DELAY, S5_DELAY,
};
use cycler_core::repl::commands::{CommandProcessor, LineOutcome};
use cycler_core::repl::status;
use cycler_core::sampling::SamplerConfig;
use cycler_core::telemetry::{MonotonicInstant, Notice, NoticeRecorder};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct MockInstant(u64);

impl Add<Duration> for MockInstant {
    type Output = Self;

    #[allow(clippy::cast_possible_truncation)]
    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.as_millis() as u64)
    }
}

impl MonotonicInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

struct Console {
    processor: CommandProcessor,
    automaton: Automaton<MockInstant>,
    notices: NoticeRecorder<MockInstant>,
    driver: NoopSwitchDriver,
    now: MockInstant,
}

impl Console {
    fn new() -> Self {
        Self {
            processor: CommandProcessor::new(),
            automaton: Automaton::new(SamplerConfig::default(), TogglePulse::default()),
            notices: NoticeRecorder::new(),
            driver: NoopSwitchDriver::new(),
            now: MockInstant(0),
        }
    }

    fn line<'a>(&mut self, text: &'a str) -> LineOutcome<'a> {
        self.processor.handle_line(
            text,
            self.now,
            &mut self.automaton,
            &mut self.driver,
            &mut self.notices,
        )
    }

    fn notices(&self) -> Vec<Notice> {
        self.notices
            .oldest_first()
            .map(|record| record.notice)
            .collect()
    }
}

#[test]
fn wizard_walks_through_every_fixed_mode() {
    for (choice, mode, delay) in [
        ("1", TestMode::S5, S5_DELAY),
        ("2", TestMode::ManualS3S4, MANUAL_S3_S4_DELAY),
        ("3", TestMode::Combination, COMBINATION_DELAY),
    ] {
        let mut console = Console::new();
        assert_eq!(
            console.line("new"),
            LineOutcome::AwaitModeChoice { retry: false }
        );
        assert_eq!(console.line(choice), LineOutcome::Done);

        let session = console.automaton.session().expect("session should exist");
        assert_eq!(session.mode(), mode);
        assert_eq!(session.delay(), delay);
        assert_eq!(session.cycle(), 1);
        assert!(console.notices().contains(&Notice::Commencing(mode)));
    }
}

#[test]
fn wizard_custom_flow_with_reprompts() {
    let mut console = Console::new();

    console.line("new");
    assert_eq!(
        console.line("4"),
        LineOutcome::AwaitCustomDelay { retry: false }
    );
    // Zero and garbage both re-prompt without starting anything.
    assert_eq!(
        console.line("0"),
        LineOutcome::AwaitCustomDelay { retry: true }
    );
    assert_eq!(
        console.line("soon"),
        LineOutcome::AwaitCustomDelay { retry: true }
    );
    assert!(console.automaton.session().is_none());

    assert_eq!(console.line("45"), LineOutcome::Done);
    let session = console.automaton.session().expect("session should exist");
    assert_eq!(session.mode(), TestMode::Custom);
    assert_eq!(session.delay(), Duration::from_secs(45));
}

#[test]
fn wizard_prompt_text_is_shared() {
    // The two front-ends print these constants verbatim; pin the wording.
    assert_eq!(status::MODE_MENU[0], "Select test mode:");
    assert_eq!(status::MODE_MENU.len(), 5);
    assert!(status::MODE_MENU[4].contains("Custom"));
    assert!(status::CUSTOM_DELAY_PROMPT.contains("seconds"));
    assert!(status::MODE_RETRY_PROMPT.contains("1"));
}

#[test]
fn pause_twice_matches_pause_once() {
    let mut console = Console::new();
    console.line("new");
    console.line("1");

    console.line("pause");
    let after_first = console.notices();
    console.line("pause");
    assert_eq!(console.notices(), after_first);
    assert!(console.automaton.session().unwrap().is_paused());
}

#[test]
fn resume_without_pause_is_a_noop() {
    let mut console = Console::new();
    console.line("new");
    console.line("1");

    let before = console.notices();
    console.line("resume");
    assert_eq!(console.notices(), before);
    assert!(!console.automaton.session().unwrap().is_paused());
}

#[test]
fn stop_renders_unstamped_notice() {
    let mut console = Console::new();
    console.line("new");
    console.line("1");
    console.line("stop");

    let record = console.notices.latest().expect("stop should be recorded");
    assert_eq!(record.notice, Notice::Stopped);

    // The session is gone by the time the notice renders, so no stamp.
    let mut line = String::new();
    status::write_notice_line(&mut line, None, record.notice).unwrap();
    assert_eq!(line, "Test stopped");
}

#[test]
fn debug_command_reports_the_snapshot() {
    let mut console = Console::new();
    console.line("new");
    console.line("1");

    assert_eq!(console.line("debug"), LineOutcome::ShowDebug);
    let snapshot = console.automaton.debug_snapshot();

    let mut line = String::new();
    status::write_debug_report(&mut line, &snapshot).unwrap();
    assert_eq!(
        line,
        "state mode=S5 paused=false cycle=1 delay=30s check-step=0 \
         attempt-on=false countdown=idle toggle=idle power=off"
    );
}

#[test]
fn unknown_input_is_ignored_without_side_effects() {
    let mut console = Console::new();
    assert!(matches!(console.line("frobnicate"), LineOutcome::Rejected(_)));
    assert!(matches!(console.line("pause resume"), LineOutcome::Rejected(_)));
    assert!(console.automaton.session().is_none());
    assert!(console.notices.is_empty());
}

#[test]
fn commands_match_case_insensitively() {
    let mut console = Console::new();
    console.line("NEW");
    console.line("1");
    assert!(console.automaton.session().is_some());
    console.line("Stop");
    assert!(console.automaton.session().is_none());
}
