mod device;
mod session;

use std::env;
use std::io::{self, Write};
use std::process;
use std::time::Instant;

use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType};

use device::DeviceProfile;
use session::Session;

fn main() -> io::Result<()> {
    let profile = parse_profile().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: cycler-emulator [--profile <normal|faulty>] | cycler-emulator <normal|faulty>");
        process::exit(2);
    });

    let mut session = Session::new(profile, Instant::now())?;

    println!("power-cycler emulator ready ({profile:?} device).");
    println!("Commands: pause, resume, new, stop, toggle, debug. F5 presses the front panel.");
    println!("Type `exit` or press Ctrl+C to quit.");

    terminal::enable_raw_mode()?;
    let result = run(&mut session);
    terminal::disable_raw_mode()?;
    println!();
    result
}

fn run(session: &mut Session) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut buffer = String::new();
    let mut next_tick = Instant::now() + session.tick_period();
    prompt(&mut out, &buffer)?;

    loop {
        let now = Instant::now();
        if now >= next_tick {
            let lines = session.tick(now)?;
            print_lines(&mut out, &lines, &buffer)?;
            next_tick += session.tick_period();
            continue;
        }

        // Sleep only until the next tick so the automaton keeps its cadence
        // even while a command line is being typed.
        let wait = next_tick.saturating_duration_since(now);
        if event::poll(wait)?
            && let Event::Key(key) = event::read()?
            && key.kind != KeyEventKind::Release
            && handle_key(session, key, &mut buffer, &mut out)?
        {
            return Ok(());
        }
    }
}

/// Applies one key press; returns `true` when the session should end.
fn handle_key(
    session: &mut Session,
    key: KeyEvent,
    buffer: &mut String,
    out: &mut impl Write,
) -> io::Result<bool> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            write!(out, "\r\n")?;
            return Ok(true);
        }
        KeyCode::Char(c) => {
            buffer.push(c);
            write!(out, "{c}")?;
            out.flush()?;
        }
        KeyCode::Backspace => {
            if buffer.pop().is_some() {
                write!(out, "\u{8} \u{8}")?;
                out.flush()?;
            }
        }
        KeyCode::F(5) => {
            // The operator reaches over and presses the real power button.
            let powered = !session.device_powered();
            session.force_device_power(powered);
            let note = [format!(
                "[device] front panel pressed, device now {}",
                if powered { "on" } else { "off" }
            )];
            print_lines(out, &note, buffer)?;
        }
        KeyCode::Enter => {
            write!(out, "\r\n")?;
            let line = std::mem::take(buffer);
            if should_terminate(line.trim()) {
                write!(out, "Session closed.\r\n")?;
                return Ok(true);
            }

            let lines = session.handle_command(&line, Instant::now())?;
            for line in &lines {
                write!(out, "{line}\r\n")?;
            }
            prompt(out, buffer)?;
        }
        _ => {}
    }

    Ok(false)
}

/// Prints asynchronous output without clobbering the half-typed line.
fn print_lines(out: &mut impl Write, lines: &[String], buffer: &str) -> io::Result<()> {
    if lines.is_empty() {
        return Ok(());
    }

    execute!(out, Clear(ClearType::CurrentLine), MoveToColumn(0))?;
    for line in lines {
        write!(out, "{line}\r\n")?;
    }
    prompt(out, buffer)
}

fn prompt(out: &mut impl Write, buffer: &str) -> io::Result<()> {
    write!(out, "> {buffer}")?;
    out.flush()
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_profile() -> Result<DeviceProfile, String> {
    let mut args = env::args().skip(1);
    if let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            DeviceProfile::from_tag(value)
        } else if arg == "--profile" {
            if let Some(value) = args.next() {
                DeviceProfile::from_tag(&value)
            } else {
                Err("Expected value after --profile".to_string())
            }
        } else {
            DeviceProfile::from_tag(&arg)
        }
    } else {
        Ok(DeviceProfile::Normal)
    }
}
