// ABOUTME: Operator prompts on the controlling terminal.
// ABOUTME: Yes/no confirmation and masked secret entry with echo disabled via raw mode.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, BufRead, IsTerminal, Write};
use zeroize::Zeroizing;

/// Whether stdin is attached to a terminal an operator can answer on.
pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// Ask a yes/no question on stderr and read the answer from stdin.
pub fn confirm(question: &str) -> bool {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stderr = io::stderr();
    confirm_with(&mut input, &mut stderr, question)
}

/// Only an explicit `yes` or `y` counts as agreement. EOF and read errors are a no.
pub fn confirm_with(input: &mut impl BufRead, output: &mut impl Write, question: &str) -> bool {
    if write!(output, "{question} (yes/no): ")
        .and_then(|_| output.flush())
        .is_err()
    {
        return false;
    }

    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "yes" | "y"),
    }
}

/// Read a secret without echoing it back to the terminal.
pub fn masked(label: &str) -> io::Result<Zeroizing<String>> {
    let mut stderr = io::stderr();
    write!(stderr, "{label}")?;
    stderr.flush()?;

    let result = {
        let _raw = RawMode::enable()?;
        read_secret()
    };
    writeln!(stderr)?;
    result
}

/// Restores cooked mode even if reading panics.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn read_secret() -> io::Result<Zeroizing<String>> {
    let mut secret = Zeroizing::new(String::new());
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        match code {
            KeyCode::Enter => return Ok(secret),
            KeyCode::Backspace => {
                secret.pop();
            }
            KeyCode::Char('c') | KeyCode::Char('d')
                if modifiers.contains(KeyModifiers::CONTROL) =>
            {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "prompt cancelled"));
            }
            KeyCode::Char(c) => secret.push(c),
            _ => {}
        }
    }
}
