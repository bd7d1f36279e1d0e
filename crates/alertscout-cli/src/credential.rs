// Reading the GitHub token - hidden when a person is typing, one line when piped
use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

const PROMPT: &str = "Enter GitHub token: ";

/// Prompt on stderr and read the token from stdin
pub fn read_token() -> Result<String> {
    let stdin = io::stdin();
    let mut stderr = io::stderr();

    write!(stderr, "{}", PROMPT)?;
    stderr.flush()?;

    if stdin.is_terminal() {
        let token = read_hidden()?;
        writeln!(stderr)?;
        non_empty(&token)
    } else {
        read_token_from(stdin.lock())
    }
}

/// Read one line from a non-interactive source
pub fn read_token_from<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read token from stdin")?;
    non_empty(&line)
}

fn non_empty(raw: &str) -> Result<String> {
    let token = raw.trim();
    if token.is_empty() {
        bail!("No GitHub token provided");
    }
    Ok(token.to_string())
}

/// Raw mode turns off echo; always switch it back before returning
fn read_hidden() -> Result<String> {
    terminal::enable_raw_mode().context("Failed to read token securely")?;
    let token = read_hidden_keys();
    terminal::disable_raw_mode()?;
    token
}

fn read_hidden_keys() -> Result<String> {
    let mut token = String::new();

    loop {
        match event::read()? {
            Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) => {
                // Windows reports releases as well as presses
                if kind == KeyEventKind::Release {
                    continue;
                }
                match code {
                    KeyCode::Enter => break,
                    KeyCode::Backspace => {
                        token.pop();
                    }
                    KeyCode::Char('c') | KeyCode::Char('d')
                        if modifiers.contains(KeyModifiers::CONTROL) =>
                    {
                        bail!("Token entry cancelled");
                    }
                    KeyCode::Esc => bail!("Token entry cancelled"),
                    KeyCode::Char(c) => token.push(c),
                    _ => {}
                }
            }
            Event::Paste(text) => token.push_str(&text),
            _ => {}
        }
    }

    Ok(token)
}
