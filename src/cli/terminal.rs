//! Line-oriented user interaction.

use anyhow::{Context, Result};
use console::Term;
use std::io::{BufRead, ErrorKind};
use std::path::PathBuf;

/// Where prompts are answered and reports are written.
pub trait Terminal {
    /// Shows `message` and returns the next line typed, without the line ending.
    ///
    /// `None` means the input was closed.
    fn prompt(&mut self, message: &str) -> Result<Option<String>>;

    fn print(&mut self, text: &str);
}

/// The process console.
pub struct ConsoleTerminal {
    term: Term,
}

impl ConsoleTerminal {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for ConsoleTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for ConsoleTerminal {
    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        self.term.write_str(message)?;
        self.term.flush()?;

        if self.term.is_term() {
            return match self.term.read_line() {
                Ok(line) => Ok(Some(line)),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
                Err(e) => Err(e).context("Failed to read input"),
            };
        }

        // Piped input: end of stream must not be mistaken for an empty answer
        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn print(&mut self, text: &str) {
        println!("{text}");
    }
}

/// Asks for the transaction log to process. An empty answer or closed input cancels.
pub fn select_file(terminal: &mut dyn Terminal) -> Result<Option<PathBuf>> {
    let Some(answer) =
        terminal.prompt("Select transaction log (.xlsx, .xls, .csv; empty to cancel): ")?
    else {
        return Ok(None);
    };
    let path = answer.trim().trim_matches(['"', '\'']).trim();
    if path.is_empty() {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(path)))
}
