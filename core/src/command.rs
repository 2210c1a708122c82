//! The three operations that can be run against the stored entry.

use std::fmt;
use std::io::{Cursor, Read, Write};
use std::str::FromStr;

use zpdb_utils_stream::StreamError;
use zpdb_utils_stream::read_to_end;
use zpdb_utils_stream::transfer;

use crate::ZpdbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Copy the entry to standard output.
    Print,
    /// Replace the entry with standard input.
    Write,
    /// Add standard input after the existing entry bytes.
    Append,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::Print, Command::Write, Command::Append];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Print => "print",
            Command::Write => "write",
            Command::Append => "append",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Print => "prints the content of file.txt",
            Command::Write => "writes stdin to file.txt",
            Command::Append => "appends stdin to file.txt",
        }
    }

    /// Whether running the command produces new entry bytes to commit.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Command::Print)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ZpdbError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.as_str() == token)
            .ok_or_else(|| ZpdbError::Usage(token.to_string()))
    }
}

/// Result of running a command against the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    /// The entry must be replaced with these bytes.
    Replace(Vec<u8>),
}

/// Run `command` against `entry`, reading from `input` and writing to
/// `output`. Nothing is committed here; a [`Outcome::Replace`] is the
/// caller's to persist.
pub fn execute(
    command: Command,
    entry: Vec<u8>,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<Outcome, StreamError> {
    match command {
        Command::Print => {
            transfer(&mut Cursor::new(entry), output)?;
            Ok(Outcome::Unchanged)
        }
        Command::Write => Ok(Outcome::Replace(read_to_end(input)?)),
        Command::Append => {
            let mut bytes = entry;
            transfer(input, &mut bytes)?;
            Ok(Outcome::Replace(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(command: Command, entry: &[u8], input: &[u8]) -> (Outcome, Vec<u8>) {
        let mut output = Vec::new();
        let outcome = execute(
            command,
            entry.to_vec(),
            &mut Cursor::new(input.to_vec()),
            &mut output,
        )
        .unwrap();
        (outcome, output)
    }

    #[test]
    fn parses_known_tokens() {
        assert_eq!("print".parse::<Command>().unwrap(), Command::Print);
        assert_eq!("write".parse::<Command>().unwrap(), Command::Write);
        assert_eq!("append".parse::<Command>().unwrap(), Command::Append);
    }

    #[test]
    fn unknown_token_is_a_usage_error() {
        let err = "delete".parse::<Command>().unwrap_err();
        assert!(matches!(err, ZpdbError::Usage(token) if token == "delete"));
    }

    #[test]
    fn print_copies_entry_and_ignores_input() {
        let (outcome, output) = run(Command::Print, b"stored", b"ignored");
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(output, b"stored");
    }

    #[test]
    fn write_replaces_entry_entirely() {
        let (outcome, output) = run(Command::Write, b"a much longer old value", b"new");
        assert_eq!(outcome, Outcome::Replace(b"new".to_vec()));
        assert!(output.is_empty());
    }

    #[test]
    fn append_keeps_existing_bytes_first() {
        let (outcome, _) = run(Command::Append, b"A", b"B");
        assert_eq!(outcome, Outcome::Replace(b"AB".to_vec()));
    }

    #[test]
    fn write_with_empty_input_clears_entry() {
        let (outcome, _) = run(Command::Write, b"old", b"");
        assert_eq!(outcome, Outcome::Replace(Vec::new()));
    }
}
