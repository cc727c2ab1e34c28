//! Line-at-a-time command reader, so several commands share one in-memory
//! session instead of each starting from a fresh roster.

use std::io::BufRead;

use anyhow::Context;
use clap::Parser;
use thiserror::Error;

use crate::{run_command, Commands, Session};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),

    #[error("line ends with an escape")]
    TrailingEscape,
}

/// One shell line parsed as a subcommand.
#[derive(Parser)]
#[command(name = "shell", no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Commands,
}

/// Splits a line on whitespace. Single and double quotes group words, and a
/// backslash outside single quotes takes the next character literally.
pub fn split_line(line: &str) -> Result<Vec<String>, SplitError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => {
                current.push(chars.next().ok_or(SplitError::TrailingEscape)?);
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(SplitError::UnterminatedQuote(q));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Runs every line of `input` against `session` until EOF or `exit`.
/// Bad lines and failed commands are reported and skipped.
pub(crate) async fn run<R: BufRead>(session: &mut Session, input: R) -> anyhow::Result<()> {
    let mut executed = 0;

    for line in input.lines() {
        let line = line.context("failed to read command")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let words = match split_line(line) {
            Ok(words) => words,
            Err(err) => {
                println!("error: {err}");
                continue;
            }
        };
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(err) => {
                let _ = err.print();
                continue;
            }
        };

        if let Err(err) = run_command(session, parsed.command).await {
            println!("error: {err:#}");
        }
        executed += 1;
    }

    tracing::info!("Shell finished after {} commands", executed);
    Ok(())
}
