//! Single-prompt mode.
//!
//! A prompt given with `--single-prompt` wins. Otherwise piped, non-empty
//! standard input is used as the prompt. Without either the CLI serves.

use std::io::{self, IsTerminal, Read, Write};

use anyhow::Result;
use fmgate_runtime::{build_backend, run_single_prompt};

use crate::error::CliError;
use crate::parser::Cli;

/// Read the prompt from stdin when it is piped.
///
/// Returns `None` for an interactive terminal or empty input.
pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    read_prompt_from(stdin.lock())
}

fn read_prompt_from(mut reader: impl Read) -> Result<Option<String>, CliError> {
    let mut buffer = String::new();
    reader.read_to_string(&mut buffer)?;
    Ok(non_empty(buffer))
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decide whether this invocation is a single-prompt run.
pub fn resolve_prompt(
    flag: Option<String>,
    stdin: impl FnOnce() -> Result<Option<String>, CliError>,
) -> Result<Option<String>, CliError> {
    match flag {
        Some(prompt) => Ok(Some(prompt)),
        None => stdin(),
    }
}

/// Run one completion and print it to stdout.
pub async fn execute(cli: &Cli, prompt: &str) -> Result<()> {
    let generation = build_backend(&cli.backend_config()).map_err(CliError::from)?;

    let text = run_single_prompt(generation.as_ref(), prompt, cli.instructions.clone())
        .await
        .map_err(CliError::from)?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}").map_err(CliError::from)?;
    stdout.flush().map_err(CliError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_piped_input_becomes_prompt() {
        let prompt = read_prompt_from("What is Rust?\n".as_bytes()).unwrap();
        assert_eq!(prompt.as_deref(), Some("What is Rust?\n"));
    }

    #[test]
    fn test_blank_piped_input_is_ignored() {
        assert!(read_prompt_from(" \n\n".as_bytes()).unwrap().is_none());
        assert!(read_prompt_from(io::empty()).unwrap().is_none());
    }

    #[test]
    fn test_flag_wins_over_stdin() {
        let prompt = resolve_prompt(Some("from flag".into()), || {
            panic!("stdin must not be read when the flag is given")
        })
        .unwrap();
        assert_eq!(prompt.as_deref(), Some("from flag"));

        let prompt = resolve_prompt(None, || Ok(Some("piped".into()))).unwrap();
        assert_eq!(prompt.as_deref(), Some("piped"));
    }

    #[tokio::test]
    async fn test_execute_with_echo_backend() {
        let cli = Cli::try_parse_from(["fmgate", "-s", "ping"]).unwrap();
        tokio_test::assert_ok!(execute(&cli, "ping").await);
    }

    #[tokio::test]
    async fn test_empty_prompt_exits_with_usage_code() {
        let cli = Cli::try_parse_from(["fmgate"]).unwrap();
        let err = execute(&cli, "   ").await.unwrap_err();
        assert_eq!(crate::error::exit_code_for(&err), 2);
    }
}
