//! fmgate command-line library.
//!
//! `main.rs` is the composition root; everything it wires lives here so it
//! can be tested.

#![deny(unsafe_code)]

pub mod error;
pub mod handlers;
pub mod logging;
pub mod parser;

pub use error::{CliError, exit_code_for};
pub use parser::{BackendArg, Cli};

/// Run the CLI: one prompt when given (flag or piped stdin), otherwise serve.
///
/// # Errors
///
/// Returns a [`CliError`] (possibly wrapped in context) describing what failed.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let prompt = handlers::prompt::resolve_prompt(
        cli.single_prompt.clone(),
        handlers::prompt::read_piped_stdin,
    )?;

    logging::init_logging(cli.verbose, prompt.is_some());

    match prompt {
        Some(prompt) => handlers::prompt::execute(&cli, &prompt).await,
        None => handlers::serve::execute(&cli).await,
    }
}
