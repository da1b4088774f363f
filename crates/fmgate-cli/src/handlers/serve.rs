//! Server mode: serve until Ctrl-C / SIGTERM, then drain.

use anyhow::Result;
use fmgate_runtime::{build_backend, serve_until_signal};
use tracing::info;

use crate::error::CliError;
use crate::parser::Cli;

pub async fn execute(cli: &Cli) -> Result<()> {
    let generation = build_backend(&cli.backend_config()).map_err(CliError::from)?;

    info!(
        backend = ?cli.backend,
        streaming = !cli.no_streaming,
        "Starting fmgate on {}:{}",
        cli.host,
        cli.port
    );

    serve_until_signal(cli.server_config(), generation, cli.proxy_config())
        .await
        .map_err(CliError::from)?;
    Ok(())
}
