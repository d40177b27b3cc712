//! `protogen generate`: run one plugin the way `protoc` would.
//!
//! Reads a binary `CodeGeneratorRequest`, runs the plugin in its sandbox and
//! writes the binary `CodeGeneratorResponse`. Both are forwarded byte for
//! byte; they are decoded only for input checks and the summary line.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use protogen_core::sandbox::protocol;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::Context;
use crate::output;

#[derive(Args)]
pub struct GenerateArgs {
    /// Plugin coordinate, e.g. `protocolbuffers/go:latest`
    pub plugin: String,

    /// Read the request from this file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Write the response to this file instead of stdout
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,

    /// Print the generation counters to stderr when done
    #[arg(long)]
    pub metrics: bool,
}

pub async fn execute(args: GenerateArgs, ctx: &Context) -> Result<()> {
    let payload = read_input(args.input.as_ref()).await?;
    protocol::decode_request(&payload).context("Input is not a valid CodeGeneratorRequest")?;

    let runtime = ctx.runtime().await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            output::print_warning("Interrupted, stopping plugin");
            on_signal.cancel();
        }
    });

    let result = runtime
        .orchestrator
        .generate(&args.plugin, &payload, &cancel)
        .await;
    signal.abort();
    let bytes = result?;
    // Already validated by the executor.
    let response =
        protocol::decode_response(&bytes).context("Plugin returned a malformed response")?;

    if let Some(error) = &response.error {
        output::print_warning(&format!("Plugin reported an error: {error}"));
    }
    write_output(args.output.as_ref(), &bytes).await?;

    if args.metrics {
        eprint!("{}", runtime.metrics.render());
    }
    if args.output.is_some() {
        output::print_success(&format!(
            "{} generated {} file(s)",
            args.plugin,
            response.file.len()
        ));
    }
    Ok(())
}

async fn read_input(path: Option<&PathBuf>) -> Result<Vec<u8>> {
    match path {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read request from stdin")?;
            Ok(buf)
        }
    }
}

async fn write_output(path: Option<&PathBuf>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(bytes).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
