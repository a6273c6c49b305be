//! Command-line sender for the layout daemon.
//!
//! Reads a JSON command file, frames it onto the control socket
//! (magic, 4-byte big-endian length, body), and prints the status reply.
//! Exits non-zero when the daemon reports a failure, so the tool composes
//! with shell scripts.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ivi_wm_core::protocol::wire::{encode_len, MAGIC, STATUS_OK};

#[derive(Debug, Parser)]
#[command(name = "ivi-wm-sendcmd", about = "Send a layout command to ivi-wm")]
struct Args {
    /// JSON command file to send
    #[arg(short = 'c', long = "path", value_name = "FILE")]
    path: PathBuf,

    /// Control socket of the daemon
    #[arg(long = "socket", value_name = "PATH", default_value = "/tmp/ivi-wm.sock")]
    socket: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let text = std::fs::read_to_string(&args.path)
        .with_context(|| format!("reading command file {}", args.path.display()))?;
    // Re-serialize compactly; this also rejects invalid JSON before it
    // ever reaches the daemon.
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", args.path.display()))?;
    let body = serde_json::to_vec(&value)?;

    let mut stream = UnixStream::connect(&args.socket)
        .await
        .with_context(|| format!("connecting to {}", args.socket.display()))?;

    stream.write_all(&MAGIC).await?;
    let mut echo = [0u8; 4];
    stream
        .read_exact(&mut echo)
        .await
        .context("reading magic echo")?;
    if echo != MAGIC {
        bail!("daemon did not echo the magic preamble");
    }
    debug!("magic exchange done");

    stream.write_all(&encode_len(body.len() as u32)).await?;
    stream.write_all(&body).await?;

    let mut status = [0u8; 4];
    stream
        .read_exact(&mut status)
        .await
        .context("reading status reply")?;
    let status = i32::from_be_bytes(status);
    println!("status: {status}");

    if status != STATUS_OK {
        bail!("daemon reported failure ({status})");
    }
    Ok(())
}
