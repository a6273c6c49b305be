//! Daemon entry point.
//!
//! Wires the pieces together on a current-thread runtime:
//!
//! ```text
//! main()
//!  └─ Settings::load()          -- TOML settings (socket path, policy)
//!  └─ CommandService::new()     -- layout store + headless backend
//!       └─ load_document()      -- optional -c/--config layout JSON
//!  └─ ControlServer::bind()     -- unix socket reactor
//!       └─ run()                -- select loop until shutdown
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ivi_wm_daemon::application::dispatch::CommandService;
use ivi_wm_daemon::infrastructure::compositor::HeadlessCompositor;
use ivi_wm_daemon::infrastructure::config::Settings;
use ivi_wm_daemon::infrastructure::server::ControlServer;

#[derive(Debug, Parser)]
#[command(name = "ivi-wm", about = "IVI window-layout control daemon")]
struct Args {
    /// Initial layout document (JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Daemon settings file (TOML)
    #[arg(long = "settings", value_name = "FILE")]
    settings: Option<PathBuf>,
}

// The daemon is deliberately single-threaded; the reactor assumes no
// concurrent access to the layout store.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.settings.as_deref())?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    info!("ivi-wm starting");

    let local_host = match hostname::get() {
        Ok(h) => h.to_string_lossy().into_owned(),
        Err(e) => {
            warn!(error = %e, "could not resolve local hostname");
            String::new()
        }
    };

    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let compositor = HeadlessCompositor::with_events(vec![0], event_tx);
    let mut service = CommandService::new(compositor, local_host);

    // A broken or non-matching layout document is a warning, not a fatal
    // error; the daemon comes up empty and waits for commands.
    if let Some(path) = &args.config {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                if let Err(e) = service.load_document(&text) {
                    warn!(error = %e, path = %path.display(), "layout document not applied");
                }
            }
            Err(e) => warn!(error = %e, path = %path.display(), "layout document not readable"),
        }
    }
    if service.is_empty() {
        service.populate_from_compositor();
    }

    let server = ControlServer::bind(
        &settings.socket_path,
        service,
        event_rx,
        settings.on_compositor_error,
    )?;
    server.run().await?;

    info!("ivi-wm stopped");
    Ok(())
}
