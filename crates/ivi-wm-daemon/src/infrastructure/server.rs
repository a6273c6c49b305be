//! Unix-socket reactor.
//!
//! The daemon is single-threaded: one current-thread task selects over the
//! compositor notification channel, the listener, and the held connection.
//! At most one client is connected at a time; the listener is polled only
//! while the connection slot is free, so a second client queues in the
//! accept backlog until the first one leaves.
//!
//! Once the held connection turns readable the full exchange
//! (magic → echo → length → body → dispatch → status) runs to completion
//! before the loop selects again. A slow sender therefore stalls
//! notification handling; commands are short and local, so arrival-order
//! processing wins over interleaving here.
//!
//! A preamble that is not the magic aborts the exchange without any
//! response but keeps the connection, letting the client resynchronize and
//! retry. Read errors and EOF free the slot.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use ivi_wm_core::protocol::envelope::{CommandEnvelope, ProtocolError};
use ivi_wm_core::protocol::wire::{self, MAGIC, MAX_BODY_LEN, STATUS_OK};

use crate::application::dispatch::{CommandService, DispatchError};
use crate::infrastructure::compositor::{Compositor, CompositorEvent};
use crate::infrastructure::config::BoundaryErrorPolicy;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("compositor failure escalated by fail-fast policy: {0}")]
    Boundary(#[source] DispatchError),
}

/// The daemon's event loop: listener, at most one held connection, and the
/// notification channel, all driven from a single task.
pub struct ControlServer<C> {
    listener: UnixListener,
    events: UnboundedReceiver<CompositorEvent>,
    service: CommandService<C>,
    policy: BoundaryErrorPolicy,
}

impl<C: Compositor> ControlServer<C> {
    /// Binds the control socket, replacing a stale socket file from a
    /// previous run.
    pub fn bind(
        path: &Path,
        service: CommandService<C>,
        events: UnboundedReceiver<CompositorEvent>,
        policy: BoundaryErrorPolicy,
    ) -> Result<Self, ServerError> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed stale socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ServerError::Bind {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        let listener = UnixListener::bind(path).map_err(|source| ServerError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "control socket listening");

        Ok(Self {
            listener,
            events,
            service,
            policy,
        })
    }

    /// Runs the reactor until a fail-fast boundary error escalates or the
    /// notification channel closes.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let mut conn: Option<UnixStream> = None;

        loop {
            if let Some(stream) = conn.as_mut() {
                let keep = tokio::select! {
                    event = self.events.recv() => {
                        let Some(event) = event else {
                            warn!("notification channel closed, stopping");
                            return Ok(());
                        };
                        self.service.handle_event(event);
                        true
                    }
                    ready = stream.readable() => match ready {
                        Ok(()) => self.serve_exchange(stream).await?,
                        Err(e) => {
                            warn!(error = %e, "connection error");
                            false
                        }
                    }
                };
                if !keep {
                    conn = None;
                }
            } else {
                tokio::select! {
                    event = self.events.recv() => {
                        let Some(event) = event else {
                            warn!("notification channel closed, stopping");
                            return Ok(());
                        };
                        self.service.handle_event(event);
                    }
                    accepted = self.listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            info!("client connected");
                            conn = Some(stream);
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }

    /// One full request cycle. Returns whether the connection stays held.
    async fn serve_exchange(&mut self, stream: &mut UnixStream) -> Result<bool, ServerError> {
        let mut magic = [0u8; 4];
        match stream.read_exact(&mut magic).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                info!("client disconnected");
                return Ok(false);
            }
            Err(e) => {
                warn!(error = %e, "read failed");
                return Ok(false);
            }
        }

        if magic != MAGIC {
            warn!(?magic, "bad magic preamble, exchange dropped");
            return Ok(true);
        }
        if let Err(e) = stream.write_all(&MAGIC).await {
            warn!(error = %e, "magic echo failed");
            return Ok(false);
        }

        let mut len_buf = [0u8; 4];
        if let Err(e) = stream.read_exact(&mut len_buf).await {
            warn!(error = %e, "length read failed");
            return Ok(false);
        }
        let len = wire::decode_len(len_buf);
        if len > MAX_BODY_LEN {
            warn!(len, "body length over limit, closing");
            return Ok(false);
        }

        let mut body = vec![0u8; len as usize];
        if let Err(e) = stream.read_exact(&mut body).await {
            warn!(error = %e, "body read failed");
            return Ok(false);
        }

        let status = self.dispatch_body(&body)?;
        if let Err(e) = stream.write_all(&wire::encode_status(status)).await {
            warn!(error = %e, "status write failed");
            return Ok(false);
        }
        Ok(true)
    }

    /// Parses and executes one body, mapping the outcome to a wire status.
    /// Under the fail-fast policy a compositor rejection escalates instead
    /// of being reported to the client.
    fn dispatch_body(&mut self, body: &[u8]) -> Result<i32, ServerError> {
        let result = std::str::from_utf8(body)
            .map_err(|e| DispatchError::Protocol(ProtocolError::from(e)))
            .and_then(|text| Ok(CommandEnvelope::parse(text)?))
            .and_then(|envelope| self.service.execute(&envelope));

        match result {
            Ok(()) => Ok(STATUS_OK),
            Err(e @ DispatchError::Compositor(_))
                if self.policy == BoundaryErrorPolicy::FailFast =>
            {
                error!(error = %e, "compositor rejected a change, failing fast");
                Err(ServerError::Boundary(e))
            }
            Err(e) => {
                let status = e.status();
                warn!(error = %e, status, "command failed");
                Ok(status)
            }
        }
    }
}
