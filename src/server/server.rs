//! DSI server over TCP.
//!
//! Accepts connections, runs the OpenSession/GetStatus bootstrap and then
//! drives one [`Session`] per connection, handing AFP commands and writes
//! to a [`RequestHandler`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use super::session::{Session, SessionState};
use crate::core::constants::{DSIERR_OK, DSIERR_TOOMANY};
use crate::core::{DsiConfig, DsiError, DsiResult, SendMode, Transport};
use crate::transport::{
    Command, DsiHeader, Frame, FrameKind, FrameReader, TcpTransport, read_bootstrap_frame,
};

/// Errors that can occur in the DSI server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] DsiError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Answer produced by a [`RequestHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    /// Error code placed in the reply header.
    pub code: u32,
    /// Reply payload.
    pub payload: Vec<u8>,
    /// Put the session to sleep once the reply is sent.
    pub sleep: bool,
}

impl Reply {
    /// Successful reply.
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            code: DSIERR_OK,
            payload,
            sleep: false,
        }
    }

    /// Error reply without payload.
    pub fn error(code: u32) -> Self {
        Self {
            code,
            payload: Vec::new(),
            sleep: false,
        }
    }

    /// Mark the reply as the client's sleep request.
    pub fn and_sleep(mut self) -> Self {
        self.sleep = true;
        self
    }
}

/// Application layer above DSI.
pub trait RequestHandler: Send + Sync + 'static {
    /// Server status block returned for GetStatus.
    fn status(&self) -> Vec<u8>;

    /// Handle a Command or Write request.
    fn handle(&self, request: &Frame) -> impl Future<Output = Reply> + Send;
}

/// A DSI server bound to a TCP listener.
pub struct DsiServer<H> {
    config: DsiConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<H>,
    sessions: Arc<Semaphore>,
}

impl<H: RequestHandler> DsiServer<H> {
    /// Bind to `config.bind_addr`.
    pub async fn bind(config: DsiConfig, handler: H) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| ServerError::BindFailed(format!("{}: {e}", config.bind_addr)))?;
        let local_addr = listener.local_addr()?;
        let sessions = Arc::new(Semaphore::new(config.max_sessions));

        info!(%local_addr, max_sessions = config.max_sessions, "DSI server listening");

        Ok(Self {
            config,
            listener,
            local_addr,
            handler: Arc::new(handler),
            sessions,
        })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the server configuration.
    pub fn config(&self) -> &DsiConfig {
        &self.config
    }

    /// Number of sessions currently open.
    pub fn session_count(&self) -> usize {
        self.config.max_sessions - self.sessions.available_permits()
    }

    /// Accept connections until `shutdown` completes or accept fails.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("DSI server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    self.spawn_connection(stream, peer);
                }
            }
        }
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<(), ServerError> {
        self.serve(std::future::pending()).await
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let config = self.config.clone();
        let handler = Arc::clone(&self.handler);
        let sessions = Arc::clone(&self.sessions);

        tokio::spawn(
            async move {
                if let Err(e) = serve_connection(stream, config, handler, sessions).await {
                    debug!(error = %e, "connection ended with error");
                }
            }
            .instrument(info_span!("dsi", %peer)),
        );
    }
}

impl<H> std::fmt::Debug for DsiServer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsiServer")
            .field("local_addr", &self.local_addr)
            .field("config", &self.config)
            .finish()
    }
}

async fn serve_connection<H: RequestHandler>(
    stream: TcpStream,
    config: DsiConfig,
    handler: Arc<H>,
    sessions: Arc<Semaphore>,
) -> DsiResult<()> {
    let (mut reader, mut transport) = TcpTransport::split(stream)?;

    let Some(request) = read_bootstrap_frame(reader.get_mut()).await? else {
        debug!("peer closed before first frame");
        return Ok(());
    };

    match (request.header.kind, request.header.command) {
        (FrameKind::Request, Command::GetStatus) => {
            debug!("status request");
            let reply =
                Frame::try_new(DsiHeader::reply_to(&request.header, DSIERR_OK), handler.status())?;
            transport.send(&reply.encode(), SendMode::Wait).await?;
            transport.close().await?;
            return Ok(());
        }
        (FrameKind::Request, Command::OpenSession) => {}
        (kind, command) => {
            warn!(?kind, ?command, "unexpected bootstrap frame");
            transport.close().await?;
            return Ok(());
        }
    }

    let Ok(_permit) = sessions.try_acquire_owned() else {
        warn!("session limit reached");
        let reply = Frame::empty(DsiHeader::reply_to(&request.header, DSIERR_TOOMANY));
        transport.send(&reply.encode(), SendMode::Wait).await?;
        transport.close().await?;
        return Ok(());
    };

    let mut session = Session::new(transport, config);
    session.open(&request).await?;
    session.start_prober()?;
    info!("session opened");

    let result = run_session(&mut session, &mut reader, handler.as_ref()).await;
    if let Err(e) = &result {
        warn!(error = %e, "session ended with error");
    }
    if let Err(e) = session.close().await {
        debug!(error = %e, "close failed");
    }
    info!("session closed");
    result
}

/// Read and dispatch frames until the session should be closed.
///
/// Returns `Ok(())` for the client's Close, a clean end of stream or an
/// idle timeout; the last two mark the session disconnected. The caller
/// closes the session afterwards in every case.
pub async fn run_session<T, R, H>(
    session: &mut Session<T>,
    reader: &mut FrameReader<R>,
    handler: &H,
) -> DsiResult<()>
where
    T: Transport,
    R: AsyncRead + Unpin,
    H: RequestHandler,
{
    loop {
        let deadline = (session.state() == SessionState::Active)
            .then(|| session.last_received() + session.config().idle_timeout());
        let buffer = session.buffer_mut().ok_or(DsiError::Closed)?;

        let read = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, reader.read_frame(buffer)).await {
                    Ok(read) => read,
                    Err(_) => {
                        info!("client silent past idle timeout");
                        session.mark_disconnected()?;
                        return Ok(());
                    }
                }
            }
            None => reader.read_frame(buffer).await,
        };

        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("peer closed connection");
                session.mark_disconnected()?;
                return Ok(());
            }
            Err(DsiError::Transport(e)) => {
                session.mark_disconnected()?;
                return Err(e.into());
            }
            Err(e) => {
                error!(error = %e, "bad frame from client");
                return Err(e);
            }
        };
        session.on_frame_received();

        if frame.header.kind == FrameKind::Reply {
            trace!(command = ?frame.header.command, request_id = frame.header.request_id, "client reply");
            continue;
        }

        match frame.header.command {
            Command::Tickle => trace!("tickle from client"),
            Command::Close => {
                debug!("client closed session");
                return Ok(());
            }
            Command::Command | Command::Write => {
                let reply = handler.handle(&frame).await;
                session
                    .send_reply(&frame.header, reply.code, reply.payload)
                    .await?;
                if reply.sleep {
                    session.sleep()?;
                }
            }
            Command::Attention | Command::OpenSession | Command::GetStatus => {
                warn!(command = ?frame.header.command, "ignoring request");
            }
        }
    }
}
