//! DSI session lifecycle.
//!
//! A [`Session`] owns one connection's transport, receive buffer and
//! negotiated parameters, and is the only place session state changes:
//!
//! ```text
//! Opening ──open──▶ Active ◀──sleep/wake──▶ Sleeping
//!    │                 │                       │
//!    └────────────── close ────────────────────┘
//!                      ▼
//!               Closing ──▶ Closed
//! ```
//!
//! `disconnected` is an orthogonal flag set from Active or Sleeping when the
//! peer is known to be gone. Sleeping or disconnected sessions get no
//! server-initiated frames: no tickles and no close handshake.
//!
//! The transport sits behind an async mutex. Holding that lock is the
//! in-write guard: replies wait for it, tickles skip when it is taken.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::negotiation::OptionNegotiator;
use super::tickle::LivenessProber;
use crate::core::constants::{DSI_DEFQUANT, DSIERR_OK};
use crate::core::{DsiConfig, DsiError, DsiResult, SendMode, Transport};
use crate::transport::{DsiHeader, Frame, ReceiveBuffer};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Created, OpenSession not yet processed.
    Opening = 0,
    /// Session open, requests flowing.
    Active = 1,
    /// Client asked the server to let it sleep.
    Sleeping = 2,
    /// Close in progress.
    Closing = 3,
    /// Terminal.
    Closed = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Opening,
            1 => Self::Active,
            2 => Self::Sleeping,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Active => "active",
            Self::Sleeping => "sleeping",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state shared with the liveness prober task.
#[derive(Debug)]
pub(crate) struct SessionShared<T> {
    state: AtomicU8,
    disconnected: AtomicBool,
    server_id: AtomicU16,
    pub(crate) writer: Mutex<Option<T>>,
}

impl<T> SessionShared<T> {
    fn new(transport: T) -> Self {
        Self {
            state: AtomicU8::new(SessionState::Opening as u8),
            disconnected: AtomicBool::new(false),
            server_id: AtomicU16::new(0),
            writer: Mutex::new(Some(transport)),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Current server request ID, advancing the counter (wraps at 2^16).
    pub(crate) fn next_server_id(&self) -> u16 {
        self.server_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// One DSI session.
#[derive(Debug)]
pub struct Session<T: Transport> {
    shared: Arc<SessionShared<T>>,
    config: DsiConfig,
    buffer: Option<ReceiveBuffer>,
    attention_quantum: u32,
    server_quantum: u32,
    last_received: Instant,
    prober: Option<JoinHandle<()>>,
}

impl<T: Transport> Session<T> {
    /// Create a session in the Opening state.
    pub fn new(transport: T, config: DsiConfig) -> Self {
        Self {
            shared: Arc::new(SessionShared::new(transport)),
            config,
            buffer: None,
            attention_quantum: DSI_DEFQUANT,
            server_quantum: 0,
            last_received: Instant::now(),
            prober: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Whether the peer has been declared gone.
    pub fn is_disconnected(&self) -> bool {
        self.shared.is_disconnected()
    }

    /// Attention quantum sent by the client.
    pub fn attention_quantum(&self) -> u32 {
        self.attention_quantum
    }

    /// Server quantum advertised to the client.
    pub fn server_quantum(&self) -> u32 {
        self.server_quantum
    }

    /// Session configuration.
    pub fn config(&self) -> &DsiConfig {
        &self.config
    }

    /// Receive buffer; present between open and close.
    pub fn buffer(&self) -> Option<&ReceiveBuffer> {
        self.buffer.as_ref()
    }

    /// Mutable receive buffer.
    pub fn buffer_mut(&mut self) -> Option<&mut ReceiveBuffer> {
        self.buffer.as_mut()
    }

    /// Current server request ID, advancing the counter.
    pub fn next_server_id(&self) -> u16 {
        self.shared.next_server_id()
    }

    fn invalid(&self, operation: &'static str) -> DsiError {
        match self.state() {
            SessionState::Closed => DsiError::Closed,
            state => DsiError::InvalidState {
                operation,
                state: state.as_str(),
            },
        }
    }

    /// Process the client's OpenSession request.
    ///
    /// Provisions the receive buffer, switches the transport to non-blocking
    /// mode, negotiates options and sends the reply. Any failure closes the
    /// transport without a reply and leaves the session Closed.
    pub async fn open(&mut self, request: &Frame) -> DsiResult<()> {
        if self.state() != SessionState::Opening {
            return Err(self.invalid("open"));
        }

        match self.try_open(request).await {
            Ok(()) => {
                self.last_received = Instant::now();
                self.shared.set_state(SessionState::Active);
                debug!(
                    request_id = request.header.request_id,
                    attention_quantum = self.attention_quantum,
                    server_quantum = self.server_quantum,
                    "session open"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "OpenSession failed, dropping connection");
                self.abort().await;
                Err(e)
            }
        }
    }

    async fn try_open(&mut self, request: &Frame) -> DsiResult<()> {
        // Size the buffer from the quantum the client will be told.
        let limits = &self.config.quantum_limits;
        let quantum = limits.or_default(limits.clamp(self.config.server_quantum));
        let buffer = ReceiveBuffer::provision(self.config.read_buffer_units, quantum, limits)?;
        self.buffer = Some(buffer);

        let negotiation =
            OptionNegotiator::from_config(&self.config).negotiate(&request.payload, quantum)?;

        let mut guard = self.shared.writer.lock().await;
        let transport = guard.as_mut().ok_or(DsiError::Closed)?;
        transport.set_nonblocking(true)?;

        if let Some(quantum) = negotiation.peer.attention_quantum {
            self.attention_quantum = quantum;
        }
        self.server_quantum = negotiation.server_quantum;

        let reply = Frame::new(
            DsiHeader::reply_to(&request.header, DSIERR_OK),
            negotiation.reply_block,
        );
        transport.send(&reply.encode(), SendMode::Wait).await?;
        Ok(())
    }

    /// Close the transport and release everything without a handshake.
    async fn abort(&mut self) {
        self.shared.set_state(SessionState::Closing);
        let transport = self.shared.writer.lock().await.take();
        if let Some(mut transport) = transport {
            if let Err(e) = transport.close().await {
                debug!(error = %e, "transport close failed");
            }
        }
        self.release();
    }

    fn release(&mut self) {
        if let Some(prober) = self.prober.take() {
            prober.abort();
        }
        self.buffer = None;
        self.shared.set_state(SessionState::Closed);
    }

    /// Send a reply to `request` with an error code and payload.
    ///
    /// Waits for any in-flight write, then holds the in-write guard for the
    /// whole frame. A payload too long for the header's length field is
    /// rejected before anything is written.
    pub async fn send_reply(&self, request: &DsiHeader, code: u32, payload: Vec<u8>) -> DsiResult<()> {
        match self.state() {
            SessionState::Active | SessionState::Sleeping => {}
            _ => return Err(self.invalid("send_reply")),
        }

        let frame = Frame::try_new(DsiHeader::reply_to(request, code), payload)?;
        let mut guard = self.shared.writer.lock().await;
        let transport = guard.as_mut().ok_or(DsiError::Closed)?;
        transport.send(&frame.encode(), SendMode::Wait).await?;
        Ok(())
    }

    /// Record inbound traffic; a sleeping client that talks is awake again.
    pub fn on_frame_received(&mut self) {
        self.last_received = Instant::now();
        if self.state() == SessionState::Sleeping {
            debug!("client activity, leaving sleep");
            self.shared.set_state(SessionState::Active);
        }
    }

    /// Time of the last inbound frame.
    pub fn last_received(&self) -> Instant {
        self.last_received
    }

    /// Whether the client has been silent longer than the idle timeout.
    ///
    /// Sleeping clients are exempt.
    pub fn is_timed_out(&self) -> bool {
        self.state() == SessionState::Active
            && self.last_received.elapsed() >= self.config.idle_timeout()
    }

    /// Enter sleep.
    pub fn sleep(&mut self) -> DsiResult<()> {
        if self.state() != SessionState::Active {
            return Err(self.invalid("sleep"));
        }
        debug!("session sleeping");
        self.shared.set_state(SessionState::Sleeping);
        Ok(())
    }

    /// Leave sleep.
    pub fn wake(&mut self) -> DsiResult<()> {
        if self.state() != SessionState::Sleeping {
            return Err(self.invalid("wake"));
        }
        debug!("session awake");
        self.last_received = Instant::now();
        self.shared.set_state(SessionState::Active);
        Ok(())
    }

    /// Declare the peer gone.
    pub fn mark_disconnected(&mut self) -> DsiResult<()> {
        match self.state() {
            SessionState::Active | SessionState::Sleeping => {
                info!("peer disconnected");
                self.shared.disconnected.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(self.invalid("mark_disconnected")),
        }
    }

    /// A prober sharing this session's transport and state.
    pub fn prober(&self) -> LivenessProber<T> {
        LivenessProber::new(Arc::clone(&self.shared))
    }

    /// Start periodic tickles at the configured interval.
    ///
    /// The task stops when the session closes.
    pub fn start_prober(&mut self) -> DsiResult<()> {
        if self.state() != SessionState::Active {
            return Err(self.invalid("start_prober"));
        }
        self.config.validate()?;
        if self.prober.is_none() {
            self.prober = Some(self.prober().spawn(self.config.tickle_interval));
        }
        Ok(())
    }

    /// Close the session.
    ///
    /// Active sessions get a close request frame followed by the transport
    /// close hook. Sleeping, disconnected or never-opened sessions skip both.
    /// Resources are released exactly once on every path; the first send or
    /// close error is returned after release. Closing a closed session is a
    /// no-op.
    pub async fn close(&mut self) -> DsiResult<()> {
        let state = self.state();
        if state == SessionState::Closed {
            return Ok(());
        }

        let handshake = state == SessionState::Active && !self.is_disconnected();
        self.shared.set_state(SessionState::Closing);

        // A tickle still being written finishes before the prober goes away.
        let transport = {
            let mut guard = self.shared.writer.lock().await;
            if let Some(prober) = self.prober.take() {
                prober.abort();
            }
            guard.take()
        };
        let mut result = Ok(());
        match transport {
            Some(mut transport) if handshake => {
                let id = self.shared.next_server_id();
                let frame = DsiHeader::close(id).to_bytes();
                if let Err(e) = transport.send(&frame, SendMode::Wait).await {
                    warn!(error = %e, request_id = id, "failed to send close");
                    result = Err(e.into());
                }
                if let Err(e) = transport.close().await {
                    warn!(error = %e, "transport close failed");
                    if result.is_ok() {
                        result = Err(e.into());
                    }
                }
                debug!(request_id = id, "session closed");
            }
            Some(_) => {
                debug!(state = %state, disconnected = self.is_disconnected(), "session released without handshake");
            }
            None => {}
        }

        self.release();
        result
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(prober) = self.prober.take() {
            prober.abort();
        }
        self.shared.set_state(SessionState::Closed);
    }
}
