//! Server-initiated tickles.
//!
//! Every tickle interval the server sends a 16-byte Tickle request so the
//! client knows the session is alive. A tickle is never sent to a sleeping
//! or disconnected client, and never while another write holds the
//! transport; skipped tickles count as success.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::session::{SessionShared, SessionState};
use crate::core::{SendMode, Transport};
use crate::transport::DsiHeader;

/// Why a tickle was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Client is sleeping.
    Sleeping,
    /// Peer already declared gone.
    Disconnected,
    /// Another frame is being written.
    InWrite,
    /// Session is not open.
    NotActive,
}

/// Result of one tickle attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickleOutcome {
    /// Tickle frame written with this request ID.
    Sent(u16),
    /// Nothing written.
    Skipped(SkipReason),
}

/// Sends tickles on behalf of one session.
pub struct LivenessProber<T> {
    shared: Arc<SessionShared<T>>,
}

impl<T: Transport> LivenessProber<T> {
    pub(crate) fn new(shared: Arc<SessionShared<T>>) -> Self {
        Self { shared }
    }

    /// Send one tickle if the session allows it.
    ///
    /// The send never waits on a full socket; a `WouldBlock` is returned as
    /// an error and the next interval tries again.
    pub async fn tickle(&self) -> io::Result<TickleOutcome> {
        match self.shared.state() {
            SessionState::Active => {}
            SessionState::Sleeping => return Ok(TickleOutcome::Skipped(SkipReason::Sleeping)),
            _ => return Ok(TickleOutcome::Skipped(SkipReason::NotActive)),
        }
        if self.shared.is_disconnected() {
            return Ok(TickleOutcome::Skipped(SkipReason::Disconnected));
        }

        let Ok(mut guard) = self.shared.writer.try_lock() else {
            return Ok(TickleOutcome::Skipped(SkipReason::InWrite));
        };
        let Some(transport) = guard.as_mut() else {
            return Ok(TickleOutcome::Skipped(SkipReason::NotActive));
        };

        let id = self.shared.next_server_id();
        transport
            .send(&DsiHeader::tickle(id).to_bytes(), SendMode::NoWait)
            .await?;
        Ok(TickleOutcome::Sent(id))
    }

    /// Run [`tickle`](Self::tickle) every `interval` until the session closes.
    ///
    /// A zero interval disables tickles; the task exits at once.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            if interval.is_zero() {
                warn!("zero tickle interval, tickles disabled");
                return;
            }

            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if matches!(
                    self.shared.state(),
                    SessionState::Closing | SessionState::Closed
                ) {
                    break;
                }

                match self.tickle().await {
                    Ok(TickleOutcome::Sent(id)) => trace!(request_id = id, "tickle sent"),
                    Ok(TickleOutcome::Skipped(reason)) => debug!(?reason, "tickle skipped"),
                    Err(e) => warn!(error = %e, "tickle failed"),
                }
            }
        })
    }
}

impl<T> std::fmt::Debug for LivenessProber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessProber")
            .field("state", &self.shared.state())
            .finish()
    }
}
