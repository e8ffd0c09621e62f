//! OpenSession option negotiation.
//!
//! The client's option block is decoded in full before anything is applied,
//! so a malformed block leaves session parameters untouched. The server
//! always answers with exactly two options: its request quantum, bounded to
//! the configured limits, and the replay cache size. A client-supplied
//! server quantum is read but never honored; some AppleShare clients
//! misbehave if the server echoes back a maximum quantum.

use tracing::{debug, error};

use crate::core::{DsiConfig, FrameError, QuantumLimits};
use crate::transport::{DsiOption, OptionTag, decode_options, encode_options};

/// Options the client sent that the server cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerOptions {
    /// Attention quantum, if the client sent one.
    pub attention_quantum: Option<u32>,
    /// Server quantum the client asked for (ignored).
    pub requested_server_quantum: Option<u32>,
}

/// Result of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    /// Parameters read from the client.
    pub peer: PeerOptions,
    /// Server quantum advertised in the reply.
    pub server_quantum: u32,
    /// Encoded reply option block.
    pub reply_block: Vec<u8>,
}

/// Builds the server side of an OpenSession exchange.
#[derive(Debug, Clone, Copy)]
pub struct OptionNegotiator {
    limits: QuantumLimits,
    replay_cache_size: u32,
}

impl OptionNegotiator {
    /// Create a negotiator.
    pub fn new(limits: QuantumLimits, replay_cache_size: u32) -> Self {
        Self {
            limits,
            replay_cache_size,
        }
    }

    /// Create a negotiator from configuration.
    pub fn from_config(config: &DsiConfig) -> Self {
        Self::new(config.quantum_limits, config.replay_cache_size)
    }

    /// Decode the client's option block.
    pub fn parse_peer_options(&self, block: &[u8]) -> Result<PeerOptions, FrameError> {
        let options = decode_options(block).inspect_err(|e| {
            error!(error = %e, "rejecting OpenSession options");
        })?;

        let mut peer = PeerOptions::default();
        for option in &options {
            match option.tag {
                OptionTag::AttentionQuantum => peer.attention_quantum = option.as_u32(),
                OptionTag::ServerQuantum => peer.requested_server_quantum = option.as_u32(),
                OptionTag::ReplayCacheSize | OptionTag::Unknown(_) => {
                    debug!(tag = option.tag.as_byte(), "ignoring OpenSession option");
                }
            }
        }
        Ok(peer)
    }

    /// The two options the server always sends back.
    pub fn server_options(&self, server_quantum: u32) -> [DsiOption; 2] {
        [
            DsiOption::from_u32(OptionTag::ServerQuantum, self.limits.clamp(server_quantum)),
            DsiOption::from_u32(OptionTag::ReplayCacheSize, self.replay_cache_size),
        ]
    }

    /// Decode the client's block and build the reply block.
    pub fn negotiate(&self, block: &[u8], server_quantum: u32) -> Result<Negotiation, FrameError> {
        let peer = self.parse_peer_options(block)?;
        let server_quantum = self.limits.clamp(server_quantum);
        let reply_block = encode_options(&self.server_options(server_quantum));

        Ok(Negotiation {
            peer,
            server_quantum,
            reply_block,
        })
    }
}
