//! Session and server configuration.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use super::constants::{
    DSI_READ_BUFFER_UNITS, DSI_SERVQUANT_DEF, DSI_SERVQUANT_MAX, DSI_SERVQUANT_MIN,
    REPLAYCACHE_SIZE, TICKLE_INTERVAL, TICKLE_TIMEOUT,
};
use super::error::DsiError;

/// Bounds on the server quantum advertised at session open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantumLimits {
    /// Smallest acceptable quantum.
    pub min: u32,
    /// Largest acceptable quantum.
    pub max: u32,
    /// Substitute for a missing or out-of-bounds quantum.
    pub default: u32,
}

impl Default for QuantumLimits {
    fn default() -> Self {
        Self {
            min: DSI_SERVQUANT_MIN,
            max: DSI_SERVQUANT_MAX,
            default: DSI_SERVQUANT_DEF,
        }
    }
}

impl QuantumLimits {
    /// Quantum to advertise: `quantum` if within `[min, max]`, else `default`.
    pub fn clamp(&self, quantum: u32) -> u32 {
        if quantum < self.min || quantum > self.max {
            self.default
        } else {
            quantum
        }
    }

    /// Quantum to size buffers with: `quantum` if nonzero, else `default`.
    pub fn or_default(&self, quantum: u32) -> u32 {
        if quantum == 0 { self.default } else { quantum }
    }
}

/// DSI configuration.
#[derive(Debug, Clone)]
pub struct DsiConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,

    /// Server quantum; 0 selects the default.
    pub server_quantum: u32,

    /// Receive buffer size in quantum units.
    pub read_buffer_units: usize,

    /// Quantum bounds.
    pub quantum_limits: QuantumLimits,

    /// Replay cache size advertised to clients.
    pub replay_cache_size: u32,

    /// Interval between server tickles.
    pub tickle_interval: Duration,

    /// Silent tickle intervals tolerated before a peer is declared gone.
    pub tickle_timeout: u32,

    /// Maximum number of concurrent sessions.
    pub max_sessions: usize,
}

impl Default for DsiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 548)),
            server_quantum: DSI_SERVQUANT_DEF,
            read_buffer_units: DSI_READ_BUFFER_UNITS,
            quantum_limits: QuantumLimits::default(),
            replay_cache_size: REPLAYCACHE_SIZE,
            tickle_interval: TICKLE_INTERVAL,
            tickle_timeout: TICKLE_TIMEOUT,
            max_sessions: 200,
        }
    }
}

impl DsiConfig {
    /// Create a new configuration builder.
    pub fn builder() -> DsiConfigBuilder {
        DsiConfigBuilder::new()
    }

    /// Idle time after which a silent peer is considered dead.
    pub fn idle_timeout(&self) -> Duration {
        self.tickle_interval.saturating_mul(self.tickle_timeout.max(1))
    }

    /// Load configuration from `DSI_*` environment variables.
    ///
    /// Unset or blank variables keep their defaults.
    pub fn from_env() -> Result<Self, DsiError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, keyed by environment variable name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DsiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parse_var(&lookup, "DSI_BIND_ADDR")? {
            config.bind_addr = addr;
        }
        if let Some(quantum) = parse_var(&lookup, "DSI_SERVER_QUANTUM")? {
            config.server_quantum = quantum;
        }
        if let Some(units) = parse_var(&lookup, "DSI_READ_BUFFER_UNITS")? {
            config.read_buffer_units = units;
        }
        if let Some(secs) = parse_var(&lookup, "DSI_TICKLE_INTERVAL_SECS")? {
            config.tickle_interval = Duration::from_secs(secs);
        }
        if let Some(count) = parse_var(&lookup, "DSI_TICKLE_TIMEOUT")? {
            config.tickle_timeout = count;
        }
        if let Some(max) = parse_var(&lookup, "DSI_MAX_SESSIONS")? {
            config.max_sessions = max;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check for values the session layer cannot run with.
    pub fn validate(&self) -> Result<(), DsiError> {
        if self.tickle_interval.is_zero() {
            return Err(DsiError::Config("tickle interval must be nonzero".into()));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, DsiError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| DsiError::Config(format!("invalid {key}: {e}"))),
        _ => Ok(None),
    }
}

/// Builder for [`DsiConfig`].
#[derive(Debug, Default)]
pub struct DsiConfigBuilder {
    config: DsiConfig,
}

impl DsiConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the server quantum.
    pub fn server_quantum(mut self, quantum: u32) -> Self {
        self.config.server_quantum = quantum;
        self
    }

    /// Set the receive buffer size in quantum units.
    pub fn read_buffer_units(mut self, units: usize) -> Self {
        self.config.read_buffer_units = units;
        self
    }

    /// Set the quantum bounds.
    pub fn quantum_limits(mut self, limits: QuantumLimits) -> Self {
        self.config.quantum_limits = limits;
        self
    }

    /// Set the advertised replay cache size.
    pub fn replay_cache_size(mut self, size: u32) -> Self {
        self.config.replay_cache_size = size;
        self
    }

    /// Set the tickle interval.
    pub fn tickle_interval(mut self, interval: Duration) -> Self {
        self.config.tickle_interval = interval;
        self
    }

    /// Set the tickle timeout multiplier.
    pub fn tickle_timeout(mut self, count: u32) -> Self {
        self.config.tickle_timeout = count;
        self
    }

    /// Set the maximum number of concurrent sessions.
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.max_sessions = max;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> DsiConfig {
        self.config
    }

    /// Build the configuration, rejecting unusable values.
    pub fn try_build(self) -> Result<DsiConfig, DsiError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantum_clamp() {
        let limits = QuantumLimits::default();

        assert_eq!(limits.clamp(0), DSI_SERVQUANT_DEF);
        assert_eq!(limits.clamp(DSI_SERVQUANT_MIN - 1), DSI_SERVQUANT_DEF);
        assert_eq!(limits.clamp(DSI_SERVQUANT_MIN), DSI_SERVQUANT_MIN);
        assert_eq!(limits.clamp(65536), 65536);
    }

    #[test]
    fn test_quantum_clamp_custom_bounds() {
        let limits = QuantumLimits {
            min: 16,
            max: 64,
            default: 32,
        };

        assert_eq!(limits.clamp(8), 32);
        assert_eq!(limits.clamp(65), 32);
        assert_eq!(limits.clamp(64), 64);
        assert_eq!(limits.or_default(0), 32);
        assert_eq!(limits.or_default(8), 8);
    }

    #[test]
    fn test_builder() {
        let config = DsiConfig::builder()
            .server_quantum(1024)
            .read_buffer_units(2)
            .tickle_interval(Duration::from_secs(5))
            .tickle_timeout(3)
            .max_sessions(4)
            .build();

        assert_eq!(config.server_quantum, 1024);
        assert_eq!(config.read_buffer_units, 2);
        assert_eq!(config.max_sessions, 4);
        assert_eq!(config.idle_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_from_lookup() {
        let config = DsiConfig::from_lookup(|key| match key {
            "DSI_BIND_ADDR" => Some("127.0.0.1:10548".into()),
            "DSI_SERVER_QUANTUM" => Some(" 65536 ".into()),
            "DSI_TICKLE_INTERVAL_SECS" => Some("10".into()),
            "DSI_MAX_SESSIONS" => Some(String::new()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 10548)));
        assert_eq!(config.server_quantum, 65536);
        assert_eq!(config.tickle_interval, Duration::from_secs(10));
        assert_eq!(config.read_buffer_units, DSI_READ_BUFFER_UNITS);
        assert_eq!(config.max_sessions, 200);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = DsiConfig::from_lookup(|key| {
            (key == "DSI_READ_BUFFER_UNITS").then(|| "twelve".to_string())
        })
        .unwrap_err();

        assert!(matches!(err, DsiError::Config(msg) if msg.contains("DSI_READ_BUFFER_UNITS")));
    }

    #[test]
    fn test_from_lookup_rejects_zero_interval() {
        let err = DsiConfig::from_lookup(|key| {
            (key == "DSI_TICKLE_INTERVAL_SECS").then(|| "0".to_string())
        })
        .unwrap_err();

        assert!(matches!(err, DsiError::Config(msg) if msg.contains("tickle interval")));
    }

    #[test]
    fn test_try_build_validates() {
        let result = DsiConfig::builder()
            .tickle_interval(Duration::ZERO)
            .try_build();
        assert!(matches!(result, Err(DsiError::Config(_))));

        let config = DsiConfig::builder()
            .tickle_interval(Duration::from_secs(1))
            .try_build()
            .unwrap();
        assert_eq!(config.idle_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn test_idle_timeout_never_zero_multiplier() {
        let config = DsiConfig::builder()
            .tickle_interval(Duration::from_secs(2))
            .tickle_timeout(0)
            .build();

        assert_eq!(config.idle_timeout(), Duration::from_secs(2));
    }
}
