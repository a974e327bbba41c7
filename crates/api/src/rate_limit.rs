//! Rate Limiting Middleware using GCRA Algorithm
//!
//! IP-keyed rate limiting via tower_governor. GCRA enforces the rate
//! without background sweeps.

use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

/// Type alias for the governor config with default settings
/// StateInformationMiddleware adds X-RateLimit-* headers via use_headers()
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Seconds per replenished request
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 1,
            burst_size: 30, // polling endpoint fires about once a second
        }
    }
}

/// Build the governor config for GovernorLayer.
///
/// Requires the service to be started with
/// `into_make_service_with_connect_info::<SocketAddr>()` so peer IPs are
/// available for key extraction.
pub fn create_governor_config(config: &RateLimitConfig) -> Arc<DefaultGovernorConfig> {
    Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.per_second)
            .burst_size(config.burst_size)
            .use_headers()
            .finish()
            .expect("rate limit config must be non-zero"),
    )
}
