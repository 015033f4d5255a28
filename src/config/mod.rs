pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use crate::hydra::DEFAULT_MAX_HOPS;

use self::types as cfg;

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_timezone_offset_hours() -> i8 {
    0
}

pub(crate) fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}

pub(crate) fn default_quote_timeout_ms() -> u64 {
    5_000
}

pub(crate) fn default_state_ttl_ms() -> u64 {
    6_000
}

pub(crate) fn default_slippage_bps() -> u32 {
    50
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
            timezone_offset_hours: default_timezone_offset_hours(),
        }
    }
}

impl Default for cfg::RouterConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            quote_timeout_ms: default_quote_timeout_ms(),
            state_ttl_ms: default_state_ttl_ms(),
            workers: None,
            slippage_bps: default_slippage_bps(),
        }
    }
}

impl Default for cfg::PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: default_prometheus_listen(),
        }
    }
}
