use std::borrow::Cow;

use tracing::Level;

use super::types::{LatencyGuard, LatencyMetadata};

pub fn guard(operation: impl Into<Cow<'static, str>>) -> LatencyGuard {
    LatencyGuard::new(operation, Level::INFO, LatencyMetadata::default())
}

pub fn guard_with_metadata(
    operation: impl Into<Cow<'static, str>>,
    metadata: LatencyMetadata,
) -> LatencyGuard {
    LatencyGuard::new(operation, Level::INFO, metadata)
}
