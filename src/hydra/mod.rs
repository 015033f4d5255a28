//! HydraDx 多跳兑换：路由发现、逐跳报价与择优聚合。

pub mod aggregator;
pub mod error;
pub mod flow_state;
pub mod math;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod service;
pub mod state;
pub mod strategy;
pub mod swap;
pub mod types;

pub use aggregator::{HydraQuoteFactory, QuoteFactorySettings, aggregate_quote};
pub use error::{HopError, QuoteError, ReaderError, SwapBuildError};
pub use flow_state::FlowState;
pub use registry::PoolRegistry;
pub use routes::{DEFAULT_MAX_HOPS, discover_routes};
pub use service::{QuoteService, RequestToken};
pub use state::{ChainSnapshot, ChainStateReader, PoolState, SnapshotReader};
pub use strategy::{HopQuoter, quote_component};
pub use swap::{SwapCall, build_swap_call};
pub use types::{
    AssetId, Balance, Direction, PoolComponent, PoolKind, Quote, QuoteArgs, SwapPair, SwapRoute,
};
