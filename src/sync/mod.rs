//! 代理钱包同步：链上代理关系与本地钱包的差异对账。

pub mod diff;
pub mod error;
pub mod proxy;
pub mod repository;
pub mod snapshot;
pub mod types;

pub use error::SyncError;
pub use proxy::{ChainProxySyncService, IdentityReader, ProxyListReader, SyncState};
pub use repository::{InMemoryMetaAccountRepository, MetaAccountRepository};
pub use snapshot::{ProxySnapshot, SnapshotProxyReader};
pub use types::{AccountId, ChainInfo, ManagedMetaAccount, SyncSummary};
