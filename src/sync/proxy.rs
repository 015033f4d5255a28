use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use super::diff::{IdentityMap, ProxyList, collect_changes, local_proxies_only};
use super::error::SyncError;
use super::repository::MetaAccountRepository;
use super::types::{AccountId, ChainInfo, SyncSummary};
use crate::graph::{CancelHandle, GraphExecutor, TaskGraph, TaskNode};
use crate::monitoring::{events, guard};

/// 链上代理列表：被代理账户 -> 代理。
#[async_trait]
pub trait ProxyListReader: Send + Sync {
    async fn fetch_proxy_list(&self) -> Result<ProxyList, SyncError>;
}

/// 链上身份（显示名）批量查询。
#[async_trait]
pub trait IdentityReader: Send + Sync {
    async fn fetch_identities(&self, accounts: &[AccountId]) -> Result<IdentityMap, SyncError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing { generation: u64 },
    Synced(SyncSummary),
    Failed { generation: u64, error: String },
}

impl SyncState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, SyncState::Syncing { .. })
    }
}

struct PendingCall {
    generation: u64,
    handle: CancelHandle,
}

/// 单链代理钱包同步：拉取链上代理列表，与本地钱包比对后写回差异。
///
/// 同一时刻只有一次同步在跑；新的 `sync_up` 取消旧的，旧调用的完成结果被丢弃。
pub struct ChainProxySyncService {
    chain: ChainInfo,
    proxies: Arc<dyn ProxyListReader>,
    identities: Arc<dyn IdentityReader>,
    repository: Arc<dyn MetaAccountRepository>,
    executor: GraphExecutor,
    generation: AtomicU64,
    pending: Mutex<Option<PendingCall>>,
    state: watch::Sender<SyncState>,
}

impl ChainProxySyncService {
    pub fn new(
        chain: ChainInfo,
        proxies: Arc<dyn ProxyListReader>,
        identities: Arc<dyn IdentityReader>,
        repository: Arc<dyn MetaAccountRepository>,
        executor: GraphExecutor,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            chain,
            proxies,
            identities,
            repository,
            executor,
            generation: AtomicU64::new(0),
            pending: Mutex::new(None),
            state,
        }
    }

    pub fn chain(&self) -> &ChainInfo {
        &self.chain
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// 启动一次同步并返回其代号；进行中的同步会被取消。
    pub fn sync_up(self: &Arc<Self>) -> u64 {
        let (generation, run) = {
            let mut pending = self.pending.lock();
            // 代号在锁内分配，挂起的调用总是最新一代
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            if let Some(previous) = pending.take() {
                previous.handle.cancel();
                debug!(
                    target: "sync::proxy",
                    chain = %self.chain.chain_id,
                    previous = previous.generation,
                    generation,
                    "取消进行中的代理同步"
                );
            }
            let run = self.executor.submit(&self.sync_graph(generation));
            *pending = Some(PendingCall {
                generation,
                handle: run.cancel_handle(),
            });
            self.state.send_replace(SyncState::Syncing { generation });
            (generation, run)
        };

        let service = Arc::clone(self);
        tokio::spawn(async move {
            let latency = guard("sync.proxy");
            let outcome = run.join().await.map_err(SyncError::from);
            service.complete(generation, outcome, latency.finish());
        });
        generation
    }

    /// 取消进行中的同步，状态回到 `Idle`。
    pub fn stop_sync_up(&self) {
        let mut pending = self.pending.lock();
        if let Some(call) = pending.take() {
            call.handle.cancel();
            debug!(
                target: "sync::proxy",
                chain = %self.chain.chain_id,
                generation = call.generation,
                "代理同步已停止"
            );
            self.state.send_replace(SyncState::Idle);
        }
    }

    /// 等待当前同步结束（成功、失败或被停止）。
    pub async fn wait_settled(&self) -> SyncState {
        let mut receiver = self.subscribe();
        match receiver.wait_for(SyncState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => SyncState::Idle,
        }
    }

    fn complete(
        &self,
        generation: u64,
        outcome: Result<SyncSummary, SyncError>,
        elapsed: Duration,
    ) {
        let mut pending = self.pending.lock();
        if pending.as_ref().map(|call| call.generation) != Some(generation) {
            trace!(target: "sync::proxy", generation, "丢弃过期的同步结果");
            return;
        }
        *pending = None;

        let next = match outcome {
            Ok(summary) => {
                events::proxy_sync_finished(&self.chain.chain_id, &summary, elapsed);
                SyncState::Synced(summary)
            }
            Err(err) => {
                events::proxy_sync_failed(&self.chain.chain_id, generation, &err);
                SyncState::Failed {
                    generation,
                    error: err.to_string(),
                }
            }
        };
        self.state.send_replace(next);
    }

    /// 代理列表与本地钱包并发读取 -> 身份查询与差异计算 -> 写回仓库。
    fn sync_graph(&self, generation: u64) -> TaskGraph<SyncSummary> {
        let proxies = Arc::clone(&self.proxies);
        let proxy_list = TaskGraph::from_node(TaskNode::new("proxy:list", move || async move {
            Ok(proxies.fetch_proxy_list().await?)
        }));

        let repository = Arc::clone(&self.repository);
        let wallets = TaskGraph::from_node(TaskNode::new("proxy:wallets", move || async move {
            Ok(repository.fetch_all().await?)
        }));

        let list_node = proxy_list.target().clone();
        let wallets_node = wallets.target().clone();
        let identities = Arc::clone(&self.identities);
        let chain = self.chain.clone();
        let changes = TaskGraph::deferred("proxy:changes", self.executor.clone(), move || {
            let wallets = wallets_node.result()?;
            let proxies = local_proxies_only(list_node.result()?, &wallets, &chain.chain_id);
            let accounts: Vec<AccountId> = proxies.keys().cloned().collect();

            let lookup = TaskGraph::from_node(TaskNode::new("proxy:identities", move || async move {
                if accounts.is_empty() {
                    return Ok(IdentityMap::new());
                }
                Ok(identities.fetch_identities(&accounts).await?)
            }));
            Ok(lookup.map("proxy:diff", move |identities| {
                Ok(collect_changes(&proxies, &wallets, &identities, &chain))
            }))
        });
        changes.add_dependency(&proxy_list);
        changes.add_dependency(&wallets);
        let changes = changes
            .inserting_head(wallets.all_nodes())
            .inserting_head(proxy_list.all_nodes());

        let repository = Arc::clone(&self.repository);
        changes.then(move |changes_node| {
            TaskGraph::from_node(TaskNode::new("proxy:save", move || async move {
                let changes = changes_node.result()?;
                let summary = SyncSummary {
                    generation,
                    saved: changes.new_or_updated.len(),
                    removed: changes.removed.len(),
                };
                if !changes.is_empty() {
                    let removed_ids = changes
                        .removed
                        .iter()
                        .map(|wallet| wallet.identifier().to_string())
                        .collect();
                    repository.save(changes.new_or_updated, removed_ids).await?;
                }
                Ok(summary)
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::sync::repository::InMemoryMetaAccountRepository;
    use crate::sync::snapshot::{ProxySnapshot, SnapshotProxyReader};
    use crate::sync::types::{ProxyStatus, WalletKind};

    const SNAPSHOT_YAML: &str = r#"
chain:
  chainId: hydradx
proxies:
  "0x0a0a0a0a":
    - accountId: "0x01010101"
      type: Any
identities:
  "0x0a0a0a0a":
    displayName: Treasury
wallets:
  - info:
      metaId: signer
      name: Main
      substrateAccountId: "0x01010101"
      kind: secrets
"#;

    /// 闸门打开前挂起代理列表读取，或直接失败。
    struct GatedReader {
        inner: SnapshotProxyReader,
        gate: watch::Receiver<bool>,
        fail: bool,
    }

    #[async_trait]
    impl ProxyListReader for GatedReader {
        async fn fetch_proxy_list(&self) -> Result<ProxyList, SyncError> {
            if self.fail {
                return Err(SyncError::ProxyList("rpc unavailable".into()));
            }
            let mut gate = self.gate.clone();
            let _ = gate.wait_for(|open| *open).await;
            self.inner.fetch_proxy_list().await
        }
    }

    struct Harness {
        gate: watch::Sender<bool>,
        repository: Arc<InMemoryMetaAccountRepository>,
        service: Arc<ChainProxySyncService>,
    }

    fn harness(open: bool, fail: bool) -> Harness {
        let snapshot = ProxySnapshot::parse(SNAPSHOT_YAML, &PathBuf::from("proxies.yaml")).unwrap();
        let (gate, receiver) = watch::channel(open);
        let reader = snapshot.reader();
        let repository = Arc::new(snapshot.repository());
        let service = Arc::new(ChainProxySyncService::new(
            snapshot.chain.clone(),
            Arc::new(GatedReader {
                inner: reader.clone(),
                gate: receiver,
                fail,
            }),
            Arc::new(reader),
            repository.clone(),
            GraphExecutor::new(2),
        ));
        Harness {
            gate,
            repository,
            service,
        }
    }

    #[tokio::test]
    async fn sync_creates_proxied_wallet() {
        let harness = harness(true, false);
        let generation = harness.service.sync_up();

        let state = harness.service.wait_settled().await;
        assert_eq!(
            state,
            SyncState::Synced(SyncSummary {
                generation,
                saved: 1,
                removed: 0,
            })
        );
        assert!(!harness.service.is_syncing());

        let wallets = harness.repository.snapshot();
        let proxied = wallets
            .iter()
            .find(|wallet| wallet.info.kind == WalletKind::Proxy)
            .unwrap();
        assert_eq!(proxied.info.name, "Treasury");
        assert_eq!(
            proxied.info.chain_accounts[0].proxy.as_ref().unwrap().status,
            ProxyStatus::New
        );
    }

    #[tokio::test]
    async fn repeated_sync_is_idempotent() {
        let harness = harness(true, false);
        harness.service.sync_up();
        harness.service.wait_settled().await;

        let generation = harness.service.sync_up();
        let state = harness.service.wait_settled().await;
        assert_eq!(
            state,
            SyncState::Synced(SyncSummary {
                generation,
                saved: 0,
                removed: 0,
            })
        );
        assert_eq!(harness.repository.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn new_sync_replaces_the_pending_one() {
        let harness = harness(false, false);
        let first = harness.service.sync_up();
        let second = harness.service.sync_up();
        assert!(second > first);

        harness.gate.send_replace(true);
        let state = harness.service.wait_settled().await;
        assert!(matches!(state, SyncState::Synced(summary) if summary.generation == second));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(harness.repository.snapshot().len(), 2);
        assert_eq!(harness.service.state(), state);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_syncs_settle_on_the_newest_generation() {
        let harness = harness(false, false);
        let callers: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&harness.service);
                tokio::spawn(async move {
                    (0..16).map(|_| service.sync_up()).max().unwrap_or_default()
                })
            })
            .collect();
        let mut newest = 0;
        for caller in callers {
            newest = newest.max(caller.await.unwrap());
        }
        assert_eq!(newest, 8 * 16);
        assert_eq!(
            harness.service.state(),
            SyncState::Syncing {
                generation: newest
            }
        );

        harness.gate.send_replace(true);
        let state = harness.service.wait_settled().await;
        assert!(matches!(state, SyncState::Synced(summary) if summary.generation == newest));
        assert_eq!(harness.repository.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn stop_discards_the_pending_sync() {
        let harness = harness(false, false);
        harness.service.sync_up();
        assert!(harness.service.is_syncing());

        harness.service.stop_sync_up();
        assert_eq!(harness.service.state(), SyncState::Idle);
        harness.gate.send_replace(true);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(harness.repository.snapshot().len(), 1);
        assert_eq!(harness.service.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn reader_failure_is_reported() {
        let harness = harness(true, true);
        let generation = harness.service.sync_up();

        match harness.service.wait_settled().await {
            SyncState::Failed {
                generation: failed,
                error,
            } => {
                assert_eq!(failed, generation);
                assert!(error.contains("rpc unavailable"));
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(harness.repository.snapshot().len(), 1);
    }
}
