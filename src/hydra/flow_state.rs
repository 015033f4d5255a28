use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::error::{HopError, ReaderError};
use super::state::{ChainStateReader, PoolState};
use super::strategy::{HopQuoter, quote_component};
use super::types::{Balance, Direction, PoolComponent, PoolKind, SwapPair};
use crate::cache::TtlCache;

/// 绑定某个资产对的报价状态：池子状态缓存与链读取器。
///
/// 资产对改变时由工厂整体替换，旧缓存随之丢弃。
pub struct FlowState {
    pair: SwapPair,
    reader: Arc<dyn ChainStateReader>,
    states: TtlCache<PoolKind, PoolState>,
}

impl FlowState {
    pub fn new(
        pair: SwapPair,
        reader: Arc<dyn ChainStateReader>,
        state_ttl: Option<Duration>,
    ) -> Self {
        Self {
            pair,
            reader,
            states: TtlCache::new(state_ttl),
        }
    }

    pub fn pair(&self) -> SwapPair {
        self.pair
    }

    pub fn reader(&self) -> &Arc<dyn ChainStateReader> {
        &self.reader
    }

    /// 读取池子状态；并发请求同一池子只回源一次。
    pub async fn pool_state(&self, key: PoolKind) -> Result<Arc<PoolState>, ReaderError> {
        self.states
            .load_or_fetch(key, |key| async move {
                trace!(target: "hydra::flow", pool = %key, "回源读取池子状态");
                self.reader.fetch_state(key).await
            })
            .await
    }

    pub fn cached_pools(&self) -> usize {
        self.states.len()
    }
}

#[async_trait]
impl HopQuoter for FlowState {
    async fn quote_hop(
        &self,
        component: &PoolComponent,
        amount: Balance,
        direction: Direction,
    ) -> Result<Balance, HopError> {
        let state = self
            .pool_state(component.pool)
            .await
            .map_err(|source| HopError::Reader {
                pool: component.pool,
                source,
            })?;
        quote_component(&state, component, amount, direction)
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::CountingReader;
    use super::*;
    use crate::hydra::strategy::fixtures;

    #[tokio::test]
    async fn hops_share_cached_pool_state() {
        let reader = Arc::new(CountingReader::new([fixtures::omnipool(), fixtures::stableswap()]));
        let flow = Arc::new(FlowState::new(SwapPair::new(1, 9), reader.clone(), None));

        let component = PoolComponent::omnipool(1, 9);
        let mut tasks = Vec::new();
        for _ in 0..4 {
            let flow = Arc::clone(&flow);
            tasks.push(tokio::spawn(async move {
                flow.quote_hop(&component, fixtures::UNIT, Direction::Sell).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap() > 0);
        }
        assert_eq!(reader.fetches(), 1);
        assert_eq!(flow.cached_pools(), 1);
    }

    #[tokio::test]
    async fn reader_failure_becomes_hop_failure() {
        let mut reader = CountingReader::new([fixtures::omnipool()]);
        reader.failing.push(PoolKind::Omnipool);
        let flow = FlowState::new(SwapPair::new(1, 9), Arc::new(reader), None);

        let err = flow
            .quote_hop(&PoolComponent::omnipool(1, 9), fixtures::UNIT, Direction::Sell)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HopError::Reader {
                pool: PoolKind::Omnipool,
                source: ReaderError::Decode(_)
            }
        ));
        assert_eq!(flow.cached_pools(), 0);
    }
}
