use std::collections::BTreeMap;

use super::state::PoolState;
use super::types::{AssetId, PoolComponent, PoolKind};

/// 某一时刻已知的全部池子，按 [`PoolKind`] 排序。
#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    pools: BTreeMap<PoolKind, PoolState>,
    tradable: BTreeMap<PoolKind, Vec<AssetId>>,
}

impl PoolRegistry {
    pub fn from_states(states: impl IntoIterator<Item = PoolState>) -> Self {
        let mut registry = Self::default();
        for state in states {
            registry.insert(state);
        }
        registry
    }

    pub fn insert(&mut self, state: PoolState) {
        let kind = state.kind();
        self.tradable.insert(kind, state.tradable_assets());
        self.pools.insert(kind, state);
    }

    pub fn get(&self, kind: &PoolKind) -> Option<&PoolState> {
        self.pools.get(kind)
    }

    pub fn contains(&self, kind: &PoolKind) -> bool {
        self.pools.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// 从 `asset` 出发的全部单跳，池子顺序优先，其次输出资产升序。
    pub fn edges_from(&self, asset: AssetId) -> impl Iterator<Item = PoolComponent> + '_ {
        self.tradable
            .iter()
            .filter(move |(_, assets)| assets.binary_search(&asset).is_ok())
            .flat_map(move |(kind, assets)| {
                assets
                    .iter()
                    .filter(move |candidate| **candidate != asset)
                    .map(move |asset_out| PoolComponent::new(*kind, asset, *asset_out))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydra::strategy::fixtures;

    #[test]
    fn edges_follow_pool_then_asset_order() {
        let registry = PoolRegistry::from_states([fixtures::stableswap(), fixtures::omnipool()]);
        let edges: Vec<_> = registry.edges_from(1).collect();
        assert_eq!(
            edges,
            vec![
                PoolComponent::omnipool(1, 9),
                PoolComponent::stableswap(2, 1, 2),
                PoolComponent::stableswap(2, 1, 9),
            ]
        );
        assert_eq!(registry.edges_from(fixtures::HUB).count(), 0);
    }
}
