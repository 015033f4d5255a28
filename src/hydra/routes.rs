use std::collections::VecDeque;

use tracing::debug;

use super::registry::PoolRegistry;
use super::types::{AssetId, PoolComponent, PoolKind, SwapPair, SwapRoute};

pub const DEFAULT_MAX_HOPS: usize = 3;

struct Partial {
    asset: AssetId,
    components: Vec<PoolComponent>,
    visited_assets: Vec<AssetId>,
    used_pools: Vec<PoolKind>,
}

/// 枚举连接 `pair` 的全部无环路由，最多 `max_hops` 跳。
///
/// 广度优先：短路由在前；同长度按池子与资产顺序。同一条路由里资产与池子都不重复。
pub fn discover_routes(registry: &PoolRegistry, pair: SwapPair, max_hops: usize) -> Vec<SwapRoute> {
    let mut routes = Vec::new();
    if pair.asset_in == pair.asset_out || max_hops == 0 {
        return routes;
    }

    let mut queue = VecDeque::new();
    queue.push_back(Partial {
        asset: pair.asset_in,
        components: Vec::new(),
        visited_assets: vec![pair.asset_in],
        used_pools: Vec::new(),
    });

    while let Some(partial) = queue.pop_front() {
        for edge in registry.edges_from(partial.asset) {
            if partial.used_pools.contains(&edge.pool) {
                continue;
            }

            if edge.asset_out == pair.asset_out {
                let mut components = partial.components.clone();
                components.push(edge);
                routes.push(SwapRoute::new(components));
            } else if partial.components.len() + 1 < max_hops
                && !partial.visited_assets.contains(&edge.asset_out)
            {
                let mut next = Partial {
                    asset: edge.asset_out,
                    components: partial.components.clone(),
                    visited_assets: partial.visited_assets.clone(),
                    used_pools: partial.used_pools.clone(),
                };
                next.components.push(edge);
                next.visited_assets.push(edge.asset_out);
                next.used_pools.push(edge.pool);
                queue.push_back(next);
            }
        }
    }

    debug!(
        target: "hydra::routes",
        pair = %pair,
        max_hops,
        pools = registry.len(),
        routes = routes.len(),
        "路由发现完成"
    );
    routes
}
