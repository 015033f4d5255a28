use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::error::QuoteError;
use super::flow_state::FlowState;
use super::pipeline::{is_better, route_pipeline};
use super::registry::PoolRegistry;
use super::routes::{DEFAULT_MAX_HOPS, discover_routes};
use super::state::{ChainStateReader, PoolState};
use super::strategy::HopQuoter;
use super::types::{Direction, Quote, QuoteArgs, SwapPair, SwapRoute};
use crate::graph::{GraphError, GraphExecutor, NodeResult, TaskGraph, TaskNode, join_settled};
use crate::monitoring::events;

/// 报价工厂的可调参数。
#[derive(Debug, Clone, Copy)]
pub struct QuoteFactorySettings {
    pub max_hops: usize,
    /// 池子状态缓存时长；`None` 表示资产对不变就一直复用。
    pub state_ttl: Option<Duration>,
}

impl Default for QuoteFactorySettings {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            state_ttl: Some(Duration::from_secs(6)),
        }
    }
}

/// HydraDx 报价聚合：发现路由、逐路由报价、择优。
pub struct HydraQuoteFactory {
    reader: Arc<dyn ChainStateReader>,
    executor: GraphExecutor,
    settings: QuoteFactorySettings,
    flow: Mutex<Option<Arc<FlowState>>>,
}

impl HydraQuoteFactory {
    pub fn new(
        reader: Arc<dyn ChainStateReader>,
        executor: GraphExecutor,
        settings: QuoteFactorySettings,
    ) -> Self {
        Self {
            reader,
            executor,
            settings,
            flow: Mutex::new(None),
        }
    }

    pub fn executor(&self) -> &GraphExecutor {
        &self.executor
    }

    pub fn settings(&self) -> QuoteFactorySettings {
        self.settings
    }

    /// 当前资产对的报价状态；资产对变化时丢弃旧状态重新开始。
    pub fn flow_state(&self, pair: SwapPair) -> Arc<FlowState> {
        let mut guard = self.flow.lock();
        if let Some(flow) = guard.as_ref() {
            if flow.pair() == pair {
                return Arc::clone(flow);
            }
            debug!(
                target: "hydra::aggregator",
                previous = %flow.pair(),
                next = %pair,
                "资产对变化，重置报价状态"
            );
        }

        let flow = Arc::new(FlowState::new(
            pair,
            Arc::clone(&self.reader),
            self.settings.state_ttl,
        ));
        *guard = Some(Arc::clone(&flow));
        flow
    }

    /// 路由发现任务图：读池子列表，并发读取每个池子状态，再枚举路由。
    ///
    /// 单个池子读取失败只会让它不参与路由；池子列表读取失败则整个发现失败。
    pub fn routes_graph(&self, pair: SwapPair) -> TaskGraph<Vec<SwapRoute>> {
        let flow = self.flow_state(pair);
        let executor = self.executor.clone();
        let max_hops = self.settings.max_hops;

        let keys_flow = Arc::clone(&flow);
        let keys = TaskGraph::from_node(TaskNode::new("routes:pool-keys", move || async move {
            Ok(keys_flow.reader().pool_keys().await?)
        }));

        keys.then(move |keys_node| {
            TaskGraph::deferred("routes:pool-states", executor, move || {
                let fetches = keys_node
                    .result()?
                    .into_iter()
                    .map(|key| {
                        let flow = Arc::clone(&flow);
                        let label = format!("routes:state:{key}");
                        TaskGraph::from_node(TaskNode::new(label, move || async move {
                            Ok(flow.pool_state(key).await?)
                        }))
                    })
                    .collect();
                Ok(join_settled("routes:registry", fetches, collect_registry))
            })
        })
        .map("routes:discover", move |registry| {
            let routes = discover_routes(&registry, pair, max_hops);
            events::routes_discovered(pair, registry.len(), routes.len());
            Ok(routes)
        })
    }

    /// 单次报价的完整任务图，目标节点即最优报价。
    pub fn quote_graph(&self, args: QuoteArgs) -> TaskGraph<Quote> {
        let pair = args.pair();
        let routes = self.routes_graph(pair);
        let quoter: Arc<dyn HopQuoter> = self.flow_state(pair);
        aggregate_quote(routes, args, quoter, self.executor.clone())
    }

    pub async fn quote(&self, args: QuoteArgs) -> Result<Quote, QuoteError> {
        let graph = self.quote_graph(args);
        self.executor.submit(&graph).join().await.map_err(QuoteError::from)
    }
}

/// 汇总池子状态；单个池子读取失败只跳过该池，全部失败时报 `Discovery` 并保留首个读取错误。
fn collect_registry(
    results: Vec<NodeResult<Arc<PoolState>>>,
) -> anyhow::Result<Arc<PoolRegistry>> {
    let mut registry = PoolRegistry::default();
    let mut first_failure: Option<GraphError> = None;
    for result in results {
        match result {
            Ok(state) => registry.insert(state.as_ref().clone()),
            Err(err) if err.is_cancelled() => return Err(GraphError::Cancelled.into()),
            Err(err) => {
                warn!(target: "hydra::aggregator", error = %err, "池子状态读取失败，跳过该池");
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }
    }
    if registry.is_empty() {
        if let Some(err) = first_failure {
            return Err(QuoteError::Discovery(err.to_string()).into());
        }
    }
    Ok(Arc::new(registry))
}

/// 在给定路由集上报价并择优。
///
/// 路由为空报 `NoRoute`；全部路由失败报 `QuoteCalcFailed`；其余失败的路由被静默丢弃。
pub fn aggregate_quote(
    routes: TaskGraph<Vec<SwapRoute>>,
    args: QuoteArgs,
    quoter: Arc<dyn HopQuoter>,
    executor: GraphExecutor,
) -> TaskGraph<Quote> {
    routes.then(move |routes_node| {
        TaskGraph::deferred("quote:routes", executor, move || {
            let routes = routes_node.result()?;
            if routes.is_empty() {
                return Err(QuoteError::NoRoute { pair: args.pair() }.into());
            }
            let pipelines = routes
                .into_iter()
                .map(|route| route_pipeline(route, args, Arc::clone(&quoter)))
                .collect();
            Ok(join_settled("quote:select", pipelines, move |results| {
                select_best(args.direction, results)
            }))
        })
    })
}

/// 卖出取输出最大、买入取输入最小；相同时保留先发现的路由。
fn select_best(direction: Direction, results: Vec<NodeResult<Quote>>) -> anyhow::Result<Quote> {
    let total = results.len();
    let mut best: Option<Quote> = None;
    let mut failures: Vec<Arc<str>> = Vec::new();

    for result in results {
        match result {
            Ok(quote) => {
                if best.as_ref().is_none_or(|current| is_better(direction, &quote, current)) {
                    best = Some(quote);
                }
            }
            Err(err) if err.is_cancelled() => return Err(GraphError::Cancelled.into()),
            Err(err) => {
                debug!(target: "hydra::aggregator", error = %err, "路由报价失败，已丢弃");
                failures.push(Arc::from(err.to_string()));
            }
        }
    }

    match best {
        Some(quote) => {
            debug!(
                target: "hydra::aggregator",
                direction = %direction,
                routes = total,
                failed = failures.len(),
                amount = quote.amount,
                "选出最优报价"
            );
            Ok(quote)
        }
        None => Err(QuoteError::QuoteCalcFailed { failures }.into()),
    }
}
