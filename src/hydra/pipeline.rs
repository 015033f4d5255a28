use std::sync::Arc;

use tracing::trace;

use super::strategy::HopQuoter;
use super::types::{Direction, Quote, QuoteArgs, SwapRoute};
use crate::graph::{TaskGraph, TaskNode};

/// 为一条路由构建逐跳串联的报价任务图。
///
/// 卖出按路由顺序，买入倒序：每一跳以上一跳的结果作为本跳的已知数量。
/// 任一跳失败则整条路由失败，不影响其他路由。
pub fn route_pipeline(
    route: SwapRoute,
    args: QuoteArgs,
    quoter: Arc<dyn HopQuoter>,
) -> TaskGraph<Quote> {
    let direction = args.direction;
    let mut graph = TaskGraph::with_result("hop:seed", args.amount);

    for (position, component) in route.quoting_order(direction).into_iter().enumerate() {
        let quoter = Arc::clone(&quoter);
        graph = graph.then(move |previous| {
            let label = format!("hop:{position}:{component}");
            TaskGraph::from_node(TaskNode::new(label, move || async move {
                let amount = previous.result()?;
                let quoted = quoter.quote_hop(&component, amount, direction).await?;
                trace!(
                    target: "hydra::pipeline",
                    hop = position,
                    component = %component,
                    direction = %direction,
                    amount,
                    quoted,
                    "单跳报价"
                );
                Ok(quoted)
            }))
        });
    }

    graph.map("route:quote", move |amount| {
        Ok(Quote {
            args,
            amount,
            context: route.to_context()?,
        })
    })
}

/// 报价方向对应的优劣比较：卖出取最大输出，买入取最小输入。
pub fn is_better(direction: Direction, candidate: &Quote, best: &Quote) -> bool {
    match direction {
        Direction::Sell => candidate.amount > best.amount,
        Direction::Buy => candidate.amount < best.amount,
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::RecordingQuoter;
    use super::*;
    use crate::graph::GraphExecutor;
    use crate::hydra::error::HopError;
    use crate::hydra::types::PoolComponent;

    fn two_hop() -> SwapRoute {
        SwapRoute::new([
            PoolComponent::omnipool(1, 2),
            PoolComponent::stableswap(2, 2, 9),
        ])
    }

    fn quoter() -> Arc<RecordingQuoter> {
        Arc::new(
            RecordingQuoter::default()
                .with_rate(PoolComponent::omnipool(1, 2), 2, 1)
                .with_rate(PoolComponent::stableswap(2, 2, 9), 3, 1),
        )
    }

    #[tokio::test]
    async fn sell_hops_run_in_route_order() {
        let executor = GraphExecutor::new(4);
        let quoter = quoter();
        let graph = route_pipeline(two_hop(), QuoteArgs::sell(1, 9, 100), quoter.clone());

        let quote = executor.submit(&graph).join().await.unwrap();
        assert_eq!(quote.amount, 600);
        assert_eq!(quote.route().unwrap(), two_hop());
        assert_eq!(
            quoter.calls(),
            vec![
                (PoolComponent::omnipool(1, 2), 100),
                (PoolComponent::stableswap(2, 2, 9), 200),
            ]
        );
    }

    #[tokio::test]
    async fn buy_hops_run_in_reverse_order() {
        let executor = GraphExecutor::new(4);
        let quoter = quoter();
        let graph = route_pipeline(two_hop(), QuoteArgs::buy(1, 9, 600), quoter.clone());

        let quote = executor.submit(&graph).join().await.unwrap();
        assert_eq!(quote.amount, 100);
        assert_eq!(quote.amount_in(), 100);
        assert_eq!(quote.amount_out(), 600);
        assert_eq!(
            quoter.calls(),
            vec![
                (PoolComponent::stableswap(2, 2, 9), 600),
                (PoolComponent::omnipool(1, 2), 200),
            ]
        );
    }

    #[tokio::test]
    async fn single_hop_buy_quotes_once() {
        let executor = GraphExecutor::new(1);
        let quoter =
            Arc::new(RecordingQuoter::default().with_rate(PoolComponent::omnipool(1, 9), 3, 1));
        let route = SwapRoute::new([PoolComponent::omnipool(1, 9)]);
        let graph = route_pipeline(route, QuoteArgs::buy(1, 9, 300), quoter.clone());

        assert_eq!(executor.submit(&graph).join().await.unwrap().amount, 100);
        assert_eq!(quoter.calls(), vec![(PoolComponent::omnipool(1, 9), 300)]);
    }

    #[tokio::test]
    async fn failing_hop_stops_the_route() {
        let executor = GraphExecutor::new(2);
        let quoter = Arc::new(
            RecordingQuoter::default()
                .with_rate(PoolComponent::stableswap(2, 2, 9), 3, 1)
                .failing(PoolComponent::omnipool(1, 2)),
        );
        let graph = route_pipeline(two_hop(), QuoteArgs::sell(1, 9, 100), quoter.clone());

        let err = executor.submit(&graph).join().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<HopError>(), Some(HopError::ZeroLiquidity { .. })));
        assert_eq!(quoter.calls().len(), 1);
    }

    #[test]
    fn better_quote_depends_on_direction() {
        let quote = |direction, amount| Quote {
            args: QuoteArgs {
                asset_in: 1,
                asset_out: 9,
                amount: 10,
                direction,
            },
            amount,
            context: String::new(),
        };
        let sell = |amount| quote(Direction::Sell, amount);
        assert!(is_better(Direction::Sell, &sell(31), &sell(30)));
        assert!(!is_better(Direction::Sell, &sell(30), &sell(30)));
        assert!(is_better(Direction::Buy, &quote(Direction::Buy, 3), &quote(Direction::Buy, 4)));
    }
}
