use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

use super::error::SwapBuildError;
use super::math::{Rounding, mul_div};
use super::types::{AssetId, Balance, Direction, PoolComponent, Quote};

const BPS_DENOMINATOR: u32 = 10_000;

/// 路由器兑换调用的参数，`route` 与报价时的跳序一致。
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SwapCall {
    Sell {
        asset_in: AssetId,
        asset_out: AssetId,
        #[serde_as(as = "DisplayFromStr")]
        amount_in: Balance,
        #[serde_as(as = "DisplayFromStr")]
        min_amount_out: Balance,
        route: Vec<PoolComponent>,
    },
    Buy {
        asset_in: AssetId,
        asset_out: AssetId,
        #[serde_as(as = "DisplayFromStr")]
        amount_out: Balance,
        #[serde_as(as = "DisplayFromStr")]
        max_amount_in: Balance,
        route: Vec<PoolComponent>,
    },
}

impl SwapCall {
    pub fn route(&self) -> &[PoolComponent] {
        match self {
            SwapCall::Sell { route, .. } | SwapCall::Buy { route, .. } => route,
        }
    }
}

/// 由报价构建兑换调用：卖出给最少输出，买入给最多输入，均按 `slippage_bps` 放宽。
pub fn build_swap_call(quote: &Quote, slippage_bps: u32) -> Result<SwapCall, SwapBuildError> {
    if slippage_bps > BPS_DENOMINATOR {
        return Err(SwapBuildError::Slippage(slippage_bps));
    }

    let route = quote.route()?;
    if !route.is_well_formed() {
        return Err(SwapBuildError::MalformedRoute);
    }
    let pair = quote.args.pair();
    let (route_in, route_out) = match (route.asset_in(), route.asset_out()) {
        (Some(route_in), Some(route_out)) => (route_in, route_out),
        _ => return Err(SwapBuildError::MalformedRoute),
    };
    if route_in != pair.asset_in || route_out != pair.asset_out {
        return Err(SwapBuildError::PairMismatch {
            pair,
            route_in,
            route_out,
        });
    }

    let denominator = Balance::from(BPS_DENOMINATOR);
    let trades = route.components.into_vec();
    match quote.args.direction {
        Direction::Sell => {
            let min_amount_out = mul_div(
                quote.amount_out(),
                denominator - Balance::from(slippage_bps),
                denominator,
                Rounding::Down,
            )
            .ok_or(SwapBuildError::Overflow)?;
            Ok(SwapCall::Sell {
                asset_in: pair.asset_in,
                asset_out: pair.asset_out,
                amount_in: quote.amount_in(),
                min_amount_out,
                route: trades,
            })
        }
        Direction::Buy => {
            let max_amount_in = mul_div(
                quote.amount_in(),
                denominator + Balance::from(slippage_bps),
                denominator,
                Rounding::Up,
            )
            .ok_or(SwapBuildError::Overflow)?;
            Ok(SwapCall::Buy {
                asset_in: pair.asset_in,
                asset_out: pair.asset_out,
                amount_out: quote.amount_out(),
                max_amount_in,
                route: trades,
            })
        }
    }
}
