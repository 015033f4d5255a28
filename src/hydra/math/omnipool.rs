use super::{Rounding, fee_amount, gross_for_net, mul_div};
use crate::hydra::types::{Balance, Permill};

/// 单个资产在 omnipool 中的储备视图。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetReserveState {
    pub reserve: Balance,
    pub hub_reserve: Balance,
}

/// 卖出：`amount_in` 的 `asset_in` 经 hub 换成 `asset_out`。
///
/// 先按 `asset_in` 的恒定乘积换出 hub，扣协议费，再用 hub 换出 `asset_out`，最后扣资产费。
/// 每一步向下取整。
pub fn calculate_sell(
    asset_in: AssetReserveState,
    asset_out: AssetReserveState,
    amount_in: Balance,
    asset_fee: Permill,
    protocol_fee: Permill,
) -> Option<Balance> {
    let delta_hub_in = mul_div(
        amount_in,
        asset_in.hub_reserve,
        asset_in.reserve.checked_add(amount_in)?,
        Rounding::Down,
    )?;
    let delta_hub_out =
        delta_hub_in.checked_sub(fee_amount(delta_hub_in, protocol_fee, Rounding::Up)?)?;
    let delta_out = mul_div(
        asset_out.reserve,
        delta_hub_out,
        asset_out.hub_reserve.checked_add(delta_hub_out)?,
        Rounding::Down,
    )?;
    delta_out.checked_sub(fee_amount(delta_out, asset_fee, Rounding::Up)?)
}

/// 买入：得到 `amount_out` 所需的最小 `asset_in` 数量。
///
/// 每一步向上取整，是 [`calculate_sell`] 的精确反函数：
/// `calculate_sell(calculate_buy(x)) >= x`。
pub fn calculate_buy(
    asset_in: AssetReserveState,
    asset_out: AssetReserveState,
    amount_out: Balance,
    asset_fee: Permill,
    protocol_fee: Permill,
) -> Option<Balance> {
    let delta_out = gross_for_net(amount_out, asset_fee)?;
    if delta_out >= asset_out.reserve {
        return None;
    }
    let delta_hub_out = mul_div(
        asset_out.hub_reserve,
        delta_out,
        asset_out.reserve - delta_out,
        Rounding::Up,
    )?;
    let delta_hub_in = gross_for_net(delta_hub_out, protocol_fee)?;
    if delta_hub_in >= asset_in.hub_reserve {
        return None;
    }
    mul_div(
        asset_in.reserve,
        delta_hub_in,
        asset_in.hub_reserve - delta_hub_in,
        Rounding::Up,
    )
}
