use async_trait::async_trait;

use super::error::HopError;
use super::math::omnipool::{self, AssetReserveState};
use super::math::stableswap::{self, AssetReserve};
use super::state::{OmnipoolState, PoolState, StableswapPoolState};
use super::types::{AssetId, Balance, Direction, PoolComponent, PoolKind};

/// 单跳报价接口：卖出给输入求输出，买入给输出求输入。
#[async_trait]
pub trait HopQuoter: Send + Sync {
    async fn quote_hop(
        &self,
        component: &PoolComponent,
        amount: Balance,
        direction: Direction,
    ) -> Result<Balance, HopError>;
}

/// 按池子种类分派到对应定价公式。状态与组件种类不符时报 `PoolMismatch`。
pub fn quote_component(
    state: &PoolState,
    component: &PoolComponent,
    amount: Balance,
    direction: Direction,
) -> Result<Balance, HopError> {
    match (component.pool, state) {
        (PoolKind::Omnipool, PoolState::Omnipool(pool)) => {
            quote_omnipool(pool, component, amount, direction)
        }
        (PoolKind::Stableswap { pool_asset }, PoolState::Stableswap(pool))
            if pool.pool_asset == pool_asset =>
        {
            quote_stableswap(pool, component, amount, direction)
        }
        (expected, _) => Err(HopError::PoolMismatch { expected }),
    }
}

fn quote_omnipool(
    pool: &OmnipoolState,
    component: &PoolComponent,
    amount: Balance,
    direction: Direction,
) -> Result<Balance, HopError> {
    let kind = PoolKind::Omnipool;
    let lookup = |asset: AssetId| {
        if asset == pool.hub_asset {
            return Err(HopError::UnknownAsset { pool: kind, asset });
        }
        pool.asset(asset)
            .ok_or(HopError::UnknownAsset { pool: kind, asset })
    };
    let asset_in = lookup(component.asset_in)?;
    let asset_out = lookup(component.asset_out)?;

    let reserves = [
        asset_in.reserve,
        asset_in.hub_reserve,
        asset_out.reserve,
        asset_out.hub_reserve,
    ];
    if reserves.contains(&0) {
        return Err(HopError::ZeroLiquidity { pool: kind });
    }
    if amount == 0 {
        return Ok(0);
    }

    let state_in = AssetReserveState {
        reserve: asset_in.reserve,
        hub_reserve: asset_in.hub_reserve,
    };
    let state_out = AssetReserveState {
        reserve: asset_out.reserve,
        hub_reserve: asset_out.hub_reserve,
    };

    match direction {
        Direction::Sell => omnipool::calculate_sell(
            state_in,
            state_out,
            amount,
            asset_out.asset_fee,
            asset_in.protocol_fee,
        )
        .ok_or(HopError::Math { pool: kind }),
        Direction::Buy => {
            if amount >= asset_out.reserve {
                return Err(HopError::InsufficientLiquidity { pool: kind });
            }
            omnipool::calculate_buy(
                state_in,
                state_out,
                amount,
                asset_out.asset_fee,
                asset_in.protocol_fee,
            )
            .ok_or(HopError::InsufficientLiquidity { pool: kind })
        }
    }
}

fn quote_stableswap(
    pool: &StableswapPoolState,
    component: &PoolComponent,
    amount: Balance,
    direction: Direction,
) -> Result<Balance, HopError> {
    let kind = PoolKind::stableswap(pool.pool_asset);
    let index = |asset: AssetId| {
        pool.index_of(asset)
            .ok_or(HopError::UnknownAsset { pool: kind, asset })
    };

    let reserves: Vec<AssetReserve> = pool
        .assets
        .iter()
        .map(|entry| AssetReserve::new(entry.reserve, entry.decimals))
        .collect();
    if reserves.len() < 2 || reserves.iter().any(|reserve| reserve.amount == 0) {
        return Err(HopError::ZeroLiquidity { pool: kind });
    }

    let amplification = u128::from(pool.amplification);
    let issuance = pool.share_issuance;
    let fee = pool.fee;
    let math = HopError::Math { pool: kind };
    let shallow = HopError::InsufficientLiquidity { pool: kind };

    if component.asset_in == pool.pool_asset {
        let index_out = index(component.asset_out)?;
        if amount == 0 {
            return Ok(0);
        }
        return match direction {
            Direction::Sell => stableswap::calculate_withdraw_one_asset(
                &reserves, index_out, amount, amplification, issuance, fee,
            )
            .ok_or(math),
            Direction::Buy => {
                if amount >= reserves[index_out].amount {
                    return Err(shallow);
                }
                stableswap::calculate_shares_for_amount(
                    &reserves, index_out, amount, amplification, issuance, fee,
                )
                .ok_or(shallow)
            }
        };
    }

    if component.asset_out == pool.pool_asset {
        let index_in = index(component.asset_in)?;
        if amount == 0 {
            return Ok(0);
        }
        return match direction {
            Direction::Sell => stableswap::calculate_shares(
                &reserves, index_in, amount, amplification, issuance, fee,
            )
            .ok_or(math),
            Direction::Buy => stableswap::calculate_add_one_asset(
                &reserves, index_in, amount, amplification, issuance, fee,
            )
            .ok_or(math),
        };
    }

    let index_in = index(component.asset_in)?;
    let index_out = index(component.asset_out)?;
    if amount == 0 {
        return Ok(0);
    }
    match direction {
        Direction::Sell => stableswap::calculate_out_given_in_with_fee(
            &reserves, index_in, index_out, amount, amplification, fee,
        )
        .ok_or(math),
        Direction::Buy => {
            if amount >= reserves[index_out].amount {
                return Err(shallow);
            }
            stableswap::calculate_in_given_out_with_fee(
                &reserves, index_in, index_out, amount, amplification, fee,
            )
            .ok_or(shallow)
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use super::*;
    use crate::hydra::state::{OmnipoolAssetState, StableswapAsset};
    use crate::hydra::types::Permill;

    pub const HUB: AssetId = 1_000;
    pub const UNIT: Balance = 1_000_000_000_000;

    /// 资产 1 与 9 的 omnipool，1:3 左右。
    pub fn omnipool() -> PoolState {
        let mut assets = BTreeMap::new();
        assets.insert(
            1,
            OmnipoolAssetState {
                reserve: 10_000 * UNIT,
                hub_reserve: 30_000 * UNIT,
                asset_fee: Permill::from_parts(2_500),
                protocol_fee: Permill::from_parts(500),
            },
        );
        assets.insert(
            9,
            OmnipoolAssetState {
                reserve: 10_000 * UNIT,
                hub_reserve: 10_000 * UNIT,
                asset_fee: Permill::from_parts(2_500),
                protocol_fee: Permill::from_parts(500),
            },
        );
        PoolState::Omnipool(OmnipoolState {
            hub_asset: HUB,
            assets,
        })
    }

    /// 份额资产为 2 的稳定池，资产 1 与 9，约 1:3.01。
    pub fn stableswap() -> PoolState {
        PoolState::Stableswap(StableswapPoolState {
            pool_asset: 2,
            assets: vec![
                StableswapAsset {
                    asset_id: 1,
                    reserve: 1_000 * UNIT,
                    decimals: 12,
                },
                StableswapAsset {
                    asset_id: 9,
                    reserve: 10_400 * UNIT,
                    decimals: 12,
                },
            ],
            amplification: 2,
            fee: Permill::from_parts(400),
            share_issuance: 9_800 * 1_000_000_000_000_000_000,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn concrete_pools_quote_expected_amounts() {
        let omni = quote_component(
            &omnipool(),
            &PoolComponent::omnipool(1, 9),
            10_000_000_000,
            Direction::Sell,
        )
        .unwrap();
        let stable = quote_component(
            &stableswap(),
            &PoolComponent::stableswap(2, 1, 9),
            10_000_000_000,
            Direction::Sell,
        )
        .unwrap();
        assert_eq!(omni, 29_909_917_904);
        assert_eq!(stable, 30_075_895_546);
    }

    #[test]
    fn buy_quotes_required_input() {
        let omni = quote_component(
            &omnipool(),
            &PoolComponent::omnipool(1, 9),
            30_000_000_000,
            Direction::Buy,
        )
        .unwrap();
        let stable = quote_component(
            &stableswap(),
            &PoolComponent::stableswap(2, 1, 9),
            30_000_000_000,
            Direction::Buy,
        )
        .unwrap();
        assert_eq!(omni, 10_030_117_922);
        assert_eq!(stable, 9_974_763_559);
    }

    #[test]
    fn mismatched_state_is_rejected() {
        let component = PoolComponent::stableswap(2, 1, 9);
        let err = quote_component(&omnipool(), &component, 1, Direction::Sell).unwrap_err();
        assert!(matches!(err, HopError::PoolMismatch { .. }));

        let component = PoolComponent::stableswap(3, 1, 9);
        let err = quote_component(&stableswap(), &component, 1, Direction::Sell).unwrap_err();
        assert!(matches!(err, HopError::PoolMismatch { .. }));
    }

    #[test]
    fn hub_and_unknown_assets_are_rejected() {
        for asset in [HUB, 42] {
            let err = quote_component(
                &omnipool(),
                &PoolComponent::omnipool(1, asset),
                UNIT,
                Direction::Sell,
            )
            .unwrap_err();
            assert!(matches!(err, HopError::UnknownAsset { asset: a, .. } if a == asset));
        }
    }

    #[test]
    fn share_hops_quote_both_directions() {
        let pool = stableswap();
        let deposit = PoolComponent::stableswap(2, 1, 2);
        let withdraw = PoolComponent::stableswap(2, 2, 9);

        let shares = quote_component(&pool, &deposit, UNIT, Direction::Sell).unwrap();
        assert!(shares > 0);
        let cost = quote_component(&pool, &deposit, shares, Direction::Buy).unwrap();
        assert!(cost > 0);

        let received = quote_component(&pool, &withdraw, shares, Direction::Sell).unwrap();
        assert!(received > 0);
        let burned = quote_component(&pool, &withdraw, received, Direction::Buy).unwrap();
        assert!(burned > 0);
    }

    #[test]
    fn draining_buys_fail_with_insufficient_liquidity() {
        let err = quote_component(
            &omnipool(),
            &PoolComponent::omnipool(1, 9),
            10_000 * UNIT,
            Direction::Buy,
        )
        .unwrap_err();
        assert!(matches!(err, HopError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn zero_amount_quotes_zero() {
        assert_eq!(
            quote_component(&stableswap(), &PoolComponent::stableswap(2, 1, 9), 0, Direction::Sell)
                .unwrap(),
            0
        );
    }
}
