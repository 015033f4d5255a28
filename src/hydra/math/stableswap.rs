use primitive_types::U256;

use super::{Rounding, fee_amount, mul_div, to_balance, to_u256};
use crate::hydra::types::{Balance, Permill};

pub const MAX_D_ITERATIONS: usize = 64;
pub const MAX_Y_ITERATIONS: usize = 128;

/// 不变量计算统一使用的精度。
pub const TARGET_PRECISION: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetReserve {
    pub amount: Balance,
    pub decimals: u8,
}

impl AssetReserve {
    pub const fn new(amount: Balance, decimals: u8) -> Self {
        Self { amount, decimals }
    }
}

pub fn normalize_value(
    amount: Balance,
    decimals: u8,
    target: u8,
    rounding: Rounding,
) -> Option<Balance> {
    if decimals == target {
        return Some(amount);
    }
    if decimals < target {
        let factor = 10_u128.checked_pow(u32::from(target - decimals))?;
        return amount.checked_mul(factor);
    }
    let factor = 10_u128.checked_pow(u32::from(decimals - target))?;
    let quotient = amount / factor;
    match rounding {
        Rounding::Up if amount % factor != 0 => quotient.checked_add(1),
        _ => Some(quotient),
    }
}

fn normalize_reserves(reserves: &[AssetReserve]) -> Option<Vec<Balance>> {
    reserves
        .iter()
        .map(|reserve| {
            normalize_value(reserve.amount, reserve.decimals, TARGET_PRECISION, Rounding::Down)
        })
        .collect()
}

fn ann(n: usize, amplification: u128) -> Option<U256> {
    let n = U256::from(n);
    (0..n.low_u64()).try_fold(to_u256(amplification), |acc, _| acc.checked_mul(n))
}

fn has_converged(previous: U256, current: U256) -> bool {
    if current > previous {
        current - previous <= U256::one()
    } else {
        previous - current < U256::one()
    }
}

/// 稳定曲线不变量 D（牛顿迭代）。
pub fn calculate_d(reserves: &[Balance], amplification: u128) -> Option<Balance> {
    let mut xp: Vec<U256> = reserves
        .iter()
        .filter(|reserve| **reserve != 0)
        .map(|reserve| to_u256(*reserve))
        .collect();
    xp.sort();

    let n_coins = U256::from(xp.len());
    let sum = xp.iter().try_fold(U256::zero(), |acc, x| acc.checked_add(*x))?;
    if sum.is_zero() {
        return Some(0);
    }
    let ann = ann(xp.len(), amplification)?;
    let one = U256::one();

    let mut d = sum;
    for _ in 0..MAX_D_ITERATIONS {
        let d_p = xp
            .iter()
            .try_fold(d, |acc, x| acc.checked_mul(d)?.checked_div(x.checked_mul(n_coins)?))?;
        let previous = d;

        let numerator = ann
            .checked_mul(sum)?
            .checked_add(d_p.checked_mul(n_coins)?)?
            .checked_mul(d)?;
        let denominator = ann
            .checked_sub(one)?
            .checked_mul(d)?
            .checked_add(n_coins.checked_add(one)?.checked_mul(d_p)?)?;
        // +2 保证结果不低于真实不变量（各储备至少为 2 时成立）
        d = numerator.checked_div(denominator)?.checked_add(U256::from(2))?;

        if has_converged(previous, d) {
            break;
        }
    }
    to_balance(d)
}

/// 已知其余储备与 D，求目标资产储备 y，结果偏向池子。
pub fn calculate_y(reserves: &[Balance], d: Balance, amplification: u128) -> Option<Balance> {
    let mut xp: Vec<U256> = reserves
        .iter()
        .filter(|reserve| **reserve != 0)
        .map(|reserve| to_u256(*reserve))
        .collect();
    xp.sort();

    let n_coins = U256::from(xp.len().checked_add(1)?);
    let ann = ann(xp.len().checked_add(1)?, amplification)?;
    let d = to_u256(d);
    let sum = xp.iter().try_fold(U256::zero(), |acc, x| acc.checked_add(*x))?;

    let mut c = d;
    for x in &xp {
        c = c.checked_mul(d)?.checked_div(x.checked_mul(n_coins)?)?;
    }
    c = c.checked_mul(d)?.checked_div(ann.checked_mul(n_coins)?)?;
    let b = sum.checked_add(d.checked_div(ann)?)?;

    let two = U256::from(2);
    let mut y = d;
    for _ in 0..MAX_Y_ITERATIONS {
        let previous = y;
        y = y
            .checked_mul(y)?
            .checked_add(c)?
            .checked_div(two.checked_mul(y)?.checked_add(b)?.checked_sub(d)?)?
            .checked_add(two)?;
        if has_converged(previous, y) {
            break;
        }
    }
    to_balance(y)
}

fn without(reserves: &[Balance], index: usize) -> Vec<Balance> {
    reserves
        .iter()
        .enumerate()
        .filter_map(|(position, reserve)| (position != index).then_some(*reserve))
        .collect()
}

/// 不收手续费的卖出：`asset_in` 储备增加 `amount_in` 后 `asset_out` 可换出的数量。
pub fn calculate_out_given_in(
    reserves: &[AssetReserve],
    index_in: usize,
    index_out: usize,
    amount_in: Balance,
    amplification: u128,
) -> Option<Balance> {
    if index_in == index_out || index_in >= reserves.len() || index_out >= reserves.len() {
        return None;
    }
    let mut normalized = normalize_reserves(reserves)?;
    let d = calculate_d(&normalized, amplification)?;

    let amount_in = normalize_value(
        amount_in,
        reserves[index_in].decimals,
        TARGET_PRECISION,
        Rounding::Down,
    )?;
    normalized[index_in] = normalized[index_in].checked_add(amount_in)?;

    let y = calculate_y(&without(&normalized, index_out), d, amplification)?;
    let new_reserve_out = normalize_value(
        y,
        TARGET_PRECISION,
        reserves[index_out].decimals,
        Rounding::Up,
    )?;
    reserves[index_out].amount.checked_sub(new_reserve_out)
}

/// 不收手续费的买入：换出 `amount_out` 的 `asset_out` 需要投入的 `asset_in` 数量。
pub fn calculate_in_given_out(
    reserves: &[AssetReserve],
    index_in: usize,
    index_out: usize,
    amount_out: Balance,
    amplification: u128,
) -> Option<Balance> {
    if index_in == index_out || index_in >= reserves.len() || index_out >= reserves.len() {
        return None;
    }
    let mut normalized = normalize_reserves(reserves)?;
    let d = calculate_d(&normalized, amplification)?;

    let amount_out = normalize_value(
        amount_out,
        reserves[index_out].decimals,
        TARGET_PRECISION,
        Rounding::Up,
    )?;
    normalized[index_out] = normalized[index_out].checked_sub(amount_out)?;
    if normalized[index_out] == 0 {
        return None;
    }

    let y = calculate_y(&without(&normalized, index_in), d, amplification)?;
    let new_reserve_in = normalize_value(
        y,
        TARGET_PRECISION,
        reserves[index_in].decimals,
        Rounding::Up,
    )?;
    new_reserve_in.checked_sub(reserves[index_in].amount)
}

pub fn calculate_out_given_in_with_fee(
    reserves: &[AssetReserve],
    index_in: usize,
    index_out: usize,
    amount_in: Balance,
    amplification: u128,
    fee: Permill,
) -> Option<Balance> {
    let amount_out =
        calculate_out_given_in(reserves, index_in, index_out, amount_in, amplification)?;
    amount_out.checked_sub(fee_amount(amount_out, fee, Rounding::Down)?)
}

pub fn calculate_in_given_out_with_fee(
    reserves: &[AssetReserve],
    index_in: usize,
    index_out: usize,
    amount_out: Balance,
    amplification: u128,
    fee: Permill,
) -> Option<Balance> {
    let amount_in =
        calculate_in_given_out(reserves, index_in, index_out, amount_out, amplification)?;
    amount_in.checked_add(fee_amount(amount_in, fee, Rounding::Up)?)
}

/// 单边流动性的手续费系数：`fee * n / (4 * (n - 1))`。
fn imbalance_fee(fee: Permill, n: usize) -> Option<Permill> {
    if n < 2 {
        return None;
    }
    let parts = mul_div(
        Balance::from(fee.deconstruct()),
        n as Balance,
        4 * (n as Balance - 1),
        Rounding::Up,
    )?;
    Some(Permill::from_parts(u32::try_from(parts).ok()?))
}

/// 按偏离等比例变化的程度扣减储备，再求 D。
fn fee_adjusted_d(
    initial: &[Balance],
    updated: &[Balance],
    initial_d: Balance,
    updated_d: Balance,
    fee: Permill,
    amplification: u128,
) -> Option<Balance> {
    let fee = imbalance_fee(fee, initial.len())?;
    if fee.is_zero() {
        return Some(updated_d);
    }
    let adjusted = initial
        .iter()
        .zip(updated)
        .map(|(initial, updated)| {
            let ideal = mul_div(updated_d, *initial, initial_d, Rounding::Down)?;
            let difference = updated.abs_diff(ideal);
            updated.checked_sub(fee_amount(difference, fee, Rounding::Up)?)
        })
        .collect::<Option<Vec<_>>>()?;
    calculate_d(&adjusted, amplification)
}

fn updated_reserves(
    reserves: &[AssetReserve],
    index: usize,
    amount: Balance,
    deposit: bool,
) -> Option<(Vec<Balance>, Vec<Balance>)> {
    if index >= reserves.len() {
        return None;
    }
    let initial = normalize_reserves(reserves)?;
    let mut updated = initial.clone();
    let rounding = if deposit { Rounding::Down } else { Rounding::Up };
    let amount = normalize_value(amount, reserves[index].decimals, TARGET_PRECISION, rounding)?;
    updated[index] = if deposit {
        updated[index].checked_add(amount)?
    } else {
        updated[index].checked_sub(amount)?
    };
    Some((initial, updated))
}

/// 单边注入 `amount` 的资产可铸造的份额（卖出资产换份额）。
pub fn calculate_shares(
    reserves: &[AssetReserve],
    index: usize,
    amount: Balance,
    amplification: u128,
    share_issuance: Balance,
    fee: Permill,
) -> Option<Balance> {
    let (initial, updated) = updated_reserves(reserves, index, amount, true)?;
    let initial_d = calculate_d(&initial, amplification)?;
    // D 可能比真实值高 2，铸造份额时向下修正
    let updated_d = calculate_d(&updated, amplification)?.checked_sub(2)?;
    if updated_d < initial_d {
        return None;
    }
    if share_issuance == 0 {
        return Some(updated_d);
    }
    let adjusted_d = fee_adjusted_d(&initial, &updated, initial_d, updated_d, fee, amplification)?;
    let minted = mul_div(
        share_issuance,
        adjusted_d.checked_sub(initial_d)?,
        initial_d,
        Rounding::Down,
    )?;
    Some(minted)
}

/// 单边取出 `amount` 的资产需要销毁的份额（用份额买资产）。
pub fn calculate_shares_for_amount(
    reserves: &[AssetReserve],
    index: usize,
    amount: Balance,
    amplification: u128,
    share_issuance: Balance,
    fee: Permill,
) -> Option<Balance> {
    let (initial, updated) = updated_reserves(reserves, index, amount, false)?;
    if updated[index] == 0 {
        return None;
    }
    let initial_d = calculate_d(&initial, amplification)?;
    let updated_d = calculate_d(&updated, amplification)?;
    let adjusted_d = fee_adjusted_d(&initial, &updated, initial_d, updated_d, fee, amplification)?;
    let burned = mul_div(
        share_issuance,
        initial_d.checked_sub(adjusted_d)?,
        initial_d,
        Rounding::Up,
    )?;
    (burned <= share_issuance).then_some(burned)
}

/// D 从 `d0` 变到 `d1` 时，以 `index` 资产单边完成所需的储备（含手续费扣减）。
fn one_asset_reserves(
    normalized: &[Balance],
    index: usize,
    d0: Balance,
    d1: Balance,
    fee: Permill,
    amplification: u128,
) -> Option<(Balance, Balance)> {
    let y = calculate_y(&without(normalized, index), d1, amplification)?;
    let fee = imbalance_fee(fee, normalized.len())?;
    let reduced = normalized
        .iter()
        .enumerate()
        .map(|(position, reserve)| {
            let target = if position == index { y } else { *reserve };
            let ideal = mul_div(*reserve, d1, d0, Rounding::Down)?;
            let expected = ideal.abs_diff(target);
            reserve.checked_sub(fee_amount(expected, fee, Rounding::Up)?)
        })
        .collect::<Option<Vec<_>>>()?;
    let y_reduced = calculate_y(&without(&reduced, index), d1, amplification)?;
    Some((reduced[index], y_reduced))
}

/// 销毁 `shares` 份额单边取出 `index` 资产的数量（卖出份额换资产）。
pub fn calculate_withdraw_one_asset(
    reserves: &[AssetReserve],
    index: usize,
    shares: Balance,
    amplification: u128,
    share_issuance: Balance,
    fee: Permill,
) -> Option<Balance> {
    if index >= reserves.len() || share_issuance == 0 || shares >= share_issuance {
        return None;
    }
    let normalized = normalize_reserves(reserves)?;
    let d0 = calculate_d(&normalized, amplification)?;
    let d1 = d0.checked_sub(mul_div(d0, shares, share_issuance, Rounding::Down)?)?;

    let (reduced_reserve, y) = one_asset_reserves(&normalized, index, d0, d1, fee, amplification)?;
    let amount = reduced_reserve.checked_sub(y)?;
    normalize_value(amount, TARGET_PRECISION, reserves[index].decimals, Rounding::Down)
}

/// 铸造 `shares` 份额需要单边注入的 `index` 资产数量（用资产买份额）。
pub fn calculate_add_one_asset(
    reserves: &[AssetReserve],
    index: usize,
    shares: Balance,
    amplification: u128,
    share_issuance: Balance,
    fee: Permill,
) -> Option<Balance> {
    if index >= reserves.len() || share_issuance == 0 {
        return None;
    }
    let normalized = normalize_reserves(reserves)?;
    let d0 = calculate_d(&normalized, amplification)?;
    let d1 = d0.checked_add(mul_div(d0, shares, share_issuance, Rounding::Up)?)?;

    let (reduced_reserve, y) = one_asset_reserves(&normalized, index, d0, d1, fee, amplification)?;
    let amount = y.checked_sub(reduced_reserve)?;
    normalize_value(amount, TARGET_PRECISION, reserves[index].decimals, Rounding::Up)
}
