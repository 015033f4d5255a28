//! 池子定价公式。全部 `Option` 返回：溢出、除零、不收敛一律为 `None`。

pub mod omnipool;
pub mod stableswap;

use primitive_types::U256;

use super::types::{Balance, Permill};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

pub(crate) fn to_u256(value: Balance) -> U256 {
    U256::from(value)
}

pub(crate) fn to_balance(value: U256) -> Option<Balance> {
    (value.bits() <= 128).then(|| value.low_u128())
}

/// `a * b / c`，中间结果用 U256。
pub(crate) fn mul_div(a: Balance, b: Balance, c: Balance, rounding: Rounding) -> Option<Balance> {
    to_balance(mul_div_u256(to_u256(a), to_u256(b), to_u256(c), rounding)?)
}

pub(crate) fn mul_div_u256(a: U256, b: U256, c: U256, rounding: Rounding) -> Option<U256> {
    if c.is_zero() {
        return None;
    }
    let product = a.checked_mul(b)?;
    let quotient = product / c;
    match rounding {
        Rounding::Up if !(product % c).is_zero() => quotient.checked_add(U256::one()),
        _ => Some(quotient),
    }
}

/// 按百万分比计算手续费数量。
pub fn fee_amount(amount: Balance, fee: Permill, rounding: Rounding) -> Option<Balance> {
    mul_div(amount, Balance::from(fee.deconstruct()), Balance::from(Permill::ONE), rounding)
}

/// 扣费后的数量为 `net` 时，扣费前至少需要多少。
pub fn gross_for_net(net: Balance, fee: Permill) -> Option<Balance> {
    let keep = Permill::ONE.checked_sub(fee.deconstruct())?;
    if keep == 0 {
        return None;
    }
    mul_div(net, Balance::from(Permill::ONE), Balance::from(keep), Rounding::Up)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_rounds_as_requested() {
        assert_eq!(mul_div(10, 10, 3, Rounding::Down), Some(33));
        assert_eq!(mul_div(10, 10, 3, Rounding::Up), Some(34));
        assert_eq!(mul_div(9, 10, 3, Rounding::Up), Some(30));
        assert_eq!(mul_div(1, 1, 0, Rounding::Down), None);
        assert_eq!(mul_div(Balance::MAX, Balance::MAX, 1, Rounding::Down), None);
        assert_eq!(
            mul_div(Balance::MAX, Balance::MAX, Balance::MAX, Rounding::Down),
            Some(Balance::MAX)
        );
    }

    #[test]
    fn gross_covers_fee() {
        let fee = Permill::from_parts(2_500);
        let gross = gross_for_net(997_500, fee).unwrap();
        assert_eq!(gross, 1_000_000);
        let gross = gross_for_net(1_000, fee).unwrap();
        assert!(gross - fee_amount(gross, fee, Rounding::Up).unwrap() >= 1_000);
        assert_eq!(gross_for_net(1, Permill::from_percent(100)), None);
    }
}
