use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub type AssetId = u32;
pub type Balance = u128;

/// 百万分比（HydraDX 手续费单位）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permill(u32);

impl Permill {
    pub const ONE: u32 = 1_000_000;

    pub const fn from_parts(parts: u32) -> Self {
        if parts > Self::ONE {
            Self(Self::ONE)
        } else {
            Self(parts)
        }
    }

    pub const fn from_percent(percent: u32) -> Self {
        Self::from_parts(percent.saturating_mul(10_000))
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn deconstruct(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sell,
    Buy,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Sell => "sell",
            Direction::Buy => "buy",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 池子种类，同时作为池子在链上的键。排序即路由发现时的池子遍历顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PoolKind {
    Omnipool,
    Stableswap {
        #[serde(rename = "poolAsset")]
        pool_asset: AssetId,
    },
}

impl PoolKind {
    pub const fn stableswap(pool_asset: AssetId) -> Self {
        Self::Stableswap { pool_asset }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Omnipool => f.write_str("omnipool"),
            PoolKind::Stableswap { pool_asset } => write!(f, "stableswap({pool_asset})"),
        }
    }
}

/// 路由中的一跳。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolComponent {
    #[serde(flatten)]
    pub pool: PoolKind,
    pub asset_in: AssetId,
    pub asset_out: AssetId,
}

impl PoolComponent {
    pub const fn new(pool: PoolKind, asset_in: AssetId, asset_out: AssetId) -> Self {
        Self {
            pool,
            asset_in,
            asset_out,
        }
    }

    pub const fn omnipool(asset_in: AssetId, asset_out: AssetId) -> Self {
        Self::new(PoolKind::Omnipool, asset_in, asset_out)
    }

    pub const fn stableswap(pool_asset: AssetId, asset_in: AssetId, asset_out: AssetId) -> Self {
        Self::new(PoolKind::stableswap(pool_asset), asset_in, asset_out)
    }
}

impl fmt::Display for PoolComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}->{}", self.pool, self.asset_in, self.asset_out)
    }
}

pub type Components = SmallVec<[PoolComponent; 4]>;

/// 按卖出方向排列的多跳路由。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapRoute {
    pub components: Components,
}

impl SwapRoute {
    pub fn new(components: impl IntoIterator<Item = PoolComponent>) -> Self {
        Self {
            components: components.into_iter().collect(),
        }
    }

    pub fn asset_in(&self) -> Option<AssetId> {
        self.components.first().map(|component| component.asset_in)
    }

    pub fn asset_out(&self) -> Option<AssetId> {
        self.components.last().map(|component| component.asset_out)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// 非空、首尾相接、资产不重复、池子不重复。
    pub fn is_well_formed(&self) -> bool {
        let Some(first) = self.components.first() else {
            return false;
        };
        let connected = self
            .components
            .windows(2)
            .all(|pair| pair[0].asset_out == pair[1].asset_in);
        if !connected {
            return false;
        }

        let mut assets = vec![first.asset_in];
        let mut pools = Vec::with_capacity(self.components.len());
        for component in &self.components {
            if assets.contains(&component.asset_out) || pools.contains(&component.pool) {
                return false;
            }
            assets.push(component.asset_out);
            pools.push(component.pool);
        }
        true
    }

    /// 报价顺序：卖出按路由顺序，买入倒序（从目标资产往回算）。
    pub fn quoting_order(&self, direction: Direction) -> Components {
        match direction {
            Direction::Sell => self.components.clone(),
            Direction::Buy => self.components.iter().rev().copied().collect(),
        }
    }

    pub fn to_context(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_context(context: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(context)
    }
}

impl fmt::Display for SwapRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, component) in self.components.iter().enumerate() {
            if index > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapPair {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
}

impl SwapPair {
    pub const fn new(asset_in: AssetId, asset_out: AssetId) -> Self {
        Self {
            asset_in,
            asset_out,
        }
    }
}

impl fmt::Display for SwapPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.asset_in, self.asset_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteArgs {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    /// 卖出时为输入数量，买入时为期望输出数量。
    pub amount: Balance,
    pub direction: Direction,
}

impl QuoteArgs {
    pub const fn sell(asset_in: AssetId, asset_out: AssetId, amount: Balance) -> Self {
        Self {
            asset_in,
            asset_out,
            amount,
            direction: Direction::Sell,
        }
    }

    pub const fn buy(asset_in: AssetId, asset_out: AssetId, amount: Balance) -> Self {
        Self {
            asset_in,
            asset_out,
            amount,
            direction: Direction::Buy,
        }
    }

    pub const fn pair(&self) -> SwapPair {
        SwapPair::new(self.asset_in, self.asset_out)
    }
}

/// 报价结果：`amount` 是另一侧的数量，`context` 是胜出路由的 JSON。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub args: QuoteArgs,
    pub amount: Balance,
    pub context: String,
}

impl Quote {
    pub fn amount_in(&self) -> Balance {
        match self.args.direction {
            Direction::Sell => self.args.amount,
            Direction::Buy => self.amount,
        }
    }

    pub fn amount_out(&self) -> Balance {
        match self.args.direction {
            Direction::Sell => self.amount,
            Direction::Buy => self.args.amount,
        }
    }

    pub fn route(&self) -> Result<SwapRoute, serde_json::Error> {
        SwapRoute::from_context(&self.context)
    }
}
