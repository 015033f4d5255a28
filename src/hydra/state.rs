use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use super::error::ReaderError;
use super::types::{AssetId, Balance, Permill, PoolKind};

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OmnipoolAssetState {
    #[serde_as(as = "DisplayFromStr")]
    pub reserve: Balance,
    #[serde_as(as = "DisplayFromStr")]
    pub hub_reserve: Balance,
    /// 该资产作为输出时按输出数量收取。
    #[serde(default)]
    pub asset_fee: Permill,
    /// 该资产作为输入时按换出的 hub 数量收取。
    #[serde(default)]
    pub protocol_fee: Permill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OmnipoolState {
    pub hub_asset: AssetId,
    #[serde(default)]
    pub assets: BTreeMap<AssetId, OmnipoolAssetState>,
}

impl OmnipoolState {
    pub fn asset(&self, asset: AssetId) -> Option<&OmnipoolAssetState> {
        self.assets.get(&asset)
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StableswapAsset {
    pub asset_id: AssetId,
    #[serde_as(as = "DisplayFromStr")]
    pub reserve: Balance,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StableswapPoolState {
    pub pool_asset: AssetId,
    pub assets: Vec<StableswapAsset>,
    pub amplification: u64,
    #[serde(default)]
    pub fee: Permill,
    #[serde_as(as = "DisplayFromStr")]
    pub share_issuance: Balance,
}

impl StableswapPoolState {
    pub fn index_of(&self, asset: AssetId) -> Option<usize> {
        self.assets.iter().position(|entry| entry.asset_id == asset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolState {
    Omnipool(OmnipoolState),
    Stableswap(StableswapPoolState),
}

impl PoolState {
    pub fn kind(&self) -> PoolKind {
        match self {
            PoolState::Omnipool(_) => PoolKind::Omnipool,
            PoolState::Stableswap(pool) => PoolKind::stableswap(pool.pool_asset),
        }
    }

    /// 可在该池子内互换的资产，升序。hub 资产不参与路由；稳定池包含份额资产。
    pub fn tradable_assets(&self) -> Vec<AssetId> {
        let mut assets: Vec<AssetId> = match self {
            PoolState::Omnipool(pool) => pool
                .assets
                .keys()
                .copied()
                .filter(|asset| *asset != pool.hub_asset)
                .collect(),
            PoolState::Stableswap(pool) => pool
                .assets
                .iter()
                .map(|entry| entry.asset_id)
                .chain(std::iter::once(pool.pool_asset))
                .collect(),
        };
        assets.sort_unstable();
        assets.dedup();
        assets
    }
}

/// 链上状态读取接口；报价只读，实现需可并发调用。
#[async_trait]
pub trait ChainStateReader: Send + Sync {
    async fn pool_keys(&self) -> Result<Vec<PoolKind>, ReaderError>;

    async fn fetch_state(&self, key: PoolKind) -> Result<PoolState, ReaderError>;
}

/// 链上池子状态的离线快照文件（JSON / YAML）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSnapshot {
    #[serde(default)]
    pub omnipool: Option<OmnipoolState>,
    #[serde(default)]
    pub stableswap: Vec<StableswapPoolState>,
}

impl ChainSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("读取快照文件失败: {}", path.display()))?;
        Self::parse(&raw, path)
    }

    pub fn parse(raw: &str, path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(raw)
                .with_context(|| format!("解析 JSON 快照失败: {}", path.display())),
            Some("yaml" | "yml") => serde_yaml::from_str(raw)
                .with_context(|| format!("解析 YAML 快照失败: {}", path.display())),
            other => bail!("不支持的快照格式: {other:?}"),
        }
    }

    pub fn into_states(self) -> Vec<PoolState> {
        self.omnipool
            .into_iter()
            .map(PoolState::Omnipool)
            .chain(self.stableswap.into_iter().map(PoolState::Stableswap))
            .collect()
    }
}

/// 以快照代替链连接的读取器。
#[derive(Debug, Clone, Default)]
pub struct SnapshotReader {
    pools: BTreeMap<PoolKind, PoolState>,
}

impl SnapshotReader {
    pub fn new(states: impl IntoIterator<Item = PoolState>) -> Self {
        Self {
            pools: states
                .into_iter()
                .map(|state| (state.kind(), state))
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: ChainSnapshot) -> Self {
        Self::new(snapshot.into_states())
    }
}

#[async_trait]
impl ChainStateReader for SnapshotReader {
    async fn pool_keys(&self) -> Result<Vec<PoolKind>, ReaderError> {
        Ok(self.pools.keys().copied().collect())
    }

    async fn fetch_state(&self, key: PoolKind) -> Result<PoolState, ReaderError> {
        self.pools
            .get(&key)
            .cloned()
            .ok_or(ReaderError::MissingPool(key))
    }
}
