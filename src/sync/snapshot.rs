use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::diff::{IdentityMap, ProxyList};
use super::error::SyncError;
use super::proxy::{IdentityReader, ProxyListReader};
use super::repository::InMemoryMetaAccountRepository;
use super::types::{AccountId, ChainInfo, ManagedMetaAccount};

/// 代理同步的离线快照：链上代理列表、链上身份与本地钱包。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySnapshot {
    pub chain: ChainInfo,
    #[serde(default)]
    pub proxies: ProxyList,
    #[serde(default)]
    pub identities: IdentityMap,
    #[serde(default)]
    pub wallets: Vec<ManagedMetaAccount>,
}

impl ProxySnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("读取代理快照失败: {}", path.display()))?;
        Self::parse(&raw, path)
    }

    pub fn parse(raw: &str, path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(raw)
                .with_context(|| format!("解析 JSON 代理快照失败: {}", path.display())),
            Some("yaml" | "yml") => serde_yaml::from_str(raw)
                .with_context(|| format!("解析 YAML 代理快照失败: {}", path.display())),
            other => bail!("不支持的快照格式: {other:?}"),
        }
    }

    pub fn repository(&self) -> InMemoryMetaAccountRepository {
        InMemoryMetaAccountRepository::new(self.wallets.iter().cloned())
    }

    pub fn reader(&self) -> SnapshotProxyReader {
        SnapshotProxyReader {
            proxies: self.proxies.clone(),
            identities: self.identities.clone(),
        }
    }
}

/// 以快照代替链连接的代理与身份读取器。
#[derive(Debug, Clone, Default)]
pub struct SnapshotProxyReader {
    proxies: ProxyList,
    identities: IdentityMap,
}

#[async_trait]
impl ProxyListReader for SnapshotProxyReader {
    async fn fetch_proxy_list(&self) -> Result<ProxyList, SyncError> {
        Ok(self.proxies.clone())
    }
}

#[async_trait]
impl IdentityReader for SnapshotProxyReader {
    async fn fetch_identities(&self, accounts: &[AccountId]) -> Result<IdentityMap, SyncError> {
        Ok(accounts
            .iter()
            .filter_map(|account| {
                self.identities
                    .get(account)
                    .map(|identity| (account.clone(), identity.clone()))
            })
            .collect())
    }
}
