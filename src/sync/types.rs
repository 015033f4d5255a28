use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SyncError;

/// 链上账户公钥，十六进制显示（`0x` 前缀）。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(Vec<u8>);

impl AccountId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for AccountId {
    type Err = SyncError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let digits = raw.trim().trim_start_matches("0x");
        if digits.is_empty() || digits.len() % 2 != 0 || !digits.is_ascii() {
            return Err(SyncError::InvalidAccount(raw.to_string()));
        }
        (0..digits.len())
            .step_by(2)
            .map(|index| u8::from_str_radix(&digits[index..index + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map(Self)
            .map_err(|_| SyncError::InvalidAccount(raw.to_string()))
    }
}

impl Serialize for AccountId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

pub type ChainId = String;

/// 代理类型，如 `Any`、`Staking`、`NonTransfer`。
pub type ProxyType = String;

/// 链上返回的一条代理关系。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyAccount {
    pub account_id: AccountId,
    #[serde(rename = "type")]
    pub proxy_type: ProxyType,
    #[serde(default)]
    pub delay: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStatus {
    New,
    Active,
    Revoked,
}

/// 本地钱包里记录的代理关系。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyAccountModel {
    #[serde(rename = "type")]
    pub proxy_type: ProxyType,
    pub account_id: AccountId,
    pub status: ProxyStatus,
}

impl ProxyAccountModel {
    /// 同一条代理关系：账户与类型相同，状态同属“有效”（new/active）或同为 revoked。
    pub fn same_proxy(&self, local: &ProxyAccountModel) -> bool {
        let live = |status| matches!(status, ProxyStatus::New | ProxyStatus::Active);
        let equal_status = match self.status {
            ProxyStatus::New | ProxyStatus::Active => live(local.status),
            ProxyStatus::Revoked => local.status == ProxyStatus::Revoked,
        };
        self.account_id == local.account_id && self.proxy_type == local.proxy_type && equal_status
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CryptoType {
    Sr25519,
    Ed25519,
    EthereumEcdsa,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainAccount {
    pub chain_id: ChainId,
    pub account_id: AccountId,
    pub public_key: Vec<u8>,
    pub crypto_type: CryptoType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyAccountModel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Secrets,
    Watch,
    Proxy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaAccount {
    pub meta_id: String,
    pub name: String,
    #[serde(default)]
    pub substrate_account_id: Option<AccountId>,
    #[serde(default)]
    pub substrate_crypto_type: Option<CryptoType>,
    #[serde(default)]
    pub chain_accounts: Vec<ChainAccount>,
    pub kind: WalletKind,
}

impl MetaAccount {
    /// 钱包在该链上是否持有 `account_id`：链专属账户优先，没有时看通用 substrate 账户。
    pub fn has(&self, account_id: &AccountId, chain_id: &str) -> bool {
        match self.chain_account(chain_id) {
            Some(chain_account) => &chain_account.account_id == account_id,
            None => self.substrate_account_id.as_ref() == Some(account_id),
        }
    }

    pub fn chain_account(&self, chain_id: &str) -> Option<&ChainAccount> {
        self.chain_accounts
            .iter()
            .find(|chain_account| chain_account.chain_id == chain_id)
    }

    /// 是否为 `account_id` 在该链上的被代理钱包。
    pub fn is_proxied(&self, account_id: &AccountId, chain_id: &str) -> bool {
        self.kind == WalletKind::Proxy
            && self.chain_account(chain_id).is_some_and(|chain_account| {
                &chain_account.account_id == account_id && chain_account.proxy.is_some()
            })
    }

    pub fn proxy_chain_account(
        &self,
        proxy_account_id: &AccountId,
        proxy_type: &str,
    ) -> Option<&ChainAccount> {
        self.chain_accounts.iter().find(|chain_account| {
            chain_account.proxy.as_ref().is_some_and(|proxy| {
                &proxy.account_id == proxy_account_id && proxy.proxy_type == proxy_type
            })
        })
    }

    pub fn replacing_chain_account(&self, replacement: ChainAccount) -> MetaAccount {
        let mut updated = self.clone();
        updated
            .chain_accounts
            .retain(|chain_account| chain_account.chain_id != replacement.chain_id);
        updated.chain_accounts.push(replacement);
        updated
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedMetaAccount {
    pub info: MetaAccount,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default)]
    pub order: u32,
}

impl ManagedMetaAccount {
    pub fn identifier(&self) -> &str {
        &self.info.meta_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncChanges<T> {
    pub new_or_updated: Vec<T>,
    pub removed: Vec<T>,
}

impl<T> Default for SyncChanges<T> {
    fn default() -> Self {
        Self {
            new_or_updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T> SyncChanges<T> {
    pub fn is_empty(&self) -> bool {
        self.new_or_updated.is_empty() && self.removed.is_empty()
    }

    pub fn extend(&mut self, other: SyncChanges<T>) {
        self.new_or_updated.extend(other.new_or_updated);
        self.removed.extend(other.removed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub chain_id: ChainId,
    #[serde(default)]
    pub ethereum_based: bool,
}

impl ChainInfo {
    pub fn crypto_type(&self) -> CryptoType {
        if self.ethereum_based {
            CryptoType::EthereumEcdsa
        } else {
            CryptoType::Sr25519
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub display_name: String,
}

/// 一次同步写入仓库的结果统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub generation: u64,
    pub saved: usize,
    pub removed: usize,
}
