use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::SyncError;
use super::types::ManagedMetaAccount;

/// 钱包持久化接口；同步服务是唯一写入者。
#[async_trait]
pub trait MetaAccountRepository: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<ManagedMetaAccount>, SyncError>;

    /// 一次写入：先更新/新增，再按 id 删除。
    async fn save(
        &self,
        new_or_updated: Vec<ManagedMetaAccount>,
        removed_ids: Vec<String>,
    ) -> Result<(), SyncError>;
}

#[derive(Default)]
pub struct InMemoryMetaAccountRepository {
    wallets: RwLock<BTreeMap<String, ManagedMetaAccount>>,
}

impl InMemoryMetaAccountRepository {
    pub fn new(wallets: impl IntoIterator<Item = ManagedMetaAccount>) -> Self {
        Self {
            wallets: RwLock::new(
                wallets
                    .into_iter()
                    .map(|wallet| (wallet.info.meta_id.clone(), wallet))
                    .collect(),
            ),
        }
    }

    pub fn snapshot(&self) -> Vec<ManagedMetaAccount> {
        let mut wallets: Vec<ManagedMetaAccount> = self.wallets.read().values().cloned().collect();
        wallets.sort_by(|left, right| {
            left.order
                .cmp(&right.order)
                .then_with(|| left.info.meta_id.cmp(&right.info.meta_id))
        });
        wallets
    }

    pub fn get(&self, meta_id: &str) -> Option<ManagedMetaAccount> {
        self.wallets.read().get(meta_id).cloned()
    }
}

#[async_trait]
impl MetaAccountRepository for InMemoryMetaAccountRepository {
    async fn fetch_all(&self) -> Result<Vec<ManagedMetaAccount>, SyncError> {
        Ok(self.snapshot())
    }

    async fn save(
        &self,
        new_or_updated: Vec<ManagedMetaAccount>,
        removed_ids: Vec<String>,
    ) -> Result<(), SyncError> {
        let mut wallets = self.wallets.write();
        for wallet in new_or_updated {
            wallets.insert(wallet.info.meta_id.clone(), wallet);
        }
        for meta_id in removed_ids {
            wallets.remove(&meta_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::diff::fixtures::{proxied_wallet, signer_wallet};
    use crate::sync::types::ProxyStatus;

    #[tokio::test]
    async fn save_applies_updates_then_removals() {
        let repository = InMemoryMetaAccountRepository::new([signer_wallet()]);
        repository
            .save(vec![proxied_wallet(ProxyStatus::New)], Vec::new())
            .await
            .unwrap();
        assert_eq!(repository.fetch_all().await.unwrap().len(), 2);

        repository.save(Vec::new(), vec!["proxied".into()]).await.unwrap();
        let remaining = repository.fetch_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].identifier(), "signer");
    }
}
