use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use super::types::{
    AccountId, AccountIdentity, ChainAccount, ChainInfo, ManagedMetaAccount, MetaAccount,
    ProxyAccount, ProxyAccountModel, ProxyStatus, SyncChanges, WalletKind,
};

/// 被代理账户 -> 其全部代理。
pub type ProxyList = BTreeMap<AccountId, Vec<ProxyAccount>>;
pub type IdentityMap = HashMap<AccountId, AccountIdentity>;

/// 只保留代理方是本地钱包的代理关系；没有剩余代理的被代理账户整体丢弃。
pub fn local_proxies_only(
    list: ProxyList,
    wallets: &[ManagedMetaAccount],
    chain_id: &str,
) -> ProxyList {
    list.into_iter()
        .filter_map(|(proxied, proxies)| {
            let local: Vec<ProxyAccount> = proxies
                .into_iter()
                .filter(|proxy| {
                    wallets
                        .iter()
                        .any(|wallet| wallet.info.has(&proxy.account_id, chain_id))
                })
                .collect();
            (!local.is_empty()).then_some((proxied, local))
        })
        .collect()
}

/// 远端代理与本地记录的差异：新出现的代理为 `new`，远端已不存在的本地代理标记为 `revoked`。
///
/// 已经是 `revoked` 的本地记录不会再次产出。
pub fn updating_proxy_models(
    wallets: &[ManagedMetaAccount],
    account_id: &AccountId,
    remote: &[ProxyAccount],
    chain_id: &str,
) -> Vec<ProxyAccountModel> {
    let remote: Vec<ProxyAccountModel> = remote
        .iter()
        .map(|proxy| ProxyAccountModel {
            proxy_type: proxy.proxy_type.clone(),
            account_id: proxy.account_id.clone(),
            status: ProxyStatus::New,
        })
        .collect();

    let local: Vec<&ProxyAccountModel> = wallets
        .iter()
        .filter(|wallet| {
            wallet.info.kind == WalletKind::Proxy && wallet.info.has(account_id, chain_id)
        })
        .flat_map(|wallet| wallet.info.chain_accounts.iter())
        .filter(|chain_account| chain_account.chain_id == chain_id)
        .filter_map(|chain_account| chain_account.proxy.as_ref())
        .collect();

    let revoked = local
        .iter()
        .filter(|model| model.status != ProxyStatus::Revoked)
        .filter(|model| !remote.iter().any(|candidate| candidate.same_proxy(model)))
        .map(|model| ProxyAccountModel {
            status: ProxyStatus::Revoked,
            ..(*model).clone()
        })
        .collect::<Vec<_>>();

    remote
        .into_iter()
        .filter(|candidate| !local.iter().any(|model| candidate.same_proxy(model)))
        .chain(revoked)
        .collect()
}

/// 一个被代理账户对应的钱包变更。
///
/// 已有被代理钱包时原地更新代理状态；代理方钱包已不存在则删除被代理钱包。
/// 没有对应钱包时新建，名称取链上身份，缺省为账户十六进制。
pub fn meta_accounts_updates(
    wallets: &[ManagedMetaAccount],
    account_id: &AccountId,
    proxies: &[ProxyAccount],
    identities: &IdentityMap,
    chain: &ChainInfo,
) -> SyncChanges<ManagedMetaAccount> {
    let chain_id = chain.chain_id.as_str();
    let mut changes = SyncChanges::default();

    for proxy in updating_proxy_models(wallets, account_id, proxies, chain_id) {
        let existing = wallets.iter().find_map(|wallet| {
            if !wallet.info.is_proxied(account_id, chain_id) {
                return None;
            }
            wallet
                .info
                .proxy_chain_account(&proxy.account_id, &proxy.proxy_type)
                .map(|chain_account| (wallet, chain_account))
        });

        match existing {
            Some((wallet, chain_account)) => {
                let proxy_wallet_exists = wallets
                    .iter()
                    .any(|candidate| candidate.info.has(&proxy.account_id, chain_id));
                if !proxy_wallet_exists {
                    changes.removed.push(wallet.clone());
                    continue;
                }
                let replacement = ChainAccount {
                    proxy: Some(proxy),
                    ..chain_account.clone()
                };
                changes.new_or_updated.push(ManagedMetaAccount {
                    info: wallet.info.replacing_chain_account(replacement),
                    ..wallet.clone()
                });
            }
            None => changes
                .new_or_updated
                .push(new_proxied_wallet(account_id, proxy, identities, chain)),
        }
    }

    changes
}

/// 全部被代理账户的变更合并。
pub fn collect_changes(
    proxies: &ProxyList,
    wallets: &[ManagedMetaAccount],
    identities: &IdentityMap,
    chain: &ChainInfo,
) -> SyncChanges<ManagedMetaAccount> {
    let mut changes = SyncChanges::default();
    for (account_id, remote) in proxies {
        changes.extend(meta_accounts_updates(wallets, account_id, remote, identities, chain));
    }
    changes
}

fn new_proxied_wallet(
    account_id: &AccountId,
    proxy: ProxyAccountModel,
    identities: &IdentityMap,
    chain: &ChainInfo,
) -> ManagedMetaAccount {
    let crypto_type = chain.crypto_type();
    let name = identities
        .get(account_id)
        .map(|identity| identity.display_name.clone())
        .unwrap_or_else(|| account_id.to_string());

    ManagedMetaAccount {
        info: MetaAccount {
            meta_id: Uuid::new_v4().to_string(),
            name,
            substrate_account_id: Some(account_id.clone()),
            substrate_crypto_type: Some(crypto_type),
            chain_accounts: vec![ChainAccount {
                chain_id: chain.chain_id.clone(),
                account_id: account_id.clone(),
                public_key: account_id.as_bytes().to_vec(),
                crypto_type,
                proxy: Some(proxy),
            }],
            kind: WalletKind::Proxy,
        },
        is_selected: false,
        order: 0,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn proxy_list(entries: Vec<(AccountId, Vec<ProxyAccount>)>) -> ProxyList {
        entries.into_iter().collect()
    }

    #[test]
    fn only_proxies_held_locally_are_kept() {
        let stranger = AccountId::new([0x77; 4]);
        let list = proxy_list(vec![
            (proxied(), vec![any_proxy(signer()), any_proxy(stranger.clone())]),
            (AccountId::new([0x0b; 4]), vec![any_proxy(stranger)]),
        ]);

        let filtered = local_proxies_only(list, &[signer_wallet()], CHAIN);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[&proxied()], vec![any_proxy(signer())]);
    }

    #[test]
    fn new_proxy_creates_a_named_proxied_wallet() {
        let mut identities = IdentityMap::new();
        identities.insert(
            proxied(),
            AccountIdentity {
                display_name: "Treasury".into(),
            },
        );
        let changes = meta_accounts_updates(
            &[signer_wallet()],
            &proxied(),
            &[any_proxy(signer())],
            &identities,
            &chain(),
        );

        assert!(changes.removed.is_empty());
        let [created] = changes.new_or_updated.as_slice() else {
            panic!("expected one wallet, got {:?}", changes.new_or_updated);
        };
        assert_eq!(created.info.name, "Treasury");
        assert_eq!(created.info.kind, WalletKind::Proxy);
        assert!(Uuid::parse_str(&created.info.meta_id).is_ok());
        let proxy = created.info.chain_accounts[0].proxy.as_ref().unwrap();
        assert_eq!(proxy.status, ProxyStatus::New);
        assert_eq!(proxy.account_id, signer());
    }

    #[test]
    fn missing_identity_falls_back_to_hex_name() {
        let changes = meta_accounts_updates(
            &[signer_wallet()],
            &proxied(),
            &[any_proxy(signer())],
            &IdentityMap::new(),
            &chain(),
        );
        assert_eq!(changes.new_or_updated[0].info.name, "0x0a0a0a0a");
    }

    #[test]
    fn known_live_proxy_produces_no_changes() {
        for status in [ProxyStatus::New, ProxyStatus::Active] {
            let wallets = [signer_wallet(), proxied_wallet(status)];
            let changes = meta_accounts_updates(
                &wallets,
                &proxied(),
                &[any_proxy(signer())],
                &IdentityMap::new(),
                &chain(),
            );
            assert!(changes.is_empty());
        }
    }

    #[test]
    fn vanished_proxy_is_marked_revoked_once() {
        let wallets = [signer_wallet(), proxied_wallet(ProxyStatus::Active)];
        let models = updating_proxy_models(&wallets, &proxied(), &[], CHAIN);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].status, ProxyStatus::Revoked);

        let changes =
            meta_accounts_updates(&wallets, &proxied(), &[], &IdentityMap::new(), &chain());
        assert_eq!(changes.new_or_updated.len(), 1);
        let updated = &changes.new_or_updated[0];
        assert_eq!(updated.info.meta_id, "proxied");
        assert_eq!(updated.order, 1);
        assert_eq!(
            updated.info.chain_accounts[0].proxy.as_ref().unwrap().status,
            ProxyStatus::Revoked
        );

        let already_revoked = [signer_wallet(), proxied_wallet(ProxyStatus::Revoked)];
        assert!(updating_proxy_models(&already_revoked, &proxied(), &[], CHAIN).is_empty());
    }

    #[test]
    fn proxied_wallet_without_local_signer_is_removed() {
        let wallets = [proxied_wallet(ProxyStatus::Active)];
        let changes =
            meta_accounts_updates(&wallets, &proxied(), &[], &IdentityMap::new(), &chain());
        assert!(changes.new_or_updated.is_empty());
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.removed[0].identifier(), "proxied");
    }

    #[test]
    fn changes_are_collected_across_proxied_accounts() {
        let other = AccountId::new([0x0b; 4]);
        let list = proxy_list(vec![
            (proxied(), vec![any_proxy(signer())]),
            (other, vec![any_proxy(signer())]),
        ]);
        let changes = collect_changes(&list, &[signer_wallet()], &IdentityMap::new(), &chain());
        assert_eq!(changes.new_or_updated.len(), 2);
    }
}
