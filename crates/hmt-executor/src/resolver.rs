//! Webhook key and linked-account resolution.

use hmt_core::{LinkedAccount, WebhookKey};
use hmt_store::Store;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

/// Message for a key that maps to no active account.
pub const NO_ACCOUNTS_MESSAGE: &str = "no accounts mapped";

/// Active key for `key`.
///
/// Unknown and inactive keys both fail with [`GatewayError::Auth`]; the
/// variant text is for the audit log only.
pub async fn resolve_key(store: &dyn Store, key: &str) -> GatewayResult<WebhookKey> {
    match store.find_webhook_key(key).await? {
        Some(found) if found.is_active => Ok(found),
        Some(found) => {
            debug!(webhook_key_id = %found.id, "Webhook key is inactive");
            Err(GatewayError::Auth(format!("inactive webhook key {}", found.id)))
        }
        None => Err(GatewayError::Auth("unknown webhook key".to_string())),
    }
}

/// Active accounts linked to `key`, in mapping order.
pub async fn resolve_accounts(
    store: &dyn Store,
    key: &WebhookKey,
) -> GatewayResult<Vec<LinkedAccount>> {
    if key.account_ids.is_empty() {
        return Err(GatewayError::Config(NO_ACCOUNTS_MESSAGE.to_string()));
    }
    let accounts = store.active_accounts(&key.account_ids).await?;
    if accounts.is_empty() {
        return Err(GatewayError::Config(NO_ACCOUNTS_MESSAGE.to_string()));
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hmt_store::MemoryStore;
    use uuid::Uuid;

    fn key(is_active: bool, account_ids: Vec<Uuid>) -> WebhookKey {
        WebhookKey {
            id: Uuid::new_v4(),
            key: "wk_1".to_string(),
            user_id: Uuid::new_v4(),
            name: "tv".to_string(),
            is_active,
            account_ids,
            sl_multiplier: None,
            target_multiplier: None,
            lot_multiplier: None,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    fn account(user_id: Uuid, is_active: bool) -> LinkedAccount {
        LinkedAccount {
            id: Uuid::new_v4(),
            user_id,
            broker_name: "zerodha".to_string(),
            label: "main".to_string(),
            api_key: "api".to_string(),
            access_token: Some("token".to_string()),
            is_active,
        }
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_keys_are_auth_errors() {
        let store = MemoryStore::new();
        assert!(matches!(
            resolve_key(&store, "wk_1").await,
            Err(GatewayError::Auth(_))
        ));

        store.insert_webhook_key(key(false, vec![]));
        let err = resolve_key(&store, "wk_1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)));
        assert_eq!(err.public_message(), "unauthorized");
    }

    #[tokio::test]
    async fn test_accounts_require_active_mapping() {
        let store = MemoryStore::new();
        let empty = key(true, vec![]);
        assert!(matches!(
            resolve_accounts(&store, &empty).await,
            Err(GatewayError::Config(msg)) if msg == NO_ACCOUNTS_MESSAGE
        ));

        let inactive = account(empty.user_id, false);
        store.insert_account(inactive.clone());
        let only_inactive = key(true, vec![inactive.id]);
        assert!(resolve_accounts(&store, &only_inactive).await.is_err());

        let active = account(empty.user_id, true);
        store.insert_account(active.clone());
        let mixed = key(true, vec![inactive.id, active.id]);
        let accounts = resolve_accounts(&store, &mixed).await.unwrap();
        assert_eq!(accounts, vec![active]);
    }
}
