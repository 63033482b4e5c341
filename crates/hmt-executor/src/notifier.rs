//! Best-effort user notifications.

use hmt_core::{LinkedAccount, Notification, NotificationKind};
use hmt_store::DynStore;
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct Notifier {
    store: DynStore,
}

impl Notifier {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Persist one notification. Failures are logged and dropped.
    pub async fn send(&self, notification: Notification) {
        if let Err(e) = self.store.insert_notification(&notification).await {
            warn!(
                user_id = %notification.user_id,
                kind = notification.kind.as_str(),
                error = %e,
                "Failed to store notification"
            );
        }
    }

    /// One notification per account.
    pub async fn per_account(
        &self,
        accounts: &[LinkedAccount],
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) {
        for account in accounts {
            self.send(Notification::new(
                account.user_id,
                Some(account.id),
                kind,
                title,
                format!("{}: {message}", account.display_name()),
            ))
            .await;
        }
    }

    /// A user-level notification not tied to an account.
    pub async fn user(&self, user_id: Uuid, kind: NotificationKind, title: &str, message: &str) {
        self.send(Notification::new(user_id, None, kind, title, message))
            .await;
    }
}
