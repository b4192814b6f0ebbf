use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{AccountId, Collection};

/// a remote mutation touched `collection` for `account_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub account_id: AccountId,
    pub collection: Collection,
}

/// change-notification feed shared between the store and any number of engines.
///
/// Receivers only learn that something changed; they re-fetch the full state rather
/// than patching from the notification.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeNotification>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// returns the number of subscribers reached
    pub fn publish(&self, notification: ChangeNotification) -> usize {
        self.tx.send(notification).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let feed = ChangeFeed::default();
        assert_eq!(
            feed.publish(ChangeNotification {
                account_id: Uuid::new_v4(),
                collection: Collection::Loans,
            }),
            0
        );

        let mut rx = feed.subscribe();
        let account = Uuid::new_v4();
        let sent = feed.publish(ChangeNotification {
            account_id: account,
            collection: Collection::Borrowers,
        });
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.account_id, account);
        assert_eq!(received.collection, Collection::Borrowers);
    }
}
