//! Group-scoped change notifications.
//!
//! Every expense mutation is fanned out to in-process subscribers (the
//! websocket endpoint) and, when Redis is configured, published on
//! `group:{id}:events` so other instances can relay it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use redis::AsyncCommands;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::routes::expense::model::Expense;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupEventKind {
    ExpenseAdded,
    ExpenseUpdated,
    ExpenseDeleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupEvent {
    pub event: GroupEventKind,
    pub group_id: Uuid,
    pub expense_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense: Option<Expense>,
}

impl GroupEvent {
    pub fn new(event: GroupEventKind, expense: &Expense) -> Self {
        Self {
            event,
            group_id: expense.group,
            expense_id: expense.id,
            expense: Some(expense.clone()),
        }
    }

    pub fn deleted(group_id: Uuid, expense_id: Uuid) -> Self {
        Self {
            event: GroupEventKind::ExpenseDeleted,
            group_id,
            expense_id,
            expense: None,
        }
    }
}

pub fn channel_name(group_id: Uuid) -> String {
    format!("group:{}:events", group_id)
}

#[derive(Clone, Default)]
pub struct EventHub {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<GroupEvent>>>>,
    redis: Option<Arc<redis::Client>>,
}

impl EventHub {
    pub fn new(redis: Option<redis::Client>) -> Self {
        Self {
            channels: Arc::default(),
            redis: redis.map(Arc::new),
        }
    }

    pub fn subscribe(&self, group_id: Uuid) -> broadcast::Receiver<GroupEvent> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(group_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Fire-and-forget. Delivery failures are logged and never reach the
    /// request that caused the event.
    pub fn publish(&self, event: GroupEvent) {
        {
            let mut channels = self
                .channels
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let closed = channels
                .get(&event.group_id)
                .is_some_and(|sender| sender.send(event.clone()).is_err());
            if closed {
                channels.remove(&event.group_id);
            }
        }

        let Some(client) = self.redis.clone() else {
            return;
        };
        tokio::spawn(async move {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode group event");
                    return;
                }
            };
            let result: redis::RedisResult<()> = async {
                let mut conn = client.get_multiplexed_async_connection().await?;
                conn.publish(channel_name(event.group_id), payload).await
            }
            .await;
            if let Err(e) = result {
                tracing::warn!(group_id = %event.group_id, error = %e, "failed to publish group event");
            }
        });
    }

    pub fn subscriber_count(&self, group_id: Uuid) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&group_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_for_their_group_only() {
        let hub = EventHub::new(None);
        let group_a = Uuid::new_v4();
        let group_b = Uuid::new_v4();
        let mut rx_a = hub.subscribe(group_a);
        let mut rx_b = hub.subscribe(group_b);

        let expense_id = Uuid::new_v4();
        hub.publish(GroupEvent::deleted(group_a, expense_id));

        let event = rx_a.recv().await.unwrap();
        assert_eq!(event.event, GroupEventKind::ExpenseDeleted);
        assert_eq!(event.expense_id, expense_id);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let hub = EventHub::new(None);
        let group_id = Uuid::new_v4();
        hub.publish(GroupEvent::deleted(group_id, Uuid::new_v4()));
        assert_eq!(hub.subscriber_count(group_id), 0);
    }

    #[test]
    fn dropped_subscribers_release_the_channel() {
        let hub = EventHub::new(None);
        let group_id = Uuid::new_v4();
        drop(hub.subscribe(group_id));
        hub.publish(GroupEvent::deleted(group_id, Uuid::new_v4()));
        assert!(hub.channels.lock().unwrap().get(&group_id).is_none());
    }

    #[test]
    fn subscribing_prunes_channels_nobody_listens_to() {
        let hub = EventHub::new(None);
        let quiet_group = Uuid::new_v4();
        let busy_group = Uuid::new_v4();
        drop(hub.subscribe(quiet_group));

        let _rx = hub.subscribe(busy_group);
        let channels = hub.channels.lock().unwrap();
        assert!(channels.get(&quiet_group).is_none());
        assert!(channels.get(&busy_group).is_some());
    }

    #[test]
    fn event_kind_serializes_snake_case() {
        let event = GroupEvent::deleted(Uuid::nil(), Uuid::nil());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "expense_deleted");
        assert!(json.get("expense").is_none());
        assert_eq!(channel_name(Uuid::nil()), "group:00000000-0000-0000-0000-000000000000:events");
    }
}
