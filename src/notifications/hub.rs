//! The shop console's single live subscription.

use std::sync::Arc;

use super::channel::{ChannelConfig, NotificationChannel};
use crate::traits::BrokerConnector;

/// Topic carrying new-order events for one shop.
pub fn shop_orders_topic(shop_id: &str) -> String {
    format!("shop/{}/orders", urlencoding::encode(shop_id))
}

/// Holds at most one [`NotificationChannel`], bound to the active shop.
///
/// Switching shops tears the old channel down completely before the new one
/// connects, so two shops' topics are never subscribed at once.
pub struct ShopNotifications {
    config: ChannelConfig,
    connector: Arc<dyn BrokerConnector>,
    active: Option<(String, NotificationChannel)>,
}

impl ShopNotifications {
    pub fn new(config: ChannelConfig, connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            config,
            connector,
            active: None,
        }
    }

    /// Follow a new shop identity. A no-op if it is already the active shop.
    pub async fn switch_shop(&mut self, shop_id: &str) {
        if self.shop_id() == Some(shop_id) {
            return;
        }

        self.close().await;
        let topic = shop_orders_topic(shop_id);
        tracing::info!(shop_id = %shop_id, topic = %topic, "Opening shop notifications");
        let channel = NotificationChannel::open(self.config.clone(), topic, Arc::clone(&self.connector));
        self.active = Some((shop_id.to_string(), channel));
    }

    /// Tear down the active channel, if any.
    pub async fn close(&mut self) {
        if let Some((shop_id, channel)) = self.active.take() {
            tracing::info!(shop_id = %shop_id, "Closing shop notifications");
            channel.teardown().await;
        }
    }

    pub fn shop_id(&self) -> Option<&str> {
        self.active.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn channel(&self) -> Option<&NotificationChannel> {
        self.active.as_ref().map(|(_, channel)| channel)
    }
}
