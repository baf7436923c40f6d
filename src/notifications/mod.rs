//! Live order notifications over STOMP.
//!
//! - [`stomp`] - frame codec and heart-beat negotiation
//! - [`channel`] - one auto-reconnecting subscription
//! - [`hub`] - the shop console's single subscription, switched with the shop

pub mod channel;
pub mod hub;
pub mod stomp;

pub use channel::{ActivityNotice, ChannelConfig, ConnectionState, NotificationChannel};
pub use hub::{shop_orders_topic, ShopNotifications};
pub use stomp::{Command, Frame, FrameError, HeartBeat};
