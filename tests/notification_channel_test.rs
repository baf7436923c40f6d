//! Integration tests for the reconnecting order-notification channel.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_for_state, wait_until, WAIT};
use futures_util::{SinkExt, StreamExt};
use market_session::adapters::mock::{BrokerEvent, MockBroker};
use market_session::adapters::TungsteniteConnector;
use market_session::notifications::{
    shop_orders_topic, ChannelConfig, Command, ConnectionState, Frame, HeartBeat,
    NotificationChannel, ShopNotifications,
};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

const DESTINATION: &str = "/topic/shop/42/orders";
const RECONNECT_DELAY: Duration = Duration::from_millis(50);

fn fast_config() -> ChannelConfig {
    ChannelConfig::new("ws://mock/ws")
        .with_heart_beat(HeartBeat::disabled())
        .with_reconnect_delay(RECONNECT_DELAY)
        .with_connect_timeout(Duration::from_millis(200))
}

fn open(broker: &MockBroker, config: ChannelConfig) -> NotificationChannel {
    NotificationChannel::open(config, shop_orders_topic("42"), Arc::new(broker.clone()))
}

#[tokio::test]
async fn test_message_raises_activity_until_acknowledged() {
    let broker = MockBroker::new();
    let channel = open(&broker, fast_config());
    let mut notices = channel.notices();

    wait_for_state(&channel, ConnectionState::Open).await;
    assert_eq!(broker.subscriptions(), vec![DESTINATION.to_string()]);
    assert!(!channel.has_activity());

    assert_eq!(broker.publish(DESTINATION, r#"{"orderId":1}"#), 1);

    let notice = tokio::time::timeout(WAIT, notices.recv()).await.unwrap().unwrap();
    assert_eq!(notice.topic, "shop/42/orders");
    assert!(channel.has_activity());

    channel.acknowledge();
    assert!(!channel.has_activity());

    channel.teardown().await;
}

#[tokio::test]
async fn test_reconnects_and_resubscribes_after_drop() {
    let broker = MockBroker::new();
    let channel = open(&broker, fast_config());
    wait_for_state(&channel, ConnectionState::Open).await;

    let dropped_at = tokio::time::Instant::now();
    broker.drop_connections();
    wait_until("second connection", || broker.connect_count() == 2).await;
    wait_for_state(&channel, ConnectionState::Open).await;

    // One backoff interval plus scheduling slack.
    let elapsed = dropped_at.elapsed();
    assert!(
        elapsed < RECONNECT_DELAY + Duration::from_millis(400),
        "reopened after {:?}",
        elapsed
    );
    assert!(elapsed >= RECONNECT_DELAY, "reopened after {:?}", elapsed);

    assert_eq!(
        broker.subscriptions(),
        vec![DESTINATION.to_string(), DESTINATION.to_string()]
    );
    assert_eq!(broker.live_connections(), 1);
    assert_eq!(broker.publish(DESTINATION, "{}"), 1);

    channel.teardown().await;
}

#[tokio::test]
async fn test_refused_connects_are_retried() {
    let broker = MockBroker::new();
    broker.fail_next_connects(3);
    let channel = open(&broker, fast_config());

    wait_for_state(&channel, ConnectionState::Open).await;
    assert_eq!(broker.connect_count(), 1);

    channel.teardown().await;
}

#[tokio::test]
async fn test_error_frame_forces_reconnect() {
    let broker = MockBroker::new();
    let channel = open(&broker, fast_config());
    wait_for_state(&channel, ConnectionState::Open).await;

    broker.send_error("session expired");
    wait_until("reconnect after ERROR", || broker.connect_count() == 2).await;
    wait_for_state(&channel, ConnectionState::Open).await;

    channel.teardown().await;
}

#[tokio::test]
async fn test_malformed_frame_is_ignored() {
    let broker = MockBroker::new();
    let channel = open(&broker, fast_config());
    wait_for_state(&channel, ConnectionState::Open).await;

    broker.send_raw("NOT-A-COMMAND\n\n\0");
    broker.publish(DESTINATION, "{}");
    let mut activity = channel.activity_receiver();
    tokio::time::timeout(WAIT, activity.wait_for(|seen| *seen))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(broker.connect_count(), 1);
    assert_eq!(channel.state(), ConnectionState::Open);

    channel.teardown().await;
}

#[tokio::test]
async fn test_silent_broker_times_out_handshake() {
    let broker = MockBroker::new();
    broker.set_silent(true);
    let channel = open(&broker, fast_config());

    wait_until("repeated attempts", || broker.connect_count() >= 2).await;
    assert_ne!(channel.state(), ConnectionState::Open);

    broker.set_silent(false);
    wait_for_state(&channel, ConnectionState::Open).await;

    channel.teardown().await;
}

#[tokio::test]
async fn test_missing_heart_beats_count_as_loss() {
    let broker = MockBroker::new();
    broker.set_heart_beat(HeartBeat::new(50, 0));
    let config = fast_config().with_heart_beat(HeartBeat::new(0, 50));
    let channel = open(&broker, config);

    wait_until("heart-beat timeout reconnect", || broker.connect_count() >= 2).await;

    channel.teardown().await;
}

#[tokio::test]
async fn test_teardown_disconnects_and_closes() {
    let broker = MockBroker::new();
    let channel = open(&broker, fast_config());
    wait_for_state(&channel, ConnectionState::Open).await;
    let state = channel.state_receiver();

    channel.teardown().await;

    assert_eq!(*state.borrow(), ConnectionState::Closed);
    assert_eq!(broker.live_connections(), 0);
    assert_eq!(
        broker.events(),
        vec![
            BrokerEvent::Connected { conn: 0 },
            BrokerEvent::Subscribed {
                conn: 0,
                destination: DESTINATION.to_string()
            },
            BrokerEvent::Disconnected { conn: 0 },
            BrokerEvent::Closed { conn: 0 },
        ]
    );
}

#[tokio::test]
async fn test_dropping_handle_stops_worker() {
    let broker = MockBroker::new();
    let channel = open(&broker, fast_config());
    wait_for_state(&channel, ConnectionState::Open).await;

    drop(channel);
    wait_until("socket closed", || broker.live_connections() == 0).await;
}

#[tokio::test]
async fn test_shop_switch_never_overlaps() {
    let broker = MockBroker::new();
    let mut shops = ShopNotifications::new(fast_config(), Arc::new(broker.clone()));

    shops.switch_shop("1").await;
    wait_for_state(shops.channel().unwrap(), ConnectionState::Open).await;

    shops.switch_shop("1").await;
    assert_eq!(broker.connect_count(), 1);

    shops.switch_shop("2").await;
    assert_eq!(shops.shop_id(), Some("2"));
    wait_for_state(shops.channel().unwrap(), ConnectionState::Open).await;

    let events = broker.events();
    let closed_first = events
        .iter()
        .position(|e| *e == BrokerEvent::Closed { conn: 0 })
        .unwrap();
    let connected_second = events
        .iter()
        .position(|e| *e == BrokerEvent::Connected { conn: 1 })
        .unwrap();
    assert!(closed_first < connected_second);
    assert_eq!(
        broker.subscriptions(),
        vec![
            "/topic/shop/1/orders".to_string(),
            "/topic/shop/2/orders".to_string()
        ]
    );
    assert_eq!(broker.publish("/topic/shop/1/orders", "{}"), 0);

    shops.close().await;
    assert!(shops.shop_id().is_none());
    assert_eq!(broker.live_connections(), 0);
}

/// Run one STOMP session on a real WebSocket and return the frames the
/// client sent before closing.
async fn serve_once(listener: TcpListener) -> Vec<Frame> {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
    let mut received = Vec::new();

    while let Some(message) = ws.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        for item in market_session::notifications::stomp::decode(&text).unwrap() {
            let market_session::notifications::stomp::Incoming::Frame(frame) = item else {
                continue;
            };
            match frame.command {
                Command::Connect => {
                    let reply = Frame::new(Command::Connected)
                        .header("version", "1.2")
                        .header("heart-beat", "0,0");
                    ws.send(Message::Text(reply.encode())).await.unwrap();
                }
                Command::Subscribe => {
                    let message = Frame::new(Command::Message)
                        .header("subscription", frame.get("id").unwrap_or_default())
                        .header("message-id", "1")
                        .header("destination", frame.get("destination").unwrap_or_default())
                        .with_body(r#"{"orderId":7}"#);
                    ws.send(Message::Text(message.encode())).await.unwrap();
                }
                _ => {}
            }
            received.push(frame);
        }
    }
    received
}

#[tokio::test]
async fn test_real_websocket_broker() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_once(listener));

    let config = ChannelConfig::new(format!("ws://{}/ws", addr))
        .with_heart_beat(HeartBeat::disabled())
        .with_reconnect_delay(Duration::from_millis(50));
    let channel = NotificationChannel::open(
        config,
        shop_orders_topic("42"),
        Arc::new(TungsteniteConnector::new()),
    );

    let mut activity = channel.activity_receiver();
    tokio::time::timeout(WAIT, activity.wait_for(|seen| *seen))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(channel.state(), ConnectionState::Open);

    channel.teardown().await;
    let frames = tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
    let commands: Vec<Command> = frames.iter().map(|f| f.command).collect();
    assert_eq!(
        commands,
        vec![Command::Connect, Command::Subscribe, Command::Disconnect]
    );
    assert_eq!(frames[0].get("host"), Some("127.0.0.1"));
    assert_eq!(frames[1].get("destination"), Some(DESTINATION));
}
