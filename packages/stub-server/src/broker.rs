//! Minimal STOMP broker: per-user queue subscriptions and delivery.

use std::sync::atomic::{AtomicU64, Ordering};

use alumnibridge_shared::stomp::{Command, Frame};
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

/// Identifier of one WebSocket connection
pub type ConnectionId = u64;

#[derive(Debug)]
struct Subscriber {
    connection: ConnectionId,
    subscription: String,
    destination: String,
    sender: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
pub struct Broker {
    next_connection: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Broker {
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_connection.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub async fn subscribe(
        &self,
        connection: ConnectionId,
        subscription: &str,
        destination: &str,
        sender: mpsc::UnboundedSender<String>,
    ) {
        self.subscribers.lock().await.push(Subscriber {
            connection,
            subscription: subscription.to_string(),
            destination: destination.to_string(),
            sender,
        });
        tracing::debug!(
            "Connection {} subscribed to {} as '{}'",
            connection,
            destination,
            subscription
        );
    }

    pub async fn unsubscribe(&self, connection: ConnectionId, subscription: &str) {
        self.subscribers
            .lock()
            .await
            .retain(|s| !(s.connection == connection && s.subscription == subscription));
    }

    /// Drop every subscription of a closed connection
    pub async fn remove_connection(&self, connection: ConnectionId) {
        self.subscribers
            .lock()
            .await
            .retain(|s| s.connection != connection);
    }

    /// Send a JSON body as a `MESSAGE` frame to every subscriber of `destination`
    ///
    /// # Returns
    ///
    /// The number of subscriptions the frame was handed to
    pub async fn publish(&self, destination: &str, body: &str) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        // Subscribers whose connection task is gone are pruned on the way
        subscribers.retain(|s| !s.sender.is_closed());

        let mut delivered = 0;
        for subscriber in subscribers.iter().filter(|s| s.destination == destination) {
            let frame = Frame::new(Command::Message)
                .header("destination", destination)
                .header("subscription", subscriber.subscription.as_str())
                .header("message-id", Uuid::new_v4().to_string())
                .header("content-type", "application/json")
                .body(body);
            if subscriber.sender.send(frame.encode()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}
