//! Chat subscription demo with field-match dispatch
//!
//! Run with: cargo run --example chat_updates
//!
//! Three clients subscribe to a small chat schema:
//!   alice  subscribes to messageAdded(channel: "general")
//!   bob    subscribes to messageAdded(channel: "random")
//!   carol  subscribes to userCount
//!
//! The demo then publishes a few updates and prints what each subscriber
//! receives. Updates to `messageAdded` reach alice and bob; updates to
//! `userCount` reach only carol. After alice disconnects, her subscriptions
//! stop receiving anything.

use std::sync::Arc;

use fieldcast::{
    channel_deliverer, Connection, FieldDef, FieldDispatcher, ObjectType, RegistryConfig, Schema,
    Subscription, SubscriptionRegistry, UpdatePayload,
};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

/// A stand-in for a websocket connection. Real transports would write
/// payloads to the socket in `send_data`.
struct ChatClient {
    user: String,
}

impl ChatClient {
    fn new(user: &str) -> Arc<dyn Connection> {
        Arc::new(Self {
            user: user.to_string(),
        })
    }
}

impl Connection for ChatClient {
    fn id(&self) -> String {
        self.user.clone()
    }

    fn send_data(&self, payload: &UpdatePayload) {
        println!("[{}] send_data: {:?}", self.user, payload.data);
    }
}

fn chat_schema() -> Schema {
    Schema::builder()
        .object(
            ObjectType::new("Message")
                .field(FieldDef::scalar("author"))
                .field(FieldDef::scalar("body")),
        )
        .subscription(
            ObjectType::new("Subscription")
                .field(FieldDef::object("messageAdded", "Message").argument("channel"))
                .field(FieldDef::scalar("userCount")),
        )
        .build()
        .expect("chat schema is well formed")
}

fn drain(user: &str, rx: &mut UnboundedReceiver<UpdatePayload>) {
    while let Ok(payload) = rx.try_recv() {
        match payload.data {
            Some(data) => println!("  {} received: {}", user, data),
            None => println!("  {} received errors: {:?}", user, payload.errors),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fieldcast=debug".parse()?)
                .add_directive("chat_updates=debug".parse()?),
        )
        .init();

    let registry = Arc::new(SubscriptionRegistry::with_config(
        chat_schema(),
        RegistryConfig::default().max_subscriptions_per_connection(10),
    ));

    let (alice_tx, mut alice_rx) = tokio::sync::mpsc::unbounded_channel();
    let (bob_tx, mut bob_rx) = tokio::sync::mpsc::unbounded_channel();
    let (carol_tx, mut carol_rx) = tokio::sync::mpsc::unbounded_channel();

    registry
        .add_subscription(
            Subscription::new("sub-1", r#"{ messageAdded(channel: "general") { author body } }"#)
                .connection(ChatClient::new("alice"))
                .deliver(channel_deliverer(alice_tx)),
        )
        .expect("alice's subscription is valid");

    registry
        .add_subscription(
            Subscription::new(
                "sub-1",
                r#"subscription Messages($channel) {
                    messageAdded(channel: $channel) { author body }
                }"#,
            )
            .variables([("channel".to_string(), json!("random"))].into())
            .operation_name("Messages")
            .connection(ChatClient::new("bob"))
            .deliver(channel_deliverer(bob_tx)),
        )
        .expect("bob's subscription is valid");

    registry
        .add_subscription(
            Subscription::new("sub-1", "{ userCount }")
                .connection(ChatClient::new("carol"))
                .deliver(channel_deliverer(carol_tx)),
        )
        .expect("carol's subscription is valid");

    println!(
        "Registered {} subscriptions across {} connections",
        registry.subscription_count(),
        registry.connection_count()
    );
    println!();

    let dispatcher = FieldDispatcher::new(Arc::clone(&registry));

    // A rejected candidate never lands in the registry
    if let Err(errors) = registry.add_subscription(
        Subscription::new("sub-2", "{ messageAdded(channel: }")
            .connection(ChatClient::new("mallory"))
            .deliver(Arc::new(|_| {})),
    ) {
        for e in &errors {
            println!("Rejected mallory's subscription: {}", e);
        }
        println!();
    }

    let notified = dispatcher.dispatch(
        "messageAdded",
        UpdatePayload::data(json!({
            "messageAdded": { "author": "dave", "body": "hello everyone" }
        })),
    );
    println!("messageAdded update reached {} subscribers", notified);
    drain("alice", &mut alice_rx);
    drain("bob", &mut bob_rx);
    drain("carol", &mut carol_rx);
    println!();

    let notified = dispatcher.dispatch("userCount", UpdatePayload::data(json!({ "userCount": 3 })));
    println!("userCount update reached {} subscribers", notified);
    drain("alice", &mut alice_rx);
    drain("bob", &mut bob_rx);
    drain("carol", &mut carol_rx);
    println!();

    // Alice disconnects; her subscriptions go with the connection
    registry.remove_connection(&"alice".into());

    let notified = dispatcher.dispatch(
        "messageAdded",
        UpdatePayload::data(json!({
            "messageAdded": { "author": "dave", "body": "anyone there?" }
        })),
    );
    println!(
        "messageAdded after alice disconnected reached {} subscribers",
        notified
    );
    drain("alice", &mut alice_rx);
    drain("bob", &mut bob_rx);
    drain("carol", &mut carol_rx);

    Ok(())
}
