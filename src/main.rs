//! Caravan CLI
//!
//! Runs a simulated mesh on an in-memory transport: a chain of relay nodes,
//! the last one with connectivity, and a message published at the far end.
//! Useful for watching the relay machinery end to end without any radio.
//!
//! Usage:
//!   caravan-cli --demo                  # 4-node chain demo
//!   caravan-cli --demo --nodes 6        # longer chain
//!   caravan-cli --demo --message "hi"   # custom message text

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use caravan_core::testing::{MemoryMesh, MemoryStore};
use caravan_core::{MessageKind, Relay, RelayConfig, RelayEvent};

fn print_usage() {
    println!("Caravan Relay v0.1.0");
    println!();
    println!("Usage:");
    println!("  caravan-cli --demo                  Run a simulated 4-node chain");
    println!();
    println!("Options:");
    println!("  --demo, -d              Run the simulated mesh demo (required)");
    println!("  --nodes <N>             Chain length, 2..=6 (default: 4)");
    println!("  --message <TEXT>        Message to publish (default: greeting)");
    println!("  --alert                 Publish as an alert instead of chat");
    println!("  --help, -h              Show this help");
    println!();
    println!("Environment:");
    println!("  RUST_LOG                Set log level (e.g., info, debug)");
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let show_help = args.iter().any(|a| a == "--help" || a == "-h");
    let demo_mode = args.iter().any(|a| a == "--demo" || a == "-d");
    let alert = args.iter().any(|a| a == "--alert");

    let nodes: usize = args
        .windows(2)
        .find(|w| w[0] == "--nodes")
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(4);

    let message = args
        .windows(2)
        .find(|w| w[0] == "--message")
        .map(|w| w[1].clone())
        .unwrap_or_else(|| "hello from the edge of the mesh".to_string());

    if show_help {
        print_usage();
        return;
    }
    if !demo_mode {
        print_usage();
        println!();
        println!("Run with --demo to start the simulated mesh");
        return;
    }
    if !(2..=6).contains(&nodes) {
        eprintln!("--nodes must be between 2 and 6, got {}", nodes);
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let kind = if alert {
        MessageKind::Alert
    } else {
        MessageKind::Chat
    };

    info!(nodes = nodes, "starting simulated mesh");
    let mesh = MemoryMesh::new();
    let store = MemoryStore::new();

    let mut relays: Vec<Relay> = Vec::with_capacity(nodes);
    for n in 0..nodes {
        let id = format!("node-{}", n);
        let (transport, transport_rx) = mesh.add_node(&id);
        let config = RelayConfig::for_testing(&id).with_display_name(format!("demo {}", id));
        let relay = Relay::start(
            config,
            Arc::new(transport),
            transport_rx,
            Arc::new(store.clone()),
        )
        .await
        .expect("relay start");
        relays.push(relay);
    }

    // Watch the publisher's events
    let mut events = relays[0].events().expect("event stream");
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RelayEvent::Status(line) => println!("  [node-0] {}", line),
                RelayEvent::Message(update) => {
                    println!(
                        "  [node-0] message {} {:?}",
                        update.message.short_id(),
                        update.change
                    )
                }
                RelayEvent::Sessions(_) => {}
            }
        }
    });

    // Chain topology; only the far end can reach the store
    for n in 0..nodes - 1 {
        mesh.link(&format!("node-{}", n), &format!("node-{}", n + 1));
    }
    relays[nodes - 1]
        .set_connectivity(true)
        .await
        .expect("set connectivity");

    // Let sessions settle, then publish at the disconnected end
    tokio::time::sleep(Duration::from_millis(200)).await;
    let id = relays[0]
        .publish(message, kind, None)
        .await
        .expect("publish");
    println!("published message {}", &id[..8.min(id.len())]);

    // Wait for the far end to upload it
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(record) = store.get(&id) {
            if record.delivered {
                println!(
                    "delivered by {} after {} hops, path: {}",
                    record.delivering_node.as_deref().unwrap_or("?"),
                    record.hop_count,
                    record.visited.join(" -> ")
                );
                break;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            eprintln!("message never reached the store");
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    for relay in relays.iter_mut() {
        relay.stop().await;
    }
    info!("demo finished");
}
