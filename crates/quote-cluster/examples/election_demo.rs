//! Leader election demonstration
//!
//! Starts three nodes on an in-process bus with compressed timeouts, lets
//! them elect a leader, crashes it and watches the survivors take over.

use quote_cluster::{ClusterConfig, ElectionEngine, LocalBus, NodeIdentity};
use std::time::Duration;
use tokio::time::sleep;

fn demo_config(node_id: &str, members: &[&str]) -> ClusterConfig {
    let mut config = ClusterConfig::new(node_id, members.iter().map(|m| m.to_string()).collect());
    config.ok_wait_ms = 300;
    config.settle_delay_ms = 50;
    config.discovery_delay_ms = 100;
    config.coordinator_wait_ms = 600;
    config
}

async fn print_cluster(nodes: &[ElectionEngine]) {
    for node in nodes {
        let report = node.status_report().await;
        println!(
            "  {} (born {}): {} / {}, leader = {}",
            report.node_id,
            report.birth_time,
            report.role,
            report.phase,
            report.leader_id.as_deref().unwrap_or("none")
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("🚀 Starting quote cluster election demo");

    let bus = LocalBus::new();
    let members = ["node-a:8081", "node-b:8082", "node-c:8083"];
    let mut nodes = Vec::new();
    for (offset, id) in members.iter().enumerate() {
        let identity = NodeIdentity::with_birth_time(*id, 1_000 + offset as i64);
        let engine = ElectionEngine::on_bus(identity, &demo_config(id, &members), &bus);
        bus.join(&engine);
        engine.start();
        nodes.push(engine);
    }

    sleep(Duration::from_secs(2)).await;
    println!("📊 Cluster after start-up:");
    print_cluster(&nodes).await;

    println!("💥 Crashing {}", members[0]);
    bus.crash(members[0]);
    nodes[0].shutdown();

    for node in &nodes[1..] {
        node.ping_leader().await;
    }
    sleep(Duration::from_secs(2)).await;

    println!("📊 Cluster after re-election:");
    print_cluster(&nodes[1..]).await;

    for node in &nodes {
        node.shutdown();
    }
    println!("✅ Demo completed");
    Ok(())
}
