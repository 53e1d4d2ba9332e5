// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Router tests for the read-only HTTP API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rlswarm_core::application::SwarmCoordinator;
use rlswarm_core::domain::node_config::SwarmNodeSpec;
use rlswarm_core::domain::store::{leaderboard_key, outputs_key, rewards_key, ROUND_STAGE_NUMBER_KEY};
use rlswarm_core::infrastructure::InMemorySwarmStore;
use rlswarm_core::presentation::api::app;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn coordinator_over(store: &InMemorySwarmStore, dir: &tempfile::TempDir) -> Arc<SwarmCoordinator> {
    let mut spec = SwarmNodeSpec::default();
    spec.discovery.enable_local = false;
    spec.discovery.cache_file = dir.path().join("peers.json").display().to_string();
    Arc::new(SwarmCoordinator::from_config(&spec, Arc::new(store.clone()), None))
}

async fn get_json(coordinator: &Arc<SwarmCoordinator>, uri: &str) -> (StatusCode, Value) {
    let response = app(coordinator.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn seeded_store() -> InMemorySwarmStore {
    let store = InMemorySwarmStore::new();
    store.put(ROUND_STAGE_NUMBER_KEY, json!([3, 1]));
    store.put(&leaderboard_key(3, 1), json!([["QmA", 5.0], ["QmB", 2.5]]));
    store.put(&rewards_key(3, 1), json!({"QmA": 1.0}));
    store.put_subkey(&outputs_key("QmA", 1, 0), "Old?", json!([10.0, {"answer": "old"}]));
    store.put_subkey(&outputs_key("QmA", 3, 1), "New?", json!([20.0, {"answer": "new"}]));
    store
}

#[tokio::test]
async fn test_healthz_before_first_poll_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator_over(&InMemorySwarmStore::new(), &dir);

    let (status, body) = get_json(&coordinator, "/api/healthz").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"detail": "store never polled"}));
}

#[tokio::test]
async fn test_healthz_after_poll() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator_over(&seeded_store(), &dir);
    coordinator.cache().poll_once().await;

    let (status, body) = get_json(&coordinator, "/api/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK");
    assert!(body["lastPolled"].is_string());
    assert!(body["lastPolledSecondsAgo"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_leaderboard_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator_over(&seeded_store(), &dir);
    coordinator.cache().poll_once().await;

    let (status, body) = get_json(&coordinator, "/api/leaderboard").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"leaders": [
            {"id": "QmA", "score": 5.0, "values": []},
            {"id": "QmB", "score": 2.5, "values": []}
        ]})
    );
}

#[tokio::test]
async fn test_gossip_endpoint_and_since_round() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator_over(&seeded_store(), &dir);
    coordinator.cache().poll_once().await;

    let (status, body) = get_json(&coordinator, "/api/gossip").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentRound"], 3);
    assert_eq!(body["currentStage"], 1);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["message"], "New?...Answer: new");
    assert_eq!(messages[0]["node"], "QmA");

    let (_, recent) = get_json(&coordinator, "/api/gossip?since_round=2").await;
    let recent = recent["messages"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["round"], 3);
}

#[tokio::test]
async fn test_gossip_before_first_poll_reports_unknown_round() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator_over(&InMemorySwarmStore::new(), &dir);

    let (status, body) = get_json(&coordinator, "/api/gossip").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"messages": [], "currentRound": -1, "currentStage": -1}));
}

#[tokio::test]
async fn test_peers_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemorySwarmStore::new();
    store.set_visible_maddrs(vec![
        "/ip4/10.0.0.1/tcp/30303".to_string(),
        "/ip4/10.0.0.2/tcp/30303".to_string(),
    ]);
    let coordinator = coordinator_over(&store, &dir);
    coordinator.start().await;

    let (status, body) = get_json(&coordinator, "/api/peers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["discovery_active"], true);
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["connected_count"], 2);
    let peers = body["peers"].as_array().unwrap();
    assert_eq!(
        peers[0],
        json!({"multiaddr": "/ip4/10.0.0.2/tcp/30303", "source": "discovery", "connected": true})
    );
    assert_eq!(
        peers[1],
        json!({"multiaddr": "/ip4/10.0.0.1/tcp/30303", "source": "self", "connected": true})
    );

    coordinator.shutdown().await;
}
