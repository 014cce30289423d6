//! Integration tests for the query API
//!
//! Each test spawns the real server on a random port and queries it over
//! HTTP, mirroring how the dashboard consumes the endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use enviro_hub::{
    Reading,
    api::{ApiState, spawn_api_server},
    store::StateStore,
};
use serde_json::{Value, json};

async fn spawn_test_api(store: Arc<StateStore>) -> SocketAddr {
    spawn_api_server("127.0.0.1:0".parse().unwrap(), ApiState { store })
        .await
        .unwrap()
}

fn reading(payload: Value) -> Reading {
    Reading::from_payload(payload.to_string().as_bytes(), Utc::now()).unwrap()
}

#[tokio::test]
async fn data_returns_empty_object_before_first_reading() {
    let addr = spawn_test_api(Arc::new(StateStore::new(10))).await;

    let response = reqwest::get(format!("http://{addr}/data")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn data_returns_latest_reading_with_timestamp() {
    let store = Arc::new(StateStore::new(10));
    store.record(reading(json!({ "LM35_Temp": 23.5 }))).await;
    store.record(reading(json!({ "LM35_Temp": 24.0 }))).await;

    let addr = spawn_test_api(store).await;

    let response = reqwest::get(format!("http://{addr}/data")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(body["LM35_Temp"], json!(24.0));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn history_returns_all_readings_when_fewer_than_requested() {
    let store = Arc::new(StateStore::new(10));
    for i in 0..3 {
        store.record(reading(json!({ "CDS_Light": i }))).await;
    }

    let addr = spawn_test_api(store).await;

    let response = reqwest::get(format!("http://{addr}/history?n=5"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    let entries = body.as_array().unwrap();

    // 3 readings, not 5 padded entries, oldest first
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["CDS_Light"], json!(0));
    assert_eq!(entries[2]["CDS_Light"], json!(2));
}

#[tokio::test]
async fn history_slices_the_most_recent_n() {
    let store = Arc::new(StateStore::new(10));
    for i in 0..8 {
        store.record(reading(json!({ "CDS_Light": i }))).await;
    }

    let addr = spawn_test_api(store).await;

    let response = reqwest::get(format!("http://{addr}/history?n=3"))
        .await
        .unwrap();
    let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    let entries = body.as_array().unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["CDS_Light"], json!(5));
    assert_eq!(entries[2]["CDS_Light"], json!(7));
}

#[tokio::test]
async fn history_without_n_uses_the_default() {
    let store = Arc::new(StateStore::new(300));
    for i in 0..250 {
        store.record(reading(json!({ "CDS_Light": i }))).await;
    }

    let addr = spawn_test_api(store).await;

    let response = reqwest::get(format!("http://{addr}/history")).await.unwrap();
    let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    let entries = body.as_array().unwrap();

    // default slice is 200, ending at the newest reading
    assert_eq!(entries.len(), 200);
    assert_eq!(entries[0]["CDS_Light"], json!(50));
    assert_eq!(entries[199]["CDS_Light"], json!(249));
}

#[tokio::test]
async fn reads_are_not_blocked_by_concurrent_writes() {
    let store = Arc::new(StateStore::new(600));
    let addr = spawn_test_api(store.clone()).await;

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                store.record(reading(json!({ "CDS_Light": i }))).await;
            }
        })
    };

    // queries interleave with the writer and always see a consistent window
    for _ in 0..20 {
        let response = reqwest::get(format!("http://{addr}/history?n=50"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
        let entries = body.as_array().unwrap();
        // arrival order is preserved in every observed snapshot
        let lights: Vec<i64> = entries
            .iter()
            .map(|e| e["CDS_Light"].as_i64().unwrap())
            .collect();
        let mut sorted = lights.clone();
        sorted.sort_unstable();
        assert_eq!(lights, sorted);
    }

    writer.await.unwrap();
}
