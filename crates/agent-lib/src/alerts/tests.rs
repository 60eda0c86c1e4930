//! Tests for the alert pipeline
//!
//! These verify:
//! - Store capacity, ordering and persistence across reopen
//! - Non-blocking dispatch when the forward queue is full
//! - One delivery attempt per alert against a local HTTP listener

use super::*;
use crate::models::AlertRecord;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn record(n: usize) -> AlertRecord {
    AlertRecord::new("Device Power Alert", format!("alert {}", n), "fa:16:3e:5e:25:ef")
}

mod store_tests {
    use super::*;

    #[test]
    fn test_capacity_evicts_oldest_in_order() {
        let store = AlertStore::in_memory(3);

        for i in 0..4 {
            store.append(record(i)).unwrap();
        }

        let messages: Vec<String> = store.list(None).into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["alert 1", "alert 2", "alert 3"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_default_capacity() {
        let store = AlertStore::in_memory(DEFAULT_MAX_RECORDS);

        for i in 0..=DEFAULT_MAX_RECORDS {
            store.append(record(i)).unwrap();
        }

        let records = store.list(None);
        assert_eq!(records.len(), DEFAULT_MAX_RECORDS);
        assert_eq!(records[0].message, "alert 1");
    }

    #[test]
    fn test_list_since_is_strict() {
        let store = AlertStore::in_memory(10);
        let base = Utc::now();

        for offset in 0..3 {
            let mut r = record(offset as usize);
            r.timestamp = base + ChronoDuration::seconds(offset);
            store.append(r).unwrap();
        }

        let newer = store.list(Some(base));
        assert_eq!(newer.len(), 2);
        assert_eq!(newer[0].message, "alert 1");

        assert!(store
            .list(Some(base + ChronoDuration::seconds(2)))
            .is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            path: temp_dir.path().join("alerts.json"),
            max_records: 5,
        };

        {
            let store = AlertStore::open(&config);
            store.append(record(1)).unwrap();
            store.append(record(2)).unwrap();
        }

        let reopened = AlertStore::open(&config);
        let messages: Vec<String> = reopened.list(None).into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["alert 1", "alert 2"]);
    }

    #[test]
    fn test_corrupted_file_is_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("alerts.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = AlertStore::open(&StoreConfig {
            path: path.clone(),
            max_records: 5,
        });
        assert!(store.is_empty());

        store.append(record(7)).unwrap();
        let reopened = AlertStore::open(&StoreConfig {
            path,
            max_records: 5,
        });
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_reads_legacy_mac_address_field() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("alerts.json");
        std::fs::write(
            &path,
            r#"[{"timestamp":"2024-05-01T10:00:00Z","scenario":"Sensor Failure","message":"m","mac_address":"aa:bb:cc:dd:ee:ff"}]"#,
        )
        .unwrap();

        let store = AlertStore::open(&StoreConfig {
            path,
            max_records: 5,
        });
        assert_eq!(store.list(None)[0].device_id, "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_persist_failure_keeps_record_in_memory() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail
        let path = temp_dir.path().join("alerts.json");
        std::fs::create_dir_all(&path).unwrap();

        let store = AlertStore::open(&StoreConfig {
            path,
            max_records: 5,
        });
        let result = store.append(record(1));

        assert!(matches!(result, Err(StoreError::Persist(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_appends_respect_capacity() {
        let store = Arc::new(AlertStore::in_memory(50));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.append(record(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 50);
    }
}

mod dispatch_tests {
    use super::*;
    use crate::health::{components, ComponentStatus, HealthRegistry};

    #[tokio::test]
    async fn test_emit_stores_and_queues() {
        let store = Arc::new(AlertStore::in_memory(10));
        let (queue, mut receiver) = ForwardQueue::new(4);
        let dispatcher = AlertDispatcher::new(store.clone(), "node-1").with_forwarding(queue);

        let emitted = dispatcher
            .emit("Sensor Failure", "Sensor measurement detected as an outlier.")
            .await;

        assert_eq!(emitted.device_id, "node-1");
        assert_eq!(store.list(None), vec![emitted.clone()]);
        assert_eq!(receiver.recv().await, Some(emitted));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let store = Arc::new(AlertStore::in_memory(10));
        let (queue, _receiver) = ForwardQueue::new(1);
        let stats = queue.stats();
        let dispatcher = AlertDispatcher::new(store.clone(), "node-1").with_forwarding(queue);

        for i in 0..3 {
            dispatcher
                .emit("Link Quality Issues", &format!("drop {}", i))
                .await;
        }

        assert_eq!(store.len(), 3);
        assert_eq!(stats.dropped(), 2);
    }

    #[tokio::test]
    async fn test_persist_failure_still_forwards_and_degrades_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("alerts.json");
        std::fs::create_dir_all(&path).unwrap();

        let store = Arc::new(AlertStore::open(&StoreConfig {
            path,
            max_records: 5,
        }));
        let health = HealthRegistry::new();
        health.register(components::ALERT_STORE).await;
        let (queue, mut receiver) = ForwardQueue::new(4);
        let dispatcher = AlertDispatcher::new(store.clone(), "node-1")
            .with_forwarding(queue)
            .with_health(health.clone());

        let record = dispatcher.create_alert("Device Power Alert", "hot");
        let result = dispatcher.publish(record.clone()).await;

        assert!(matches!(result, Err(StoreError::Persist(_))));
        assert_eq!(store.list(None), vec![record.clone()]);
        assert_eq!(receiver.recv().await, Some(record));
        assert_eq!(
            health.status(components::ALERT_STORE).await,
            Some(ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_store_health_follows_latest_publish() {
        let health = HealthRegistry::new();
        health.register(components::ALERT_STORE).await;
        health
            .set_degraded(components::ALERT_STORE, "disk full")
            .await;

        let dispatcher = AlertDispatcher::new(Arc::new(AlertStore::in_memory(5)), "node-1")
            .with_health(health.clone());
        dispatcher.emit("Sensor Failure", "recovered").await;

        assert_eq!(
            health.status(components::ALERT_STORE).await,
            Some(ComponentStatus::Healthy)
        );
    }

    #[test]
    fn test_resolve_device_id_prefers_override() {
        assert_eq!(resolve_device_id(Some("edge-7"), "fa:16:3e:5e:25:ef"), "edge-7");

        let resolved = resolve_device_id(Some("  "), "fa:16:3e:5e:25:ef");
        assert!(!resolved.is_empty());
    }
}

mod forward_tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    type Received = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn spawn_collector(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        let app = Router::new().route(
            "/health",
            post(move |Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(body);
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/health", addr), received)
    }

    #[test]
    fn test_endpoint_formatting() {
        let config = ForwardConfig::default();
        assert_eq!(config.endpoint(), "http://10.254.102.73:3000/health");

        let config = ForwardConfig {
            path: "ingest".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "http://10.254.102.73:3000/ingest");
    }

    #[tokio::test]
    async fn test_record_payload_delivered() {
        let (url, received) = spawn_collector(StatusCode::CREATED).await;
        let forwarder =
            HttpForwarder::with_endpoint(url, PayloadShape::Record, Duration::from_secs(5)).unwrap();

        forwarder.forward(&record(1)).await.unwrap();

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["device_id"], "fa:16:3e:5e:25:ef");
        assert_eq!(bodies[0]["scenario"], "Device Power Alert");
    }

    #[tokio::test]
    async fn test_submission_payload_omits_device() {
        let (url, received) = spawn_collector(StatusCode::OK).await;
        let forwarder =
            HttpForwarder::with_endpoint(url, PayloadShape::Submission, Duration::from_secs(5))
                .unwrap();

        forwarder.forward(&record(1)).await.unwrap();

        let bodies = received.lock().unwrap();
        assert!(bodies[0].get("device_id").is_none());
        assert_eq!(bodies[0]["message"], "alert 1");
    }

    #[tokio::test]
    async fn test_unexpected_status_is_error() {
        let (url, _received) = spawn_collector(StatusCode::SERVICE_UNAVAILABLE).await;
        let forwarder =
            HttpForwarder::with_endpoint(url, PayloadShape::Record, Duration::from_secs(5)).unwrap();

        let result = forwarder.forward(&record(1)).await;
        assert!(matches!(result, Err(ForwardError::Status(503))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let forwarder = HttpForwarder::with_endpoint(
            format!("http://{}/health", addr),
            PayloadShape::Record,
            Duration::from_secs(2),
        )
        .unwrap();

        let result = forwarder.forward(&record(1)).await;
        assert!(matches!(result, Err(ForwardError::Transport(_))));
    }

    #[tokio::test]
    async fn test_worker_attempts_each_alert_once() {
        let (url, received) = spawn_collector(StatusCode::INTERNAL_SERVER_ERROR).await;
        let forwarder: Arc<dyn AlertSink> = Arc::new(
            HttpForwarder::with_endpoint(url, PayloadShape::Record, Duration::from_secs(5)).unwrap(),
        );

        let (queue, receiver) = ForwardQueue::new(8);
        let stats = queue.stats();
        let worker = ForwardWorker::new(receiver, forwarder, stats.clone());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        assert!(queue.try_enqueue(record(1)));
        assert!(queue.try_enqueue(record(2)));
        drop(queue);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        drop(shutdown_tx);

        assert_eq!(received.lock().unwrap().len(), 2);
        assert_eq!(stats.failed(), 2);
        assert_eq!(stats.delivered(), 0);
    }
}
