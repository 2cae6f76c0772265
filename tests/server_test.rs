//! Integration tests for the status HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use synheart_ecg_agent::alert::{AlertStateMachine, AlertTable};
    use synheart_ecg_agent::server::{run, ServerConfig};
    use synheart_ecg_agent::sink::StatusFile;
    use synheart_ecg_agent::BeatClass;

    async fn start(status_path: &Path) -> (String, tokio::sync::oneshot::Sender<()>) {
        let machine = Arc::new(AlertStateMachine::new(
            StatusFile::new(status_path),
            AlertTable::default(),
        ));
        let config = ServerConfig::new("127.0.0.1", 0);

        let (addr, shutdown_tx) = run(config, machine).await.expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        (format!("http://{addr}"), shutdown_tx)
    }

    async fn poll(client: &reqwest::Client, base: &str) -> serde_json::Value {
        client
            .get(format!("{base}/status"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (base, shutdown_tx) = start(&dir.path().join("status.txt")).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("{base}/health"))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_status_alerts_on_change_only() {
        let dir = tempfile::tempdir().unwrap();
        let status_path = dir.path().join("status.txt");
        let (base, shutdown_tx) = start(&status_path).await;
        let client = reqwest::Client::new();

        // Missing status file reads as the baseline class
        let body = poll(&client, &base).await;
        assert_eq!(body["value"], 0);
        assert!(body["new_alert"].is_null());
        assert_eq!(body["forced"], false);

        StatusFile::new(&status_path)
            .publish(BeatClass::Ventricular)
            .unwrap();
        let body = poll(&client, &base).await;
        assert_eq!(body["value"], 2);
        assert_eq!(body["new_alert"]["severity"], "critical");
        assert!(body["new_alert"]["title"].as_str().is_some());

        let body = poll(&client, &base).await;
        assert_eq!(body["value"], 2);
        assert!(body["new_alert"].is_null());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_force_overrides_bounded_polls() {
        let dir = tempfile::tempdir().unwrap();
        let (base, shutdown_tx) = start(&dir.path().join("status.txt")).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/force"))
            .json(&serde_json::json!({ "value": 1, "rows": 2 }))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["value"], 1);
        assert_eq!(body["rows"], 2);

        let mut values = Vec::new();
        let mut forced = Vec::new();
        for _ in 0..3 {
            let body = poll(&client, &base).await;
            values.push(body["value"].as_i64().unwrap());
            forced.push(body["forced"].as_bool().unwrap());
        }
        assert_eq!(values, vec![1, 1, 0]);
        assert_eq!(forced, vec![true, true, false]);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_force_rejects_malformed_body() {
        let dir = tempfile::tempdir().unwrap();
        let (base, shutdown_tx) = start(&dir.path().join("status.txt")).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("{base}/force"))
            .json(&serde_json::json!({ "value": "high" }))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_client_error());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let dir = tempfile::tempdir().unwrap();
        let (base, shutdown_tx) = start(&dir.path().join("status.txt")).await;

        // Send OPTIONS request to check CORS
        let client = reqwest::Client::new();
        let response = client
            .request(reqwest::Method::OPTIONS, format!("{base}/force"))
            .header("Origin", "http://localhost:3000")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        let _ = shutdown_tx.send(());
    }
}
