// API Integration Tests
//
// Purpose: Drive the session protocol end to end through the router
// Run with: cargo test --features api --test api_integration_tests

#[cfg(feature = "api")]
mod api_tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use mining_forecast_rust::api_server::{create_router, AppState};
    use mining_forecast_rust::error::WeightError;
    use mining_forecast_rust::{
        DisabledAdvisory, ForecastConfig, InMemoryDatasetProvider, MineralWeightMap,
        PipelineOrchestrator, ReportSummaryAdvisory, TabularData, UniformWeights, WeightProvider,
    };
    use serde_json::Value;
    use std::sync::{mpsc, Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt; // for oneshot

    // Helper: small soil dataset with an identifier column
    fn soil_table() -> TabularData {
        let rows = 80;
        TabularData::from_numeric_columns(vec![
            ("ID".to_string(), (1..=rows).map(|i| Some(i as f64)).collect()),
            (
                "Copper".to_string(),
                (0..rows).map(|i| Some(12.0 + 3.0 * (i as f64 * 0.4).sin())).collect(),
            ),
            (
                "Iron".to_string(),
                (0..rows).map(|i| Some(30.0 + (i % 11) as f64)).collect(),
            ),
        ])
    }

    // Helper: Create test app
    fn create_test_app() -> axum::Router {
        let mut config = ForecastConfig {
            seed: Some(11),
            ..Default::default()
        };
        config.model.n_estimators = 10;

        let orchestrator = PipelineOrchestrator::new(
            config,
            Arc::new(InMemoryDatasetProvider::new(soil_table())),
            Arc::new(UniformWeights),
            Arc::new(ReportSummaryAdvisory),
        )
        .expect("valid config");

        create_router(AppState::new(orchestrator, Duration::from_secs(60)))
    }

    // Helper: Parse JSON response
    async fn json_response(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        serde_json::from_slice(&body).expect("Failed to parse JSON")
    }

    async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> axum::response::Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn connect(app: &axum::Router) -> String {
        let response = send(app, "POST", "/api/sessions", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        body["sessionId"].as_str().expect("session id").to_string()
    }

    // =========================================================================
    // Section 1: Health Check
    // =========================================================================

    #[tokio::test]
    async fn test_health_check() {
        let app = create_test_app();
        let response = send(&app, "GET", "/health", None).await;

        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = json_response(response).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    }

    // =========================================================================
    // Section 2: Session lifecycle
    // =========================================================================

    #[tokio::test]
    async fn test_connect_lists_mineral_columns() {
        let app = create_test_app();
        let response = send(&app, "POST", "/api/sessions", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_response(response).await;
        assert_eq!(body["columns"], serde_json::json!(["Copper", "Iron"]));
        assert_eq!(body["sessionId"].as_str().map(str::len), Some(16));
    }

    #[tokio::test]
    async fn test_full_dataset_request() {
        let app = create_test_app();
        let id = connect(&app).await;

        let response = send(&app, "GET", &format!("/api/sessions/{}/dataset", id), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_response(response).await;
        assert_eq!(body["columns"], serde_json::json!(["ID", "Copper", "Iron"]));
        let rows = body["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 80);
        assert_eq!(rows[0]["ID"], serde_json::json!(1.0));
    }

    #[tokio::test]
    async fn test_disconnect_removes_session() {
        let app = create_test_app();
        let id = connect(&app).await;

        let response = send(&app, "DELETE", &format!("/api/sessions/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, "GET", &format!("/api/sessions/{}/dataset", id), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, "DELETE", &format!("/api/sessions/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_response(response).await;
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    // =========================================================================
    // Section 3: Processing
    // =========================================================================

    #[tokio::test]
    async fn test_process_returns_events() {
        let app = create_test_app();
        let id = connect(&app).await;

        let response = send(
            &app,
            "POST",
            &format!("/api/sessions/{}/process", id),
            Some(serde_json::json!({"targetColumn": "Copper"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_response(response).await;
        let events = body["events"].as_array().unwrap();

        assert_eq!(events[0]["chartEntries"].as_array().unwrap().len(), 180);
        assert!(events[1]["accuracy"].is_number());

        let report = &events[2]["sustainabilityReport"];
        assert_eq!(report["graphData"].as_array().unwrap().len(), 25);
        assert_eq!(report["metadata"]["totalPeriods"], 25);

        assert!(events[3]["advisoryText"].is_string());
        assert_eq!(events[4]["message"], "Processing complete for column: Copper");
        assert!(events.iter().all(|e| e.get("error").is_none()));
    }

    #[tokio::test]
    async fn test_process_unknown_column_is_single_error() {
        let app = create_test_app();
        let id = connect(&app).await;

        let response = send(
            &app,
            "POST",
            &format!("/api/sessions/{}/process", id),
            Some(serde_json::json!({"targetColumn": "Gold"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_response(response).await;
        assert_eq!(
            body["events"],
            serde_json::json!([{"error": "Column 'Gold' not found in dataset."}])
        );

        // Session survives the failed request
        let response = send(
            &app,
            "POST",
            &format!("/api/sessions/{}/process", id),
            Some(serde_json::json!({"targetColumn": "Iron"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_process_unknown_session() {
        let app = create_test_app();
        let response = send(
            &app,
            "POST",
            "/api/sessions/deadbeef/process",
            Some(serde_json::json!({"targetColumn": "Copper"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // Holds the pipeline inside weight acquisition until the test releases it
    struct GatedWeights {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl WeightProvider for GatedWeights {
        fn get_weights(&self, names: &[String]) -> Result<MineralWeightMap, WeightError> {
            if let Ok(entered) = self.entered.lock() {
                let _ = entered.send(());
            }
            if let Ok(release) = self.release.lock() {
                let _ = release.recv_timeout(Duration::from_secs(30));
            }
            UniformWeights.get_weights(names)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disconnect_during_processing_is_gone() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let orchestrator = PipelineOrchestrator::new(
            ForecastConfig {
                seed: Some(5),
                ..Default::default()
            },
            Arc::new(InMemoryDatasetProvider::new(soil_table())),
            Arc::new(GatedWeights {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
            Arc::new(DisabledAdvisory),
        )
        .unwrap();
        let app = create_router(AppState::new(orchestrator, Duration::from_secs(60)));
        let id = connect(&app).await;

        let pending = {
            let app = app.clone();
            let uri = format!("/api/sessions/{}/process", id);
            tokio::spawn(async move {
                send(&app, "POST", &uri, Some(serde_json::json!({"targetColumn": "Copper"}))).await
            })
        };

        // Wait until the run is past forecasting
        tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(30)))
            .await
            .unwrap()
            .expect("pipeline reached weight acquisition");

        let response = send(&app, "DELETE", &format!("/api/sessions/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        release_tx.send(()).unwrap();

        let response = pending.await.unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
        let body = json_response(response).await;
        assert!(body["error"].as_str().unwrap().contains("disconnected"));
    }

    #[tokio::test]
    async fn test_advisory_disabled_omits_event() {
        let orchestrator = PipelineOrchestrator::new(
            ForecastConfig {
                seed: Some(3),
                ..Default::default()
            },
            Arc::new(InMemoryDatasetProvider::new(soil_table())),
            Arc::new(UniformWeights),
            Arc::new(DisabledAdvisory),
        )
        .unwrap();
        let app = create_router(AppState::new(orchestrator, Duration::from_secs(60)));
        let id = connect(&app).await;

        let response = send(
            &app,
            "POST",
            &format!("/api/sessions/{}/process", id),
            Some(serde_json::json!({"targetColumn": "Iron"})),
        )
        .await;
        let body = json_response(response).await;
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.get("advisoryText").is_none()));
    }
}
