use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use fantasy_api::{create_app, AppState};
use fantasy_core::{
    config::WorkerConfig,
    models::{RunLog, RunStatus},
    traits::{ParserAdapter, ParserConfigRepository},
    ParserRegistry,
};
use fantasy_dispatcher::SchedulerHandle;
use fantasy_infrastructure::{DatabaseManager, MetricsCollector};
use fantasy_testing_utils::{test_database, ParserConfigBuilder, StubAdapter, TestEnv};
use fantasy_worker::{TaskExecutionManager, TaskTracker, WorkerPool};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    db: DatabaseManager,
}

async fn setup() -> TestApp {
    let db = test_database().await;
    let registry = Arc::new(
        ParserRegistry::builder()
            .register(Arc::new(StubAdapter::new("fpl_players")) as Arc<dyn ParserAdapter>)
            .register(Arc::new(StubAdapter::new("fpl_ownership").with_records(2, 1)) as Arc<dyn ParserAdapter>)
            .build(),
    );

    let worker_config = WorkerConfig::default();
    let manager = Arc::new(TaskExecutionManager::new(
        Arc::clone(&registry),
        db.run_log_repository(),
        MetricsCollector::new(),
        &worker_config,
    ));
    let tracker = TaskTracker::new(worker_config.result_ttl());
    let pool = Arc::new(WorkerPool::start(
        manager,
        tracker.clone(),
        MetricsCollector::new(),
        &worker_config,
    ));

    let state = AppState {
        parser_configs: db.parser_config_repository(),
        run_logs: db.run_log_repository(),
        registry,
        executor: pool,
        task_status: Arc::new(tracker),
        scheduler: SchedulerHandle::detached(),
        database: db.clone(),
        metrics: Some(PrometheusBuilder::new().build_recorder().handle()),
    };

    TestApp {
        app: create_app(state, true),
        db,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, value)
}

fn fpl_players_request() -> Value {
    json!({
        "name": "FPL Players",
        "platform": "FPL",
        "parser_type": "fpl_players",
        "schedule": "0 */4 * * *",
        "is_active": true
    })
}

async fn wait_until_ready(app: &Router, task_id: &str) -> Value {
    let uri = format!("/parsers/task/{task_id}/status");
    let ready = TestEnv::wait_for(
        || {
            let uri = uri.clone();
            async move {
                let (status, body) = send(app, "GET", &uri, None).await;
                status == StatusCode::OK && body["ready"] == json!(true)
            }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(ready, "task {task_id} did not finish in time");
    send(app, "GET", &uri, None).await.1
}

#[tokio::test]
async fn test_create_run_poll_and_read_logs() {
    let test = setup().await;

    let (status, created) = send(&test.app, "POST", "/parsers", Some(fpl_players_request())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["platform"], "FPL");
    assert_eq!(created["last_status"], "none");
    let id = created["id"].as_i64().unwrap();

    let (status, dispatch) = send(&test.app, "POST", &format!("/parsers/{id}/run"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(dispatch["status"], "started");
    assert_eq!(dispatch["parser_id"], id);
    assert_eq!(dispatch["parser_name"], "FPL Players");

    let task_id = dispatch["task_id"].as_str().unwrap().to_string();
    let report = wait_until_ready(&test.app, &task_id).await;
    assert_eq!(report["successful"], true);
    assert_eq!(report["failed"], false);
    assert_eq!(report["result"]["records_processed"], 3);

    // 完成后的轮询结果保持不变
    let (_, again) = send(&test.app, "GET", &format!("/parsers/task/{task_id}/status"), None).await;
    assert_eq!(again, report);

    let (status, logs) = send(&test.app, "GET", &format!("/parsers/{id}/logs"), None).await;
    assert_eq!(status, StatusCode::OK);
    let logs: Vec<RunLog> = serde_json::from_value(logs).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, RunStatus::Success);
    assert!(logs[0].finished_at.unwrap() >= logs[0].started_at);

    let (_, config) = send(&test.app, "GET", &format!("/parsers/{id}"), None).await;
    assert_eq!(config["last_status"], "success");
    assert!(config["last_run"].is_string());
}

#[tokio::test]
async fn test_unknown_parser_type_run_fails_with_diagnostic() {
    let test = setup().await;
    let config = test
        .db
        .parser_config_repository()
        .create(&ParserConfigBuilder::new().with_parser_type("nonexistent").build_new())
        .await
        .unwrap();

    let (status, dispatch) = send(&test.app, "POST", &format!("/parsers/{}/run", config.id), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let report = wait_until_ready(&test.app, dispatch["task_id"].as_str().unwrap()).await;
    assert_eq!(report["failed"], true);

    let (_, logs) = send(&test.app, "GET", &format!("/parsers/{}/logs", config.id), None).await;
    let logs: Vec<RunLog> = serde_json::from_value(logs).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, RunStatus::Failed);
    assert!(logs[0].errors_count >= 1);
    assert!(logs[0].log_data.as_deref().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_create_rejects_unknown_type_and_invalid_cron() {
    let test = setup().await;

    let mut request = fpl_players_request();
    request["parser_type"] = json!("nonexistent");
    let (status, body) = send(&test.app, "POST", "/parsers", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UNKNOWN_PARSER_TYPE");
    assert!(body["error"]["suggestions"].is_array());
    assert!(body["error"]["timestamp"].is_string());

    let mut request = fpl_players_request();
    request["schedule"] = json!("every four hours");
    let (status, body) = send(&test.app, "POST", "/parsers", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_CRON_EXPRESSION");

    let (status, _) = send(&test.app, "POST", "/parsers", Some(json!({ "name": "missing fields" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = send(&test.app, "GET", "/parsers", None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_unknown_ids_return_404() {
    let test = setup().await;

    for (method, uri) in [
        ("GET", "/parsers/999"),
        ("DELETE", "/parsers/999"),
        ("POST", "/parsers/999/run"),
    ] {
        let (status, body) = send(&test.app, method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(body["error"]["code"], "PARSER_NOT_FOUND");
    }

    let (status, _) = send(&test.app, "PUT", "/parsers/999", Some(json!({ "is_active": false }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&test.app, "GET", "/parsers/task/unknown-task/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "TASK_NOT_FOUND");
}

#[tokio::test]
async fn test_update_deactivates_and_keeps_history() {
    let test = setup().await;
    let (_, created) = send(&test.app, "POST", "/parsers", Some(fpl_players_request())).await;
    let id = created["id"].as_i64().unwrap();

    let (_, dispatch) = send(&test.app, "POST", &format!("/parsers/{id}/run"), None).await;
    wait_until_ready(&test.app, dispatch["task_id"].as_str().unwrap()).await;

    let (status, updated) = send(
        &test.app,
        "PUT",
        &format!("/parsers/{id}"),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_active"], false);
    assert_eq!(updated["name"], "FPL Players");
    assert_eq!(updated["schedule"], "0 */4 * * *");
    assert_eq!(updated["last_status"], "success");

    let (_, logs) = send(&test.app, "GET", &format!("/parsers/{id}/logs"), None).await;
    assert_eq!(logs.as_array().unwrap().len(), 1);

    // 未启用的配置仍可手动运行
    let (status, _) = send(&test.app, "POST", &format!("/parsers/{id}/run"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, cleared) = send(
        &test.app,
        "PUT",
        &format!("/parsers/{id}"),
        Some(json!({ "schedule": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared["schedule"].is_null());

    let (status, body) = send(
        &test.app,
        "PUT",
        &format!("/parsers/{id}"),
        Some(json!({ "schedule": "0 0 0 * * *" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_CRON_EXPRESSION");
}

#[tokio::test]
async fn test_delete_keeps_run_logs() {
    let test = setup().await;
    let (_, created) = send(&test.app, "POST", "/parsers", Some(fpl_players_request())).await;
    let id = created["id"].as_i64().unwrap();

    let (_, dispatch) = send(&test.app, "POST", &format!("/parsers/{id}/run"), None).await;
    wait_until_ready(&test.app, dispatch["task_id"].as_str().unwrap()).await;

    let (status, body) = send(&test.app, "DELETE", &format!("/parsers/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": true, "id": id }));

    let (status, _) = send(&test.app, "GET", &format!("/parsers/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, logs) = send(&test.app, "GET", &format!("/parsers/{id}/logs"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_pagination_and_types() {
    let test = setup().await;
    for i in 0..3 {
        let mut request = fpl_players_request();
        request["name"] = json!(format!("Parser {i}"));
        send(&test.app, "POST", "/parsers", Some(request)).await;
    }

    let (_, all) = send(&test.app, "GET", "/parsers", None).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, page) = send(&test.app, "GET", "/parsers?skip=1&limit=1", None).await;
    let page = page.as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["name"], "Parser 1");

    let (status, _) = send(&test.app, "GET", "/parsers?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, types) = send(&test.app, "GET", "/parsers/types", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(types, json!(["fpl_ownership", "fpl_players"]));
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let test = setup().await;

    let (status, body) = send(&test.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}
