use std::time::Instant;

use axum::{extract::Request, http::Method, middleware::Next, response::Response};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

/// 探针和抓取路径只记 debug 日志
const QUIET_PATHS: [&str; 2] = ["/health", "/metrics"];

pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let quiet = QUIET_PATHS.contains(&uri.path());
    let start = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed = start.elapsed();

    if status.is_server_error() {
        warn!("请求处理失败: {} {} - 状态: {} - 耗时: {:?}", method, uri, status, elapsed);
    } else if quiet {
        debug!("{} {} - {} - {:?}", method, uri, status, elapsed);
    } else {
        info!("{} {} - 状态: {} - 耗时: {:?}", method, uri, status, elapsed);
    }

    response
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}
