use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use fantasy_core::{
    models::{NewParserConfig, ParserConfig, ParserConfigPatch, RunLog, TaskDispatch},
    FantasyError,
};
use fantasy_dispatcher::CronSchedule;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    routes::AppState,
};

const DEFAULT_PARSER_LIMIT: i64 = 100;
const DEFAULT_LOG_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 1000;

/// 分页参数
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    fn resolve(&self, default_limit: i64) -> ApiResult<(i64, i64)> {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(default_limit);
        if skip < 0 {
            return Err(ApiError::BadRequest("skip 不能为负数".to_string()));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::BadRequest(format!("limit 必须在1-{MAX_LIMIT}之间")));
        }
        Ok((skip, limit))
    }
}

/// 空字符串等同于不设置调度
fn normalize_schedule(schedule: Option<String>) -> Option<String> {
    schedule
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn validate_parser_type(state: &AppState, parser_type: &str) -> ApiResult<()> {
    if !state.registry.contains(parser_type) {
        return Err(FantasyError::unknown_parser_type(parser_type).into());
    }
    Ok(())
}

fn validate_schedule(schedule: Option<&str>) -> ApiResult<()> {
    if let Some(expression) = schedule {
        CronSchedule::validate(expression)?;
    }
    Ok(())
}

async fn load_config(state: &AppState, id: i64) -> ApiResult<ParserConfig> {
    state
        .parser_configs
        .get_by_id(id)
        .await?
        .ok_or_else(|| FantasyError::ParserConfigNotFound { id }.into())
}

/// 获取解析器配置列表
pub async fn list_parsers(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Vec<ParserConfig>>> {
    let Query(params) = params?;
    let (skip, limit) = params.resolve(DEFAULT_PARSER_LIMIT)?;
    Ok(Json(state.parser_configs.list(skip, limit).await?))
}

/// 已注册的解析器类型
pub async fn list_parser_types(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.list_types())
}

/// 创建解析器配置
pub async fn create_parser(
    State(state): State<AppState>,
    payload: Result<Json<NewParserConfig>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(mut request) = payload?;
    request.validate()?;
    request.schedule = normalize_schedule(request.schedule);
    validate_parser_type(&state, &request.parser_type)?;
    validate_schedule(request.schedule.as_deref())?;

    let created = state.parser_configs.create(&request).await?;
    info!(
        "创建解析器配置: id={}, name={}, type={}",
        created.id, created.name, created.parser_type
    );
    state.scheduler.upsert(created.clone());

    Ok((StatusCode::CREATED, Json(created)))
}

/// 获取单个解析器配置
pub async fn get_parser(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<ParserConfig>> {
    let Path(id) = id?;
    Ok(Json(load_config(&state, id).await?))
}

/// 部分更新解析器配置
pub async fn update_parser(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ParserConfigPatch>, JsonRejection>,
) -> ApiResult<Json<ParserConfig>> {
    let Path(id) = id?;
    let Json(mut patch) = payload?;
    patch.validate()?;
    patch.schedule = patch.schedule.map(normalize_schedule);

    if let Some(parser_type) = &patch.parser_type {
        validate_parser_type(&state, parser_type)?;
    }
    if let Some(schedule) = &patch.schedule {
        validate_schedule(schedule.as_deref())?;
    }

    let mut config = load_config(&state, id).await?;
    config.apply_patch(patch);
    let updated = state.parser_configs.update(&config).await?;

    info!(
        "更新解析器配置: id={}, active={}, schedule={:?}",
        updated.id, updated.is_active, updated.schedule
    );
    state.scheduler.upsert(updated.clone());

    Ok(Json(updated))
}

/// 删除解析器配置，历史运行日志保留
pub async fn delete_parser(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    if !state.parser_configs.delete(id).await? {
        return Err(FantasyError::ParserConfigNotFound { id }.into());
    }

    info!("删除解析器配置: id={}", id);
    state.scheduler.remove(id);

    Ok(Json(json!({ "deleted": true, "id": id })))
}

/// 手动触发一次运行
///
/// 未启用的配置同样可以手动运行。
pub async fn run_parser(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let config = load_config(&state, id).await?;
    let parser_name = config.name.clone();

    let handle = state.executor.execute(config).await?;
    info!("手动触发解析器: id={}, task={}", id, handle);

    let dispatch = TaskDispatch {
        task_id: handle.to_string(),
        status: "started".to_string(),
        parser_id: id,
        parser_name,
        started_at: Utc::now(),
    };
    Ok((StatusCode::ACCEPTED, Json(dispatch)))
}

/// 运行历史，按开始时间倒序
///
/// 配置被删除后仍可查询其历史日志。
pub async fn parser_logs(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Vec<RunLog>>> {
    let Path(id) = id?;
    let Query(params) = params?;
    let (skip, limit) = params.resolve(DEFAULT_LOG_LIMIT)?;
    Ok(Json(state.run_logs.list_for_config(id, skip, limit).await?))
}
