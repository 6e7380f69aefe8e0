use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use fantasy_core::models::{TaskHandle, TaskStatusReport};

use crate::{error::ApiResult, routes::AppState};

/// 查询任务状态，可反复轮询
pub async fn task_status(
    State(state): State<AppState>,
    task_id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<TaskStatusReport>> {
    let Path(task_id) = task_id?;
    let report = state.task_status.status(&TaskHandle::from(task_id)).await?;
    Ok(Json(report))
}
