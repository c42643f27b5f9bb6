//! `/health` 与 `/ready`

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::{middleware::AppState, models::role::roles};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// 进程启动时调用一次
pub fn set_start_time() {
    let _ = START_TIME.set(Instant::now());
}

pub fn get_uptime() -> u64 {
    START_TIME.get().map_or(0, |start| start.elapsed().as_secs())
}

/// 存活探针，不访问存储
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime(),
    })
}

fn check(name: &str, outcome: Result<(), String>) -> HealthCheck {
    HealthCheck {
        name: name.to_string(),
        status: if outcome.is_ok() { "healthy" } else { "unhealthy" }.to_string(),
        message: outcome.err(),
    }
}

/// 就绪探针：存储可达，且内置角色目录已经写入
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let store = state.store.ping().await.map_err(|e| e.to_string());
    let catalogue = match state.store.find_role_by_name(roles::BOARD_ADMIN).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err("role catalogue not bootstrapped".to_string()),
        Err(e) => Err(e.to_string()),
    };

    let checks = vec![check("store", store), check("role_catalogue", catalogue)];
    let ready = checks.iter().all(|c| c.status == "healthy");
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, checks }))
}
