//! 应用状态与请求追踪

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::JwtService,
    cache::{MemoryTokenCache, TokenCache},
    config::AppConfig,
    error::AppError,
    repository::Store,
    services::{BoardService, InvitationService, MembershipService, PermissionService, PositionService},
};

/// 应用状态
///
/// 服务共享同一个 `Arc<dyn Store>`；生产环境是 PostgreSQL，测试使用内存实现。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub jwt_service: Arc<JwtService>,
    pub permission_service: Arc<PermissionService>,
    pub position_service: Arc<PositionService>,
    pub membership_service: Arc<MembershipService>,
    pub invitation_service: Arc<InvitationService>,
    pub board_service: Arc<BoardService>,
}

impl AppState {
    /// 用进程内令牌缓存构建
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self, AppError> {
        Self::with_token_cache(config, store, Arc::new(MemoryTokenCache::new()))
    }

    pub fn with_token_cache(
        config: AppConfig,
        store: Arc<dyn Store>,
        cache: Arc<dyn TokenCache>,
    ) -> Result<Self, AppError> {
        let max_retries = config.ordering.max_retries;

        let jwt_service = Arc::new(JwtService::from_config(&config.security)?);
        let permission_service = Arc::new(PermissionService::new(store.clone(), max_retries));
        let position_service = Arc::new(PositionService::new(store.clone(), config.ordering.clone()));
        let membership_service = Arc::new(MembershipService::new(store.clone(), max_retries));
        let invitation_service = Arc::new(InvitationService::new(
            cache,
            membership_service.clone(),
            config.invitations.clone(),
        ));
        let board_service = Arc::new(BoardService::new(
            store.clone(),
            position_service.clone(),
            max_retries,
        ));

        Ok(Self {
            config,
            store,
            jwt_service,
            permission_service,
            position_service,
            membership_service,
            invitation_service,
            board_service,
        })
    }
}

const TRACE_HEADER: &str = "x-trace-id";
const REQUEST_HEADER: &str = "x-request-id";

/// 指标标签只允许有限取值
fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::PATCH => "PATCH",
        Method::DELETE => "DELETE",
        _ => "OTHER",
    }
}

fn status_label(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200..=299 => "2xx",
        401 => "401",
        403 => "403",
        404 => "404",
        409 => "409",
        400..=499 => "4xx",
        503 => "503",
        _ => "5xx",
    }
}

/// 沿用上游传入的 trace id，没有或不合法时重新生成
fn trace_id_from(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 请求追踪：span 带上 trace / request id，记录耗时指标，并把两个 id 回写到响应头
pub async fn track_requests(req: Request, next: Next) -> Response {
    let trace_id = trace_id_from(req.headers());
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = started.elapsed();
        let status = response.status();

        metrics::counter!(
            "http_requests_total",
            "method" => method_label(&method),
            "status" => status_label(status)
        )
        .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(status = status.as_u16(), elapsed_ms = elapsed.as_millis() as u64, "Request completed");

        for (name, value) in [(TRACE_HEADER, &trace_id), (REQUEST_HEADER, &request_id)] {
            if let Ok(value) = HeaderValue::from_str(value) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_is_propagated() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_HEADER, HeaderValue::from_static("upstream-trace-7"));
        assert_eq!(trace_id_from(&headers), "upstream-trace-7");
    }

    #[test]
    fn test_trace_id_generated_when_missing_or_oversized() {
        assert!(Uuid::parse_str(&trace_id_from(&HeaderMap::new())).is_ok());

        let mut headers = HeaderMap::new();
        let long = "t".repeat(200);
        headers.insert(TRACE_HEADER, HeaderValue::from_str(&long).unwrap());
        assert_ne!(trace_id_from(&headers), long);
    }

    #[test]
    fn test_metric_labels_are_bounded() {
        assert_eq!(method_label(&Method::OPTIONS), "OTHER");
        assert_eq!(status_label(StatusCode::CREATED), "2xx");
        assert_eq!(status_label(StatusCode::UNPROCESSABLE_ENTITY), "4xx");
        assert_eq!(status_label(StatusCode::SERVICE_UNAVAILABLE), "503");
        assert_eq!(status_label(StatusCode::BAD_GATEWAY), "5xx");
    }
}
