//! HTTP Middleware
//!
//! 按状态码记录失败请求

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// 4xx 记 warn，5xx 记 error，附带耗时
///
/// 业务错误明细在 `ApiError::into_response()` 中记录
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP client error"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        routing::post,
        Router,
    };
    use tower::util::ServiceExt;

    fn router(status: StatusCode) -> Router {
        Router::new()
            .route("/picAnalyse", post(move || async move { status }))
            .layer(axum::middleware::from_fn(error_logging_middleware))
    }

    async fn call(status: StatusCode) -> StatusCode {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/picAnalyse")
            .body(Body::empty())
            .unwrap();
        router(status).oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_passes_responses_through() {
        assert_eq!(call(StatusCode::OK).await, StatusCode::OK);
        assert_eq!(call(StatusCode::BAD_REQUEST).await, StatusCode::BAD_REQUEST);
        assert_eq!(
            call(StatusCode::INTERNAL_SERVER_ERROR).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
