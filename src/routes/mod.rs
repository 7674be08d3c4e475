//! Business routes.
//!
//! Owner and dog resources are registered so that they sit behind admission
//! control, but no handler has a backing store yet: every call answers
//! 501 Not Implemented.

use axum::{
    http::{Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct NotImplemented {
    pub error: &'static str,
    pub method: String,
    pub path: String,
}

pub fn router() -> Router {
    Router::new()
        .route(
            "/owner/{id}",
            get(not_implemented).put(not_implemented).delete(not_implemented),
        )
        .route(
            "/dog/{id}",
            get(not_implemented).put(not_implemented).delete(not_implemented),
        )
}

async fn not_implemented(method: Method, uri: Uri) -> (StatusCode, Json<NotImplemented>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(NotImplemented {
            error: "not implemented",
            method: method.to_string(),
            path: uri.path().to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn resources_answer_501() {
        for (method, path) in [
            (Method::GET, "/owner/7"),
            (Method::PUT, "/owner/7"),
            (Method::DELETE, "/dog/rex"),
        ] {
            let request = Request::builder()
                .method(method.clone())
                .uri(path)
                .body(Body::empty())
                .unwrap();
            let response = router().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED, "{method} {path}");

            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["path"], path);
            assert_eq!(json["method"], method.as_str());
        }
    }

    #[tokio::test]
    async fn unknown_method_is_405() {
        let request = Request::post("/dog/1").body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
