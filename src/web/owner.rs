//! Caller identity as resolved by the request layer in front of the service.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};

/// Header carrying the authenticated caller's user ID.
pub const OWNER_HEADER: &str = "x-owner-id";

/// The user on whose behalf a request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Owner(v.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "message": "Not authorized" })),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Owner, StatusCode> {
        let mut builder = Request::builder().uri("/api/sites");
        if let Some(value) = header {
            builder = builder.header(OWNER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Owner::from_request_parts(&mut parts, &())
            .await
            .map_err(|(status, _)| status)
    }

    #[tokio::test]
    async fn test_owner_from_header() {
        assert_eq!(extract(Some(" alice ")).await, Ok(Owner("alice".to_string())));
    }

    #[tokio::test]
    async fn test_missing_owner_rejected() {
        assert_eq!(extract(None).await, Err(StatusCode::UNAUTHORIZED));
        assert_eq!(extract(Some("  ")).await, Err(StatusCode::UNAUTHORIZED));
    }
}
