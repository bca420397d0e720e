//! Store tenancy extractor.
//!
//! Multi-tenant routing happens upstream; this service consumes the result
//! as an opaque store id carried in the `X-Store-Id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use pawprint_core::StoreId;

use crate::error::AppError;

/// Header carrying the tenant id, set by the platform edge.
pub const STORE_ID_HEADER: &str = "x-store-id";

/// The store a request is scoped to.
#[derive(Debug, Clone, Copy)]
pub struct StoreContext(pub StoreId);

impl<S> FromRequestParts<S> for StoreContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(STORE_ID_HEADER)
            .ok_or_else(|| AppError::Validation("missing X-Store-Id header".to_string()))?
            .to_str()
            .map_err(|_| AppError::Validation("invalid X-Store-Id header".to_string()))?;

        let store_id = raw
            .parse::<StoreId>()
            .map_err(|_| AppError::Validation("X-Store-Id must be a UUID".to_string()))?;

        Ok(Self(store_id))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<StoreContext, AppError> {
        let (mut parts, ()) = request.into_parts();
        StoreContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_valid_store_id() {
        let store_id = StoreId::generate();
        let request = Request::builder()
            .header("X-Store-Id", store_id.to_string())
            .body(())
            .expect("request builds");

        let context = extract(request).await.expect("extracts");
        assert_eq!(context.0, store_id);
    }

    #[tokio::test]
    async fn test_missing_header_is_validation_error() {
        let request = Request::builder().body(()).expect("request builds");
        let result = extract(request).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_non_uuid_header_is_validation_error() {
        let request = Request::builder()
            .header("X-Store-Id", "store-42")
            .body(())
            .expect("request builds");
        let result = extract(request).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
