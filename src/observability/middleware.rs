use poem::http::HeaderValue;
use poem::{Endpoint, IntoResponse, Middleware, Request, Response, Result as PoemResult};
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::security::OPERATOR_HEADER;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

/// Wraps every request in a span carrying request, correlation and operator ids.
pub struct RequestTracingMiddleware;

impl<E: Endpoint> Middleware<E> for RequestTracingMiddleware {
    type Output = RequestTracingEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        RequestTracingEndpoint { ep }
    }
}

pub struct RequestTracingEndpoint<E> {
    ep: E,
}

#[poem::async_trait]
impl<E: Endpoint> Endpoint for RequestTracingEndpoint<E> {
    type Output = Response;

    async fn call(&self, mut req: Request) -> PoemResult<Self::Output> {
        let request_id = Uuid::new_v4().to_string();
        let correlation_id = req
            .header(CORRELATION_ID_HEADER)
            .map(|s| s.to_string())
            .unwrap_or_else(|| request_id.clone());
        let operator_id = req.header(OPERATOR_HEADER).unwrap_or("-").to_string();

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            req.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            req.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }

        let span = info_span!(
            "http_request",
            request_id = %request_id,
            correlation_id = %correlation_id,
            operator_id = %operator_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        async move {
            let start = Instant::now();
            let mut response = self.ep.call(req).await?.into_response();
            info!(
                status = response.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            );
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response)
        }
        .instrument(span)
        .await
    }
}

pub fn extract_request_id(req: &Request) -> Option<String> {
    req.header(REQUEST_ID_HEADER).map(|s| s.to_string())
}

pub fn extract_correlation_id(req: &Request) -> Option<String> {
    req.header(CORRELATION_ID_HEADER).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poem::{handler, EndpointExt};

    #[handler]
    fn echo(req: &Request) -> String {
        format!(
            "{}|{}",
            extract_request_id(req).unwrap_or_default(),
            extract_correlation_id(req).unwrap_or_default()
        )
    }

    #[tokio::test]
    async fn test_ids_are_attached() {
        let ep = echo.with(RequestTracingMiddleware);
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, "corr-1")
            .finish();

        let resp = ep.call(req).await.unwrap();
        let request_id = resp
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap();
        let body = resp.into_body().into_string().await.unwrap();
        assert_eq!(body, format!("{}|corr-1", request_id));
    }

    #[tokio::test]
    async fn test_correlation_defaults_to_request_id() {
        let ep = echo.with(RequestTracingMiddleware);
        let resp = ep.call(Request::builder().finish()).await.unwrap();

        let body = resp.into_body().into_string().await.unwrap();
        let (request_id, correlation_id) = body.split_once('|').unwrap();
        assert!(!request_id.is_empty());
        assert_eq!(request_id, correlation_id);
    }

    #[test]
    fn test_missing_request_id() {
        let req = Request::builder().finish();
        assert!(extract_request_id(&req).is_none());
    }
}
