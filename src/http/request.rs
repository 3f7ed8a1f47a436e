//! Request id middleware.
//!
//! # Responsibilities
//! - Reuse the caller's `x-request-id` or generate a UUID v4
//! - Expose the id to handlers as a request extension
//! - Echo the id on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An id already set on the response by a handler is left alone

use std::task::{Context, Poll};

use axum::http::{HeaderValue, Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlation id of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Read the [`RequestId`] extension off a request.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ResBody: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let header = request
            .headers()
            .get(X_REQUEST_ID)
            .filter(|v| !v.is_empty())
            .cloned();
        let value = match header {
            Some(value) => value,
            None => {
                let generated = HeaderValue::from_str(&Uuid::new_v4().to_string());
                match generated {
                    Ok(value) => {
                        request.headers_mut().insert(X_REQUEST_ID, value.clone());
                        value
                    }
                    Err(_) => HeaderValue::from_static("unknown"),
                }
            }
        };

        if let Ok(id) = value.to_str() {
            request.extensions_mut().insert(RequestId(id.to_string()));
        }

        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            response.headers_mut().entry(X_REQUEST_ID).or_insert(value);
            Ok(response)
        })
    }
}
