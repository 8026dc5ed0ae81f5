//! Envelope middleware layer.

use super::{config::CorsPolicy, envelope::apply_envelope};
use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Applies the CORS and security envelope to every response and answers
/// preflight requests before any routing or authentication runs.
#[derive(Clone)]
pub struct EnvelopeLayer {
    policy: Arc<CorsPolicy>,
}

impl EnvelopeLayer {
    /// Layer applying `policy` to every response.
    pub fn new(policy: CorsPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }
}

impl<S> Layer<S> for EnvelopeLayer {
    type Service = EnvelopeMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EnvelopeMiddleware {
            inner,
            policy: self.policy.clone(),
        }
    }
}

/// Service produced by [`EnvelopeLayer`].
#[derive(Clone)]
pub struct EnvelopeMiddleware<S> {
    inner: S,
    policy: Arc<CorsPolicy>,
}

impl<S> Service<Request<Body>> for EnvelopeMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let policy = self.policy.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let origin = req
                .headers()
                .get(header::ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            // Preflight never reaches routing or auth
            if req.method() == Method::OPTIONS {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::OK;
                apply_envelope(response.headers_mut(), &policy, origin.as_deref());
                return Ok(response);
            }

            let mut response = inner.call(req).await?;
            apply_envelope(response.headers_mut(), &policy, origin.as_deref());

            Ok(response)
        })
    }
}
