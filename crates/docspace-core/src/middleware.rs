use std::sync::Arc;

use async_trait::async_trait;
use web_time::Instant;

use crate::context::RequestContext;
use crate::error::EdgeError;
use crate::handler::DynHandler;
use crate::http::Response;

pub type BoxMiddleware = Arc<dyn Middleware>;

#[async_trait(?Send)]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: RequestContext, next: Next<'_>) -> Result<Response, EdgeError>;
}

/// Remaining middleware chain for one request, ending in the matched handler.
pub struct Next<'a> {
    middlewares: &'a [BoxMiddleware],
    handler: &'a dyn DynHandler,
}

impl<'a> Next<'a> {
    pub fn new(middlewares: &'a [BoxMiddleware], handler: &'a dyn DynHandler) -> Self {
        Self {
            middlewares,
            handler,
        }
    }

    pub async fn run(self, ctx: RequestContext) -> Result<Response, EdgeError> {
        match self.middlewares {
            [] => self.handler.call(ctx).await,
            [current, rest @ ..] => current.handle(ctx, Next::new(rest, self.handler)).await,
        }
    }
}

/// Logs one line per request with method, path, status and latency.
pub struct RequestLogger;

#[async_trait(?Send)]
impl Middleware for RequestLogger {
    async fn handle(&self, ctx: RequestContext, next: Next<'_>) -> Result<Response, EdgeError> {
        let method = ctx.request().method().to_string();
        let path = ctx.request().uri().path().to_owned();
        let started = Instant::now();

        let outcome = next.run(ctx).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &outcome {
            Ok(response) => tracing::info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                bytes = response.body().len(),
                elapsed_ms,
                "request served"
            ),
            Err(err) => tracing::error!(
                method = %method,
                path = %path,
                status = err.status().as_u16(),
                error = %err,
                elapsed_ms,
                "request failed"
            ),
        }
        outcome
    }
}
