use std::future::Future;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::EdgeError;
use crate::http::HandlerFuture;
use crate::response::IntoResponse;

/// Object-safe endpoint stored in the route table.
pub trait DynHandler: Send + Sync {
    fn call(&self, ctx: RequestContext) -> HandlerFuture;
}

/// Any async `fn(RequestContext) -> Result<impl IntoResponse, EdgeError>` is a handler.
impl<F, Fut, Out> DynHandler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, EdgeError>> + 'static,
    Out: IntoResponse,
{
    fn call(&self, ctx: RequestContext) -> HandlerFuture {
        let pending = self(ctx);
        Box::pin(async move { pending.await.map(IntoResponse::into_response) })
    }
}

pub type BoxHandler = Arc<dyn DynHandler>;

pub trait IntoHandler {
    fn into_handler(self) -> BoxHandler;
}

impl<H: DynHandler + 'static> IntoHandler for H {
    fn into_handler(self) -> BoxHandler {
        Arc::new(self)
    }
}
