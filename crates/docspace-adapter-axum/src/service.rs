use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body as AxumBody;
use axum::http::{Request, Response};
use docspace_core::proxy::ProxyHandle;
use docspace_core::router::RouterService;
use http::StatusCode;
use tokio::{runtime::Handle, task};
use tower::Service;

use crate::request::into_core_request;
use crate::response::into_axum_response;

/// Tower service that runs the core router for each axum request.
///
/// Core futures are not `Send`, so the router is driven on the current worker with
/// `block_in_place`; this requires a multi-threaded runtime.
#[derive(Clone)]
pub struct DocSpaceAxumService {
    router: RouterService,
    proxy: ProxyHandle,
}

impl DocSpaceAxumService {
    pub fn new(router: RouterService, proxy: ProxyHandle) -> Self {
        Self { router, proxy }
    }
}

impl Service<Request<AxumBody>> for DocSpaceAxumService {
    type Response = Response<AxumBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<AxumBody>) -> Self::Future {
        let router = self.router.clone();
        let proxy = self.proxy.clone();
        Box::pin(async move {
            let core_request = match into_core_request(request, proxy).await {
                Ok(req) => req,
                Err(e) => {
                    tracing::error!(error = %e, "failed to buffer request body");
                    let mut err_response = Response::new(AxumBody::from(e));
                    *err_response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    return Ok(err_response);
                }
            };

            let core_response = task::block_in_place(move || {
                Handle::current().block_on(router.oneshot(core_request))
            });
            Ok(into_axum_response(core_response))
        })
    }
}
