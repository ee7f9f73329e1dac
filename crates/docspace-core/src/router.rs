use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as PathRouter;
use serde::Serialize;
use tower_service::Service;

use crate::body::Body;
use crate::context::RequestContext;
use crate::error::EdgeError;
use crate::handler::{BoxHandler, IntoHandler};
use crate::http::{HandlerFuture, Method, Request, Response};
use crate::middleware::{BoxMiddleware, Middleware, Next};
use crate::params::PathParams;
use crate::response::{IntoResponse, JsonBody};

pub const DEFAULT_ROUTE_LISTING_PATH: &str = "/__docspace/routes";

#[derive(Clone, Debug)]
pub struct RouteInfo {
    method: Method,
    path: String,
}

impl RouteInfo {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Serialize)]
struct RouteListingEntry {
    method: String,
    path: String,
}

/// Handlers keyed by method, then by `matchit` path pattern.
#[derive(Default)]
struct RouteTable {
    by_method: HashMap<Method, PathRouter<BoxHandler>>,
    index: Vec<RouteInfo>,
}

impl RouteTable {
    fn insert(&mut self, method: Method, path: &str, handler: BoxHandler) {
        if let Err(err) = self
            .by_method
            .entry(method.clone())
            .or_default()
            .insert(path, handler)
        {
            panic!("route {method} {path} conflicts with an existing route: {err}");
        }
        self.index.push(RouteInfo::new(method, path));
    }

    fn resolve(&self, method: &Method, path: &str) -> Result<(&BoxHandler, PathParams), EdgeError> {
        if let Some(matched) = self
            .by_method
            .get(method)
            .and_then(|paths| paths.at(path).ok())
        {
            let params = matched
                .params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
            return Ok((matched.value, PathParams::new(params)));
        }

        let allowed: Vec<Method> = self
            .by_method
            .iter()
            .filter(|(_, paths)| paths.at(path).is_ok())
            .map(|(candidate, _)| candidate.clone())
            .collect();
        if allowed.is_empty() {
            Err(EdgeError::not_found(format!("route {path}")))
        } else {
            Err(EdgeError::method_not_allowed(method, &allowed))
        }
    }
}

#[derive(Default)]
pub struct RouterBuilder {
    table: RouteTable,
    middlewares: Vec<BoxMiddleware>,
    route_listing: bool,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a JSON index of every registered route at `DEFAULT_ROUTE_LISTING_PATH`.
    pub fn enable_route_listing(mut self) -> Self {
        self.route_listing = true;
        self
    }

    /// Panics when `path` conflicts with a route already registered for `method`.
    pub fn route<H>(mut self, path: &str, method: Method, handler: H) -> Self
    where
        H: IntoHandler,
    {
        self.table.insert(method, path, handler.into_handler());
        self
    }

    pub fn get<H>(self, path: &str, handler: H) -> Self
    where
        H: IntoHandler,
    {
        self.route(path, Method::GET, handler)
    }

    pub fn post<H>(self, path: &str, handler: H) -> Self
    where
        H: IntoHandler,
    {
        self.route(path, Method::POST, handler)
    }

    pub fn options<H>(self, path: &str, handler: H) -> Self
    where
        H: IntoHandler,
    {
        self.route(path, Method::OPTIONS, handler)
    }

    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> RouterService {
        let RouterBuilder {
            mut table,
            middlewares,
            route_listing,
        } = self;

        if route_listing {
            let mut listed = table.index.clone();
            listed.push(RouteInfo::new(Method::GET, DEFAULT_ROUTE_LISTING_PATH));
            table.insert(
                Method::GET,
                DEFAULT_ROUTE_LISTING_PATH,
                listing_handler(listed).into_handler(),
            );
        }

        RouterService {
            inner: Arc::new(RouterInner { table, middlewares }),
        }
    }
}

fn listing_handler(
    routes: Vec<RouteInfo>,
) -> impl Fn(RequestContext) -> std::future::Ready<Result<JsonBody, EdgeError>> + Send + Sync + 'static {
    move |_ctx| {
        let payload: Vec<RouteListingEntry> = routes
            .iter()
            .map(|route| RouteListingEntry {
                method: route.method().as_str().to_string(),
                path: route.path().to_string(),
            })
            .collect();
        std::future::ready(
            Body::json(&payload)
                .map(JsonBody)
                .map_err(EdgeError::internal),
        )
    }
}

#[derive(Clone)]
pub struct RouterService {
    inner: Arc<RouterInner>,
}

impl RouterService {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.inner.table.index.clone()
    }

    /// Dispatch a request and render any error as its HTTP response.
    pub async fn oneshot(&self, request: Request) -> Response {
        match self.inner.dispatch(request).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }
}

struct RouterInner {
    table: RouteTable,
    middlewares: Vec<BoxMiddleware>,
}

impl RouterInner {
    async fn dispatch(&self, request: Request) -> Result<Response, EdgeError> {
        let (handler, params) = self
            .table
            .resolve(request.method(), request.uri().path())?;
        let ctx = RequestContext::new(request, params);
        Next::new(&self.middlewares, handler.as_ref()).run(ctx).await
    }
}

impl Service<Request> for RouterService {
    type Response = Response;
    type Error = EdgeError;
    type Future = HandlerFuture;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.dispatch(request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{request_builder, StatusCode};
    use crate::response::Text;
    use futures::executor::block_on;
    use serde::Deserialize;
    use serde_json::json;

    fn get(uri: &str) -> Request {
        request_builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[test]
    fn route_matches_path_params() {
        #[derive(Deserialize)]
        struct Params {
            number: String,
        }

        async fn handler(ctx: RequestContext) -> Result<Text<String>, EdgeError> {
            let params: Params = ctx.path()?;
            Ok(Text::new(format!("company {}", params.number)))
        }

        let service = RouterService::builder()
            .get("/company/{number}", handler)
            .build();

        let response = block_on(service.clone().call(get("/company/RC000766"))).expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_bytes(), b"company RC000766");
    }

    #[test]
    fn route_listing_outputs_all_routes() {
        async fn noop(_ctx: RequestContext) -> Result<(), EdgeError> {
            Ok(())
        }

        let service = RouterService::builder()
            .enable_route_listing()
            .get("/sitemap.xml", noop)
            .options("/proxy", noop)
            .build();

        let response =
            block_on(service.clone().call(get(DEFAULT_ROUTE_LISTING_PATH))).expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let payload: Vec<serde_json::Value> = response.body().to_json().expect("json payload");
        assert!(payload.contains(&json!({
            "method": "GET",
            "path": DEFAULT_ROUTE_LISTING_PATH
        })));
        assert!(payload.contains(&json!({ "method": "GET", "path": "/sitemap.xml" })));
        assert!(payload.contains(&json!({ "method": "OPTIONS", "path": "/proxy" })));

        assert!(service
            .routes()
            .iter()
            .any(|route| route.path() == "/sitemap.xml" && *route.method() == Method::GET));
    }

    #[test]
    fn returns_method_not_allowed() {
        async fn handler(_ctx: RequestContext) -> Result<(), EdgeError> {
            Ok(())
        }

        let service = RouterService::builder()
            .post("/routing/toggle", handler)
            .build();

        let error = block_on(service.clone().call(get("/routing/toggle"))).expect_err("error");
        assert_eq!(error.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn oneshot_renders_not_found() {
        let service = RouterService::builder().build();
        let response = block_on(service.oneshot(get("/missing")));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let payload: serde_json::Value = response.body().to_json().expect("json");
        assert_eq!(payload["error"]["status"], 404);
    }
}
