use crate::config::AppConfig;
use crate::error::EdgeError;
use crate::proxy::ProxyHandle;
use crate::router::RouterService;

/// A named router, ready to hand to an adapter.
pub struct App {
    name: String,
    router: RouterService,
}

impl App {
    pub fn with_name(router: RouterService, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            router,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_router(self) -> RouterService {
        self.router
    }
}

/// Application wiring. Adapters pass their outbound client so services built at
/// startup, such as the hosted backend, can keep a handle to it.
pub trait Hooks {
    fn routes(config: &AppConfig, upstream: &ProxyHandle) -> Result<RouterService, EdgeError>;

    fn build_app(config: &AppConfig, upstream: &ProxyHandle) -> Result<App, EdgeError>
    where
        Self: Sized,
    {
        let router = Self::routes(config, upstream)?;
        Ok(App::with_name(router, config.app.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::context::RequestContext;
    use crate::http::{request_builder, StatusCode};
    use crate::proxy::{ProxyClient, ProxyRequest, ProxyResponse};
    use async_trait::async_trait;
    use futures::executor::block_on;

    struct Offline;

    #[async_trait(?Send)]
    impl ProxyClient for Offline {
        async fn send(&self, _request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
            Err(EdgeError::internal(anyhow::anyhow!("offline")))
        }
    }

    struct SiteHooks;

    impl Hooks for SiteHooks {
        fn routes(config: &AppConfig, _upstream: &ProxyHandle) -> Result<RouterService, EdgeError> {
            let base = config.site.base_url.clone();
            Ok(RouterService::builder()
                .get("/base", move |_ctx: RequestContext| {
                    let base = base.clone();
                    async move { Ok::<_, EdgeError>(base) }
                })
                .build())
        }
    }

    struct BrokenHooks;

    impl Hooks for BrokenHooks {
        fn routes(_config: &AppConfig, _upstream: &ProxyHandle) -> Result<RouterService, EdgeError> {
            Err(EdgeError::internal(anyhow::anyhow!("missing backend key")))
        }
    }

    #[test]
    fn build_app_names_app_and_wires_routes() {
        let upstream = ProxyHandle::with_client(Offline);
        let app = SiteHooks::build_app(&AppConfig::default(), &upstream).expect("app");
        assert_eq!(app.name(), "DocSpace");

        let request = request_builder()
            .uri("/base")
            .body(Body::empty())
            .expect("request");
        let response = block_on(app.into_router().oneshot(request));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_bytes(), b"https://docspace.uk");
    }

    #[test]
    fn build_app_surfaces_routing_failures() {
        let upstream = ProxyHandle::with_client(Offline);
        let err = BrokenHooks::build_app(&AppConfig::default(), &upstream)
            .err()
            .expect("error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
