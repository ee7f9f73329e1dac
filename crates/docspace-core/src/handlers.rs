//! HTTP surface of the DocSpace workload.

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::app::Hooks;
use crate::backend::{BackendError, OAuthProvider, SupabaseClient};
use crate::body::Body;
use crate::charges::{ChargesCard, ChargesResponse};
use crate::companies_house::{proxy_handler, CompaniesHouseProxy};
use crate::company::CompanyRecord;
use crate::config::AppConfig;
use crate::context::RequestContext;
use crate::director::{DirectorInfo, DirectorLookup};
use crate::error::EdgeError;
use crate::http::Response;
use crate::middleware::RequestLogger;
use crate::proxy::ProxyHandle;
use crate::response::{Html, IntoResponse, JsonBody, Redirect, Text, Xml};
use crate::router::RouterService;
use crate::routing::{DualRouter, Navigation, UrlMode};
use crate::seo::{Category, HeadDocument, InitialView, SeoMetaManager, DEFAULT_META};
use crate::sitemap::SitemapBuilder;

/// Services shared by every route, built once from configuration.
pub struct AppState {
    config: AppConfig,
    proxy: CompaniesHouseProxy,
    seo: SeoMetaManager,
    sitemap: SitemapBuilder,
    router: DualRouter,
    directors: DirectorLookup,
    backend: Option<SupabaseClient>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            proxy: CompaniesHouseProxy::new(&config.proxy),
            seo: SeoMetaManager::new(config.site.base_url.as_str()),
            sitemap: SitemapBuilder::new(&config.site, &config.sitemap),
            router: DualRouter::new(config.routing.clean_urls),
            directors: DirectorLookup::new(&config.directors),
            backend: None,
            config,
        }
    }

    /// Attach the hosted backend when `[backend]` is configured; otherwise a no-op.
    pub fn with_backend(mut self, handle: ProxyHandle) -> Result<Self, BackendError> {
        if self.config.backend.is_configured() {
            self.backend = Some(SupabaseClient::new(&self.config.backend, handle)?);
        } else {
            log::info!("backend not configured; auth routes disabled");
        }
        Ok(self)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn router(&self) -> &DualRouter {
        &self.router
    }

    pub fn directors(&self) -> &DirectorLookup {
        &self.directors
    }

    pub fn backend(&self) -> Option<&SupabaseClient> {
        self.backend.as_ref()
    }
}

/// The DocSpace site: every service in [`AppState`], with the backend attached when configured.
pub struct DocSpaceApp;

impl Hooks for DocSpaceApp {
    fn routes(config: &AppConfig, upstream: &ProxyHandle) -> Result<RouterService, EdgeError> {
        let state = AppState::new(config.clone())
            .with_backend(upstream.clone())
            .map_err(EdgeError::internal)?;
        Ok(build_router(Arc::new(state)))
    }
}

pub fn build_router(state: Arc<AppState>) -> RouterService {
    let mut builder = RouterService::builder()
        .enable_route_listing()
        .middleware(RequestLogger)
        .get("/", with_state(&state, home))
        .get("/health", with_state(&state, health))
        .get("/proxy", with_state(&state, proxy))
        .options("/proxy", with_state(&state, proxy_preflight))
        .post("/seo/company", with_state(&state, seo_company))
        .post("/charges/summary", with_state(&state, charges_summary))
        .get("/sitemap.xml", with_state(&state, sitemap))
        .get("/company/{number}", with_state(&state, company_page))
        .get("/routing/mode", with_state(&state, routing_mode))
        .post("/routing/toggle", with_state(&state, routing_toggle))
        .post("/routing/links", with_state(&state, routing_links))
        .get("/directors", with_state(&state, director))
        .get("/directors/popup", with_state(&state, director_popup))
        .get("/auth/oauth/{provider}", with_state(&state, oauth_redirect));

    for category in Category::ALL {
        builder = builder.get(category.path(), with_state(&state, category_page));
    }
    builder.build()
}

fn with_state<F, Fut, Res>(
    state: &Arc<AppState>,
    handler: F,
) -> impl Fn(RequestContext) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<AppState>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, EdgeError>> + 'static,
    Res: IntoResponse,
{
    let state = Arc::clone(state);
    move |ctx| handler(Arc::clone(&state), ctx)
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn json<T: Serialize>(value: &T) -> Result<JsonBody, EdgeError> {
    Body::json(value).map(JsonBody).map_err(EdgeError::internal)
}

async fn health(_state: Arc<AppState>, _ctx: RequestContext) -> Result<Text<&'static str>, EdgeError> {
    Ok(Text::new("ok"))
}

/// Landing page head; `?company=` sends the browser to the company fragment.
async fn home(state: Arc<AppState>, ctx: RequestContext) -> Result<Response, EdgeError> {
    let mut doc = HeadDocument::new();
    state.seo.set_basic_meta(&mut doc, &DEFAULT_META);
    doc.set_canonical_url(format!("{}/", state.seo.base_url()));

    let query = ctx.request().uri().query().unwrap_or("");
    match state.seo.initial_navigation(&mut doc, query) {
        InitialView::Company { fragment } => Ok(Redirect(format!("/{fragment}")).into_response()),
        InitialView::Category(_) | InitialView::Default => Ok(Html(doc.render()?).into_response()),
    }
}

async fn proxy(state: Arc<AppState>, ctx: RequestContext) -> Result<Response, EdgeError> {
    proxy_handler(&state.proxy, ctx).await
}

async fn proxy_preflight(state: Arc<AppState>, _ctx: RequestContext) -> Result<Response, EdgeError> {
    Ok(state.proxy.preflight())
}

async fn seo_company(state: Arc<AppState>, ctx: RequestContext) -> Result<Html<String>, EdgeError> {
    let company: CompanyRecord = ctx.json()?;
    let mut doc = HeadDocument::new();
    state.seo.update_company_meta(&mut doc, &company, today());
    Ok(Html(doc.render()?))
}

/// Card fields for a Companies House charges payload posted by the front end.
async fn charges_summary(_state: Arc<AppState>, ctx: RequestContext) -> Result<JsonBody, EdgeError> {
    let charges: ChargesResponse = ctx.json()?;
    json(&ChargesCard::from_charges(&charges))
}

async fn sitemap(state: Arc<AppState>, ctx: RequestContext) -> Result<Xml<String>, EdgeError> {
    let xml = match ctx.proxy_handle() {
        Some(handle) => state.sitemap.generate(&handle, today()).await,
        None => {
            log::warn!("no outbound client installed; serving basic sitemap");
            state.sitemap.basic_sitemap(today())
        }
    };
    Ok(Xml(xml))
}

async fn company_page(state: Arc<AppState>, ctx: RequestContext) -> Result<Response, EdgeError> {
    let path = ctx.request().uri().path().to_string();
    match state.router.navigate(&path) {
        Navigation::Redirect(location) => Ok(Redirect(location).into_response()),
        Navigation::LoadCompany(number) => {
            let company = CompanyRecord {
                number: Some(number),
                ..CompanyRecord::default()
            };
            let mut doc = HeadDocument::new();
            state.seo.update_company_meta(&mut doc, &company, today());
            Ok(Html(doc.render()?).into_response())
        }
        Navigation::LoadCategory(_) | Navigation::PassThrough => {
            Err(EdgeError::not_found(format!("company page {path}")))
        }
    }
}

async fn category_page(state: Arc<AppState>, ctx: RequestContext) -> Result<Html<String>, EdgeError> {
    let path = ctx.request().uri().path();
    let Navigation::LoadCategory(category) = state.router.navigate(path) else {
        return Err(EdgeError::not_found(format!("category page {path}")));
    };
    let mut doc = HeadDocument::new();
    state.seo.update_category_meta(&mut doc, category.slug());
    doc.set_canonical_url(format!("{}{}", state.seo.base_url(), category.path()));
    Ok(Html(doc.render()?))
}

#[derive(Serialize)]
struct ModeView {
    mode: UrlMode,
    clean_urls: bool,
}

impl ModeView {
    fn new(mode: UrlMode) -> Self {
        Self {
            mode,
            clean_urls: mode == UrlMode::CleanMode,
        }
    }
}

async fn routing_mode(state: Arc<AppState>, _ctx: RequestContext) -> Result<JsonBody, EdgeError> {
    json(&ModeView::new(state.router.mode()))
}

async fn routing_toggle(state: Arc<AppState>, _ctx: RequestContext) -> Result<JsonBody, EdgeError> {
    json(&ModeView::new(state.router.toggle()))
}

async fn routing_links(state: Arc<AppState>, ctx: RequestContext) -> Result<Html<String>, EdgeError> {
    Ok(Html(state.router.update_all_links(ctx.text()?)))
}

#[derive(Deserialize)]
struct DirectorQuery {
    #[serde(default)]
    name: Option<String>,
}

fn find_director(
    state: &AppState,
    ctx: &RequestContext,
) -> Result<(String, Arc<DirectorInfo>), EdgeError> {
    let query: DirectorQuery = ctx.query()?;
    let name = query
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| EdgeError::bad_request("missing name parameter"))?;
    let info = state
        .directors
        .lookup(&name)
        .ok_or_else(|| EdgeError::not_found(format!("director {}", name.trim())))?;
    Ok((name.trim().to_string(), info))
}

async fn director(state: Arc<AppState>, ctx: RequestContext) -> Result<JsonBody, EdgeError> {
    #[derive(Serialize)]
    struct DirectorView<'a> {
        name: &'a str,
        badge: String,
        #[serde(flatten)]
        info: &'a DirectorInfo,
    }

    let (name, info) = find_director(&state, &ctx)?;
    json(&DirectorView {
        name: &name,
        badge: state.directors.badge(&info)?,
        info: &info,
    })
}

async fn director_popup(state: Arc<AppState>, ctx: RequestContext) -> Result<Html<String>, EdgeError> {
    let (name, info) = find_director(&state, &ctx)?;
    Ok(Html(state.directors.popup(&name, &info)?))
}

#[derive(Deserialize)]
struct OAuthParams {
    provider: String,
}

#[derive(Deserialize)]
struct OAuthQuery {
    #[serde(default)]
    redirect_to: Option<String>,
}

async fn oauth_redirect(state: Arc<AppState>, ctx: RequestContext) -> Result<Redirect, EdgeError> {
    let backend = state
        .backend
        .as_ref()
        .ok_or_else(|| EdgeError::not_found("backend"))?;
    let params: OAuthParams = ctx.path()?;
    let provider = match params.provider.as_str() {
        "google" => OAuthProvider::Google,
        "facebook" => OAuthProvider::Facebook,
        other => return Err(EdgeError::bad_request(format!("unsupported provider {other}"))),
    };
    let query: OAuthQuery = ctx.query()?;
    let redirect_to = query
        .redirect_to
        .unwrap_or_else(|| format!("{}/", state.seo.base_url()));
    Ok(Redirect(backend.oauth_sign_in_url(provider, &redirect_to)))
}
