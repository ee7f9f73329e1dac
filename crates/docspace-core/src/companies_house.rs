//! Forwarding proxy for the Companies House REST and document APIs.
//!
//! Browsers cannot hold the API key, so the site sends `?url=<target>&apiKey=<key>` here
//! and the proxy performs the authenticated `GET`. Document downloads are served from
//! pre-signed URLs on the document API host; those must not carry the Basic auth header.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

use crate::body::Body;
use crate::config::ProxyConfig;
use crate::context::RequestContext;
use crate::error::EdgeError;
use crate::http::header::{
    ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE,
};
use crate::http::{HeaderValue, Response, StatusCode};
use crate::proxy::{ProxyHandle, ProxyRequest, ProxyResponse};
use crate::response::response_with_body;

pub const MISSING_PARAMS_MESSAGE: &str = "Missing url or apiKey parameter";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Query accepted by `/proxy`. `endpoint` and `key` are older spellings still sent by
/// some pages.
#[derive(Debug, Default, Deserialize)]
pub struct ProxyQuery {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

impl ProxyQuery {
    pub fn target(&self) -> Option<&str> {
        non_empty(&self.url).or_else(|| non_empty(&self.endpoint))
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(&self.api_key).or_else(|| non_empty(&self.key))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[derive(Clone, Debug)]
struct CorsHeaders {
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsHeaders {
    fn from_config(config: &ProxyConfig) -> Self {
        Self {
            allow_methods: header_or(&config.allow_methods, "GET, POST, OPTIONS"),
            allow_headers: header_or(&config.allow_headers, "Content-Type"),
        }
    }

    fn apply(&self, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
    }
}

fn header_or(value: &str, fallback: &'static str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| {
        log::warn!("ignoring invalid CORS header value `{}`", value);
        HeaderValue::from_static(fallback)
    })
}

#[derive(Clone, Debug)]
pub struct CompaniesHouseProxy {
    document_api_host: String,
    cors: CorsHeaders,
}

impl Default for CompaniesHouseProxy {
    fn default() -> Self {
        Self::new(&ProxyConfig::default())
    }
}

impl CompaniesHouseProxy {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            document_api_host: config.document_api_host.clone(),
            cors: CorsHeaders::from_config(config),
        }
    }

    /// Pre-signed document download; authenticated by the URL itself.
    pub fn is_document_api(&self, target: &str) -> bool {
        target.contains(self.document_api_host.as_str())
    }

    pub fn is_pdf_request(&self, target: &str) -> bool {
        target.contains("/content") || target.contains("/document") || self.is_document_api(target)
    }

    pub fn upstream_request(&self, target: &str, api_key: &str) -> Result<ProxyRequest, EdgeError> {
        let mut request = ProxyRequest::get(target)?;
        let headers = request.headers_mut();

        if !self.is_document_api(target) {
            let credentials = STANDARD.encode(format!("{api_key}:"));
            let value = HeaderValue::from_str(&format!("Basic {credentials}"))
                .map_err(EdgeError::internal)?;
            headers.insert(AUTHORIZATION, value);
        }

        let accept = if self.is_pdf_request(target) {
            "application/pdf"
        } else {
            "application/json"
        };
        headers.insert(ACCEPT, HeaderValue::from_static(accept));

        Ok(request)
    }

    /// Forward `query` through `handle`. Every outcome, including failures, is a response
    /// carrying the CORS headers.
    pub async fn forward(&self, handle: Option<&ProxyHandle>, query: &ProxyQuery) -> Response {
        let (target, api_key) = match (query.target(), query.api_key()) {
            (Some(target), Some(api_key)) => (target, api_key),
            _ => {
                return self.text_response(StatusCode::BAD_REQUEST, MISSING_PARAMS_MESSAGE);
            }
        };

        let Some(handle) = handle else {
            return self.fetch_failed("no upstream client is configured");
        };

        let document_api = self.is_document_api(target);
        log::info!("proxy target={} document_api={}", target, document_api);

        let result = match self.upstream_request(target, api_key) {
            Ok(request) => handle.send(request).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(upstream) => {
                log::info!(
                    "proxy target={} status={} bytes={}",
                    target,
                    upstream.status().as_u16(),
                    upstream.body().len()
                );
                self.relay(upstream)
            }
            Err(err) => {
                log::error!("proxy target={} failed: {}", target, err);
                self.fetch_failed(&failure_cause(&err))
            }
        }
    }

    /// Response to an `OPTIONS` preflight: an empty `200` carrying the CORS headers.
    pub fn preflight(&self) -> Response {
        let mut response = response_with_body(StatusCode::OK, Body::empty());
        self.cors.apply(&mut response);
        response
    }

    /// Mirror status, content type and bytes from upstream.
    fn relay(&self, upstream: ProxyResponse) -> Response {
        let status = upstream.status();
        let content_type = upstream
            .headers()
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));

        let mut response = response_with_body(status, upstream.into_body());
        response.headers_mut().insert(CONTENT_TYPE, content_type);
        self.cors.apply(&mut response);
        response
    }

    fn fetch_failed(&self, cause: &str) -> Response {
        self.text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error fetching data: {cause}"),
        )
    }

    fn text_response(&self, status: StatusCode, message: impl Into<String>) -> Response {
        let mut response = response_with_body(status, Body::text(message));
        self.cors.apply(&mut response);
        response
    }
}

fn failure_cause(err: &EdgeError) -> String {
    match err {
        EdgeError::Internal { source } => source.to_string(),
        other => other.message(),
    }
}

pub async fn proxy_handler(
    proxy: &CompaniesHouseProxy,
    ctx: RequestContext,
) -> Result<Response, EdgeError> {
    let query: ProxyQuery = ctx.query().unwrap_or_default();
    let handle = ctx.proxy_handle();
    Ok(proxy.forward(handle.as_ref(), &query).await)
}
