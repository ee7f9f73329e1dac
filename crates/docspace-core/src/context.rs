use serde::de::DeserializeOwned;

use crate::body::Body;
use crate::error::EdgeError;
use crate::http::Request;
use crate::params::PathParams;
use crate::proxy::ProxyHandle;

/// Request context exposed to handlers and middleware.
pub struct RequestContext {
    request: Request,
    path_params: PathParams,
}

impl RequestContext {
    pub fn new(request: Request, params: PathParams) -> Self {
        Self {
            request,
            path_params: params,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    pub fn path<T>(&self) -> Result<T, EdgeError>
    where
        T: DeserializeOwned,
    {
        self.path_params
            .deserialize()
            .map_err(|err| EdgeError::bad_request(format!("invalid path parameters: {}", err)))
    }

    pub fn query<T>(&self) -> Result<T, EdgeError>
    where
        T: DeserializeOwned,
    {
        let query = self.request.uri().query().unwrap_or("");
        serde_urlencoded::from_str(query)
            .map_err(|err| EdgeError::bad_request(format!("invalid query string: {}", err)))
    }

    pub fn json<T>(&self) -> Result<T, EdgeError>
    where
        T: DeserializeOwned,
    {
        self.request
            .body()
            .to_json()
            .map_err(|err| EdgeError::bad_request(format!("invalid JSON payload: {}", err)))
    }

    pub fn text(&self) -> Result<&str, EdgeError> {
        self.request
            .body()
            .as_str()
            .ok_or_else(|| EdgeError::bad_request("request body is not valid UTF-8"))
    }

    pub fn body(&self) -> &Body {
        self.request.body()
    }

    /// Outbound client installed by the hosting adapter.
    pub fn proxy_handle(&self) -> Option<ProxyHandle> {
        self.request.extensions().get::<ProxyHandle>().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{request_builder, Method, StatusCode};
    use crate::proxy::{ProxyClient, ProxyRequest, ProxyResponse};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::collections::HashMap;

    fn ctx(path: &str, body: Body, params: PathParams) -> RequestContext {
        let request = request_builder()
            .method(Method::GET)
            .uri(path)
            .body(body)
            .expect("request");
        RequestContext::new(request, params)
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct ProxyQuery {
        url: Option<String>,
        #[serde(rename = "apiKey")]
        api_key: Option<String>,
    }

    #[test]
    fn path_deserialises_successfully() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct CompanyPath {
            number: String,
        }

        let mut inner = HashMap::new();
        inner.insert("number".to_string(), "12387565".to_string());
        let ctx = ctx("/company/12387565", Body::empty(), PathParams::new(inner));
        let parsed: CompanyPath = ctx.path().expect("path parameters");
        assert_eq!(parsed.number, "12387565");
        assert_eq!(ctx.path_params().get("number"), Some("12387565"));
    }

    #[test]
    fn query_decodes_percent_encoded_values() {
        let ctx = ctx(
            "/proxy?url=https%3A%2F%2Fapi.example.com%2Fcompany%2F1&apiKey=secret",
            Body::empty(),
            PathParams::default(),
        );
        let parsed: ProxyQuery = ctx.query().expect("query");
        assert_eq!(
            parsed,
            ProxyQuery {
                url: Some("https://api.example.com/company/1".into()),
                api_key: Some("secret".into()),
            }
        );
    }

    #[test]
    fn query_defaults_to_empty_when_missing() {
        let ctx = ctx("/proxy", Body::empty(), PathParams::default());
        let parsed: ProxyQuery = ctx.query().expect("query");
        assert_eq!(parsed.url, None);
        assert_eq!(parsed.api_key, None);
    }

    #[test]
    fn invalid_json_returns_bad_request() {
        let ctx = ctx("/seo/company", Body::from("not json"), PathParams::default());
        let err = ctx.json::<serde_json::Value>().expect_err("expected error");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("invalid JSON payload"));
    }

    #[test]
    fn text_rejects_binary_bodies() {
        let ctx = ctx(
            "/routing/links",
            Body::from(vec![0xffu8, 0xfe]),
            PathParams::default(),
        );
        assert_eq!(
            ctx.text().expect_err("binary").status(),
            StatusCode::BAD_REQUEST
        );
    }

    struct DummyClient;

    #[async_trait(?Send)]
    impl ProxyClient for DummyClient {
        async fn send(&self, _request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
            Ok(ProxyResponse::new(StatusCode::OK, Body::empty()))
        }
    }

    #[test]
    fn proxy_handle_is_retrieved_when_present() {
        let mut request = request_builder()
            .method(Method::GET)
            .uri("/sitemap.xml")
            .body(Body::empty())
            .expect("request");
        assert!(RequestContext::new(
            request_builder().uri("/").body(Body::empty()).unwrap(),
            PathParams::default()
        )
        .proxy_handle()
        .is_none());

        request
            .extensions_mut()
            .insert(ProxyHandle::with_client(DummyClient));
        let ctx = RequestContext::new(request, PathParams::default());
        assert!(ctx.proxy_handle().is_some());
        assert_eq!(ctx.into_request().uri().path(), "/sitemap.xml");
    }
}
