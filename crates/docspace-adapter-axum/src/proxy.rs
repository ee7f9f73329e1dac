use std::time::Duration;

use async_trait::async_trait;
use docspace_core::body::Body;
use docspace_core::error::EdgeError;
use docspace_core::http::{HeaderName, HeaderValue, Method, StatusCode};
use docspace_core::proxy::{ProxyClient, ProxyRequest, ProxyResponse};
use reqwest::{header, Client};

/// Outbound client for proxy forwards, sitemap listings and backend calls.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    /// No timeout unless one is given; the proxy waits on upstream as long as it takes.
    pub fn new(timeout: Option<Duration>) -> Result<Self, EdgeError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(EdgeError::internal)?;
        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl ProxyClient for UpstreamClient {
    async fn send(&self, request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
        let (method, uri, headers, body) = request.into_parts();
        let mut builder = self
            .client
            .request(reqwest_method(&method)?, uri.to_string());

        for (name, value) in headers.iter() {
            let header_name = header::HeaderName::from_bytes(name.as_str().as_bytes())
                .map_err(EdgeError::internal)?;
            let header_value =
                header::HeaderValue::from_bytes(value.as_bytes()).map_err(EdgeError::internal)?;
            builder = builder.header(header_name, header_value);
        }
        if !body.is_empty() {
            builder = builder.body(body.into_bytes());
        }

        let response = builder.send().await.map_err(EdgeError::internal)?;
        let status =
            StatusCode::from_u16(response.status().as_u16()).map_err(EdgeError::internal)?;
        let mut proxy_response = ProxyResponse::new(status, Body::empty());

        for (name, value) in response.headers().iter() {
            let header_name =
                HeaderName::from_bytes(name.as_str().as_bytes()).map_err(EdgeError::internal)?;
            let header_value =
                HeaderValue::from_bytes(value.as_bytes()).map_err(EdgeError::internal)?;
            proxy_response
                .headers_mut()
                .append(header_name, header_value);
        }

        let bytes = response.bytes().await.map_err(EdgeError::internal)?;
        *proxy_response.body_mut() = Body::from_bytes(bytes);

        Ok(proxy_response)
    }
}

fn reqwest_method(method: &Method) -> Result<reqwest::Method, EdgeError> {
    reqwest::Method::from_bytes(method.as_str().as_bytes()).map_err(EdgeError::internal)
}
