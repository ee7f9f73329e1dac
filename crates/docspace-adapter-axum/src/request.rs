use axum::body::Body as AxumBody;
use axum::http::Request;
use docspace_core::body::Body;
use docspace_core::http::Request as CoreRequest;
use docspace_core::proxy::ProxyHandle;

/// Buffer an axum request into a core request and install the outbound client.
pub async fn into_core_request(
    request: Request<AxumBody>,
    proxy: ProxyHandle,
) -> Result<CoreRequest, String> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| format!("Failed to convert body into bytes: {e}"))?;

    let mut core_request = CoreRequest::from_parts(parts, Body::from_bytes(bytes));
    core_request.extensions_mut().insert(proxy);
    Ok(core_request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::UpstreamClient;
    use docspace_core::http::Method;

    fn handle() -> ProxyHandle {
        ProxyHandle::with_client(UpstreamClient::new(None).expect("client"))
    }

    #[tokio::test]
    async fn buffers_body_and_keeps_metadata() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/routing/links?x=1")
            .header("content-type", "text/html")
            .body(AxumBody::from("<a href=\"#company/1\">x</a>"))
            .expect("request");

        let core_request = into_core_request(request, handle())
            .await
            .expect("request conversion");
        assert_eq!(core_request.method(), &Method::POST);
        assert_eq!(core_request.uri().path(), "/routing/links");
        assert_eq!(core_request.uri().query(), Some("x=1"));
        assert_eq!(core_request.headers()["content-type"], "text/html");
        assert_eq!(
            core_request.body().as_str(),
            Some("<a href=\"#company/1\">x</a>")
        );
    }

    #[tokio::test]
    async fn installs_proxy_handle() {
        let request = Request::builder()
            .uri("/sitemap.xml")
            .body(AxumBody::empty())
            .expect("request");
        let core_request = into_core_request(request, handle())
            .await
            .expect("request conversion");
        assert!(core_request.extensions().get::<ProxyHandle>().is_some());
        assert!(core_request.body().is_empty());
    }
}
