use crate::body::Body;
use crate::http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
    response_builder, HeaderValue, Response, StatusCode,
};

/// Convert common return types into `Response`.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for Body {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, self)
    }
}

impl IntoResponse for &str {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self))
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self))
    }
}

pub struct Text<T>(T);

impl<T> Text<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> IntoResponse for Text<T>
where
    T: Into<String>,
{
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self.0.into()))
    }
}

/// HTML fragment or page.
pub struct Html<T>(pub T);

impl<T> IntoResponse for Html<T>
where
    T: Into<String>,
{
    fn into_response(self) -> Response {
        with_content_type(
            Body::text(self.0.into()),
            HeaderValue::from_static("text/html; charset=utf-8"),
        )
    }
}

/// XML document such as the sitemap.
pub struct Xml<T>(pub T);

impl<T> IntoResponse for Xml<T>
where
    T: Into<String>,
{
    fn into_response(self) -> Response {
        with_content_type(
            Body::text(self.0.into()),
            HeaderValue::from_static("application/xml; charset=utf-8"),
        )
    }
}

/// JSON payload serialized up front; use `Body::json` failures as internal errors.
pub struct JsonBody(pub Body);

impl IntoResponse for JsonBody {
    fn into_response(self) -> Response {
        with_content_type(self.0, HeaderValue::from_static("application/json"))
    }
}

/// `302 Found` pointing at `location`.
pub struct Redirect(pub String);

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let mut response = response_with_body(StatusCode::FOUND, Body::empty());
        match HeaderValue::from_str(&self.0) {
            Ok(value) => {
                response.headers_mut().insert(LOCATION, value);
            }
            Err(_) => {
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            }
        }
        response
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::NO_CONTENT, Body::empty())
    }
}

impl<T> IntoResponse for (StatusCode, T)
where
    T: IntoResponse,
{
    fn into_response(self) -> Response {
        let (status, inner) = self;
        let mut response = inner.into_response();
        *response.status_mut() = status;
        response
    }
}

pub fn response_with_body(status: StatusCode, body: Body) -> Response {
    let mut builder = response_builder().status(status);

    if !body.is_empty() {
        builder = builder
            .header(CONTENT_LENGTH, body.len().to_string())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
    }

    builder
        .body(body)
        .expect("static response builder should not fail")
}

fn with_content_type(body: Body, content_type: HeaderValue) -> Response {
    let mut response = response_with_body(StatusCode::OK, body);
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_body_sets_length_and_type() {
        let response = response_with_body(StatusCode::OK, Body::from("hello"));
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .unwrap(),
            "5"
        );
        assert_eq!(
            headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn empty_body_does_not_set_length() {
        let response = response_with_body(StatusCode::OK, Body::empty());
        assert!(response.headers().get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn html_and_xml_set_their_media_types() {
        let html = Html("<title>x</title>").into_response();
        assert_eq!(
            html.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );

        let xml = Xml("<urlset/>").into_response();
        assert_eq!(
            xml.headers().get(CONTENT_TYPE).unwrap(),
            "application/xml; charset=utf-8"
        );
        assert_eq!(xml.body().as_bytes(), b"<urlset/>");
    }

    #[test]
    fn redirect_sets_location() {
        let response = Redirect("/#company/00000006".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/#company/00000006"
        );
    }

    #[test]
    fn unit_type_sets_no_content() {
        let response = ().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.body().is_empty());
    }

    #[test]
    fn status_code_tuple_overrides_status() {
        let response = (StatusCode::CREATED, "created").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body().as_bytes(), b"created");
    }
}
