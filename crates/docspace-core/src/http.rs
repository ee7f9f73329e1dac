//! HTTP vocabulary shared by the core and its adapters.

use std::future::Future;
use std::pin::Pin;

pub use http::header::{self, HeaderName};
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};

use crate::body::Body;
use crate::error::EdgeError;

pub type Request = http::Request<Body>;
pub type Response = http::Response<Body>;

/// Boxed handler output; not `Send`, adapters drive it on their own thread.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, EdgeError>>>>;

pub fn request_builder() -> http::request::Builder {
    http::Request::builder()
}

pub fn response_builder() -> http::response::Builder {
    http::Response::builder()
}
