//! Axum host for the DocSpace router, with a reqwest-backed upstream client.

mod dev_server;
mod proxy;
mod request;
mod response;
mod service;

pub use dev_server::{init_logging, run_app, AxumDevServer, AxumDevServerConfig};
pub use proxy::UpstreamClient;
pub use request::into_core_request;
pub use response::into_axum_response;
pub use service::DocSpaceAxumService;
