use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use docspace_core::app::Hooks;
use docspace_core::config::{AppConfig, LoggingConfig};
use docspace_core::proxy::ProxyHandle;
use docspace_core::router::RouterService;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use tokio::runtime::Builder as RuntimeBuilder;
use tokio::signal;
use tower::{service_fn, Service};

use crate::proxy::UpstreamClient;
use crate::service::DocSpaceAxumService;

#[derive(Clone)]
pub struct AxumDevServerConfig {
    pub addr: SocketAddr,
    pub enable_ctrl_c: bool,
}

impl Default for AxumDevServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            enable_ctrl_c: true,
        }
    }
}

/// Blocking server that hosts a core router behind axum.
pub struct AxumDevServer {
    router: RouterService,
    proxy: ProxyHandle,
    config: AxumDevServerConfig,
}

impl AxumDevServer {
    pub fn with_config(
        router: RouterService,
        proxy: ProxyHandle,
        config: AxumDevServerConfig,
    ) -> Self {
        Self {
            router,
            proxy,
            config,
        }
    }

    pub fn run(self) -> anyhow::Result<()> {
        let runtime = RuntimeBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;

        runtime.block_on(async move { self.run_async().await })
    }

    async fn run_async(self) -> anyhow::Result<()> {
        let listener = StdTcpListener::bind(self.config.addr)
            .with_context(|| format!("failed to bind server to {}", self.config.addr))?;
        listener
            .set_nonblocking(true)
            .context("failed to set listener to non-blocking")?;
        let listener = tokio::net::TcpListener::from_std(listener)
            .context("failed to adopt std listener into tokio")?;

        log::info!("listening on http://{}", self.config.addr);
        self.serve(listener).await
    }

    async fn serve(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        let AxumDevServer {
            router,
            proxy,
            config,
        } = self;

        let service = DocSpaceAxumService::new(router, proxy);
        let app = Router::new().fallback_service(service_fn(move |req| {
            let mut svc = service.clone();
            async move { svc.call(req).await }
        }));

        let server = axum::serve(listener, app.into_make_service());
        if config.enable_ctrl_c {
            server
                .with_graceful_shutdown(async {
                    let _ = signal::ctrl_c().await;
                })
                .await
                .context("axum server error")?;
        } else {
            server.await.context("axum server error")?;
        }
        Ok(())
    }
}

/// Install `simple_logger` at the configured level; `echo_stdout = false` silences it.
pub fn init_logging(logging: &LoggingConfig) {
    let level: LevelFilter = logging.level.into();
    let level = if logging.echo_stdout.unwrap_or(true) {
        level
    } else {
        LevelFilter::Off
    };
    SimpleLogger::new().with_level(level).init().ok();
}

/// Build the app described by `A` from `config` and serve it until interrupted.
pub fn run_app<A: Hooks>(config: &AppConfig, server: AxumDevServerConfig) -> anyhow::Result<()> {
    init_logging(&config.logging);

    let timeout = config.proxy.timeout_secs.map(Duration::from_secs);
    let upstream = ProxyHandle::with_client(
        UpstreamClient::new(timeout).context("failed to build upstream client")?,
    );
    let app = A::build_app(config, &upstream).context("failed to build app")?;
    log::info!("starting {}", app.name());

    AxumDevServer::with_config(app.into_router(), upstream, server).run()
}
