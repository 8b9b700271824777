use crate::http::{ParcelApiServices, run_parcel_http_server};
use common::http::HttpServerConfig;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct ParcelApi {
    services: ParcelApiServices,
    config: HttpServerConfig,
}

impl ParcelApi {
    pub fn new(services: ParcelApiServices, config: HttpServerConfig) -> Self {
        debug!("Initializing parcel API module");
        Self { services, config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move { run_parcel_http_server(self.config, self.services, ctx).await })
        }
    }
}
