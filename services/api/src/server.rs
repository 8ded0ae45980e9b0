use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::{build_pipeline_state, seed_reference_data, AppState};
use crate::routes::with_pipeline_routes;
use hireflow::config::{AppConfig, AppEnvironment};
use hireflow::error::AppError;
use hireflow::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (pipeline_state, repository) =
        build_pipeline_state(config.fees.clone(), config.sweep.token.clone());
    if config.environment == AppEnvironment::Development {
        seed_reference_data(&repository);
        info!("seeded development reference data");
    }

    let app = with_pipeline_routes(pipeline_state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "placement pipeline service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
