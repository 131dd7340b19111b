use pdfqa::{api, config, logging, processing::DocumentService};
use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing();

    let config = match config::load() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(error = %error, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let service = match DocumentService::from_config(&config).await {
        Ok(service) => Arc::new(service),
        Err(error) => {
            tracing::error!(kind = %error.kind(), error = %error, "Failed to initialize document service");
            return ExitCode::FAILURE;
        }
    };
    let app = api::create_router(service);

    let listener = match TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.server_port)).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(port = config.server_port, error = %error, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Listening on http://0.0.0.0:{}", config.server_port);

    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(error = %error, "Server terminated");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
