use actix_web::{HttpServer, web};
use lead_verify_api::{AppConfig, AppState, LogFormat, create_app};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().with_current_span(false).init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let server_config = lead_verify_api::ServerConfig::from_env();
    init_tracing(server_config.log_format);

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let bind_address = config.server.bind_address();
    let state = match AppState::from_config(config) {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            error!(error = %e, "Failed to start");
            std::process::exit(1);
        }
    };

    info!(
        host = %bind_address.0,
        port = bind_address.1,
        version = env!("CARGO_PKG_VERSION"),
        "Server starting"
    );

    HttpServer::new(move || create_app(state.clone()))
        .bind(bind_address)?
        .run()
        .await
}
