use ember_server::{api, init_logger_with_file, Config, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment and logging
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_logger_with_file(None, Some(&config.work_dir));

    tracing::info!(
        environment = %config.environment,
        port = config.http_port,
        "Ember server starting"
    );

    // 2. Wire state and background workers (recovery sweep, printer
    //    workers, fulfillment coordinator)
    let state = ServerState::initialize(config.clone())?;
    state.start_workers();

    // 3. Serve HTTP until ctrl-c
    let app = api::build_app(state.clone());
    let listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    state.shutdown();
    Ok(())
}
