//! call-agent server binary

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use call_agent_config::load_settings;
use call_agent_server::http::create_router;
use call_agent_server::AppState;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = std::env::var("CALL_AGENT_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(error) => {
            tracing::error!(%error, "Configuration invalid");
            std::process::exit(1);
        }
    };

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::new(settings);
    let router = create_router(state);

    tracing::info!(%addr, "call-agent listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await
}
