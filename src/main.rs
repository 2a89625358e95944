use std::sync::Arc;

use host_mcp_bridge::{
    build_app,
    config::Config,
    host::{
        memory::{HostFixture, InMemoryHost},
        HostHandle,
    },
    logging, AppState, CallerDefaults,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let memory_host = match &config.host_fixture {
        Some(path) => InMemoryHost::from_fixture_file(path)?,
        None => {
            warn!("MCP_HOST_FIXTURE is not set, serving an empty host");
            InMemoryHost::from_fixture(HostFixture::default())
        }
    };

    let bind_socket = config.bind_socket()?;
    let state = AppState::new(
        config.api_token.clone(),
        HostHandle::from_host(Arc::new(memory_host)),
        CallerDefaults {
            assistant: config.assistant.clone(),
            language: config.language.clone(),
            user_id: config.user_id.clone(),
        },
    );
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        assistant = %config.assistant,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
