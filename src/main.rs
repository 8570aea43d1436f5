use tracing_subscriber::EnvFilter;

use classquiz::config::{self, Settings};
use classquiz::error::Result;
use classquiz::game;
use classquiz::gateway::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;

    config::init(&settings.config_dir)?;
    let game_config = config::load_game_config(&settings.config_dir)?;

    let session = game::spawn_session(game_config.feedback.clone());
    let state = AppState::new(session, &game_config);

    let app = gateway::router(state, &settings.static_dir);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port)).await?;

    tracing::info!("Classroom quiz server running on port {}", settings.port);

    axum::serve(listener, app).await?;
    Ok(())
}
