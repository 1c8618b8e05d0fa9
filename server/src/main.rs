use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod game_logic;
mod room_manager;
mod state;
mod web;

use crate::config::load_settings;
use crate::error::Result as AppResult;
use crate::room_manager::RoomManagerHandle;
use crate::state::AppState;
use crate::web::run_server;

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,tower_http=debug", env!("CARGO_PKG_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_settings = load_settings()?;
    tracing::info!(settings = ?app_settings, "Configuration loaded");

    let room_manager = RoomManagerHandle::spawn(256, app_settings.server.tick_rate_hz);
    let app_state = AppState { room_manager };

    run_server(app_state, app_settings.server).await?;

    Ok(())
}
