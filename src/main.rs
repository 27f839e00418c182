mod app;
mod auth;
mod config;
mod error;
mod events;
mod flash;
mod i18n;
mod state;
mod users;
mod view;

use crate::users::presenter::UserExtensions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "useradmin=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let (app_state, db) = state::AppState::init(UserExtensions::default()).await?;

    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("migrations applied");

    if let Some((email, password)) = &app_state.config.bootstrap_admin {
        users::services::ensure_admin(&app_state, email, password).await?;
    }

    let _event_log = events::spawn_logger(&app_state.events);

    app::serve(app::build_app(app_state)).await
}
