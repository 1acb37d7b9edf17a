use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use room_chat_service::{
    config::{Config, LogFormat},
    db, error::AppError, logging, middleware::RequestLogging, routes,
    services::pg_store::PgStore, state::AppState,
};
use std::sync::Arc;

fn cors(config: &Config) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);
    if config.allows_any_origin() {
        return cors.allow_any_origin();
    }
    config
        .cors_allow_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    logging::init_tracing(LogFormat::from_env());
    let cfg = Arc::new(Config::from_env()?);

    let pool = db::init_pool(&cfg.database_url, cfg.db_max_connections)
        .await
        .map_err(|e| AppError::StartServer(format!("db: {e}")))?;
    let store = Arc::new(PgStore::new(pool));
    let state = AppState::new(cfg.clone(), store)?;
    let registry = state.registry.clone();

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting room-chat-service");

    let server_cfg = cfg.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&server_cfg))
            .wrap(RequestLogging)
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| AppError::StartServer(format!("bind {bind_addr}: {e}")))?
    .run()
    .await
    .map_err(|e| AppError::StartServer(e.to_string()))?;

    let closed = registry.shutdown().await;
    tracing::info!(closed, "room-chat-service stopped");
    Ok(())
}
