pub mod attachments;
pub mod messages;
pub mod wsroute;

use crate::error::AppError;
use actix_web::{get, web, HttpResponse};

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Register every route. Shared by `main` and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json = web::JsonConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into());

    cfg.app_data(json)
        .service(health)
        .service(wsroute::ws_handler)
        .service(messages::get_history)
        .service(attachments::announce_attachment);
}
