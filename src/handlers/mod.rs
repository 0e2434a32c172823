pub mod chat;
pub mod charts;
pub mod messages;

pub use chat::*;
pub use charts::*;
pub use messages::*;

use actix_web::{web, HttpResponse};

use crate::models::response::ErrorResponse;

pub(crate) fn error_response(status_code: u16, error: String) -> HttpResponse {
    let body = ErrorResponse { error, status_code };
    match status_code {
        400 => HttpResponse::BadRequest().json(body),
        404 => HttpResponse::NotFound().json(body),
        409 => HttpResponse::Conflict().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// Register every route of the API
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/chat").route(web::post().to(chat)))
        .service(web::resource("/messages").route(web::get().to(list_messages)))
        .service(
            web::resource("/messages/{id}")
                .route(web::get().to(get_message))
                .route(web::delete().to(dismiss_message)),
        )
        .service(web::resource("/messages/{id}/run").route(web::post().to(run_query)))
        .service(web::resource("/messages/{id}/chart").route(web::get().to(get_chart)))
        .service(web::resource("/messages/{id}/chart.svg").route(web::get().to(get_chart_svg)))
        .service(web::resource("/messages/{id}/export").route(web::get().to(export_data)));
}
