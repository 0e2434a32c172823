use actix_web::{web, HttpResponse, Error};
use log::{info, error};
use uuid::Uuid;

use crate::handlers::error_response;
use crate::models::response::RunRequest;
use crate::services::ConversationService;

/// Re-render a message with its current execution state
pub async fn get_message(
    message_id: web::Path<Uuid>,
    service: web::Data<ConversationService>,
) -> Result<HttpResponse, Error> {
    let message_id = message_id.into_inner();
    match service.render(message_id).await {
        Ok(Some(rendered)) => Ok(HttpResponse::Ok().json(rendered)),
        Ok(None) => Ok(error_response(404, format!("Message with ID {} not found", message_id))),
        Err(e) => {
            error!("Failed to render message {}: {}", message_id, e);
            Ok(error_response(500, format!("Failed to render message: {}", e)))
        }
    }
}

/// Run SQL from a message on the user's request
pub async fn run_query(
    message_id: web::Path<Uuid>,
    request: web::Json<RunRequest>,
    service: web::Data<ConversationService>,
) -> Result<HttpResponse, Error> {
    let message_id = message_id.into_inner();
    let request = request.into_inner();
    if request.sql.trim().is_empty() {
        return Ok(error_response(400, "SQL must not be empty".to_string()));
    }

    match service.exists(message_id) {
        Ok(true) => {},
        Ok(false) => return Ok(error_response(404, format!("Message with ID {} not found", message_id))),
        Err(e) => return Ok(error_response(500, format!("Failed to read transcript: {}", e))),
    }

    info!("Manual run requested for message {}", message_id);
    match service.run_manual(message_id, &request.sql, request.connection).await {
        Ok(state) => Ok(HttpResponse::Ok().json(state)),
        Err(e) => Ok(error_response(400, format!("Could not run query: {}", e))),
    }
}

/// Tear down a message's view so late results are dropped
pub async fn dismiss_message(
    message_id: web::Path<Uuid>,
    service: web::Data<ConversationService>,
) -> Result<HttpResponse, Error> {
    let message_id = message_id.into_inner();
    match service.exists(message_id) {
        Ok(true) => {},
        Ok(false) => return Ok(error_response(404, format!("Message with ID {} not found", message_id))),
        Err(e) => return Ok(error_response(500, format!("Failed to read transcript: {}", e))),
    }

    match service.dismiss(message_id) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(error_response(500, format!("Failed to dismiss message: {}", e))),
    }
}
