use actix_web::{web, HttpResponse, Error};
use log::{info, error};

use crate::handlers::error_response;
use crate::models::response::ChatRequest;
use crate::services::ConversationService;

/// Ask the assistant a question and return the rendered answer
pub async fn chat(
    request: web::Json<ChatRequest>,
    service: web::Data<ConversationService>,
) -> Result<HttpResponse, Error> {
    if request.question.trim().is_empty() {
        return Ok(error_response(400, "Question must not be empty".to_string()));
    }
    info!("Received question: {}", request.question);

    match service.ask(&request.question, request.context()).await {
        Ok(rendered) => Ok(HttpResponse::Ok().json(rendered)),
        Err(e) => {
            error!("Error processing question: {}", e);
            Ok(error_response(500, format!("Error processing question: {}", e)))
        }
    }
}

/// The whole transcript, oldest first
pub async fn list_messages(
    service: web::Data<ConversationService>,
) -> Result<HttpResponse, Error> {
    match service.transcript() {
        Ok(messages) => Ok(HttpResponse::Ok().json(messages)),
        Err(e) => Ok(error_response(500, format!("Failed to read transcript: {}", e))),
    }
}
