mod config;
mod models;
mod services;
mod handlers;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer, middleware::Logger};
use std::sync::Arc;

use config::Config;
use services::{
    AIService, CompletionBackend, ConversationService, HttpQueryExecutor, MemoryQueryExecutor,
    QueryExecutionCoordinator, QueryExecutor,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("🚀 Starting SQL chat API");

    // Load configuration from environment variables
    let config = Config::from_env();

    let completion: Option<Arc<dyn CompletionBackend>> = match AIService::new(&config) {
        Ok(service) => {
            let backend: Arc<dyn CompletionBackend> = Arc::new(service);
            Some(backend)
        }
        Err(e) => {
            log::error!("❌ Failed to initialize AI service: {}", e);
            None
        }
    };

    let executor: Arc<dyn QueryExecutor> = match HttpQueryExecutor::new(&config) {
        Ok(Some(executor)) => Arc::new(executor),
        Ok(None) => {
            log::info!("💾 Using in-memory query executor for local development");
            Arc::new(MemoryQueryExecutor::new())
        }
        Err(e) => {
            log::error!("❌ Failed to initialize query executor: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    let coordinator = QueryExecutionCoordinator::new(executor);
    let conversation = ConversationService::new(completion, coordinator);

    // Start HTTP server
    let server_url = format!("http://127.0.0.1:{}", config.server_port);
    log::info!("🌐 Starting server at {}", server_url);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(conversation.clone()))
            .configure(handlers::configure)
    })
    .bind(format!("127.0.0.1:{}", config.server_port))
    .map_err(|e| {
        log::error!("❌ Failed to bind to port {}: {}", config.server_port, e);
        e
    })?
    .run()
    .await
}
