mod auth;
mod batch;
mod config;
mod dam;
mod error;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use auth::jwt::JwtService;
use auth::middleware::AuthMiddleware;
use auth::models::TokenSubject;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use batch::batch_service::BatchService;
use batch::processor::ProcessingSettings;
use config::ServerConfig;
use dam::catalog::DamCatalog;
use dam::connection_service::ConnectionService;
use routes::configure_routes;
use std::env;
use std::sync::Arc;
use storage::local_service::LocalService;
use storage::s3_service::S3Service;
use storage::ImageStorage;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = ServerConfig::from_env().map_err(std::io::Error::other)?;

    let storage = match &config.s3_bucket {
        Some(bucket) => {
            let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
            log::info!("Storing images in s3://{}", bucket);
            ImageStorage::S3(S3Service::new(S3Client::new(&aws_config), bucket.clone()))
        }
        None => {
            log::info!("Storing images under {}", config.upload_dir.display());
            ImageStorage::Local(LocalService::new(config.upload_dir.clone()))
        }
    };

    let catalog = match &config.dam_catalog_path {
        Some(path) => DamCatalog::load(path),
        None => DamCatalog::builtin(),
    }
    .map_err(|e| {
        log::error!("Failed to load DAM catalog: {}", e);
        std::io::Error::other(format!("DAM catalog loading failed: {}", e))
    })?;

    let batch_service = BatchService::new(storage);
    let connection_service =
        ConnectionService::new(Arc::new(catalog), config.connection_test_timeout);
    let processing = ProcessingSettings {
        tick: config.processing_tick,
    };

    let jwt_service = config.jwt_secret.as_deref().map(JwtService::new);
    match (&jwt_service, &config.dev_token_user) {
        (Some(jwt), Some(user_id)) => {
            let subject = TokenSubject {
                id: user_id.clone(),
                email: format!("{}@localhost", user_id),
                name: user_id.clone(),
            };
            match jwt.generate_token(&subject) {
                Ok(token) => log::info!("Development token for {}: {}", user_id, token),
                Err(e) => log::error!("Failed to issue development token: {}", e),
            }
        }
        (Some(_), None) => log::info!("Bearer authentication enabled for /api"),
        (None, _) => log::warn!("JWT_SECRET is not set; /api is open to anonymous requests"),
    }
    let auth_middleware = AuthMiddleware::new(jwt_service);

    let bind_address = config.bind_address();
    let frontend_dir = config.frontend_dir.clone();
    log::info!("Serving frontend from {}", frontend_dir);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "PATCH", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(batch_service.clone()))
            .app_data(web::Data::new(connection_service.clone()))
            .app_data(web::Data::new(processing))
            .configure(|cfg| configure_routes(cfg, frontend_dir.clone(), auth_middleware.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
