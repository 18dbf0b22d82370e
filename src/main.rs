// src/main.rs
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use log::{info, warn};
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::AppConfig;
use crate::services::board::BatchBoard;
use crate::services::gateway::ModelGateway;
use crate::services::image_client::ImageRequestClient;
use crate::services::retry::RetryPolicy;
use crate::services::sequencer::PacedSequencer;
use crate::services::store::{KeyValueStore, MemoryStore, ProfileStore, RedisStore};
use crate::services::style_client::StyleRequestClient;
use crate::services::transport::GeminiTransport;
use crate::services::{ImageProcessor, Stylist};

#[derive(Clone)]
pub struct AppState {
    stylist: Arc<Stylist>,
    image_processor: Arc<ImageProcessor>,
    configured: bool,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting StyleSense service...");

    let config = AppConfig::from_env()?;
    if config.api_key.is_none() {
        warn!("No API key configured; model requests will fail until GEMINI_API_KEY is set");
    }

    // Initialize services
    let kv: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => {
            info!("REDIS_URL not set, keeping saved outfits in memory");
            Arc::new(MemoryStore::default())
        }
    };
    let transport = Arc::new(GeminiTransport::new(&config.base_url, config.request_timeout)?);
    let gateway = Arc::new(ModelGateway::new(
        transport,
        config.api_key.clone(),
        RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay),
    ));
    let stylist = Arc::new(Stylist::new(
        StyleRequestClient::new(gateway.clone(), &config.text_model),
        ImageRequestClient::new(gateway.clone(), &config.image_model),
        PacedSequencer::new(config.image_pacing),
        ProfileStore::new(kv),
        Arc::new(BatchBoard::new()),
    ));

    let app_state = AppState {
        stylist,
        image_processor: Arc::new(ImageProcessor::new()),
        configured: gateway.is_configured(),
    };

    let static_dir = config.static_dir.clone();
    let serve_static = static_dir.is_dir();
    if !serve_static {
        warn!("Static directory {} not found, UI will not be served", static_dir.display());
    }

    info!("Starting HTTP server on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(4 * 1024 * 1024))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure);
        if serve_static {
            app.service(Files::new("/", static_dir.clone()).index_file("index.html"))
        } else {
            app
        }
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
