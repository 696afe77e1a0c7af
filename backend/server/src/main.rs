mod config;
mod handlers;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use config::Config;
use handlers::AppState;
use ketos_services::database::create_connection;
use ketos_services::{DockerRuntime, EnvironmentService, HttpEnvironmentApi, ModelPackager};

const ENVIRONMENT_API_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env();

    log::info!("Starting Ketos server on {}:{}", config.server_host, config.server_port);

    let db = create_connection(&config.database_url).await?;
    log::info!("Database connection established");
    log::info!("Note: Run migrations with 'cargo run --bin migration up' if not already done");

    let runtime = Arc::new(
        DockerRuntime::new(&config.platform.registry)
            .await
            .context("Failed to initialize container runtime")?,
    );
    let api = Arc::new(HttpEnvironmentApi::new(ENVIRONMENT_API_REQUEST_TIMEOUT)?);
    let settings = Arc::new(config.platform.clone());

    log::info!(
        "Environment data under {}, archives under {}",
        settings.environments_data_root.display(),
        settings.packaging_root.display()
    );

    let environments = Arc::new(EnvironmentService::new(db.clone(), runtime, api, settings));
    let packager = Arc::new(ModelPackager::new(db, environments));

    let app_state = web::Data::new(AppState {
        packager,
        max_upload_bytes: config.max_upload_bytes,
    });

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_method()
            .allow_any_origin()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await?;

    Ok(())
}
