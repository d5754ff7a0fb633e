use actix_web::{App, HttpServer, web};
use neuroscan::config::AppConfig;
use neuroscan::inference::InferenceService;
use neuroscan::ledger::HistoryLedger;
use neuroscan::report::{ReportGenerator, TumorCatalog};
use neuroscan::routes::configure_routes;
use neuroscan::storage::image_store::ImageStore;
use std::env;
use std::io;
use std::sync::Arc;

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", context, err);
    io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| startup_error("Configuration failed", e))?;

    for dir in [&config.storage.upload_dir, &config.storage.report_dir] {
        std::fs::create_dir_all(dir)?;
    }
    if !config.storage.signature_path.exists() {
        log::warn!(
            "Signature image {} not found; patient-visit reports will show a placeholder",
            config.storage.signature_path.display()
        );
    }

    let inference = InferenceService::initialize(&config.model, &config.preprocessing)
        .map_err(|e| startup_error("Model loading failed", e))?;

    let catalog = Arc::new(TumorCatalog::default());
    let missing = catalog.missing(inference.labels());
    if !missing.is_empty() {
        log::warn!(
            "Labels without a catalog entry, reports will fail for them: {:?}",
            missing
        );
    }

    let store = ImageStore::new(&config.storage.upload_dir, config.server.max_upload_bytes);
    let reports = ReportGenerator::new(
        &config.storage.report_dir,
        &config.storage.signature_path,
        catalog.clone(),
        config.report.clone(),
    );
    let ledger = HistoryLedger::new(&config.storage.history_file);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server on {}", bind_address);

    let upload_dir = config.storage.upload_dir.clone();
    let report_dir = config.storage.report_dir.clone();

    let config = web::Data::new(config);
    let store = web::Data::new(store);
    let inference = web::Data::new(inference);
    let reports = web::Data::new(reports);
    let ledger = web::Data::new(ledger);
    let catalog = web::Data::from(catalog);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(config.clone())
            .app_data(store.clone())
            .app_data(inference.clone())
            .app_data(reports.clone())
            .app_data(ledger.clone())
            .app_data(catalog.clone())
            .configure(|cfg| configure_routes(cfg, upload_dir.clone(), report_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
