use actix_cors::Cors;
use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use chrono::Local;
use log::{error, info, warn};
use shared::{ClassificationResult, HistoryRecord, InferenceResponse, TumorInfo};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::html::{self, AnalysisOutcome, FormOutcome};
use crate::inference::InferenceService;
use crate::ledger::HistoryLedger;
use crate::ledger::history_ledger::format_timestamp;
use crate::report::{ReportGenerator, ReportRequest, TumorCatalog};
use crate::session::SessionForm;
use crate::storage::image_store::ImageStore;
use crate::upload::UploadForm;

pub fn configure_routes(cfg: &mut web::ServiceConfig, upload_dir: PathBuf, report_dir: PathBuf) {
    cfg.service(
        web::resource("/")
            .route(web::get().to(index))
            .route(web::post().to(classify_form)),
    )
    .service(web::resource("/dashboard").route(web::get().to(dashboard)))
    .service(web::resource("/dashboard/analyze").route(web::post().to(analyze)))
    .service(
        web::scope("/api")
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .route("/classify", web::post().to(classify_api))
            .route("/history", web::get().to(history_api)),
    )
    .service(Files::new("/uploads", upload_dir))
    .service(Files::new("/reports", report_dir));
}

fn html_response(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body)
}

fn log_failure(context: &str, err: &AppError) {
    if err.is_user_error() {
        warn!("{} rejected: {}", context, err);
    } else {
        error!("{} failed: {}", context, err);
    }
}

fn public_url(prefix: &str, path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", prefix, urlencoding::encode(&file_name))
}

/// Runs a blocking closure on the worker pool and flattens its error.
async fn blocking<T, E, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(Into::into)
}

async fn classify_stored(
    inference: web::Data<InferenceService>,
    image_path: PathBuf,
    timeout_secs: u64,
) -> Result<ClassificationResult, AppError> {
    let task = blocking(move || inference.classify(&image_path));
    actix_web::rt::time::timeout(Duration::from_secs(timeout_secs), task)
        .await
        .map_err(|_| AppError::Timeout(timeout_secs))?
}

struct StoredResult {
    result: ClassificationResult,
    image_path: PathBuf,
}

/// Store and classify the `file` part of a submitted form.
async fn store_and_classify(
    form: &UploadForm,
    store: web::Data<ImageStore>,
    inference: web::Data<InferenceService>,
    config: &AppConfig,
) -> Result<StoredResult, AppError> {
    let file = form.require_file()?;
    let (data, file_name) = (file.data.clone(), file.file_name.clone());
    let image_path = blocking(move || store.store(&data, &file_name)).await?;
    let result = classify_stored(
        inference,
        image_path.clone(),
        config.server.inference_timeout_secs,
    )
    .await?;
    Ok(StoredResult { result, image_path })
}

async fn index() -> HttpResponse {
    html_response(StatusCode::OK, html::form_page(None, None))
}

async fn classify_form(
    payload: Multipart,
    store: web::Data<ImageStore>,
    inference: web::Data<InferenceService>,
    config: web::Data<AppConfig>,
) -> HttpResponse {
    let outcome = async {
        let form = UploadForm::from_multipart(payload, config.server.max_upload_bytes).await?;
        store_and_classify(&form, store, inference, &config).await
    }
    .await;

    match outcome {
        Ok(stored) => {
            info!(
                "Form prediction: {} ({:.4})",
                stored.result.label, stored.result.confidence
            );
            let image_url = public_url("/uploads", &stored.image_path);
            let page = html::form_page(
                Some(&FormOutcome {
                    result: &stored.result,
                    image_url: &image_url,
                }),
                None,
            );
            html_response(StatusCode::OK, page)
        }
        Err(e) => {
            log_failure("Form classification", &e);
            html_response(e.status_code(), html::form_page(None, Some(&e.user_message())))
        }
    }
}

struct Analysis {
    result: ClassificationResult,
    info: Option<TumorInfo>,
    image_url: String,
    report_url: String,
    report_name: String,
}

#[allow(clippy::too_many_arguments)]
async fn run_analysis(
    form: &UploadForm,
    session: &SessionForm,
    store: web::Data<ImageStore>,
    inference: web::Data<InferenceService>,
    reports: web::Data<ReportGenerator>,
    ledger: web::Data<HistoryLedger>,
    catalog: &TumorCatalog,
    config: &AppConfig,
) -> Result<Analysis, AppError> {
    let analysis_id = Uuid::new_v4();
    let stored = store_and_classify(form, store, inference, config).await?;
    let result = stored.result;
    info!(
        "[{}] Prediction: {} ({:.4})",
        analysis_id, result.label, result.confidence
    );

    let timestamp = format_timestamp(&Local::now());
    let record = HistoryRecord::new(&session.patient, &result, timestamp.clone());
    blocking(move || ledger.append(&record)).await?;
    info!("[{}] History updated", analysis_id);

    let report_path = {
        let result = result.clone();
        let patient = session.patient.clone();
        let visit = session.visit_type();
        let image_path = stored.image_path.clone();
        blocking(move || {
            reports.render(&ReportRequest {
                result: &result,
                patient: &patient,
                visit: &visit,
                image_path: &image_path,
                timestamp: &timestamp,
            })
        })
        .await?
    };
    info!("[{}] Report generated", analysis_id);

    Ok(Analysis {
        info: catalog.get(&result.label).cloned(),
        result,
        image_url: public_url("/uploads", &stored.image_path),
        report_url: public_url("/reports", &report_path),
        report_name: report_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    })
}

async fn load_history(ledger: web::Data<HistoryLedger>) -> Result<Vec<HistoryRecord>, String> {
    blocking(move || ledger.load_all()).await.map_err(|e| {
        error!("Failed to load history: {}", e);
        "Patient history is currently unavailable.".to_string()
    })
}

fn render_dashboard(
    status: StatusCode,
    session: &SessionForm,
    analysis: Option<&Analysis>,
    error: Option<&str>,
    history: &Result<Vec<HistoryRecord>, String>,
) -> HttpResponse {
    let outcome = analysis.map(|a| AnalysisOutcome {
        result: &a.result,
        info: a.info.as_ref(),
        image_url: &a.image_url,
        report_url: &a.report_url,
        report_name: &a.report_name,
    });
    let history = history
        .as_ref()
        .map(|records| records.as_slice())
        .map_err(|e| e.as_str());
    html_response(
        status,
        html::dashboard_page(session, outcome.as_ref(), error, history),
    )
}

async fn dashboard(ledger: web::Data<HistoryLedger>) -> HttpResponse {
    let history = load_history(ledger).await;
    render_dashboard(StatusCode::OK, &SessionForm::default(), None, None, &history)
}

async fn analyze(
    payload: Multipart,
    store: web::Data<ImageStore>,
    inference: web::Data<InferenceService>,
    reports: web::Data<ReportGenerator>,
    ledger: web::Data<HistoryLedger>,
    catalog: web::Data<TumorCatalog>,
    config: web::Data<AppConfig>,
) -> HttpResponse {
    let (session, outcome) = match UploadForm::from_multipart(payload, config.server.max_upload_bytes).await {
        Err(e) => (SessionForm::default(), Err(e)),
        Ok(form) => match SessionForm::from_upload(&form) {
            Err(e) => (SessionForm::default(), Err(e)),
            Ok(session) => {
                let outcome = run_analysis(
                    &form,
                    &session,
                    store,
                    inference,
                    reports,
                    ledger.clone(),
                    &catalog,
                    &config,
                )
                .await;
                (session, outcome)
            }
        },
    };

    let history = load_history(ledger).await;
    match outcome {
        Ok(analysis) => render_dashboard(StatusCode::OK, &session, Some(&analysis), None, &history),
        Err(e) => {
            log_failure("Dashboard analysis", &e);
            render_dashboard(e.status_code(), &session, None, Some(&e.user_message()), &history)
        }
    }
}

async fn classify_api(
    payload: Multipart,
    store: web::Data<ImageStore>,
    inference: web::Data<InferenceService>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let form = UploadForm::from_multipart(payload, config.server.max_upload_bytes).await?;
    let stored = store_and_classify(&form, store, inference, &config)
        .await
        .inspect_err(|e| log_failure("API classification", e))?;

    let file_name = stored
        .image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(HttpResponse::Ok().json(InferenceResponse::new(&stored.result, file_name)))
}

async fn history_api(ledger: web::Data<HistoryLedger>) -> Result<HttpResponse, AppError> {
    let records = blocking(move || ledger.load_all()).await?;
    Ok(HttpResponse::Ok().json(records))
}
