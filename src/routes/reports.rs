use axum::{
    extract::{Multipart, State},
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use crate::{
    AppState,
    error::AppError,
    services::{
        dataset::load_dataset,
        report::{ReportGenerator, TemplateSource},
    },
};
use tower_http::cors::{CorsLayer, Any};

pub const REPORT_FILE_NAME: &str = "data_insight_report.html";

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/generate-report", post(generate_report))
        .layer(cors)
}

#[derive(Debug)]
struct Upload {
    file_name: String,
    data: Bytes,
}

#[derive(Debug, Default)]
struct ReportRequest {
    dataset: Option<Upload>,
    template: Option<Upload>,
}

async fn read_request(mut multipart: Multipart) -> Result<ReportRequest, AppError> {
    let mut request = ReportRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read field '{}': {}", name, e)))?;

        match name.as_str() {
            "dataset" => request.dataset = Some(Upload { file_name, data }),
            "template" if !data.is_empty() => request.template = Some(Upload { file_name, data }),
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(request)
}

#[axum::debug_handler]
async fn generate_report(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let start = std::time::Instant::now();
    let request = read_request(multipart).await?;

    // 1. Validate the dataset upload before doing any work
    let dataset = request
        .dataset
        .ok_or_else(|| AppError::InvalidInput("No dataset file provided".to_string()))?;
    tracing::info!(
        "Report requested for '{}' ({}KB)",
        dataset.file_name,
        dataset.data.len() / 1024
    );

    // 2. Pick the template: uploaded one wins over the configured default
    let template = match request.template {
        Some(upload) => {
            tracing::info!("Using uploaded template '{}'", upload.file_name);
            let text = String::from_utf8(upload.data.to_vec())
                .map_err(|_| AppError::InvalidInput("Template file must be UTF-8 text".to_string()))?;
            TemplateSource::Inline(text)
        }
        None => state.config.default_template(),
    };

    // 3. Parse and render on the blocking pool
    let title = state.config.report_title.clone();
    let seed = state.config.sample_seed;
    let html = tokio::task::spawn_blocking(move || -> Result<String, AppError> {
        let parsed = load_dataset(&dataset.data, &dataset.file_name)?;
        let generator = match seed {
            Some(seed) => ReportGenerator::new(parsed).with_seed(seed),
            None => ReportGenerator::new(parsed),
        };
        Ok(generator.generate(&title, &template)?.into_html())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Report task failed: {}", e)))??;

    tracing::info!("Report generated in {:?} ({}KB)", start.elapsed(), html.len() / 1024);

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", REPORT_FILE_NAME),
            ),
        ],
        html,
    )
        .into_response())
}
