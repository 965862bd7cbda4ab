use std::path::PathBuf;

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;
use plotters::drawing::DrawingAreaErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Template file not found at {}", .0.display())]
    TemplateNotFound(PathBuf),
    #[error("Template error: {0}")]
    TemplateError(String),
    #[error("Chart error: {0}")]
    ChartError(String),
    #[error("File processing error: {0}")]
    FileProcessingError(String),
    #[error("DataFrame error: {0}")]
    DataFrameError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<polars::error::PolarsError> for AppError {
    fn from(err: polars::error::PolarsError) -> Self {
        AppError::DataFrameError(err.to_string())
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        AppError::TemplateError(err.to_string())
    }
}

impl<E> From<DrawingAreaErrorKind<E>> for AppError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        AppError::ChartError(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            AppError::TemplateError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ChartError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::FileProcessingError(_) => StatusCode::BAD_REQUEST,
            AppError::DataFrameError(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::InvalidInput(msg) => msg,
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
