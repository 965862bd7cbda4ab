//! Dataset insight reports: upload a table, get back a self-contained HTML
//! report with column statistics, association matrices and charts.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

pub use error::AppError;
pub use services::dataset::{load_dataset, load_dataset_from_path, Column, Dataset};
pub use services::report::{render, Report, ReportGenerator, TemplateSource};

// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
}

impl AppState {
    pub fn new(config: config::Config) -> Self {
        Self { config }
    }
}
