pub mod loader;
pub mod types;

pub use loader::{load_dataset, load_dataset_from_path, DatasetFormat};
pub use types::{Column, ColumnValues, Dataset};
