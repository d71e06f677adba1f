//! Loading built-in datasets as uploads

use thiserror::Error;
use tracing::{error, info};

use diversity_client::{AnalysisBackend, ClientError};
use diversity_types::{Document, DatasetCategory, EXAMPLE_CORPUS, EXAMPLE_CORPUS_NAME};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Unknown dataset category: {0}")]
    UnknownCategory(String),

    #[error("Unknown dataset {dataset:?} in category {category}")]
    UnknownDataset {
        category: String,
        dataset: Option<String>,
    },

    #[error("Failed to load dataset")]
    Fetch(#[source] ClientError),
}

/// Fetch a catalog dataset and wrap it as a `text/plain` document named
/// after its catalog file.
///
/// Single-dataset categories take `dataset_id = None`; collections need one.
pub async fn load_dataset<B>(
    backend: &B,
    category_id: &str,
    dataset_id: Option<&str>,
) -> Result<Document, DatasetError>
where
    B: AnalysisBackend + ?Sized,
{
    let category = DatasetCategory::find(category_id)
        .ok_or_else(|| DatasetError::UnknownCategory(category_id.to_string()))?;
    let (id, file) = category
        .resolve(dataset_id)
        .ok_or_else(|| DatasetError::UnknownDataset {
            category: category_id.to_string(),
            dataset: dataset_id.map(str::to_string),
        })?;

    info!(dataset = id, "Loading dataset");
    let content = backend.default_dataset(id).await.map_err(|e| {
        error!(dataset = id, error = %e, "Error loading dataset");
        DatasetError::Fetch(e)
    })?;

    Ok(Document::from_text(file, content.content))
}

/// The bundled corpus, usable without a backend
pub fn example_corpus() -> Document {
    Document::from_text(EXAMPLE_CORPUS_NAME, EXAMPLE_CORPUS)
}
