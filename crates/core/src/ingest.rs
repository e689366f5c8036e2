use crate::error::IngestError;
use crate::models::PdfDocument;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Reads every path into memory, keeping the given order.
pub async fn load_documents(paths: &[PathBuf]) -> Result<Vec<PdfDocument>, IngestError> {
    let mut documents = Vec::with_capacity(paths.len());

    for path in paths {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;
        let bytes = tokio::fs::read(path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "loaded document");
        documents.push(PdfDocument::new(name, bytes));
    }

    Ok(documents)
}

pub fn digest_document(document: &PdfDocument) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&document.bytes);
    format!("{:x}", hasher.finalize())
}
