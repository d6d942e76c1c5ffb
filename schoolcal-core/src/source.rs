//! Where documents come from and how their text is read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{SchoolCalError, SchoolCalResult};
use crate::process::{combined_output, run_tool};

/// One attachment awaiting extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier recorded in the processed-source ledger
    pub id: String,
    pub path: PathBuf,
    /// Short label passed to the extractor, e.g. the file stem
    pub context: String,
}

impl Document {
    pub fn from_path(path: &Path) -> Self {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let context = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        Document {
            id,
            path: path.to_path_buf(),
            context,
        }
    }
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// All documents currently available, in a stable order.
    async fn documents(&self) -> SchoolCalResult<Vec<Document>>;
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, document: &Document) -> SchoolCalResult<String>;
}

/// A drop directory of PDF attachments.
#[derive(Debug, Clone)]
pub struct InboxDir {
    dir: PathBuf,
}

impl InboxDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        InboxDir { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DocumentSource for InboxDir {
    async fn documents(&self) -> SchoolCalResult<Vec<Document>> {
        if !self.dir.exists() {
            warn!(inbox = %self.dir.display(), "Inbox directory does not exist");
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if path.is_file() && is_pdf {
                documents.push(Document::from_path(&path));
            }
        }

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(count = documents.len(), "Found inbox documents");
        Ok(documents)
    }
}

/// `pdftotext -layout <file> -`
#[derive(Debug, Clone)]
pub struct PdfToText {
    timeout: Duration,
}

impl PdfToText {
    pub fn new(timeout: Duration) -> Self {
        PdfToText { timeout }
    }
}

#[async_trait]
impl TextExtractor for PdfToText {
    async fn extract_text(&self, document: &Document) -> SchoolCalResult<String> {
        let path = document.path.to_string_lossy().into_owned();
        let output = run_tool(
            "pdftotext",
            &["-layout", path.as_str(), "-"],
            None,
            self.timeout,
        )
        .await?;

        if !output.status.success() {
            return Err(SchoolCalError::transport(
                "pdftotext",
                format!("{}: {}", document.id, combined_output(&output).trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
