// Document loader module
// Reads files, directories, and inline text into normalized Documents


use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::{RagError, Result};

/// Kind of source a document was created from. Drives chunking strategy
/// selection and retrieval filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Markdown,
    Text,
    Json,
    Schema,
}

impl DocumentType {
    /// Map a file extension to a document type. Returns `None` for
    /// extensions the loader does not understand.
    #[inline]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "txt" | "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            "graphql" | "gql" => Some(Self::Schema),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Json => "json",
            Self::Schema => "schema",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub section: Option<String>,
}

/// A normalized input unit, immutable once created. The id is derived
/// deterministically from the source path (or the explicit id for schema
/// and inline text) so re-ingesting the same source is idempotent at the
/// document level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub source: String,
    pub doc_type: DocumentType,
    pub metadata: DocumentMetadata,
}

impl Document {
    #[inline]
    pub fn new(
        id: impl Into<String>,
        content: String,
        source: impl Into<String>,
        doc_type: DocumentType,
    ) -> Self {
        let id = id.into();
        let metadata = DocumentMetadata {
            document_id: id.clone(),
            section: None,
        };
        Self {
            id,
            content,
            source: source.into(),
            doc_type,
            metadata,
        }
    }
}

/// Options for [`load_directory`].
#[derive(Debug, Clone)]
pub struct DirectoryOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Only load files with these extensions. When `None`, all known text
    /// types are loaded. Unknown extensions are skipped silently either way.
    pub extensions: Option<Vec<String>>,
    /// Skip any path containing one of these substrings.
    pub exclude: Vec<String>,
}

impl Default for DirectoryOptions {
    #[inline]
    fn default() -> Self {
        Self {
            recursive: true,
            extensions: None,
            exclude: Vec::new(),
        }
    }
}

/// A single file that failed to load during a directory batch.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: String,
    pub message: String,
}

/// Result of a directory load. Failed files are reported here rather than
/// aborting the batch, so one bad file cannot block a large ingestion run.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub errors: Vec<LoadFailure>,
}

/// Load a single file into a Document.
#[inline]
pub async fn load_file(path: &Path) -> Result<Document> {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    let doc_type = DocumentType::from_extension(ext).ok_or_else(|| {
        RagError::Input(format!("unsupported file type: {}", path.display()))
    })?;

    let content = fs::read_to_string(path).await?;
    let source = path.to_string_lossy().into_owned();

    debug!("Loaded {} ({} bytes)", source, content.len());
    Ok(Document::new(source.clone(), content, source, doc_type))
}

/// Load every recognized file under a directory.
///
/// Entries are visited in sorted order per directory so repeated runs over
/// the same tree produce documents in the same order.
#[inline]
pub async fn load_directory(path: &Path, options: &DirectoryOptions) -> Result<LoadOutcome> {
    if !path.is_dir() {
        return Err(RagError::Input(format!(
            "not a directory: {}",
            path.display()
        )));
    }

    let mut outcome = LoadOutcome::default();
    let mut pending = VecDeque::new();
    pending.push_back(path.to_path_buf());

    while let Some(dir) = pending.pop_front() {
        let mut entries = match collect_entries(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                outcome.errors.push(LoadFailure {
                    path: dir.to_string_lossy().into_owned(),
                    message: e.to_string(),
                });
                continue;
            }
        };
        entries.sort();

        for entry in entries {
            let entry_str = entry.to_string_lossy();
            if options
                .exclude
                .iter()
                .any(|pattern| entry_str.contains(pattern.as_str()))
            {
                debug!("Excluded {}", entry_str);
                continue;
            }

            if entry.is_dir() {
                if options.recursive {
                    pending.push_back(entry);
                }
                continue;
            }

            let ext = entry.extension().and_then(OsStr::to_str).unwrap_or_default();
            if !extension_allowed(ext, options.extensions.as_deref()) {
                continue;
            }

            match load_file(&entry).await {
                Ok(document) => outcome.documents.push(document),
                Err(e) => {
                    warn!("Failed to load {}: {}", entry_str, e);
                    outcome.errors.push(LoadFailure {
                        path: entry_str.into_owned(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    debug!(
        "Loaded {} documents from {} ({} failures)",
        outcome.documents.len(),
        path.display(),
        outcome.errors.len()
    );
    Ok(outcome)
}

/// Load a schema dump (e.g. a GraphQL introspection result or SDL text)
/// under an explicit identifier.
#[inline]
pub fn load_schema(text: &str, id: &str) -> Result<Document> {
    if text.trim().is_empty() {
        return Err(RagError::Input("schema text cannot be empty".to_string()));
    }
    Ok(Document::new(
        id,
        text.to_string(),
        id,
        DocumentType::Schema,
    ))
}

/// Load an inline text snippet under an explicit identifier.
#[inline]
pub fn load_inline(text: &str, id: &str) -> Result<Document> {
    if text.trim().is_empty() {
        return Err(RagError::Input("inline text cannot be empty".to_string()));
    }
    Ok(Document::new(id, text.to_string(), id, DocumentType::Text))
}

fn extension_allowed(ext: &str, filter: Option<&[String]>) -> bool {
    match filter {
        Some(allowed) => allowed
            .iter()
            .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext)),
        None => DocumentType::from_extension(ext).is_some(),
    }
}

async fn collect_entries(dir: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry.path());
    }
    Ok(entries)
}
