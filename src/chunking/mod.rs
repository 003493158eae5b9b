// Chunking module
// Splits Documents into overlapping, token-budgeted Chunks


use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;
use crate::loader::{Document, DocumentType};
use crate::tokens;

/// Configuration for document chunking.
///
/// Token budgets are converted to character budgets through
/// [`crate::tokens`], the same approximation the context formatter uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in tokens.
    pub max_tokens: usize,
    /// Overlap between consecutive size-based chunks, in tokens.
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub section: Option<String>,
    pub doc_type: DocumentType,
}

/// A bounded span of a document's text prepared for embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_text: String,
    /// Zero-based, contiguous within the source document.
    pub chunk_index: usize,
    pub source: String,
    pub token_count: usize,
    pub metadata: ChunkMetadata,
}

/// Chunk a document with the strategy appropriate for its type: section
/// boundaries for markdown, size-based splitting for everything else.
///
/// Empty or whitespace-only documents produce zero chunks, not an error.
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    if document.content.trim().is_empty() {
        debug!("Document {} is empty, producing no chunks", document.id);
        return Ok(Vec::new());
    }

    let chunks = match document.doc_type {
        DocumentType::Markdown => chunk_by_sections(document, config),
        _ => chunk_by_size(document, config),
    };

    debug!(
        "Chunked document {} into {} chunks",
        document.id,
        chunks.len()
    );
    Ok(chunks)
}

/// Chunk a batch of documents, skipping documents that fail.
#[inline]
pub fn chunk_documents(documents: &[Document], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut all_chunks = Vec::new();
    for document in documents {
        match chunk_document(document, config) {
            Ok(chunks) => all_chunks.extend(chunks),
            Err(e) => warn!("Failed to chunk document {}: {}", document.id, e),
        }
    }
    all_chunks
}

/// Greedy size-based chunking with overlap.
///
/// Accumulates text up to the token budget, preferring to cut at a
/// paragraph, line, sentence, or word boundary in the second half of the
/// window. The next chunk starts `overlap_tokens` before the cut so
/// context is not lost at the boundary.
#[inline]
pub fn chunk_by_size(document: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    if document.content.trim().is_empty() {
        return Vec::new();
    }

    let section = document.metadata.section.clone();
    let chunks = split_text(&document.content, config)
        .into_iter()
        .map(|piece| make_chunk(document, piece, section.clone()))
        .collect();
    reindex(chunks)
}

/// Section-based chunking for markdown.
///
/// Splits at heading boundaries first; headings are recorded as chunk
/// metadata. A section that still exceeds the budget falls back to
/// size-based splitting, retaining its section tag. Documents without
/// headings fall back to size-based chunking entirely.
#[inline]
pub fn chunk_by_sections(document: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    let sections = markdown_sections(&document.content);
    if sections.is_empty() {
        return chunk_by_size(document, config);
    }

    let budget = tokens::budget_chars(config.max_tokens);
    let mut chunks = Vec::new();

    for section in sections {
        let text = document
            .content
            .get(section.start..section.end)
            .unwrap_or_default()
            .trim();
        if text.is_empty() {
            continue;
        }

        let title = section.title.or_else(|| document.metadata.section.clone());
        if text.chars().count() <= budget {
            chunks.push(make_chunk(document, text.to_string(), title));
        } else {
            for piece in split_text(text, config) {
                chunks.push(make_chunk(document, piece, title.clone()));
            }
        }
    }

    reindex(chunks)
}

fn make_chunk(document: &Document, text: String, section: Option<String>) -> Chunk {
    let token_count = tokens::estimate_tokens(&text);
    Chunk {
        chunk_text: text,
        chunk_index: 0,
        source: document.source.clone(),
        token_count,
        metadata: ChunkMetadata {
            document_id: document.id.clone(),
            section,
            doc_type: document.doc_type,
        },
    }
}

/// Assign contiguous zero-based indexes in document order.
fn reindex(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.chunk_index = i;
    }
    chunks
}

/// Split raw text into pieces of at most `max_tokens` (in the character
/// approximation), consecutive pieces sharing `overlap_tokens` of text.
fn split_text(content: &str, config: &ChunkingConfig) -> Vec<String> {
    let budget = tokens::budget_chars(config.max_tokens).max(1);
    let overlap = tokens::budget_chars(config.overlap_tokens);

    let mut splits = Vec::new();
    let mut start = 0;

    while start < content.len() {
        let hard_end = offset_after_chars(content, start, budget);
        let end = if hard_end < content.len() {
            // Prefer a natural boundary, but never cut the window below half
            // the budget or chunks degenerate.
            let min_cut = offset_after_chars(content, start, budget / 2);
            find_break(content, min_cut, hard_end)
        } else {
            hard_end
        };

        let piece = content.get(start..end).unwrap_or_default().trim();
        if !piece.is_empty() {
            splits.push(piece.to_string());
        }

        if end >= content.len() {
            break;
        }

        let next_start = step_back_chars(content, end, overlap);
        // Overlap must never stall the scan
        start = if next_start > start { next_start } else { end };
    }

    splits
}

/// Find the best break point in `content[min_cut..end]`, searching for a
/// paragraph break, then a line break, a sentence end, and finally a word
/// boundary. Falls back to the hard cut.
fn find_break(content: &str, min_cut: usize, end: usize) -> usize {
    let window = content.get(min_cut..end).unwrap_or_default();
    for pattern in ["\n\n", "\n", ". ", " "] {
        if let Some(pos) = window.rfind(pattern) {
            return min_cut + pos + pattern.len();
        }
    }
    end
}

/// Byte offset after advancing `chars` characters from `start`.
fn offset_after_chars(content: &str, start: usize, chars: usize) -> usize {
    content
        .get(start..)
        .and_then(|tail| tail.char_indices().nth(chars).map(|(i, _)| start + i))
        .unwrap_or(content.len())
}

/// Byte offset after stepping back `chars` characters from `end`.
fn step_back_chars(content: &str, end: usize, chars: usize) -> usize {
    if chars == 0 {
        return end;
    }
    content
        .get(..end)
        .and_then(|head| head.char_indices().rev().nth(chars - 1).map(|(i, _)| i))
        .unwrap_or(0)
}

struct Section {
    title: Option<String>,
    start: usize,
    end: usize,
}

/// Locate heading-delimited sections via markdown parsing, so headings
/// inside fenced code blocks never split a section. Returns an empty list
/// when the document has no headings.
fn markdown_sections(content: &str) -> Vec<Section> {
    let mut headings: Vec<(String, usize)> = Vec::new();
    let mut in_heading = false;
    let mut title = String::new();
    let mut heading_start = 0;

    for (event, range) in Parser::new_ext(content, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                in_heading = true;
                title.clear();
                heading_start = range.start;
            }
            Event::End(TagEnd::Heading(_)) => {
                in_heading = false;
                headings.push((title.trim().to_string(), heading_start));
            }
            Event::Text(text) | Event::Code(text) => {
                if in_heading {
                    title.push_str(&text);
                }
            }
            _ => {}
        }
    }

    if headings.is_empty() {
        return Vec::new();
    }

    let mut sections = Vec::new();
    let first_heading = headings[0].1;
    if content
        .get(..first_heading)
        .is_some_and(|preamble| !preamble.trim().is_empty())
    {
        sections.push(Section {
            title: None,
            start: 0,
            end: first_heading,
        });
    }

    for (i, (title, start)) in headings.iter().enumerate() {
        let end = headings.get(i + 1).map_or(content.len(), |(_, next)| *next);
        sections.push(Section {
            title: Some(title.clone()),
            start: *start,
            end,
        });
    }

    sections
}
