// Context formatting module
// Renders ranked chunk lists into token-budgeted text blocks for prompts


use crate::loader::DocumentType;
use crate::store::StoredChunk;
use crate::tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatStyle {
    Compact,
    #[default]
    Detailed,
    Markdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    pub style: FormatStyle,
    pub include_metadata: bool,
    pub include_scores: bool,
    /// Context budget, measured with the same approximation the chunker
    /// uses.
    pub max_tokens: usize,
    pub separator: String,
}

impl Default for FormatOptions {
    #[inline]
    fn default() -> Self {
        Self {
            style: FormatStyle::Detailed,
            include_metadata: true,
            include_scores: false,
            max_tokens: 4000,
            separator: "\n\n---\n\n".to_string(),
        }
    }
}

/// Render ranked chunks into a single context string.
///
/// Chunks are included in rank order until the next whole rendered chunk
/// would exceed the token budget; an included chunk is never cut mid-text,
/// so every chunk in the output stays syntactically complete. Identical
/// inputs produce byte-identical output.
#[inline]
pub fn format(chunks: &[StoredChunk], scores: Option<&[f32]>, options: &FormatOptions) -> String {
    let refs: Vec<&StoredChunk> = chunks.iter().collect();
    format_refs(&refs, scores, options)
}

/// Preset for query-explanation prompts: detailed entries with source
/// metadata, scores omitted.
#[inline]
pub fn format_for_explanation(
    chunks: &[StoredChunk],
    scores: Option<&[f32]>,
    options: &FormatOptions,
) -> String {
    let preset = FormatOptions {
        style: FormatStyle::Detailed,
        include_metadata: true,
        include_scores: false,
        max_tokens: options.max_tokens,
        separator: options.separator.clone(),
    };
    let context = format(chunks, scores, &preset);
    format!("Relevant Documentation Context:\n\n{context}")
}

/// Preset for optimization prompts: schema chunks first, compact entries
/// without metadata.
#[inline]
pub fn format_for_optimization(chunks: &[StoredChunk], options: &FormatOptions) -> String {
    let mut prioritized: Vec<&StoredChunk> = chunks
        .iter()
        .filter(|c| c.chunk.metadata.doc_type == DocumentType::Schema)
        .collect();
    prioritized.extend(
        chunks
            .iter()
            .filter(|c| c.chunk.metadata.doc_type != DocumentType::Schema),
    );

    let preset = FormatOptions {
        style: FormatStyle::Compact,
        include_metadata: false,
        include_scores: false,
        max_tokens: options.max_tokens,
        separator: options.separator.clone(),
    };
    let context = format_refs(&prioritized, None, &preset);
    format!("Optimization References:\n\n{context}")
}

/// Balanced context from documentation and schema chunks, with the budget
/// split 60/40 between them.
#[inline]
pub fn format_combined(
    doc_chunks: &[StoredChunk],
    schema_chunks: &[StoredChunk],
    options: &FormatOptions,
) -> String {
    let doc_options = FormatOptions {
        max_tokens: options.max_tokens * 6 / 10,
        ..options.clone()
    };
    let schema_options = FormatOptions {
        max_tokens: options.max_tokens * 4 / 10,
        ..options.clone()
    };

    let doc_context = format(doc_chunks, None, &doc_options);
    let schema_context = format(schema_chunks, None, &schema_options);
    let divider = "=".repeat(50);

    format!("Documentation:\n\n{doc_context}\n\n{divider}\n\nSchema Information:\n\n{schema_context}")
}

fn format_refs(chunks: &[&StoredChunk], scores: Option<&[f32]>, options: &FormatOptions) -> String {
    let mut rendered = Vec::new();
    let mut used_tokens = 0;

    for (i, stored) in chunks.iter().enumerate() {
        let score = scores.and_then(|s| s.get(i)).copied();
        let piece = render_chunk(stored, score, options);

        let cost = tokens::estimate_tokens(&piece);
        if used_tokens + cost > options.max_tokens {
            break;
        }
        used_tokens += cost;
        rendered.push(piece);
    }

    rendered.join(&options.separator)
}

fn render_chunk(stored: &StoredChunk, score: Option<f32>, options: &FormatOptions) -> String {
    let chunk = &stored.chunk;

    if !options.include_metadata {
        return chunk.chunk_text.clone();
    }

    match options.style {
        FormatStyle::Markdown => {
            let mut out = format!("## {}\n\n", source_name(&chunk.source));
            if let Some(section) = &chunk.metadata.section {
                let line = format!("**Section:** {section}\n\n");
                out.push_str(&line);
            }
            if options.include_scores {
                if let Some(score) = score {
                    let line = format!("**Relevance:** {:.1}%\n\n", score * 100.0);
                    out.push_str(&line);
                }
            }
            out.push_str(&chunk.chunk_text);
            out
        }
        FormatStyle::Detailed => {
            let mut header = format!("[Source: {}", source_name(&chunk.source));
            if let Some(section) = &chunk.metadata.section {
                let part = format!(" | Section: {section}");
                header.push_str(&part);
            }
            if options.include_scores {
                if let Some(score) = score {
                    let part = format!(" | Relevance: {:.1}%", score * 100.0);
                    header.push_str(&part);
                }
            }
            header.push_str("]\n\n");
            header.push_str(&chunk.chunk_text);
            header
        }
        FormatStyle::Compact => {
            if options.include_scores {
                if let Some(score) = score {
                    return format!("[Relevance: {:.0}%] {}", score * 100.0, chunk.chunk_text);
                }
            }
            chunk.chunk_text.clone()
        }
    }
}

/// Last path segment of the source, for readable headers.
fn source_name(source: &str) -> &str {
    source.rsplit('/').next().unwrap_or(source)
}
