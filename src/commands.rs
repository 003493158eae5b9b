// CLI command implementations
// Thin delivery vehicle over the library; all pipeline logic lives in the
// library modules

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::config::Config;
use crate::context::{self, FormatOptions};
use crate::embeddings::EmbeddingService;
use crate::loader::{self, DirectoryOptions};
use crate::pipeline::{IngestionOptions, IngestionOutcome, IngestionPipeline, IngestionProgress};
use crate::retrieval::{RetrievalOptions, RetrievalService};
use crate::store::{SearchFilter, VectorStore};

fn build_services(config: &Config) -> Result<(EmbeddingService, VectorStore)> {
    let embedder = EmbeddingService::from_config(&config.embedding)
        .context("Failed to initialize embedding provider")?;
    let store = VectorStore::from_config(config).context("Failed to initialize vector store")?;
    Ok((embedder, store))
}

fn build_pipeline(
    config: &Config,
    embedder: EmbeddingService,
    store: VectorStore,
) -> IngestionPipeline {
    IngestionPipeline::new(embedder, store)
        .with_chunking(config.chunking.clone())
        .with_batch_size(config.embedding.batch_size)
        .with_batch_delay(Duration::from_millis(config.embedding.batch_delay_ms))
}

fn progress_bar_options() -> Result<(ProgressBar, IngestionOptions)> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}")
            .context("Invalid progress bar template")?,
    );

    let updates = bar.clone();
    let options = IngestionOptions {
        on_progress: Some(Box::new(move |progress: &IngestionProgress| {
            updates.set_length(progress.total_chunks as u64);
            updates.set_position(progress.processed_chunks as u64);
            updates.set_message(format!("{:?}", progress.phase));
        })),
        cancel: None,
    };
    Ok((bar, options))
}

/// Ingest a documentation file or directory into the knowledge base.
#[inline]
pub async fn ingest_path(
    config: &Config,
    path: &Path,
    recursive: bool,
    extensions: Option<Vec<String>>,
    exclude: Vec<String>,
) -> Result<()> {
    info!("Ingesting {}", path.display());

    let (embedder, store) = build_services(config)?;
    let pipeline = build_pipeline(config, embedder, store);
    let (bar, options) = progress_bar_options()?;

    let progress = if path.is_dir() {
        let dir_options = DirectoryOptions {
            recursive,
            extensions,
            exclude,
        };
        pipeline
            .ingest_directory(path, &dir_options, &options)
            .await?
    } else {
        let document = loader::load_file(path).await?;
        pipeline.ingest_documents(vec![document], &options).await?
    };

    bar.finish_and_clear();
    report_progress(&progress);
    Ok(())
}

/// Ingest a GraphQL schema dump (SDL or introspection JSON) under an
/// explicit identifier.
#[inline]
pub async fn ingest_schema_file(config: &Config, file: &Path, id: &str) -> Result<()> {
    info!("Ingesting schema from {}", file.display());

    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read schema file: {}", file.display()))?;
    let document = loader::load_schema(&text, id)?;

    let (embedder, store) = build_services(config)?;
    let pipeline = build_pipeline(config, embedder, store);
    let (bar, options) = progress_bar_options()?;

    let progress = pipeline.ingest_documents(vec![document], &options).await?;

    bar.finish_and_clear();
    report_progress(&progress);
    Ok(())
}

/// Search the knowledge base and print the assembled context.
#[inline]
pub async fn search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    schema_only: bool,
    docs_only: bool,
) -> Result<()> {
    let (embedder, store) = build_services(config)?;
    let retrieval = RetrievalService::new(embedder, store);

    let options = RetrievalOptions {
        limit: limit.unwrap_or(config.retrieval.limit),
        min_similarity: None,
        filter: SearchFilter::default(),
    };

    let result = if schema_only {
        retrieval.retrieve_schema_context(query, &options).await?
    } else if docs_only {
        retrieval
            .retrieve_documentation_context(query, &options)
            .await?
    } else {
        let options = RetrievalOptions {
            min_similarity: Some(config.retrieval.min_similarity),
            ..options
        };
        retrieval.retrieve(query, &options).await?
    };

    if result.chunks.is_empty() {
        println!("No matching chunks found.");
        return Ok(());
    }

    println!(
        "{} {} matching chunks\n",
        style("Found").green().bold(),
        result.chunks.len()
    );
    for (stored, score) in result.chunks.iter().zip(&result.scores) {
        let section = stored.chunk.metadata.section.as_deref().unwrap_or("-");
        println!(
            "  {}  {}  ({}, section: {})",
            style(format!("{score:.3}")).cyan(),
            style(&stored.chunk.source).bold(),
            stored.chunk.metadata.doc_type.as_str(),
            section
        );
    }

    let format_options = FormatOptions {
        max_tokens: config.retrieval.context_max_tokens,
        ..FormatOptions::default()
    };
    println!(
        "\n{}",
        context::format(&result.chunks, Some(&result.scores), &format_options)
    );
    Ok(())
}

/// Show backend availability and stored chunk counts.
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    let (embedder, store) = build_services(config)?;
    let retrieval = RetrievalService::new(embedder.clone(), store.clone());
    let availability = retrieval.check_availability().await;

    let ok = style("ok").green();
    let unavailable = style("unavailable").red();

    println!(
        "Embedding provider: {} ({} dimensions) — {}",
        embedder.provider_name(),
        embedder.dimension(),
        if availability.embedder { &ok } else { &unavailable }
    );
    println!(
        "Vector store: {}",
        if availability.store { &ok } else { &unavailable }
    );

    if availability.store {
        let pipeline = build_pipeline(config, embedder, store);
        let stats = pipeline.stats().await?;

        println!("Stored chunks: {}", stats.total_chunks);

        let mut by_type: Vec<_> = stats.by_type.iter().collect();
        by_type.sort();
        for (doc_type, count) in by_type {
            println!("  {doc_type}: {count}");
        }

        let mut by_source: Vec<_> = stats.by_source.iter().collect();
        by_source.sort();
        for (source, count) in by_source {
            println!("  {source}: {count}");
        }
    }

    Ok(())
}

/// Print the effective configuration as TOML.
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    print!("{rendered}");
    Ok(())
}

/// Write the effective configuration to the config directory.
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    config.save()?;
    let config_dir = Config::config_dir()?;
    println!(
        "Wrote configuration to {}",
        config_dir.join("config.toml").display()
    );
    Ok(())
}

fn report_progress(progress: &IngestionProgress) {
    match progress.outcome() {
        IngestionOutcome::Completed => println!(
            "{} stored {} chunks from {} documents",
            style("Ingestion complete:").green().bold(),
            progress.stored_chunks,
            progress.total_documents
        ),
        IngestionOutcome::Partial => println!(
            "{} stored {}/{} chunks ({} errors)",
            style("Ingestion partially complete:").yellow().bold(),
            progress.stored_chunks,
            progress.total_chunks,
            progress.errors.len()
        ),
        IngestionOutcome::Failed => println!(
            "{} no chunks were stored",
            style("Ingestion failed:").red().bold()
        ),
    }

    for failure in &progress.errors {
        println!(
            "  {} {}: {}",
            style("error:").red(),
            failure.document_id,
            failure.message
        );
    }
}
