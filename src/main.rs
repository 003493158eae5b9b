use std::path::PathBuf;

use clap::{Parser, Subcommand};
use graphq_rag::Result;
use graphq_rag::commands::{
    ingest_path, ingest_schema_file, init_config, search, show_config, show_status,
};
use graphq_rag::config::Config;

#[derive(Parser)]
#[command(name = "graphq-rag")]
#[command(about = "RAG knowledge base for GraphQL documentation and schema context")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest a documentation file or directory
    Ingest {
        /// File or directory to ingest
        path: PathBuf,
        /// Do not descend into subdirectories
        #[arg(long)]
        no_recurse: bool,
        /// Only load files with these extensions, e.g. "md,txt"
        #[arg(long, value_delimiter = ',')]
        extensions: Option<Vec<String>>,
        /// Skip paths containing any of these substrings
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
    /// Ingest a GraphQL schema dump (SDL or introspection JSON)
    IngestSchema {
        /// Schema file to ingest
        file: PathBuf,
        /// Identifier for the schema document
        #[arg(long, default_value = "graphql_schema")]
        id: String,
    },
    /// Search the knowledge base
    Search {
        query: String,
        /// Maximum number of chunks to return
        #[arg(long)]
        limit: Option<usize>,
        /// Only search schema chunks
        #[arg(long, conflicts_with = "docs")]
        schema: bool,
        /// Only search documentation chunks
        #[arg(long)]
        docs: bool,
    },
    /// Show backend availability and stored chunk counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                init_config(&config)?;
            }
        }
        Commands::Ingest {
            path,
            no_recurse,
            extensions,
            exclude,
        } => {
            ingest_path(&config, &path, !no_recurse, extensions, exclude).await?;
        }
        Commands::IngestSchema { file, id } => {
            ingest_schema_file(&config, &file, &id).await?;
        }
        Commands::Search {
            query,
            limit,
            schema,
            docs,
        } => {
            search(&config, &query, limit, schema, docs).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["graphq-rag", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Status);
        }
    }

    #[test]
    fn ingest_command_with_path() {
        let cli = Cli::try_parse_from(["graphq-rag", "ingest", "./docs"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest {
                path, no_recurse, ..
            } = parsed.command
            {
                assert_eq!(path, PathBuf::from("./docs"));
                assert!(!no_recurse);
            }
        }
    }

    #[test]
    fn ingest_command_with_extensions() {
        let cli = Cli::try_parse_from(["graphq-rag", "ingest", "./docs", "--extensions", "md,txt"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { extensions, .. } = parsed.command {
                assert_eq!(extensions, Some(vec!["md".to_string(), "txt".to_string()]));
            }
        }
    }

    #[test]
    fn search_command_with_limit() {
        let cli = Cli::try_parse_from(["graphq-rag", "search", "mutations", "--limit", "5"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { query, limit, .. } = parsed.command {
                assert_eq!(query, "mutations");
                assert_eq!(limit, Some(5));
            }
        }
    }

    #[test]
    fn search_schema_and_docs_flags_conflict() {
        let cli = Cli::try_parse_from(["graphq-rag", "search", "q", "--schema", "--docs"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["graphq-rag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["graphq-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["graphq-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
