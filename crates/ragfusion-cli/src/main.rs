//! rag-fusion - Command-line interface for RAG-Fusion search.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ragfusion_core::{
    FusionConfig, FusionError, FusionResults, IndexService, MetadataValue, NewDocument,
    RankedList, Result,
};
use ragfusion_providers::{OpenAiClient, PineconeIndex};
use ragfusion_query::{reciprocal_rank_fusion, FusionEngine, QueryConfig, DEFAULT_RRF_K};

type RemoteEngine = FusionEngine<OpenAiClient, OpenAiClient, PineconeIndex>;

/// Characters of content shown per result in text output.
const PREVIEW_CHARS: usize = 120;

/// rag-fusion - multi-query vector search with Reciprocal Rank Fusion
#[derive(Parser)]
#[command(name = "rag-fusion")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/ragfusion/config.toml or ./ragfusion.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search with generated query variants and fuse the results
    Search {
        /// Search query
        query: String,

        /// Results fetched per query variant
        #[arg(short = 'k', long)]
        top_k: Option<u32>,

        /// Number of generated query variants
        #[arg(short = 'n', long)]
        num_queries: Option<usize>,

        /// RRF constant k (at least 1)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        rrf_k: Option<u32>,

        /// Maximum number of fused results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Index to search
        #[arg(long, value_enum, default_value_t = IndexArg::Primary)]
        index: IndexArg,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Embed documents from a file and upsert them into the index
    Upload {
        /// `.jsonl` file of documents, or a text file with one document per line
        path: PathBuf,

        /// Index to write to
        #[arg(long, value_enum, default_value_t = IndexArg::Primary)]
        index: IndexArg,
    },

    /// Fuse ranked lists from a JSON file without calling any service
    Fuse {
        /// JSON array of ranked lists
        path: PathBuf,

        /// RRF constant k (at least 1)
        #[arg(long, default_value_t = DEFAULT_RRF_K, value_parser = clap::value_parser!(u32).range(1..))]
        rrf_k: u32,

        /// Maximum number of fused results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the effective configuration (secrets redacted)
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexArg {
    Primary,
    Secondary,
}

impl From<IndexArg> for IndexService {
    fn from(arg: IndexArg) -> Self {
        match arg {
            IndexArg::Primary => Self::Primary,
            IndexArg::Secondary => Self::Secondary,
        }
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        if err.is_fatal() {
            eprintln!("{}", err);
        } else {
            eprintln!("Error [{}]: {}", err.error_code(), err);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Search {
            query,
            top_k,
            num_queries,
            rrf_k,
            limit,
            index,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;

            let mut query_config = QueryConfig::from(&config.search);
            if let Some(top_k) = top_k {
                query_config.top_k = top_k;
            }
            if let Some(num_queries) = num_queries {
                query_config.num_queries = num_queries;
            }
            if let Some(rrf_k) = rrf_k {
                query_config.rrf_k = rrf_k;
            }
            if let Some(limit) = limit {
                query_config.result_limit = limit;
            }

            let engine = build_engine(&config, index.into()).await?;
            let results = engine.search_with_query(&query, query_config).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
        }
        Commands::Upload { path, index } => {
            let config = load_config(cli.config.as_deref())?;
            let documents = read_documents(&path)?;

            if documents.is_empty() {
                println!("No documents found in: {}", path.display());
                return Ok(());
            }

            println!("Uploading {} document(s)...", documents.len());

            let engine = build_engine(&config, index.into()).await?;
            let summary = engine.upload_documents(documents).await?;

            println!(
                "Complete: {} upserted, {} skipped",
                summary.upserted, summary.skipped
            );
        }
        Commands::Fuse {
            path,
            rrf_k,
            limit,
        } => {
            let content = fs::read_to_string(&path)?;
            let result_sets: Vec<RankedList> = serde_json::from_str(&content)?;
            debug!("Fusing {} ranked lists", result_sets.len());

            let mut fused = reciprocal_rank_fusion(result_sets, rrf_k);
            if let Some(limit) = limit {
                fused.truncate(limit);
            }

            println!("{}", serde_json::to_string_pretty(&fused)?);
        }
        Commands::Config => {
            let mut config = match cli.config.as_deref() {
                Some(path) => FusionConfig::load(path)?,
                None => FusionConfig::load_default()?,
            };
            config.apply_env(|key| std::env::var(key).ok());

            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<FusionConfig> {
    let config = FusionConfig::from_env(path)?;
    info!(
        "Loaded configuration (index {:?}, rrf_k {})",
        config.pinecone.index_name, config.search.rrf_k
    );
    Ok(config)
}

async fn build_engine(config: &FusionConfig, service: IndexService) -> Result<RemoteEngine> {
    let index_name = config.index_name(service)?;
    let host = match service {
        IndexService::Primary => config.pinecone.host.as_deref(),
        IndexService::Secondary => None,
    };

    let timeout = config.search.timeout();
    let index = tokio::time::timeout(
        timeout,
        PineconeIndex::connect(&config.pinecone, index_name, host),
    )
    .await
    .map_err(|_| FusionError::timeout("describe index", timeout.as_millis() as u64))??;

    info!("Searching {} index {:?}", service, index_name);

    let openai = Arc::new(OpenAiClient::new(&config.openai));
    Ok(FusionEngine::new(openai.clone(), openai, Arc::new(index)).with_timeout(timeout))
}

/// Read documents for upload.
///
/// `.jsonl` files hold one JSON document per line; any other file is
/// treated as plain text with one document per non-empty line.
fn read_documents(path: &Path) -> Result<Vec<NewDocument>> {
    let content = fs::read_to_string(path)?;
    let is_jsonl = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jsonl"))
        .unwrap_or(false);

    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut documents = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if is_jsonl {
            let doc: NewDocument = serde_json::from_str(line).map_err(|e| {
                FusionError::invalid_argument(format!(
                    "{}:{}: {}",
                    path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            documents.push(doc);
        } else {
            let mut doc = NewDocument::new(line);
            doc.metadata
                .insert("source".to_string(), MetadataValue::from(source.as_str()));
            documents.push(doc);
        }
    }

    Ok(documents)
}

fn print_results(results: &FusionResults) {
    println!("Query: {}", results.query);
    println!("Variants:");
    for (i, variant) in results.variants.iter().enumerate() {
        println!("  {}. {}", i + 1, variant);
    }

    println!(
        "\n{} result(s) in {}ms:",
        results.total_results, results.latency_ms
    );
    for (i, result) in results.results.iter().enumerate() {
        println!(
            "{:>3}. [{:.4}] {}  {}",
            i + 1,
            result.fusion_score,
            result.id(),
            preview(&result.item.content)
        );
    }
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}
