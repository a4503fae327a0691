mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use coderag_index::repo_map::render_repo_map;
use coderag_index::{
    AnnIndex, CodeIndexer, GraphStore, HybridRetriever, IndexReport, SearchResult,
    format_as_context,
};
use coderag_llm::openai::OpenAiProvider;
use coderag_llm::simulated::SimulatedProvider;
use coderag_llm::{AnyProvider, RetryPolicy};

use crate::config::{Config, LlmConfig, ProviderKind};

#[derive(Parser)]
#[command(
    name = "coderag",
    about = "Index source trees into a code graph and run hybrid retrieval over them",
    version
)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true, default_value = "coderag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, persist and embed a source tree
    Index {
        /// Repository root
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Re-parse files even when their content hash is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Retrieve the most relevant code for a natural-language query
    Query {
        text: String,
        /// Number of results (0 uses the configured default)
        #[arg(short, long, default_value_t = 0)]
        k: usize,
        /// Print a prompt-ready context block instead of a hit list
        #[arg(long)]
        context: bool,
        /// Token budget for the context block
        #[arg(long, default_value_t = 4_000)]
        budget: usize,
    },
    /// Show the repository map recorded by the latest successful run
    RepoMap {
        #[arg(default_value = ".")]
        root: PathBuf,
        #[arg(long, default_value_t = 2_000)]
        budget: usize,
        /// Full-text search over map entries instead of rendering the map
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Index { root, force } => cmd_index(&config, &root, force).await,
        Commands::Query {
            text,
            k,
            context,
            budget,
        } => cmd_query(&config, &text, k, context.then_some(budget)).await,
        Commands::RepoMap {
            root,
            budget,
            search,
            limit,
        } => cmd_repo_map(&config, &root, budget, search.as_deref(), limit).await,
    }
}

async fn cmd_index(config: &Config, root: &Path, force: bool) -> anyhow::Result<()> {
    let root = canonical_root(root)?;
    let (store, ann) = open_index(config).await?;
    let provider = Arc::new(create_provider(&config.llm)?);
    let indexer = CodeIndexer::new(store.clone(), provider, ann, config.index.indexer.clone());

    let report = indexer
        .index_project(&root, force)
        .await
        .with_context(|| format!("indexing {} failed", root.display()))?;
    print_report(&report);
    store.close().await;
    Ok(())
}

async fn cmd_query(
    config: &Config,
    text: &str,
    k: usize,
    context_budget: Option<usize>,
) -> anyhow::Result<()> {
    let (store, ann) = open_index(config).await?;
    if store.node_count().await? == 0 {
        bail!("index is empty; run `coderag index <root>` first");
    }
    let provider = Arc::new(create_provider(&config.llm)?);
    let retriever = HybridRetriever::new(store.clone(), provider, ann, config.retrieval.clone());

    let results = retriever.retrieve(text, k).await?;
    match context_budget {
        Some(budget) => println!("{}", format_as_context(&results, budget)),
        None if results.is_empty() => println!("no results"),
        None => {
            for hit in &results {
                println!("{}", format_hit(hit));
            }
        }
    }
    store.close().await;
    Ok(())
}

async fn cmd_repo_map(
    config: &Config,
    root: &Path,
    budget: usize,
    search: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let root = canonical_root(root)?;
    let repo_root = root.to_string_lossy().to_string();
    let store = GraphStore::open(&config.index.db_path)
        .await
        .with_context(|| format!("failed to open index at {}", config.index.db_path))?;

    if let Some(text) = search {
        for entry in store.search_repo_map(&repo_root, text, limit).await? {
            let symbol = entry.symbol_name.as_deref().unwrap_or("");
            let line = entry.start_line.map(|l| format!(":{l}")).unwrap_or_default();
            println!("{}{line} {symbol}", entry.path);
        }
    } else {
        let Some(run) = store.latest_successful_run(&repo_root).await? else {
            bail!("no successful index run recorded for {repo_root}");
        };
        let entries = store.repo_map_entries(run.id).await?;
        println!("{}", render_repo_map(&entries, budget));
    }
    store.close().await;
    Ok(())
}

fn canonical_root(root: &Path) -> anyhow::Result<PathBuf> {
    std::fs::canonicalize(root).with_context(|| format!("invalid root {}", root.display()))
}

async fn open_index(config: &Config) -> anyhow::Result<(GraphStore, Arc<AnnIndex>)> {
    for path in [&config.index.db_path, &config.index.ann_path] {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let store = GraphStore::open(&config.index.db_path)
        .await
        .with_context(|| format!("failed to open index at {}", config.index.db_path))?;
    let ann = Arc::new(AnnIndex::new(Some(PathBuf::from(&config.index.ann_path))));
    Ok((store, ann))
}

fn create_provider(config: &LlmConfig) -> anyhow::Result<AnyProvider> {
    if config.provider == ProviderKind::Simulated {
        return Ok(AnyProvider::Simulated(SimulatedProvider::new(
            config.embedding_dimensions,
        )));
    }
    let Some(api_key) = config.api_key() else {
        tracing::warn!("no API key configured, falling back to the simulated provider");
        return Ok(AnyProvider::Simulated(SimulatedProvider::new(
            config.embedding_dimensions,
        )));
    };

    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| config.default_base_url().to_owned());
    let mut provider = OpenAiProvider::new(
        api_key.to_owned(),
        base_url,
        config.model.clone(),
        config.max_tokens,
        Some(config.embedding_model.clone()),
    )
    .context("failed to build LLM provider")?
    .with_prefer_json(config.prefer_json)
    .with_retry_policy(RetryPolicy {
        max_retries: config.retry.max_retries,
        base_delay: Duration::from_millis(config.retry.base_delay_ms),
        max_delay: Duration::from_millis(config.retry.max_delay_ms),
    });
    if let Some(temperature) = config.temperature {
        provider = provider.with_temperature(temperature);
    }
    if config.provider == ProviderKind::OpenRouter {
        provider = provider.with_name("openrouter");
        if let Some(referer) = &config.http_referer {
            provider = provider.with_header("HTTP-Referer", referer);
        }
        if let Some(title) = &config.app_title {
            provider = provider.with_header("X-Title", title);
        }
    }
    Ok(AnyProvider::OpenAi(provider))
}

fn print_report(report: &IndexReport) {
    println!(
        "run {}: scanned {}, indexed {}, skipped {}, deleted {}, errors {}",
        report.run_id,
        report.files_scanned,
        report.indexed,
        report.skipped,
        report.deleted,
        report.errors
    );
    println!(
        "wrote {} nodes, {} edges, embedded {} in {} ms",
        report.nodes_written, report.edges_written, report.embedded, report.elapsed_ms
    );
}

fn format_hit(hit: &SearchResult) -> String {
    format!(
        "{:.4} {}:{}-{} [{}] {}",
        hit.score,
        hit.node.filepath,
        hit.node.start_line,
        hit.node.end_line,
        hit.node.kind,
        hit.node.name
    )
}
