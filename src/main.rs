use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nephrag_core::config::{Config, StoreBackend};
use nephrag_core::render::{render_answer, render_categories, render_report};
use nephrag_core::{Category, IndexCatalog, QaService, evaluate_raw};
use nephrag_index::document::TextSplitter;
use nephrag_index::{
    BuildReport, IngestionPipeline, LocalVectorStore, QdrantOps, Retriever, VectorStore,
};
use nephrag_llm::LlmProvider;
use nephrag_llm::ollama::OllamaProvider;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Parser, Debug)]
#[command(name = "nephrag", version)]
#[command(about = "Category-routed document retrieval and lab-value scoring for nephrology")]
struct Cli {
    /// Configuration file (falls back to NEPHRAG_CONFIG, then config/default.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the category a question routes to
    Route { question: String },

    /// Retrieve the most relevant passages for a question
    Ask {
        question: String,
        /// Number of passages to return (default: retrieval.top_k)
        #[arg(short = 'k', long = "top-k", value_parser = parse_top_k)]
        top_k: Option<usize>,
        /// Also generate an answer from the retrieved passages
        #[arg(long)]
        generate: bool,
    },

    /// Score lab values, e.g. `score --lab Creatinine=1.4 --lab eGFR=52`
    Score {
        #[arg(
            long = "lab",
            value_name = "NAME=VALUE",
            value_parser = parse_lab_pair,
            required = true,
            num_args = 1..
        )]
        labs: Vec<(String, String)>,
    },

    /// Rebuild the collection of one category from its documents
    Build {
        /// Category slug: aki, ckd, ns, gn, electrolyte
        category: Category,
        /// Documents directory (default: <docs_root>/<slug>)
        #[arg(long, value_name = "DIR")]
        docs: Option<PathBuf>,
    },

    /// Rebuild every category whose documents directory exists
    BuildAll,

    /// List categories with their slugs, collections and trigger keywords
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Route { question } => {
            let category = config.keyword_table().route(&question);
            match category.slug() {
                Some(slug) => println!("{category} ({slug})"),
                None => println!("{category}"),
            }
        }
        Command::Score { labs } => {
            let report = evaluate_raw(labs)?;
            print!("{}", render_report(&report));
        }
        Command::Categories => {
            print!(
                "{}",
                render_categories(&config.keyword_table(), &config.catalog())
            );
        }
        Command::Ask {
            question,
            top_k,
            generate,
        } => {
            let provider = Arc::new(create_provider(&config));
            health_check(&provider).await;
            let service = create_service(&config, create_store(&config)?, provider);
            let top_k = top_k.unwrap_or(service.settings().top_k);
            let generate = generate || service.settings().generate_answer;
            let answer = service.ask_with(&question, top_k, generate).await?;
            print!("{}", render_answer(&answer));
        }
        Command::Build { category, docs } => {
            let provider = Arc::new(create_provider(&config));
            health_check(&provider).await;
            let pipeline = create_pipeline(&config, create_store(&config)?, provider);
            let report = build_category(&pipeline, &config.catalog(), category, docs).await?;
            print_build(&report);
        }
        Command::BuildAll => {
            let provider = Arc::new(create_provider(&config));
            health_check(&provider).await;
            let pipeline = create_pipeline(&config, create_store(&config)?, provider);
            let catalog = config.catalog();
            let reports = build_all(&pipeline, &catalog).await?;
            if reports.is_empty() {
                tracing::warn!(
                    docs_root = %catalog.docs_root().display(),
                    "no category documents directory found"
                );
            }
            for report in &reports {
                print_build(report);
            }
        }
    }

    Ok(())
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("NEPHRAG_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn parse_lab_pair(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing lab field name in {raw:?}"));
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}

fn parse_top_k(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("top-k must be at least 1".to_owned()),
        Ok(k) => Ok(k),
        Err(e) => Err(format!("invalid top-k {raw:?}: {e}")),
    }
}

fn create_provider(config: &Config) -> OllamaProvider {
    OllamaProvider::new(
        &config.llm.base_url,
        config.llm.model.clone(),
        config.llm.embedding_model.clone(),
    )
}

fn create_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.index.backend {
        StoreBackend::Local => {
            let local = LocalVectorStore::new(config.index.root.clone());
            tracing::debug!(root = %local.root().display(), "using local vector store");
            Arc::new(local)
        }
        StoreBackend::Qdrant => {
            let ops = QdrantOps::new(&config.index.qdrant_url).with_context(|| {
                format!("failed to create Qdrant client for {}", config.index.qdrant_url)
            })?;
            tracing::debug!(url = %config.index.qdrant_url, "using qdrant vector store");
            Arc::new(ops)
        }
    };
    Ok(store)
}

fn create_service<P: LlmProvider>(
    config: &Config,
    store: Arc<dyn VectorStore>,
    provider: Arc<P>,
) -> QaService<P> {
    let mut retriever = Retriever::new(store, Arc::clone(&provider));
    if let Some(threshold) = config.retrieval.score_threshold {
        retriever = retriever.with_score_threshold(threshold);
    }
    QaService::new(
        config.keyword_table(),
        config.catalog(),
        retriever,
        provider,
        config.ask_settings(),
    )
}

fn create_pipeline<P: LlmProvider>(
    config: &Config,
    store: Arc<dyn VectorStore>,
    provider: Arc<P>,
) -> IngestionPipeline<P> {
    IngestionPipeline::new(TextSplitter::new(config.splitter_config()), store, provider)
}

async fn health_check(provider: &OllamaProvider) {
    match provider.health_check().await {
        Ok(()) => tracing::info!("ollama health check passed"),
        Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
    }
}

async fn build_category<P: LlmProvider>(
    pipeline: &IngestionPipeline<P>,
    catalog: &IndexCatalog,
    category: Category,
    docs: Option<PathBuf>,
) -> anyhow::Result<BuildReport> {
    let collection = catalog.resolve(category)?;
    let dir = match docs {
        Some(dir) => dir,
        None => catalog
            .docs_dir(category)
            .with_context(|| format!("no documents directory for {category}"))?,
    };
    pipeline
        .build(&collection, &dir)
        .await
        .with_context(|| format!("failed to build {collection} from {}", dir.display()))
}

async fn build_all<P: LlmProvider>(
    pipeline: &IngestionPipeline<P>,
    catalog: &IndexCatalog,
) -> anyhow::Result<Vec<BuildReport>> {
    let mut reports = Vec::new();
    for category in Category::KNOWN {
        let Some(dir) = catalog.docs_dir(category) else {
            continue;
        };
        if !dir.is_dir() {
            tracing::info!(%category, dir = %dir.display(), "skipping category without documents");
            continue;
        }
        reports.push(build_category(pipeline, catalog, category, Some(dir)).await?);
    }
    Ok(reports)
}

fn print_build(report: &BuildReport) {
    println!(
        "{}: {} documents, {} chunks",
        report.collection, report.documents, report.chunks
    );
}
