use citeline::cli::{Cli, Commands, ConfigAction};
use citeline::config::{expand_path, Config, ConfigValidator};
use citeline::embedding::provider_from_config;
use citeline::entities::{EntityExtractor, EntityRuleTable, KeywordExtractor};
use citeline::error::{CitelineError, Result};
use citeline::indexing::{BuildOptions, IndexBuilder};
use citeline::retrieval::{EvidencePack, HybridRetriever};
use citeline::sql::{ReadOnlySqlTool, SqlResult};
use citeline::storage::{StorageManager, StorageStats};
use citeline::verify::{render_note, ResearchDraft, Verifier};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let Cli {
        config,
        profile,
        verbose,
        command,
    } = Cli::parse_args();

    // Initialize logging
    init_logging(verbose);

    let (config, profile) = (&config, &profile);

    // Handle commands
    match command {
        Commands::Build { docs_dir } => {
            cmd_build(load_config(config, profile)?, docs_dir).await?;
        }
        Commands::Retrieve {
            query,
            top_k,
            hop_k,
            out,
        } => {
            cmd_retrieve(load_config(config, profile)?, &query, top_k, hop_k, out).await?;
        }
        Commands::Sql { query } => {
            cmd_sql(&load_config(config, profile)?, &query)?;
        }
        Commands::Verify {
            draft,
            packs,
            sql_results,
            note,
        } => {
            cmd_verify(&draft, &packs, &sql_results, note)?;
        }
        Commands::Stats => {
            cmd_stats(&load_config(config, profile)?)?;
        }
        Commands::Config { action } => {
            cmd_config(config.clone(), profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "citeline=debug"
    } else {
        "citeline=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_build(mut config: Config, docs_dir: Option<PathBuf>) -> Result<()> {
    if let Some(dir) = docs_dir {
        config.indexing.docs_dir = dir;
    }

    let options = BuildOptions::from_config(&config)?;
    let storage = StorageManager::open(&config.storage)?;
    let embedder = provider_from_config(&config.embedding)?;
    let extractor = load_extractor(&config)?;

    tracing::info!(
        "Building index with {} and entity rules v{}",
        embedder.model_name(),
        extractor.version()
    );

    let builder = IndexBuilder::from_storage(&storage, embedder, extractor, options);
    let report = tokio::task::spawn_blocking(move || builder.build())
        .await
        .map_err(|e| CitelineError::Other(anyhow::anyhow!("Build task failed: {}", e)))??;

    println!("✓ Indexed {} chunks from {} documents", report.chunks, report.documents);
    println!("  Collection: {} ({}D)", report.collection, report.dimension);
    println!(
        "  Graph: {} entities, {} mentions, {} co-occurrence edges",
        report.graph.entities, report.graph.mentions, report.graph.co_occurrence_edges
    );
    println!("  Mapping: {}", report.mapping_path.display());

    Ok(())
}

async fn cmd_retrieve(
    mut config: Config,
    query: &str,
    top_k: Option<usize>,
    hop_k: Option<usize>,
    out: Option<PathBuf>,
) -> Result<()> {
    if let Some(top_k) = top_k {
        config.retrieval.top_k = top_k;
    }
    if let Some(hop_k) = hop_k {
        config.retrieval.hop_k = hop_k;
    }
    ConfigValidator::validate(&config)?;

    let storage = StorageManager::open(&config.storage)?;
    let embedder = provider_from_config(&config.embedding)?;
    let retriever = HybridRetriever::from_config(&config, &storage, embedder)?;

    let pack = retriever.retrieve_with_deadline(query).await?;
    let json = to_json(&pack, "Failed to serialize evidence pack")?;

    match out {
        Some(path) => {
            write_file(&path, &json)?;
            eprintln!("✓ Wrote {}", path.display());
            eprintln!("  Seed chunks: {}", pack.seed_chunks().len());
            eprintln!("  Graph paths: {}", pack.graph_paths().len());
            eprintln!("  Expanded chunks: {}", pack.expanded_chunks().len());
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn cmd_sql(config: &Config, query: &str) -> Result<()> {
    let tool = ReadOnlySqlTool::new(&config.sql)?;
    let result = tool.read_query(query)?;
    println!("{}", to_json(&result, "Failed to serialize SQL result")?);
    Ok(())
}

fn cmd_verify(
    draft_path: &Path,
    pack_paths: &[PathBuf],
    sql_paths: &[PathBuf],
    note: Option<PathBuf>,
) -> Result<()> {
    let draft: ResearchDraft = read_json(draft_path)?;

    let verifier = if pack_paths.is_empty() && sql_paths.is_empty() {
        Verifier::new()
    } else {
        let packs = pack_paths
            .iter()
            .map(|p| read_json::<EvidencePack>(p))
            .collect::<Result<Vec<_>>>()?;
        let sql = sql_paths
            .iter()
            .map(|p| read_json::<SqlResult>(p))
            .collect::<Result<Vec<_>>>()?;
        Verifier::with_sources(&packs, &sql)
    };

    let report = verifier.verify(&draft);
    println!("{}", to_json(&report, "Failed to serialize report")?);

    if let Some(path) = note {
        write_file(&path, &render_note(&draft, &report))?;
        eprintln!("✓ Wrote note {}", path.display());
    }

    Ok(())
}

fn cmd_stats(config: &Config) -> Result<()> {
    let storage = StorageManager::open(&config.storage)?;
    let stats = storage.stats(&config.indexing.collection)?;

    println!("Collection: {}", stats.collection);
    match stats.points {
        Some(points) => println!("  Points: {}", points),
        None => println!("  Points: (not built)"),
    }
    println!("  Mapping entries: {}", stats.mapping_entries);
    println!("Graph:");
    println!("  Chunks: {}", stats.graph.chunks);
    println!("  Entities: {}", stats.graph.entities);
    println!("  Mentions: {}", stats.graph.mentions);
    println!("  Co-occurrence edges: {}", stats.graph.co_occurrence_edges);
    println!(
        "Storage: {}",
        StorageStats::format_size(stats.total_size())
    );

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: &Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(&config_path, profile)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let rules_path = config_dir.join("entities.toml");
            if force || !rules_path.exists() {
                write_file(&rules_path, EntityRuleTable::builtin_source())?;
            }

            let mut config = Config::default();
            config.entities.rules_file = Some(rules_path.clone());
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("✓ Entity rule table installed at: {}", rules_path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: &Option<PathBuf>, profile: &Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'citeline config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, profile),
        None => Config::load(&path),
    }
}

fn load_extractor(config: &Config) -> Result<Arc<dyn EntityExtractor>> {
    let rules_file = config
        .entities
        .rules_file
        .as_deref()
        .map(expand_path)
        .transpose()?;
    let table = EntityRuleTable::load_or_builtin(rules_file.as_deref())?;

    tracing::debug!(
        "Loaded {} entity surface forms (rules v{})",
        table.surface_form_count(),
        table.version
    );

    Ok(Arc::new(KeywordExtractor::new(table)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CitelineError::Io {
            source: e,
            context: format!("Failed to read {:?}", path),
        })?;
    serde_json::from_str(&content).map_err(|e| CitelineError::Json {
        source: e,
        context: format!("Failed to parse {:?}", path),
    })
}

fn to_json<T: serde::Serialize>(value: &T, context: &str) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| CitelineError::Json {
        source: e,
        context: context.to_string(),
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| CitelineError::Io {
                source: e,
                context: format!("Failed to create directory: {:?}", parent),
            })?;
        }
    }
    std::fs::write(path, content).map_err(|e| CitelineError::Io {
        source: e,
        context: format!("Failed to write {:?}", path),
    })
}
