use sampark::cli::{Cli, Commands, ConfigAction};
use sampark::config::Config;
use sampark::error::{Result, SamparkError};
use sampark::patterns::PatternLibrary;
use sampark::providers::HttpCompletionClient;
use sampark::query::{
    FallbackExtractor, IntentClassifier, LlmExtractor, NoContext, QueryPipeline, RegexExtractor,
};
use std::sync::Arc;

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse_args();

    match cli.command {
        Commands::Extract { query, llm, json } => {
            cmd_extract(cli.config, &query, llm, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sampark=info"));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_extract(
    config_path: Option<std::path::PathBuf>,
    query: &str,
    use_llm: bool,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;

    let library = Arc::new(match &config.patterns.patterns_file {
        Some(path) => PatternLibrary::from_file(path)?,
        None => PatternLibrary::builtin()?,
    });

    let fallback: Option<Arc<dyn FallbackExtractor>> = if use_llm && config.llm.enabled {
        let client = HttpCompletionClient::new(&config.llm)
            .map_err(|e| SamparkError::Config(e.to_string()))?;
        Some(Arc::new(LlmExtractor::new(
            Arc::new(client),
            library.clone(),
            config.llm.clone(),
        )))
    } else {
        if use_llm {
            tracing::warn!("LLM fallback requested but llm.enabled is false; running regex-only");
        }
        None
    };

    let pipeline = QueryPipeline::new(
        IntentClassifier::new(&config.extraction),
        RegexExtractor::new(library, config.extraction.clone()),
        fallback,
        Arc::new(NoContext),
        config.extraction.clone(),
    );

    let rt = tokio::runtime::Runtime::new().map_err(|e| SamparkError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    let extracted = rt.block_on(pipeline.understand(query, ""));

    if json {
        let payload = serde_json::to_string_pretty(&extracted).map_err(|e| SamparkError::Json {
            source: e,
            context: "Failed to serialize extraction".to_string(),
        })?;
        println!("{}", payload);
        return Ok(());
    }

    println!("Query:      {}", query);
    println!("Normalized: {}", extracted.normalized_query);
    println!(
        "Intent:     {:?}{}",
        extracted.intent,
        extracted
            .secondary_intent
            .map(|s| format!(" (secondary: {:?})", s))
            .unwrap_or_default()
    );
    println!("Method:     {:?}", extracted.method);
    println!("Confidence: {:.2}", extracted.confidence);

    let e = &extracted.entities;
    if e.is_empty() {
        println!("Entities:   (none)");
    } else {
        println!("Entities:");
        if !e.graduation_years.is_empty() {
            println!("  years:    {:?}", e.graduation_years);
        }
        if let Some(location) = &e.location {
            println!("  location: {}", location);
        }
        if !e.branch.is_empty() {
            println!("  branch:   {}", e.branch.join(", "));
        }
        if !e.degree.is_empty() {
            println!("  degree:   {}", e.degree.join(", "));
        }
        if !e.skills.is_empty() {
            println!("  skills:   {}", e.skills.join(", "));
        }
        if !e.services.is_empty() {
            println!("  services: {}", e.services.join(", "));
        }
        if let Some(tier) = e.turnover_tier {
            println!("  turnover: {:?}", tier);
        }
    }

    Ok(())
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| SamparkError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(p) => p,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = Config::default_path()?;

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SamparkError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(p) => p,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'sampark config init' to create one."
        );
        return Ok(Config::default());
    }

    Config::load(&path)
}
