use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;

use harga_bot::application::errors::BotError;
use harga_bot::application::services::chat_service::render_outcome;
use harga_bot::application::services::{AggregatorContext, ChatService, PriceAggregator};
use harga_bot::domain::traits::{PriceCache, ProxyPool};
use harga_bot::infrastructure::adapters::ConsoleAdapter;
use harga_bot::infrastructure::cache::{build_cache, MemoryCache};
use harga_bot::infrastructure::config::Config;
use harga_bot::infrastructure::proxy::{read_list, RotatingProxyPool};
use harga_bot::infrastructure::sources::sources_from_config;

#[derive(Parser)]
#[command(name = "harga-bot")]
#[command(about = "Price range lookups across Indonesian marketplaces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive console bot
    Run,
    /// Answer one price question and exit
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Drop the cached price for a question
    Forget {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Drop every cached price
    ClearCache,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Version => {
            println!("harga-bot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(),
        command => execute(&cli.config, command),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn execute(config_path: &str, command: Commands) -> Result<(), BotError> {
    let config = load_config(config_path)?;
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let aggregator = Arc::new(build_aggregator(&config)?);

        match command {
            Commands::Run => {
                tracing::info!(
                    "Starting {} with sources: {} (lookup budget {:?})",
                    config.bot.name,
                    aggregator.source_names().join(", "),
                    aggregator.overall_timeout()
                );
                let chat = Arc::new(ChatService::with_keywords(
                    Arc::clone(&aggregator),
                    config.bot.price_keywords.clone(),
                ));
                ConsoleAdapter::new(config.bot.name.clone(), chat).run().await
            }
            Commands::Ask { question } => {
                let outcome = aggregator.resolve(&question.join(" ")).await;
                println!("{}", render_outcome(&outcome));
                Ok(())
            }
            Commands::Forget { question } => {
                let question = question.join(" ");
                let removed = aggregator.forget(&question).await?;
                let query = aggregator.normalize(&question);
                if removed {
                    println!("Removed cached price for '{}'", query);
                } else {
                    println!("No cached price for '{}'", query);
                }
                Ok(())
            }
            Commands::ClearCache => {
                let removed = aggregator.clear_cache().await?;
                println!("Removed {} cached price(s)", removed);
                Ok(())
            }
            Commands::Version | Commands::InitConfig => Ok(()),
        }
    })
}

fn load_config(config_path: &str) -> Result<Config, BotError> {
    if !Path::new(config_path).exists() {
        tracing::info!("No config at {}, using defaults", config_path);
        return Ok(Config::load_env()?);
    }

    let mut config = Config::load(config_path)?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn build_aggregator(config: &Config) -> Result<PriceAggregator, BotError> {
    let cache: Arc<dyn PriceCache> = match build_cache(&config.cache) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!("Failed to open price cache: {}, falling back to memory", e);
            Arc::new(MemoryCache::new(config.cache_ttl()))
        }
    };

    let proxies = build_proxy_pool(config);
    let scrapers = sources_from_config(config, proxies)?;

    let ctx = AggregatorContext::new(cache)
        .with_normalizer(config.normalizer())
        .with_cleaner(config.cleaner())
        .with_filter(config.outlier_filter())
        .with_scrapers(scrapers)
        .with_timeouts(config.source_timeout(), config.overall_timeout());

    Ok(PriceAggregator::new(ctx))
}

fn build_proxy_pool(config: &Config) -> Option<Arc<dyn ProxyPool>> {
    let mut addresses = config.proxy.addresses.clone();

    if let Some(path) = &config.proxy.list_path {
        match read_list(path) {
            Ok(listed) => addresses.extend(listed),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    let pool = RotatingProxyPool::new(addresses, config.proxy.max_failures);
    if pool.is_empty() {
        return None;
    }
    tracing::info!("Proxy pool ready with {} address(es)", pool.len());
    Some(Arc::new(pool))
}

fn init_config() -> Result<(), BotError> {
    let config = Config::default();
    let yaml = serde_yaml::to_string(&config)
        .map_err(|e| BotError::Internal(format!("Failed to render config: {}", e)))?;
    println!("{}", yaml);
    println!("\nSave this to config.yaml and adjust as needed.");
    Ok(())
}
