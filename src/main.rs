mod commands;
mod dispatch;
mod gateway;

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::sync::Arc;
use tolk_channels::telegram::TelegramChannel;
use tolk_core::{
    config::{self, Config, TolkConfig},
    languages::LanguageTable,
    rate_limit::RateLimiter,
    traits::{Channel, Translator},
};
use tolk_providers::openai::OpenAiTranslator;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "tolk",
    version,
    about = "tolk: translate chat messages on command"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot.
    Start,
    /// Show the effective configuration and check it.
    Status,
    /// Translate text once and print the result.
    Translate {
        /// Target language code (e.g. "es").
        code: String,
        /// The text to translate.
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
    },
    /// List the known language codes.
    Languages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_tracing(&cfg.tolk);

    match cli.command {
        Commands::Start => {
            cfg.validate()?;

            let translator: Arc<dyn Translator> =
                Arc::new(OpenAiTranslator::from_config(&cfg.openai)?);
            let channels = build_channels(&cfg)?;

            let languages = Arc::new(LanguageTable::from_config(
                &cfg.languages.codes,
                cfg.languages.replace_list,
            ));
            let limiter = Arc::new(RateLimiter::new(cfg.bot.rate_limit_config()));
            let dispatcher = Arc::new(dispatch::Dispatcher::new(
                languages.clone(),
                limiter.clone(),
                translator,
                cfg.bot.clone(),
            ));

            info!("{}: starting", cfg.tolk.name);
            let gw = Arc::new(gateway::Gateway::new(
                channels,
                dispatcher,
                limiter,
                languages,
                cfg.tolk.command.clone(),
                cli.config.clone(),
            ));
            gw.run().await?;
        }
        Commands::Status => print_status(&cli.config, &cfg).await,
        Commands::Translate { code, text } => {
            cfg.validate()?;
            let languages =
                LanguageTable::from_config(&cfg.languages.codes, cfg.languages.replace_list);
            let Some(language) = languages.resolve(&code) else {
                anyhow::bail!("unknown language code: {code}. Run `tolk languages` for the list.");
            };

            let translator = OpenAiTranslator::from_config(&cfg.openai)?;
            let translation = translator
                .translate(&text.join(" "), &language)
                .await
                .map_err(|e| anyhow::anyhow!("translation failed: {e}"))?;
            println!("{translation}");
        }
        Commands::Languages => {
            let languages =
                LanguageTable::from_config(&cfg.languages.codes, cfg.languages.replace_list);
            println!("{}", commands::languages_text(&languages));
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. With a log directory set, output is
/// also written to a daily rolling file; the returned guard flushes it on drop.
fn init_tracing(cfg: &TolkConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match cfg.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", cfg.name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Build the enabled channels.
fn build_channels(cfg: &Config) -> anyhow::Result<HashMap<String, Arc<dyn Channel>>> {
    let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();

    if let Some(ref tg) = cfg.channel.telegram {
        if tg.enabled {
            if tg.bot_token.is_empty() {
                anyhow::bail!(
                    "Telegram is enabled but bot_token is empty. \
                     Set it in config.toml or TELEGRAM_BOT_TOKEN env var."
                );
            }
            let channel = TelegramChannel::new(tg.clone())
                .with_commands(commands::menu(&cfg.tolk.command));
            channels.insert("telegram".to_string(), Arc::new(channel));
        }
    }

    if channels.is_empty() {
        anyhow::bail!("No channels enabled. Enable at least one channel in config.toml.");
    }
    Ok(channels)
}

/// Build the translator and resolve its endpoint host, without calling the API.
async fn check_provider(cfg: &Config) -> anyhow::Result<String> {
    let translator = OpenAiTranslator::from_config(&cfg.openai)?;
    let url = url::Url::parse(translator.endpoint())?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("endpoint has no host"))?;
    let port = url.port_or_known_default().unwrap_or(443);
    let bare_host = host.trim_start_matches('[').trim_end_matches(']');
    let addrs = tokio::net::lookup_host((bare_host, port)).await?.count();
    Ok(format!(
        "{} ({}) ready, {host} resolves to {addrs} address(es)",
        translator.name(),
        translator.model()
    ))
}

async fn print_status(path: &str, cfg: &Config) {
    println!("tolk status\n");
    println!("Config: {path}");
    match cfg.validate() {
        Ok(()) => println!("  config: valid"),
        Err(e) => println!("  config: {e}"),
    }
    println!();

    println!("  endpoint: {}", cfg.openai.endpoint());
    println!("  model: {}", cfg.openai.model);
    match check_provider(cfg).await {
        Ok(summary) => println!("  provider: {summary}"),
        Err(e) => println!("  provider: unavailable ({e})"),
    }
    println!("  timeout: {}s", cfg.openai.timeout_secs);
    println!(
        "  api key: {}",
        if cfg.openai.api_key.is_empty() {
            "missing"
        } else {
            "set"
        }
    );

    let languages = LanguageTable::from_config(&cfg.languages.codes, cfg.languages.replace_list);
    println!(
        "  languages: {} ({})",
        languages.len(),
        if cfg.languages.replace_list {
            "configured list only"
        } else {
            "built-in plus overrides"
        }
    );
    let limit = cfg.bot.rate_limit_config();
    if limit.is_unlimited() {
        println!("  rate limit: off");
    } else {
        println!(
            "  rate limit: {} per {}s",
            limit.max_requests,
            limit.window.as_secs()
        );
    }
    println!();

    if let Some(ref tg) = cfg.channel.telegram {
        println!(
            "  telegram: {}",
            if tg.enabled && !tg.bot_token.is_empty() {
                "configured"
            } else if tg.enabled {
                "enabled but missing bot_token"
            } else {
                "disabled"
            }
        );
    } else {
        println!("  telegram: not configured");
    }
}
