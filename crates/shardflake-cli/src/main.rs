#![doc = include_str!("../README.md")]

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::config::{AppConfig, CliArgs, Command};
use cli::output::{to_json, to_listing};
use cli::telemetry::init_telemetry;
use shardflake::{Id, RedisStore, ReservationScript, Shardflake};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    run(config).await
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    match config.command {
        Command::Script => {
            println!(
                "{}",
                ReservationScript::render(&config.config, &config.key_prefix)
            );
        }
        Command::Decode { ref ids, json } => {
            let ids: Vec<Id> = ids.iter().copied().map(Id::from_raw).collect();
            if json {
                println!("{}", to_json(&config.config, &ids)?);
            } else {
                println!("{}", to_listing(&config.config, &ids));
            }
        }
        Command::Generate {
            data_type,
            count,
            timestamp,
            json,
        } => {
            let store = RedisStore::connect(&config.redis_url)
                .await
                .with_context(|| format!("failed to connect to Redis at {}", config.redis_url))?;
            let generator = Shardflake::with_key_prefix(
                config.config.clone(),
                store,
                &config.key_prefix,
            );

            let ids = generator.generate_ids(data_type, count, timestamp).await?;
            if json {
                println!("{}", to_json(&config.config, &ids)?);
            } else {
                for id in &ids {
                    println!("{id}");
                }
            }

            if (ids.len() as u64) < count {
                anyhow::bail!("Redis granted only {} of {count} ids", ids.len());
            }
        }
    }
    Ok(())
}

fn log_startup_info(_config: &AppConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Starting with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Starting with key prefix {} against {}",
            _config.key_prefix,
            _config.redis_url
        );
    }
}
