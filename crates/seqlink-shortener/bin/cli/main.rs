mod cli;

use crate::cli::{Command, CounterBackendArg, LogFormatArg, StoreBackendArg, CLI};
use clap::Parser;
use seqlink_core::{RecordStore, SequenceCounter, Shortener};
use seqlink_shortener::{ShortenerService, ShortenerSettings};
use seqlink_storage::mysql::migrate;
use seqlink_storage::{
    InMemoryCounter, InMemoryRecordStore, MySqlCounter, MySqlRecordStore, RedisCounter,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Service = ShortenerService<Box<dyn RecordStore>, Box<dyn SequenceCounter>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;
    init_tracing(config.log_format);
    config.check_backends()?;

    info!(
        store_backend = %config.store,
        counter_backend = %config.counter_backend(),
        "starting seqlink"
    );

    match config.command {
        Command::Encode { sequence } => {
            println!("{}", config.alphabet.encode(sequence));
            return Ok(());
        }
        Command::Decode { ref code } => {
            println!("{}", config.alphabet.decode(code)?);
            return Ok(());
        }
        _ => {}
    }

    let service = build_service(&config).await?;

    match config.command {
        Command::Shorten { urls } => {
            for url in urls {
                let code = service.shorten(&url).await?;
                match &config.base_url {
                    Some(base_url) => println!("{}", code.to_url(base_url)),
                    None => println!("{code}"),
                }
            }
        }
        Command::Resolve { code } => println!("{}", service.resolve(&code).await?),
        Command::Inspect { code } => {
            let record = service.inspect(&code).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Status => println!("{}", service.counter().peek().await?),
        Command::Encode { .. } | Command::Decode { .. } => {}
    }

    Ok(())
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

async fn build_service(config: &CLI) -> Result<Service, Box<dyn std::error::Error>> {
    let mysql = match &config.mysql_dsn {
        Some(dsn) if uses_mysql(config) => {
            let store = MySqlRecordStore::connect(dsn).await?;
            if config.migrate {
                migrate(store.pool()).await?;
            }
            Some(store)
        }
        _ => None,
    };

    let counter: Box<dyn SequenceCounter> = match (config.counter_backend(), &mysql) {
        (CounterBackendArg::InMemory, _) => Box::new(InMemoryCounter::new()),
        (CounterBackendArg::Mysql, Some(store)) => Box::new(
            MySqlCounter::open(store.pool().clone(), config.counter_name.as_str()).await?,
        ),
        (CounterBackendArg::Mysql, None) => {
            return Err("mysql dsn is required when the counter backend is mysql".into())
        }
        (CounterBackendArg::Redis, _) => {
            let redis_url = config
                .redis_url
                .as_deref()
                .ok_or("redis url is required when the counter backend is redis")?;
            Box::new(RedisCounter::connect(redis_url, config.counter_name.as_str()).await?)
        }
    };

    let store: Box<dyn RecordStore> = match (config.store, mysql) {
        (StoreBackendArg::InMemory, _) => Box::new(InMemoryRecordStore::new()),
        (StoreBackendArg::Mysql, Some(store)) => Box::new(store),
        (StoreBackendArg::Mysql, None) => {
            return Err("mysql dsn is required when the store backend is mysql".into())
        }
    };

    let settings = ShortenerSettings::builder()
        .alphabet(config.alphabet.clone())
        .reserved_codes(config.reserved_codes.clone())
        .build();

    Ok(ShortenerService::with_settings(store, counter, settings)?)
}

fn uses_mysql(config: &CLI) -> bool {
    config.store == StoreBackendArg::Mysql || config.counter_backend() == CounterBackendArg::Mysql
}
