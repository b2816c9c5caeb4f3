//! objcache operator CLI
//!
//! Loads settings and environment overrides, runs one command against the
//! object cache and prints the JSON report.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use objcache_cli::{Args, LogFormat, execute, prepare_config, render};
use objcache_domain::BlogId;
use objcache_persistence::{ObjectCache, ObjectCacheConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);

    let mut config = ObjectCacheConfig::load(args.settings.as_deref())?;
    prepare_config(&mut config, &args.command);

    tracing::info!(
        version = objcache_persistence::VERSION,
        endpoint = %config.redis.endpoint(),
        disabled = config.disabled,
        "Starting objcache"
    );

    let mut cache = ObjectCache::connect(&config)?;
    if let Some(blog_id) = args.blog_id {
        cache.switch_to_blog(BlogId(blog_id));
    }

    let report = execute(&mut cache, &args.command).await?;
    cache.close();

    println!("{}", render(&report, args.pretty)?);
    Ok(())
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Plain => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
