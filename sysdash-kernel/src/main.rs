/**
 * SYSDASH - node entry point
 *
 * Config file, then environment, then CLI flags. Logging starts before the
 * config is read and is switched to debug afterwards if the config asks.
 */

use anyhow::Result;
use clap::Parser;
use sysdash_kernel::cli::CliArgs;
use sysdash_kernel::{load_config, Runner};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter};

fn filter(debug: bool) -> EnvFilter {
    let default = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();

    let (filter_layer, filter_handle) = reload::Layer::new(filter(args.debug));
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .init();

    let mut config = load_config().await;
    config.apply_env_overrides();
    args.apply(&mut config);
    if config.debug && !args.debug {
        filter_handle.modify(|f| *f = filter(true))?;
    }

    let runner = Runner::bind(config).await?;
    info!(
        "sysdash {} started as {} ({})",
        if runner.config().agent { "agent" } else { "master" },
        runner.local_node().name,
        runner.local_node().key()
    );
    runner.run().await
}
