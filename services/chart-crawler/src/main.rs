//!
//! src/main.rs  Andrew Belles  Oct 6th, 2025
//!
//! Entry point of the chart crawler. Wires configuration, the listing
//! source, the store and the viewer together behind three commands:
//!   once   run a single cycle and exit
//!   watch  crawl on an interval and serve the viewer
//!   serve  only serve the viewer
//!

mod config;
mod errors;
mod logging;

mod clock;
mod crawler;
mod fetch;
mod matcher;
mod merge;
mod notify;
mod retention;
mod server;
mod store;
mod types;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::errors::CrawlerError;

#[derive(Debug, Parser)]
#[command(name = "chart-crawler", version, about = "Newest-songs crawler for a tracked artist roster")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one fetch/merge/retention cycle and exit
    Once,
    /// Crawl periodically and serve the viewer
    Watch,
    /// Serve the viewer over the existing data file
    Serve,
}

fn build_crawler(cfgs: &AppConfig) -> Result<crawler::Crawler, CrawlerError> {
    let source = fetch::GenieChartSource::new(&cfgs.http, &cfgs.source)?;
    let crawler = crawler::Crawler::new(
        Arc::new(source),
        store::RecordStore::new(&cfgs.store.data_file),
        cfgs.roster.clone(),
        Arc::new(retention::AgingPolicy::new(cfgs.retention.tracked_window_days)?),
        Arc::new(clock::SystemClock),
        cfgs.http.timeout
    );

    if cfgs.sync.enabled {
        let notifier = notify::GitPushNotifier::new(&cfgs.sync);
        return Ok(crawler.with_notifier(Arc::new(notifier)));
    }
    Ok(crawler)
}

#[tokio::main]
async fn main() -> Result<(), CrawlerError> {
    let cli  = Cli::parse();
    let cfgs = config::load_config()?;
    let _log = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service="chart-crawler",
        version=%env!("CARGO_PKG_VERSION"),
        artists=cfgs.roster.artists.len(),
        data_file=%cfgs.store.data_file.display(),
        "starting"
    );

    match cli.command {
        Command::Once => {
            let crawler = build_crawler(&cfgs)?;
            let report = crawler.run_cycle().await;
            if !report.persisted {
                return Err(CrawlerError::Store(
                    format!("failed to persist {}", cfgs.store.data_file.display())
                ));
            }
        }
        Command::Watch => {
            let crawler = Arc::new(build_crawler(&cfgs)?);
            let shutdown = crawler.shutdown();
            let viewer = tokio::spawn(server::serve(
                cfgs.schedule.bind_addr,
                crawler.store().clone(),
                shutdown.clone()
            ));

            crawler.run(cfgs.schedule.interval).await;
            shutdown.cancel();
            match viewer.await {
                Ok(result) => result?,
                Err(e) => tracing::error!(error = %e, "server.join.failed"),
            }
        }
        Command::Serve => {
            let shutdown = tokio_util::sync::CancellationToken::new();
            let trigger = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });
            server::serve(
                cfgs.schedule.bind_addr,
                store::RecordStore::new(&cfgs.store.data_file),
                shutdown
            ).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        assert!(matches!(Cli::parse_from(["chart-crawler", "once"]).command, Command::Once));
        assert!(matches!(Cli::parse_from(["chart-crawler", "watch"]).command, Command::Watch));
        assert!(matches!(Cli::parse_from(["chart-crawler", "serve"]).command, Command::Serve));
    }
}
