use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use market_gateway::{
    providers::{MarketGateway, ib_gateway::client::GatewayClient},
    resolver::SymbolResolver,
};
use tokio::sync::watch;
use tracing::{info, warn};
use trading_cycle::{
    config::{AppConfig, load_config_path},
    cycle::TradingCycle,
    logging, runner,
    schedule::RetrySchedule,
};

#[derive(Parser)]
#[command(version, about = "Screens a ticker universe through the broker gateway")]
struct Cli {
    #[arg(long, value_name = "FILE")]
    config: PathBuf,
    /// Also append logs to this file.
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run cycles until Ctrl-C.
    Run,
    /// Run a single cycle and print what it found.
    Once,
    /// Resolve one ticker to its instrument id.
    Resolve { ticker: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;

    let config = load_config_path(&cli.config)?;

    let client = GatewayClient::new(&config.gateway, &config.rate_limits)
        .context("building gateway client")?;
    info!(base_url = client.base_url(), "gateway client ready");
    let gateway: Arc<dyn MarketGateway> = Arc::new(client);
    let resolver = Arc::new(SymbolResolver::with_options(
        Arc::clone(&gateway),
        config.resolver.ttl(),
        config.resolver.filter.clone(),
    ));

    match cli.cmd {
        Cmd::Resolve { ticker } => {
            let ticker = ticker.trim().to_uppercase();
            let id = resolver
                .resolve(&ticker)
                .await
                .with_context(|| format!("resolving {ticker}"))?;
            println!("{ticker}\t{id}");
        }
        Cmd::Once => {
            let mut cycle = TradingCycle::new(&config, gateway, resolver)?;
            let (_tx, rx) = watch::channel(false);
            let report = cycle.run_once(&rx).await?;
            report.metrics.log();

            for (ticker, result) in &report.screened {
                for signal in result.buys.iter().chain(&result.sells) {
                    println!(
                        "{ticker}\t{:?}\t{}\tclose={:.2}",
                        signal.kind, signal.timestamp, signal.row.close
                    );
                }
            }
            for failure in &report.failures {
                println!("{failure}");
            }
            for order in &report.planned {
                println!(
                    "{}\tBUY {} @ {:.2}\tstop={:?}",
                    order.ticker,
                    order.ticket.quantity,
                    order.ticket.price.unwrap_or_default(),
                    order.stop_loss
                );
            }
        }
        Cmd::Run => run_loop(&config, gateway, resolver).await?,
    }

    Ok(())
}

async fn run_loop(
    config: &AppConfig,
    gateway: Arc<dyn MarketGateway>,
    resolver: Arc<SymbolResolver>,
) -> Result<()> {
    let mut cycle = TradingCycle::new(config, gateway, resolver)?;
    let schedule = RetrySchedule::new(config.cycle.interval(), config.cycle.backoff_policy());
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                let _ = tx.send(true);
            }
            Err(err) => warn!(error = %err, "cannot listen for Ctrl-C"),
        }
    });

    info!(
        tickers = config.cycle.tickers.len(),
        interval_secs = config.cycle.interval_secs,
        account = config.account_id.as_deref().unwrap_or("-"),
        "trading loop starting"
    );
    runner::run(&mut cycle, schedule, rx).await;
    Ok(())
}
