use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use point_economy::config::Args;
use point_economy::csv::{CsvError, read_events, write_accounts};
use point_economy::gateway::ConsoleGateway;
use point_economy::market::MarketDocument;
use point_economy::store::JsonFileStore;
use point_economy::{Bot, Ledger, LedgerDocument, Marketplace};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match args.economy() {
        Ok(config) => config,
        Err(reason) => {
            error!(%reason, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if args.events.extension().is_none_or(|ext| ext != "csv") {
        warn!(path = %args.events.display(), "input file seems to not be a csv file");
    }
    let events = match read_events(&args.events) {
        Ok(events) => events,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let ledger = Arc::new(Ledger::new(JsonFileStore::<LedgerDocument>::new(
        args.ledger_path(),
    )));
    let market = Arc::new(Marketplace::new(
        JsonFileStore::<MarketDocument>::new(args.market_path()),
        config.purchase_policy,
    ));
    let mut bot = Bot::new(config, ledger.clone(), market, Arc::new(ConsoleGateway::new()));
    let (event_sender, event_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in events {
            match result {
                Ok(event) => {
                    if event_sender.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    bot.run(ReceiverStream::new(event_receiver)).await;

    if let Some(path) = &args.accounts_out {
        let written = File::create(path)
            .map_err(CsvError::from)
            .and_then(|file| write_accounts(BufWriter::new(file), &ledger.snapshot()));
        if let Err(e) = written {
            error!(path = %path.display(), "{e}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
