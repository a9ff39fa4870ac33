use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use oddsledger::analytics::allocation::allocate;
use oddsledger::analytics::settlement::BetResult;
use oddsledger::config::{Command, Config};
use oddsledger::feed::{read_legacy_feed, read_match_feed};
use oddsledger::reconcile::{reconcile, MatchSnapshot};
use oddsledger::report::{self, OutputMode, SummaryRow};
use oddsledger::store::{Side, StoreBackend};

fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let store = config.open_store()?;
    info!(store = %store.describe(), group = %config.group, "Store opened");

    match &config.command {
        Command::Ingest { feed } => {
            let batch = read_match_feed(feed, &config.group, &config.unknown_time_label)?;
            ingest(&config, store.as_ref(), batch)
        }
        Command::IngestLegacy { feed } => {
            let batch = read_legacy_feed(feed, &config.group, &config.unknown_time_label)?;
            ingest(&config, store.as_ref(), batch)
        }
        Command::SetOdds { match_id, side, odds } => {
            let side: Side = side.parse()?;
            let quote = config.odds_config().parse(odds);
            if !quote.is_available() {
                warn!(match_id = %match_id, token = %odds, "Odds token not understood, storing N/A");
            }
            let mut book = store.load()?;
            let metrics = book.set_platform_odds(match_id, side, quote)?;
            store.commit(&book)?;
            info!(
                match_id = %match_id,
                %side,
                kelly_a = ?metrics.side_a.kelly,
                kelly_b = ?metrics.side_b.kelly,
                "Platform odds recorded"
            );
            Ok(())
        }
        Command::Report { json } => {
            let book = store.load()?;
            let rows = report::metrics_rows(&book.side_views());
            report::print_items(&rows, OutputMode::from_json_flag(*json))
        }
        Command::Allocate { bankroll, json } => {
            let book = store.load()?;
            let plan = allocate(book.rank_opportunities(), *bankroll, &config.allocation_config());
            let mode = OutputMode::from_json_flag(*json);
            match mode {
                OutputMode::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                OutputMode::Table => {
                    report::print_items(&report::allocation_rows(&plan), mode)?;
                    println!("{}", report::allocation_footer(&plan));
                }
            }
            Ok(())
        }
        Command::Bet { match_id, side, stake } => {
            let side: Side = side.parse()?;
            let mut book = store.load()?;
            book.place_bet(match_id, side, *stake)?;
            store.commit(&book)?;
            info!(match_id = %match_id, %side, stake, "Bet recorded");
            Ok(())
        }
        Command::Settle { match_id, side, result } => {
            let side: Side = side.parse()?;
            let result: BetResult = result.parse()?;
            let mut book = store.load()?;
            book.settle_bet(match_id, side, result)?;
            store.commit(&book)?;
            info!(match_id = %match_id, %side, %result, "Bet settled");
            Ok(())
        }
        Command::Stats { days, json } => {
            let book = store.load()?;
            let times = config.time_parser();
            let rows = [
                SummaryRow::new("all", &book.ledger_summary(&times, None)),
                SummaryRow::new(format!("last {days}d"), &book.ledger_summary(&times, Some(*days))),
            ];
            report::print_items(&rows, OutputMode::from_json_flag(*json))
        }
    }
}

fn ingest(config: &Config, store: &dyn StoreBackend, batch: Vec<MatchSnapshot>) -> Result<()> {
    let book = store.load()?;
    let outcome = reconcile(book, batch, &config.reconcile_config());
    store
        .commit(&outcome.book)
        .with_context(|| format!("Failed to commit {}", store.describe()))?;

    for record in &outcome.new_records {
        info!(
            match_id = %record.match_id,
            time = %record.time_label,
            team_a = %record.team_a,
            team_b = record.team_b.as_deref().unwrap_or("-"),
            "Match added"
        );
    }
    info!(
        new = outcome.new_records.len(),
        updated = outcome.updated.len(),
        skipped = outcome.skipped,
        "Ingest complete"
    );
    Ok(())
}
