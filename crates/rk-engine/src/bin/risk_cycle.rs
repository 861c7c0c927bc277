//! Nightly batch entry point.
//!
//! Usage: `risk-cycle <data-dir> <as-of YYYY-MM-DD> [out-dir]`
//!
//! Loads the CSV feeds under `data-dir` and an optional JSON configuration
//! (path in `RISK_CONFIG`), runs the scoring and measurement cycles for the
//! as-of date, appends records to the JSONL store under `out-dir` and writes
//! the roll-up reports next to it.

use anyhow::Context;
use chrono::NaiveDate;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rk_data::{load_snapshot, OutputStore};
use rk_engine::{MeasurementCycle, ScoringCycle};
use rk_report::{CreditReporter, MarketReporter};
use rk_types::RiskConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "risk_cycle=info,rk_engine=info,rk_data=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let data_dir = args
        .next()
        .context("usage: risk-cycle <data-dir> <as-of YYYY-MM-DD> [out-dir]")?;
    let as_of: NaiveDate = args
        .next()
        .context("missing as-of date")?
        .parse()
        .context("as-of date must be YYYY-MM-DD")?;
    let out_dir = args.next().unwrap_or_else(|| "out".to_string());

    let config = match std::env::var("RISK_CONFIG") {
        Ok(path) => RiskConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        Err(_) => RiskConfig::default(),
    };

    let snapshot = load_snapshot(&data_dir, as_of)
        .with_context(|| format!("loading feeds from {data_dir}"))?;
    std::fs::create_dir_all(&out_dir)?;
    let store = OutputStore::open(&out_dir)?;

    let scoring = ScoringCycle::new(config.clone()).run(&snapshot, &store)?;
    let measurement = MeasurementCycle::new(config.clone()).run(&snapshot, &store)?;

    let (credit_report, credit_exceptions) =
        CreditReporter::new(config.capital.clone()).roll_up(as_of, &store.scores_at(as_of));
    let market_report = MarketReporter::new().roll_up(as_of, &store.measurements_at(as_of));

    write_json(&out_dir, "credit_report.json", &credit_report)?;
    write_json(&out_dir, "credit_exceptions.json", &credit_exceptions)?;
    write_json(&out_dir, "market_report.json", &market_report)?;
    write_json(&out_dir, "scoring_cycle.json", &scoring)?;
    write_json(&out_dir, "measurement_cycle.json", &measurement)?;

    info!(
        %as_of,
        customers_scored = scoring.completed,
        portfolios_measured = measurement.completed,
        scoring_exceptions = scoring.exceptions.len(),
        measurement_exceptions = measurement.exceptions.len(),
        "cycle complete"
    );
    Ok(())
}

fn write_json<T: serde::Serialize>(dir: &str, name: &str, value: &T) -> anyhow::Result<()> {
    let path = std::path::Path::new(dir).join(name);
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
