//! Load test of the food ordering api: the order verification flow (or the customer
//! browse flow) driven by goose under one of the smoke/load/stress/spike profiles.
//!
//! Configuration comes from the environment (`BASE_URL`, `TEST_TYPE`, `SCENARIO`...),
//! the command line belongs to goose.
mod goose_transport;
mod scenarios;

use std::{process::ExitCode, sync::Arc};

use colored::Colorize;
use goose::prelude::*;
use order_flow::{
    config::Settings,
    error::{ConfigError, SetupError, ThresholdError},
    http::setup,
    metrics::Metrics,
    threshold::evaluate,
};
use thiserror::Error;

use crate::scenarios::RunContext;

/// exit code of a run that crossed a threshold
const THRESHOLDS_CROSSED: u8 = 99;

#[derive(Debug, Error)]
enum LoadTestError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("setup: {0}")]
    Setup(#[from] SetupError),
    #[error("thresholds: {0}")]
    Threshold(#[from] ThresholdError),
    #[error("goose: {0}")]
    Goose(#[from] GooseError),
}

#[tokio::main]
async fn main() -> Result<ExitCode, LoadTestError> {
    let settings = Settings::from_env()?;
    let thresholds = settings.profile.thresholds()?;
    let profile = settings.profile;

    println!(
        "{} TEST_TYPE={} SCENARIO={:?} BASE_URL={}",
        "[Setup]".bold(),
        profile,
        settings.scenario,
        settings.base_url
    );
    println!(
        "{} {} stages, peak {} users, {}s",
        "[Setup]".bold(),
        profile.stages().len(),
        profile.peak_users(),
        profile.total_duration().as_secs()
    );

    let metrics = Metrics::default();
    let data = match setup(&settings, &metrics).await {
        Ok(data) => data,
        Err(e) => {
            println!("{} {}", "[Setup]".bold(), e.to_string().red());
            return Err(e.into());
        }
    };
    println!(
        "{} Loaded {} APPROVED store(s) for test.",
        "[Setup]".bold(),
        data.stores.len()
    );

    let host = settings.base_url.clone();
    let run = Arc::new(RunContext::new(settings, data.session, data.stores, metrics));

    GooseAttack::initialize()?
        .set_default(GooseDefault::Host, host.as_str())?
        .set_default(GooseDefault::TestPlan, profile.test_plan().as_str())?
        .register_scenario(scenarios::build(run.clone()))
        .execute()
        .await?;

    println!("\n{}", "Custom metrics".bold());
    for metric in run.metrics.all() {
        println!("  {metric}");
    }

    println!("\n{}", "Thresholds".bold());
    let outcomes = evaluate(&run.metrics, &thresholds);
    for outcome in &outcomes {
        println!("  {outcome}");
    }

    if outcomes.iter().all(|o| o.passed()) {
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}", "some thresholds have been crossed".red());
        Ok(ExitCode::from(THRESHOLDS_CROSSED))
    }
}
