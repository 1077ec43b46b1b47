use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{info, warn};

use operator::geometry::CalibrationOffset;
use operator::speech::{Narrator, SayNarrator};
use operator::synth::{InputSynthesizer, SynthesizerConfig};
use operator::{
    Agent, AgentConfig, CredentialPool, EnigoBackend, GeminiClient, RunOutcome, XcapCapture,
};

use crate::utils::{init_logging, Args};

mod calibrate;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging()?;
    let args = Args::parse();

    if args.calibrate {
        return calibrate::run();
    }

    let Some(task) = args.task else {
        // No task and no mode flag: show the synopsis, then fail.
        Args::command().print_help()?;
        println!();
        std::process::exit(2);
    };

    // Credentials are fatal before the loop starts; mid-run exhaustion is
    // handled by the loop itself.
    let pool = Arc::new(CredentialPool::from_env().context("loading credentials")?);

    let backend = EnigoBackend::new().context("initializing input backend")?;
    let synth = InputSynthesizer::new(
        backend,
        CalibrationOffset::from_env(),
        SynthesizerConfig::default(),
    );
    let narrator: Option<Box<dyn Narrator>> =
        (!args.quiet).then(|| Box::new(SayNarrator) as Box<dyn Narrator>);
    let mut agent = Agent::new(
        Box::new(XcapCapture),
        Box::new(GeminiClient::new(pool)),
        narrator,
        synth,
        AgentConfig::default(),
    );

    match agent.run(&task).await.context("running task")? {
        RunOutcome::Done => info!("task reported complete"),
        RunOutcome::BudgetExhausted => {
            warn!("stopping: step budget exhausted before the task reported completion");
        }
    }
    Ok(())
}
