use std::{thread, time::Duration};

use anyhow::Context;
use clap::Parser;
use futura::{
    error::{Error, ErrorKind},
    task::{Config, Executor},
};
use log::{debug, info};

/// A futura pipeline example.
///
/// Parses each input in the background, scales it, and recovers from inputs
/// that are not numbers or that take too long to parse.
#[derive(Parser, Debug)]
struct Args {
    /// Number of pool workers. Spawns a thread per task when not given.
    #[arg(short, long)]
    workers: Option<usize>,

    /// How long a single parse may take, in milliseconds.
    #[arg(short, long, default_value_t = 200)]
    deadline: u64,

    /// Values to push through the pipeline. A value prefixed with `slow:`
    /// takes a second to parse.
    #[arg(default_values_t = ["4".to_string(), "x".to_string(), "slow:9".to_string()])]
    inputs: Vec<String>,
}

fn parse(input: &str) -> futura::Result<i64> {
    let input = match input.strip_prefix("slow:") {
        Some(rest) => {
            thread::sleep(Duration::from_secs(1));
            rest
        }
        None => input,
    };

    input
        .parse()
        .map_err(|e| Error::custom("parse", format!("{input:?}: {e}")))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let executor = match args.workers {
        Some(n) => Executor::new(Config::from_env().with_workers(n))
            .context("Could not start worker pool")?,
        None => Executor::thread_per_task(Config::from_env()),
    };

    let deadline = Duration::from_millis(args.deadline);

    for input in args.inputs {
        debug!("submitting {input:?}");

        let label = input.clone();
        let result = executor
            .timeout_with(move |token| {
                let n = parse(&input)?;
                token.check()?;
                Ok(n)
            }, deadline)
            .then(|n| n * 10)
            .catch(ErrorKind::Custom("parse"), |e| info!("skipping bad input, {e}"))
            .catch(ErrorKind::Timeout, |e| info!("giving up, {e}"))
            .complete(move || debug!("{label:?} done"));

        println!("{}", result.try_join().context("Pipeline failed")?);
    }

    executor.shutdown();

    Ok(())
}
