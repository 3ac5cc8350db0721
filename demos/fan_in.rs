use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use futura::{error::Error, future::Future};
use log::error;

/// A futura fan-in example.
///
/// Starts one delayed task per requested duration, waits for all of them and
/// reports them in input order. Afterwards the same durations are replayed one
/// at a time with `foreach`.
#[derive(Parser, Debug)]
struct Args {
    /// Task durations in milliseconds. A duration of 0 fails its task.
    #[arg(default_values_t = [300, 100, 200])]
    durations: Vec<u64>,
}

fn task(ms: u64) -> Future<u64> {
    Future::delay(
        move || {
            if ms == 0 {
                Error::custom("task", "asked to fail").raise();
            }
            ms
        },
        Duration::from_millis(ms),
    )
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let started = Instant::now();

    match Future::wait(args.durations.iter().copied().map(task)).try_join() {
        Ok(values) => {
            println!("all done after {:?}", started.elapsed());
            for (i, ms) in values.iter().enumerate() {
                println!("  task {i}: {ms}ms");
            }
        }
        Err(Error::Aggregate(failures)) => {
            for (i, e) in failures.into_errors() {
                error!("task {i} failed: {e}");
            }
        }
        Err(e) => return Err(e).context("Could not gather tasks"),
    }

    let started = Instant::now();
    Future::foreach(args.durations, |ms| {
        task(ms).then(move |ms| println!("  replayed {ms}ms"))
    })
    .try_join()
    .context("Replay stopped early")?;

    println!("replay done after {:?}", started.elapsed());

    Ok(())
}
