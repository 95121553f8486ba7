use std::env;

use anyhow::{bail, Context, Result};
use poolstats_sync::{init_tracing, RunSummary, Runner, SyncConfig};

const USAGE: &str = "usage: poolstats-sync [run | once | repair | reactivate <address>]";
const DEFAULT_LOG_DIRECTIVE: &str = "info";

enum Command {
    Run,
    Once,
    Repair,
    Reactivate(String),
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let command = match args.next().as_deref() {
            None | Some("run") => Command::Run,
            Some("once") => Command::Once,
            Some("repair") => Command::Repair,
            Some("reactivate") => {
                let address = args.next().context(USAGE)?;
                Command::Reactivate(address)
            }
            Some(other) => bail!("unknown command {other:?}\n{USAGE}"),
        };
        if let Some(extra) = args.next() {
            bail!("unexpected argument {extra:?}\n{USAGE}");
        }
        Ok(command)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", DEFAULT_LOG_DIRECTIVE);
    }
    init_tracing();

    let command = Command::parse(env::args().skip(1))?;
    let config = SyncConfig::from_env().context("failed to load configuration")?;
    let runner = Runner::new(config)?;

    match command {
        Command::Run => runner.run_until_ctrl_c().await?,
        Command::Once => print_summary(&runner.run_once().await?),
        Command::Repair => {
            let repaired = runner.repair().await?;
            println!("backfilled last_activated_at on {repaired} participant(s)");
        }
        Command::Reactivate(address) => {
            runner.reactivate(&address).await?;
            println!("reactivated {address}");
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "batches={} participants={} workers={} synced={} changed={} deactivated={} grace_holds={} errors={} repaired={} elapsed={:.2?}",
        summary.batches,
        summary.participants,
        summary.workers,
        summary.synced,
        summary.changed,
        summary.deactivated,
        summary.grace_holds,
        summary.errors,
        summary.repaired,
        summary.elapsed,
    );
}
