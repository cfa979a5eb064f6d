mod cli;
mod config;
mod descriptor;
mod host;
mod lifecycle;
mod script;
mod util;

use anyhow::Context;
use cli::Verb;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout belongs to the host
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = cli::get_opts();
    match &opts.verb {
        Verb::Drive { driver_path, output } => {
            let summary = host::drive_file(driver_path, output.as_deref())
                .await
                .with_context(|| format!("drive of {:?} failed", driver_path))?;
            tracing::info!("{} tasks, {} records", summary.tasks, summary.records);
        }
        verb => {
            let script = script::resolve(opts.script, &opts.endpoint);
            lifecycle::dispatch(script.as_ref(), verb).await?;
        }
    }

    Ok(())
}
