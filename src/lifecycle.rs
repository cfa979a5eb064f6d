use crate::cli::Verb;
use crate::script::Script;
use anyhow::Context;
use tracing::{debug, info};

/// Route one lifecycle verb to the script's handler
pub async fn dispatch(script: &dyn Script, verb: &Verb) -> anyhow::Result<()> {
    debug!("{} <- {:?}", script.name(), verb);
    match verb {
        Verb::Setup { config_path, setup_path } => {
            script.setup(config_path, setup_path).await.context("setup failed")?;
            info!("{} setup written to {:?}", script.name(), setup_path);
        }
        Verb::Run { setup_path, task_index, output_path } => {
            script
                .run(setup_path, *task_index, output_path)
                .await
                .with_context(|| format!("run of task {} failed", task_index))?;
        }
        Verb::Finish { setup_path } => {
            script.finish(setup_path).await.context("finish failed")?;
        }
        Verb::Drive { .. } => anyhow::bail!("drive is a host command, not a script verb"),
    }
    Ok(())
}
