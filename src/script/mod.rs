pub mod covid19;
pub mod hello;

use async_trait::async_trait;
use std::path::Path;

/// A script answering the three lifecycle verbs a host invokes
#[async_trait]
pub trait Script: Send + Sync {
    fn name(&self) -> &str;

    /// Read the configuration at `config_path`, write the setup descriptor to `setup_path`
    async fn setup(&self, config_path: &Path, setup_path: &Path) -> anyhow::Result<()>;

    /// Produce the rows of one task; returns the number of rows written
    async fn run(&self, setup_path: &Path, task_index: u32, output_path: &Path) -> anyhow::Result<usize>;

    async fn finish(&self, setup_path: &Path) -> anyhow::Result<()>;
}

/// Bundled scripts selectable with `--script`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScriptKind {
    /// Fixed five-column descriptor, three placeholder rows per task
    Hello,
    /// Country timeline fetched over HTTP, one task
    Covid19,
}

pub fn resolve(kind: ScriptKind, endpoint: &str) -> Box<dyn Script> {
    match kind {
        ScriptKind::Hello => Box::new(hello::HelloScript),
        ScriptKind::Covid19 => Box::new(covid19::Covid19Script::new(endpoint)),
    }
}
