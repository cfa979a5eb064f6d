use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Command;

/// Captured result of one script invocation
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

/// Backend trait: run a command line and return its output and exit status
#[async_trait]
pub trait Backend: Send + Sync {
    async fn run(
        &self,
        cmd: &str,
        cwd: Option<&Path>,
        env: &HashMap<String, String>,
        timeout_secs: Option<u64>,
    ) -> anyhow::Result<CommandOutput>;
}

/// Local backend: runs in host shell (PowerShell on Windows, sh on Unix)
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self {}
    }
}

fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("powershell.exe");
        c.arg("-NoLogo").arg("-NoProfile").arg("-Command").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn run(
        &self,
        cmd: &str,
        cwd: Option<&Path>,
        env: &HashMap<String, String>,
        timeout_secs: Option<u64>,
    ) -> anyhow::Result<CommandOutput> {
        let mut c = shell_command(cmd);
        if let Some(dir) = cwd {
            c.current_dir(dir);
        }
        c.envs(env).kill_on_drop(true);

        let output = match timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), c.output())
                .await
                .map_err(|_| anyhow::anyhow!("local backend timed out after {}s", secs))?
                .context("local backend failed to run process")?,
            None => c.output().await.context("local backend failed to run process")?,
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        })
    }
}
