use crate::config::{load_drive_config, DriveConfig};
use crate::descriptor::{load_descriptor, validate_descriptor, SetupDescriptor};
use crate::host::backend::{Backend, CommandOutput, LocalBackend};
use crate::host::records::{read_records, Record};
use crate::util::{command_line, create_run_dir, write_artifact};
use anyhow::Context;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Counts reported after a successful drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveSummary {
    pub tasks: u32,
    pub records: usize,
}

fn resolve_out_path(work_dir: &Path, task_index: u32) -> PathBuf {
    work_dir.join(format!("output-{}.csv", task_index))
}

/// Public entry used by main.rs
pub async fn drive_file(path: &Path, output: Option<&Path>) -> anyhow::Result<DriveSummary> {
    let config = load_drive_config(path)?;
    let base = std::env::temp_dir().join("scriptpipe");
    let mut sink: Box<dyn Write> = match output {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).with_context(|| format!("failed to create {:?}", p))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    let summary = drive(&config, &base, &LocalBackend::new(), &mut sink).await?;
    sink.flush()?;
    Ok(summary)
}

/// Take a script through setup, one run per task, and finish; validated records go to `sink`.
///
/// The work dir is removed after a successful finish and kept when any step fails.
pub async fn drive(
    config: &DriveConfig,
    base: &Path,
    backend: &dyn Backend,
    sink: &mut dyn Write,
) -> anyhow::Result<DriveSummary> {
    let work_dir = create_run_dir(base)?;
    info!("working directory {:?}", work_dir);

    let config_yaml = serde_yaml::to_string(&config.config)?;
    let config_path = write_artifact(&work_dir, "config.yml", &config_yaml).context("failed to create config.yml file")?;
    let setup_path = work_dir.join("setup.yml");

    // <command> setup config.yml setup.yml
    invoke(config, backend, "setup", &[path_arg(&config_path), path_arg(&setup_path)], &config.env).await?;

    let setup: SetupDescriptor =
        load_descriptor(&setup_path).context("setup command didn't create appropriate setup.yml")?;
    validate_descriptor(&setup)?;
    info!("setup declares {} columns over {} tasks", setup.columns.len(), setup.tasks);

    let mut total = 0;
    let result = run_tasks(config, backend, &setup, &setup_path, &work_dir, sink, &mut total).await;
    cleanup(&work_dir, setup.tasks);
    result?;

    // <command> finish setup.yml
    invoke(config, backend, "finish", &[path_arg(&setup_path)], &config.env).await?;

    if let Err(e) = std::fs::remove_dir_all(&work_dir) {
        warn!("could not remove {:?}: {}", work_dir, e);
    }

    info!("drive finished: {} records from {} tasks", total, setup.tasks);
    Ok(DriveSummary { tasks: setup.tasks, records: total })
}

async fn run_tasks(
    config: &DriveConfig,
    backend: &dyn Backend,
    setup: &SetupDescriptor,
    setup_path: &Path,
    work_dir: &Path,
    sink: &mut dyn Write,
    total: &mut usize,
) -> anyhow::Result<()> {
    for task_index in 0..setup.tasks {
        let out_path = resolve_out_path(work_dir, task_index);
        if out_path.exists() {
            std::fs::remove_file(&out_path).with_context(|| format!("failed to remove {:?}", out_path))?;
        }

        let mut env = config.env.clone();
        env.insert("INDEX".to_string(), task_index.to_string());

        // <command> run setup.yml <index> output-<index>.csv
        let args = [path_arg(setup_path), task_index.to_string(), path_arg(&out_path)];
        invoke(config, backend, "run", &args, &env).await?;

        let file = std::fs::File::open(&out_path)
            .with_context(|| format!("run command didn't create output file for task {}", task_index))?;
        let records = read_records(file, setup)
            .with_context(|| format!("failed to parse output file {}", task_index))?;
        write_records(sink, &records)?;
        info!("task {} produced {} records", task_index, records.len());
        *total += records.len();
    }
    Ok(())
}

/// Runs one lifecycle verb. The child's stdout is relayed at info and its stderr at
/// warn, each stream in its own order; lines of the two are not interleaved.
async fn invoke(
    config: &DriveConfig,
    backend: &dyn Backend,
    verb: &str,
    args: &[String],
    env: &HashMap<String, String>,
) -> anyhow::Result<CommandOutput> {
    let mut full = vec![verb.to_string()];
    full.extend_from_slice(args);
    let cmd = command_line(&config.run, &full);
    info!("Running command: {}", cmd);

    let cwd = (!config.cwd.is_empty()).then(|| Path::new(&config.cwd));
    let out = backend
        .run(&cmd, cwd, env, config.timeout)
        .await
        .with_context(|| format!("failed to start {} command", verb))?;

    for line in out.stdout.lines() {
        info!("[{}] {}", verb, line);
    }
    for line in out.stderr.lines() {
        warn!("[{}] {}", verb, line);
    }
    if !out.status.success() {
        let code = out.status.code().map(|c| c.to_string()).unwrap_or_else(|| "none (killed by signal)".to_string());
        anyhow::bail!("{} command exited with error code {}", capitalize(verb), code);
    }
    Ok(out)
}

fn write_records(sink: &mut dyn Write, records: &[Record]) -> anyhow::Result<()> {
    for r in records {
        serde_json::to_writer(&mut *sink, r)?;
        sink.write_all(b"\n")?;
    }
    Ok(())
}

fn cleanup(work_dir: &Path, tasks: u32) {
    for i in 0..tasks {
        let out_path = resolve_out_path(work_dir, i);
        if let Err(e) = std::fs::remove_file(&out_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("could not remove {:?}: {}", out_path, e);
            }
        }
    }
}

fn path_arg(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(first) => first.to_uppercase().chain(c).collect(),
        None => String::new(),
    }
}
