use crate::config::{load_config, render_config};
use crate::descriptor::{load_descriptor, save_descriptor, ColumnSpec, ColumnType, SetupDescriptor};
use crate::script::Script;
use crate::util::write_rows;
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

const PLACEHOLDER_TIME: &str = "2019-01-01 00:00:00";

/// The generic example: logs its configuration, then emits the same rows for every task
pub struct HelloScript;

pub fn descriptor() -> SetupDescriptor {
    SetupDescriptor::new(
        vec![
            ColumnSpec::new("s", ColumnType::String),
            ColumnSpec::new("i", ColumnType::Long),
            ColumnSpec::new("f", ColumnType::Double),
            ColumnSpec::timestamp("t", "%Y-%m-%d %H:%M:%S"),
            ColumnSpec::new("j", ColumnType::Json),
        ],
        2,
    )
}

/// Rows for one task; the json column is left empty
pub fn rows(task_index: u32) -> Vec<Vec<String>> {
    [("a", 0.1_f64), ("b", 0.2), ("c", 0.3)]
        .iter()
        .map(|(s, f)| {
            vec![
                s.to_string(),
                task_index.to_string(),
                f.to_string(),
                PLACEHOLDER_TIME.to_string(),
                String::new(),
            ]
        })
        .collect()
}

#[async_trait]
impl Script for HelloScript {
    fn name(&self) -> &str {
        "hello"
    }

    async fn setup(&self, config_path: &Path, setup_path: &Path) -> anyhow::Result<()> {
        let config = load_config(config_path)?;
        println!("config: {}", render_config(&config));
        save_descriptor(setup_path, &descriptor())
    }

    async fn run(&self, setup_path: &Path, task_index: u32, output_path: &Path) -> anyhow::Result<usize> {
        let setup = load_descriptor(setup_path)?;
        if task_index >= setup.tasks {
            warn!("task index {} is outside the {} declared tasks", task_index, setup.tasks);
        }
        let n = write_rows(output_path, rows(task_index))?;
        info!("task {} wrote {} rows to {:?}", task_index, n, output_path);
        Ok(n)
    }

    async fn finish(&self, setup_path: &Path) -> anyhow::Result<()> {
        load_descriptor(setup_path)?;
        println!("Done.");
        Ok(())
    }
}
