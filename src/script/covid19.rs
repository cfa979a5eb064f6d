use crate::descriptor::{load_descriptor, save_descriptor, ColumnSpec, ColumnType, SetupDescriptor};
use crate::script::Script;
use crate::util::write_rows;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

pub const DEFAULT_ENDPOINT: &str = "https://thevirustracker.com/timeline/map-data.json";

const NUMERIC_FIELDS: [&str; 3] = ["cases", "deaths", "recovered"];

/// Body of the timeline endpoint: `{"data": [{...}, ...]}`
#[derive(Debug, Deserialize)]
pub struct Timeline {
    pub data: Vec<Map<String, Value>>,
}

/// Fetches a per-country case timeline and writes it as a single task
pub struct Covid19Script {
    endpoint: String,
}

impl Covid19Script {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    async fn fetch(&self) -> anyhow::Result<Timeline> {
        info!("fetching {}", self.endpoint);
        let resp = reqwest::Client::new()
            .get(&self.endpoint)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.endpoint))?
            .error_for_status()?;
        let timeline: Timeline = resp
            .json()
            .await
            .with_context(|| format!("{} did not return timeline JSON", self.endpoint))?;
        Ok(timeline)
    }
}

pub fn descriptor() -> SetupDescriptor {
    SetupDescriptor::new(
        vec![
            ColumnSpec::new("countrycode", ColumnType::String),
            ColumnSpec::timestamp("date", "%m/%d/%y"),
            ColumnSpec::new("cases", ColumnType::Long),
            ColumnSpec::new("deaths", ColumnType::Long),
            ColumnSpec::new("recovered", ColumnType::Long),
        ],
        1,
    )
}

fn field(record: &Map<String, Value>, key: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn or_zero(value: String) -> String {
    if value.is_empty() {
        "0".to_string()
    } else {
        value
    }
}

pub fn rows(timeline: &Timeline) -> Vec<Vec<String>> {
    timeline
        .data
        .iter()
        .map(|record| {
            let mut row = vec![field(record, "countrycode"), field(record, "date")];
            row.extend(NUMERIC_FIELDS.iter().map(|k| or_zero(field(record, k))));
            row
        })
        .collect()
}

#[async_trait]
impl Script for Covid19Script {
    fn name(&self) -> &str {
        "covid19"
    }

    async fn setup(&self, _config_path: &Path, setup_path: &Path) -> anyhow::Result<()> {
        save_descriptor(setup_path, &descriptor())
    }

    async fn run(&self, setup_path: &Path, task_index: u32, output_path: &Path) -> anyhow::Result<usize> {
        load_descriptor(setup_path)?;
        let timeline = self.fetch().await?;
        let n = write_rows(output_path, rows(&timeline))?;
        info!("task {} wrote {} rows to {:?}", task_index, n, output_path);
        Ok(n)
    }

    async fn finish(&self, _setup_path: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}
