use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Value types a column of the output rows may carry
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    String,
    Long,
    Double,
    Timestamp,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
    /// strftime pattern, only meaningful for timestamp columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self { name: name.into(), kind, format: None }
    }

    pub fn timestamp(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnType::Timestamp,
            format: Some(format.into()),
        }
    }
}

/// Setup descriptor written by `setup` and read back by `run` and `finish`.
///
/// Keys other than `columns` and `tasks` are kept in `extra` so a script can carry
/// its own settings from `setup` to `run`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SetupDescriptor {
    pub columns: Vec<ColumnSpec>,
    #[serde(default = "default_tasks")]
    pub tasks: u32,
    /// Used by timestamp columns that declare no `format`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timestamp_format: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_tasks() -> u32 {
    1
}

impl SetupDescriptor {
    pub fn new(columns: Vec<ColumnSpec>, tasks: u32) -> Self {
        Self {
            columns,
            tasks,
            default_timestamp_format: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Load a setup descriptor from YAML
pub fn load_descriptor(path: &Path) -> anyhow::Result<SetupDescriptor> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    let d: SetupDescriptor = serde_yaml::from_str(&content).with_context(|| format!("failed to parse YAML {:?}", path))?;
    Ok(d)
}

/// Write a setup descriptor as YAML, replacing any existing file
pub fn save_descriptor(path: &Path, descriptor: &SetupDescriptor) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(descriptor)?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

/// Checks the host needs before reading rows: at least one column, unique names
pub fn validate_descriptor(d: &SetupDescriptor) -> anyhow::Result<()> {
    if d.columns.is_empty() {
        anyhow::bail!("setup descriptor declares no columns");
    }
    let mut names = HashSet::new();
    for c in &d.columns {
        if !names.insert(c.name.as_str()) {
            anyhow::bail!("duplicate column name '{}'", c.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_default_to_one() {
        let d: SetupDescriptor = serde_yaml::from_str("columns:\n- name: a\n  type: string\n").unwrap();
        assert_eq!(d.tasks, 1);
        assert_eq!(d.columns, vec![ColumnSpec::new("a", ColumnType::String)]);
    }

    #[test]
    fn format_only_written_when_present() {
        let d = SetupDescriptor::new(
            vec![
                ColumnSpec::new("s", ColumnType::String),
                ColumnSpec::timestamp("t", "%Y-%m-%d"),
            ],
            2,
        );
        let yaml = serde_yaml::to_string(&d).unwrap();
        assert_eq!(yaml.matches("format").count(), 1);
        assert!(yaml.contains("tasks: 2"));
    }

    #[test]
    fn unknown_keys_survive_a_rewrite() {
        let src = "columns:\n- name: id\n  type: long\ntasks: 3\nregion_name: eu-west-1\n";
        let d: SetupDescriptor = serde_yaml::from_str(src).unwrap();
        assert_eq!(d.extra.get("region_name").and_then(|v| v.as_str()), Some("eu-west-1"));

        let again: SetupDescriptor = serde_yaml::from_str(&serde_yaml::to_string(&d).unwrap()).unwrap();
        assert_eq!(again, d);
    }

    #[test]
    fn default_timestamp_format_is_typed() {
        let src = "columns:\n- name: t\n  type: timestamp\ndefault_timestamp_format: '%Y/%m/%d'\n";
        let d: SetupDescriptor = serde_yaml::from_str(src).unwrap();
        assert_eq!(d.default_timestamp_format.as_deref(), Some("%Y/%m/%d"));
        assert!(d.extra.is_empty());
        assert!(!serde_yaml::to_string(&SetupDescriptor::new(vec![], 1)).unwrap().contains("default_timestamp_format"));
    }

    #[test]
    fn unknown_column_type_is_rejected() {
        let r: Result<SetupDescriptor, _> = serde_yaml::from_str("columns:\n- name: a\n  type: blob\n");
        assert!(r.is_err());
    }

    #[test]
    fn validate_rejects_duplicates_and_empty() {
        let dup = SetupDescriptor::new(
            vec![ColumnSpec::new("a", ColumnType::Long), ColumnSpec::new("a", ColumnType::String)],
            1,
        );
        assert!(validate_descriptor(&dup).is_err());
        assert!(validate_descriptor(&SetupDescriptor::new(vec![], 1)).is_err());
    }
}
