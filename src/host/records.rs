use crate::descriptor::{ColumnSpec, ColumnType, SetupDescriptor};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::io::Read;

/// One validated output row, keyed by column name
pub type Record = Map<String, Value>;

const TRUE_STRINGS: [&str; 14] = [
    "true", "True", "TRUE", "yes", "Yes", "YES", "t", "T", "y", "Y", "on", "On", "ON", "1",
];

/// Timestamp pattern for columns without `format` when the descriptor sets no default
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// Parse a task's CSV output (no header) against the descriptor's columns.
///
/// An unquoted empty field is null; a quoted `""` is an empty string.
pub fn read_records<R: Read>(mut reader: R, setup: &SetupDescriptor) -> anyhow::Result<Vec<Record>> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw).context("failed to read output")?;

    let default_format = setup
        .default_timestamp_format
        .as_deref()
        .unwrap_or(DEFAULT_TIMESTAMP_FORMAT);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_slice());

    let mut records = Vec::new();
    let mut row = csv::StringRecord::new();
    loop {
        let start = rdr.position().byte() as usize;
        let more = rdr
            .read_record(&mut row)
            .with_context(|| format!("malformed CSV at record {}", records.len() + 1))?;
        if !more {
            break;
        }
        let end = (rdr.position().byte() as usize).min(raw.len());
        let quoted = quoted_fields(&raw[start..end]);

        let fields: Vec<Option<&str>> = row
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if f.is_empty() && !quoted.get(i).copied().unwrap_or(false) {
                    None
                } else {
                    Some(f)
                }
            })
            .collect();
        let record = convert_record(&fields, &setup.columns, default_format)
            .with_context(|| format!("invalid record {}", records.len() + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// For each field of the first record in `raw`, whether it opens with a quote
fn quoted_fields(raw: &[u8]) -> Vec<bool> {
    let body = match raw.iter().position(|b| *b != b'\r' && *b != b'\n') {
        Some(i) => &raw[i..],
        None => return Vec::new(),
    };

    let mut flags = Vec::new();
    let mut field_start = true;
    let mut in_quotes = false;
    for &b in body {
        if field_start {
            field_start = false;
            flags.push(b == b'"');
            if b == b'"' {
                in_quotes = true;
                continue;
            }
        }
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => field_start = true,
            b'\r' | b'\n' if !in_quotes => return flags,
            _ => {}
        }
    }
    if field_start {
        flags.push(false);
    }
    flags
}

/// `None` fields become null; everything else must parse as its column's type
pub fn convert_record(fields: &[Option<&str>], columns: &[ColumnSpec], default_format: &str) -> anyhow::Result<Record> {
    if fields.len() != columns.len() {
        anyhow::bail!(
            "invalid number of columns (expected {} but got {})",
            columns.len(),
            fields.len()
        );
    }

    let mut record = Record::new();
    for (column, field) in columns.iter().zip(fields) {
        let value = match field {
            None => Value::Null,
            Some(raw) => parse_value(column, raw, default_format).with_context(|| format!("column '{}'", column.name))?,
        };
        record.insert(column.name.clone(), value);
    }
    Ok(record)
}

pub fn parse_value(column: &ColumnSpec, raw: &str, default_format: &str) -> anyhow::Result<Value> {
    let v = match column.kind {
        ColumnType::Boolean => Value::Bool(TRUE_STRINGS.contains(&raw)),
        ColumnType::String => Value::String(raw.to_string()),
        ColumnType::Long => {
            let n: i64 = raw.parse().with_context(|| format!("'{}' is not a long", raw))?;
            Value::from(n)
        }
        ColumnType::Double => {
            let f: f64 = raw.parse().with_context(|| format!("'{}' is not a double", raw))?;
            serde_json::Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| anyhow::anyhow!("'{}' has no JSON representation", raw))?
        }
        ColumnType::Timestamp => {
            let format = column.format.as_deref().unwrap_or(default_format);
            Value::String(parse_timestamp(raw, format)?.to_rfc3339())
        }
        ColumnType::Json => serde_json::from_str(raw).with_context(|| format!("'{}' is not JSON", raw))?,
    };
    Ok(v)
}

/// Accepts offset-bearing, naive date-time and date-only patterns; no offset means UTC
pub fn parse_timestamp(raw: &str, format: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(raw, format) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    match NaiveDate::parse_from_str(raw, format) {
        Ok(date) => Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))),
        Err(e) => anyhow::bail!("'{}' does not match timestamp format '{}': {}", raw, format, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{covid19, hello};
    use serde_json::json;

    fn descriptor(columns: Vec<ColumnSpec>) -> SetupDescriptor {
        SetupDescriptor::new(columns, 1)
    }

    #[test]
    fn hello_rows_validate_against_hello_descriptor() {
        let body = "a,0,0.1,2019-01-01 00:00:00,\nb,0,0.2,2019-01-01 00:00:00,\n";
        let records = read_records(body.as_bytes(), &hello::descriptor()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            Value::Object(records[0].clone()),
            json!({"s": "a", "i": 0, "f": 0.1, "t": "2019-01-01T00:00:00+00:00", "j": null})
        );
    }

    #[test]
    fn date_only_format() {
        let records = read_records("JP,03/01/20,256,0,0\n".as_bytes(), &covid19::descriptor()).unwrap();
        assert_eq!(records[0]["date"], json!("2020-03-01T00:00:00+00:00"));
        assert_eq!(records[0]["cases"], json!(256));
    }

    #[test]
    fn builtin_default_format_takes_fractions_and_offset() {
        let column = ColumnSpec::new("t", ColumnType::Timestamp);
        let v = parse_value(&column, "2019-01-01 00:00:00.123456 +0000", DEFAULT_TIMESTAMP_FORMAT).unwrap();
        assert_eq!(v, json!("2019-01-01T00:00:00.123456+00:00"));

        let dt = parse_timestamp("2019-01-01 09:00:00 +0900", DEFAULT_TIMESTAMP_FORMAT).unwrap();
        assert_eq!(dt.to_rfc3339(), "2019-01-01T00:00:00+00:00");
        assert!(parse_timestamp("yesterday", DEFAULT_TIMESTAMP_FORMAT).is_err());
    }

    #[test]
    fn descriptor_default_format_applies_to_unformatted_columns() {
        let mut setup = descriptor(vec![
            ColumnSpec::new("t", ColumnType::Timestamp),
            ColumnSpec::timestamp("u", "%d.%m.%Y"),
        ]);
        setup.default_timestamp_format = Some("%Y/%m/%d".to_string());

        let records = read_records("2019/01/02,03.04.2020\n".as_bytes(), &setup).unwrap();
        assert_eq!(records[0]["t"], json!("2019-01-02T00:00:00+00:00"));
        assert_eq!(records[0]["u"], json!("2020-04-03T00:00:00+00:00"));
    }

    #[test]
    fn quoted_empty_is_a_string_unquoted_empty_is_null() {
        let setup = descriptor(vec![
            ColumnSpec::new("s", ColumnType::String),
            ColumnSpec::new("n", ColumnType::Long),
            ColumnSpec::new("u", ColumnType::String),
        ]);
        let records = read_records("\"\",,\n,7,\"\"\n\"x,y\",,\"\"\"\"\n".as_bytes(), &setup).unwrap();
        assert_eq!(Value::Object(records[0].clone()), json!({"s": "", "n": null, "u": null}));
        assert_eq!(Value::Object(records[1].clone()), json!({"s": null, "n": 7, "u": ""}));
        assert_eq!(Value::Object(records[2].clone()), json!({"s": "x,y", "n": null, "u": "\""}));
    }

    #[test]
    fn quoted_empty_number_is_rejected() {
        let setup = descriptor(vec![ColumnSpec::new("n", ColumnType::Long)]);
        assert!(read_records("\"\"\n".as_bytes(), &setup).is_err());
    }

    #[test]
    fn quote_flags_follow_field_boundaries() {
        assert_eq!(quoted_fields(b"\"\",a,\n"), vec![true, false, false]);
        assert_eq!(quoted_fields(b"\n\"a\nb\",c"), vec![true, false]);
        assert_eq!(quoted_fields(b"a,b"), vec![false, false]);
    }

    #[test]
    fn column_count_must_match() {
        let err = read_records("a,0,0.1\n".as_bytes(), &hello::descriptor()).unwrap_err();
        assert!(format!("{:#}", err).contains("expected 5 but got 3"));
    }

    #[test]
    fn booleans_and_json() {
        let cols = vec![
            ColumnSpec::new("up", ColumnType::Boolean),
            ColumnSpec::new("tags", ColumnType::Json),
        ];
        let r = convert_record(&[Some("Yes"), Some(r#"{"env":"dev"}"#)], &cols, DEFAULT_TIMESTAMP_FORMAT).unwrap();
        assert_eq!(r["up"], json!(true));
        assert_eq!(r["tags"], json!({"env": "dev"}));

        let r = convert_record(&[Some("nope"), None], &cols, DEFAULT_TIMESTAMP_FORMAT).unwrap();
        assert_eq!(r["up"], json!(false));
        assert_eq!(r["tags"], Value::Null);

        assert!(convert_record(&[Some("1"), Some("{broken")], &cols, DEFAULT_TIMESTAMP_FORMAT).is_err());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let long = ColumnSpec::new("n", ColumnType::Long);
        let double = ColumnSpec::new("x", ColumnType::Double);
        assert!(parse_value(&long, "1.5", DEFAULT_TIMESTAMP_FORMAT).is_err());
        assert!(parse_value(&double, "abc", DEFAULT_TIMESTAMP_FORMAT).is_err());
        assert!(parse_value(&double, "NaN", DEFAULT_TIMESTAMP_FORMAT).is_err());
        assert_eq!(parse_value(&double, "2.5", DEFAULT_TIMESTAMP_FORMAT).unwrap(), json!(2.5));
    }
}
