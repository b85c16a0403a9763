use crate::data::bar::Bar;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;

const TIMESTAMP_HEADERS: [&str; 4] = ["date", "datetime", "timestamp", "time"];

//column positions resolved from the header row
struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    adj_close: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        //"Adj Close", "adj_close" and "AdjClose" all normalize to "adjclose"
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| {
                h.chars()
                    .filter(|c| !c.is_whitespace() && *c != '_')
                    .collect::<String>()
                    .to_lowercase()
            })
            .collect();

        let find = |name: &str| normalized.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| anyhow!("Missing required column '{}'", name))
        };

        let timestamp = TIMESTAMP_HEADERS
            .iter()
            .find_map(|name| find(*name))
            .ok_or_else(|| {
                anyhow!(
                    "Missing timestamp column (expected one of {:?})",
                    TIMESTAMP_HEADERS
                )
            })?;

        Ok(Columns {
            timestamp,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
            adj_close: find("adjclose"),
        })
    }
}

//accepts rfc3339, "YYYY-MM-DD HH:MM:SS" and plain dates (midnight utc)
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(anyhow!("Unrecognized timestamp '{}'", raw))
}

fn parse_field(record: &StringRecord, index: usize, name: &str, line: usize) -> Result<f64> {
    let raw = record
        .get(index)
        .ok_or_else(|| anyhow!("Missing {} value at line {}", name, line))?;
    raw.trim()
        .parse::<f64>()
        .context(format!("Failed to parse {} '{}' at line {}", name, raw, line))
}

//empty cells in optional columns are treated as missing
fn parse_optional(
    record: &StringRecord,
    index: Option<usize>,
    name: &str,
    line: usize,
) -> Result<Option<f64>> {
    match index {
        Some(i) if record.get(i).map(|v| !v.trim().is_empty()).unwrap_or(false) => {
            Ok(Some(parse_field(record, i, name, line)?))
        }
        _ => Ok(None),
    }
}

//loads bars from a csv file
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let headers = reader
        .headers()
        .context(format!("Failed to read CSV header of {:?}", path))?
        .clone();
    let columns = Columns::from_headers(&headers)?;

    let mut bars = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let line = index + 2;
        let record = result.context(format!("Failed to parse CSV record at line {}", line))?;

        let raw_timestamp = record.get(columns.timestamp).unwrap_or_default();
        let timestamp = parse_timestamp(raw_timestamp)
            .context(format!("Failed to parse timestamp at line {}", line))?;

        let bar = Bar::new(
            timestamp,
            parse_field(&record, columns.open, "open", line)?,
            parse_field(&record, columns.high, "high", line)?,
            parse_field(&record, columns.low, "low", line)?,
            parse_field(&record, columns.close, "close", line)?,
            parse_optional(&record, columns.volume, "volume", line)?,
        )
        .context(format!("Invalid bar at line {}", line))?
        .with_adj_close(parse_optional(&record, columns.adj_close, "adj close", line)?);

        bars.push(bar);
    }

    //sort by timestamp to ensure chronological order
    bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    Ok(bars)
}
