use crate::data::bar::Bar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown price column '{0}'")]
pub struct UnknownColumn(pub String);

//the fixed price columns a table carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceColumn {
    Open,
    High,
    Low,
    Close,
    Volume,
    AdjClose,
}

impl PriceColumn {
    pub const ALL: [PriceColumn; 6] = [
        PriceColumn::Open,
        PriceColumn::High,
        PriceColumn::Low,
        PriceColumn::Close,
        PriceColumn::Volume,
        PriceColumn::AdjClose,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceColumn::Open => "open",
            PriceColumn::High => "high",
            PriceColumn::Low => "low",
            PriceColumn::Close => "close",
            PriceColumn::Volume => "volume",
            PriceColumn::AdjClose => "adjclose",
        }
    }
}

impl fmt::Display for PriceColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceColumn {
    type Err = UnknownColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_lowercase();

        PriceColumn::ALL
            .into_iter()
            .find(|column| column.as_str() == normalized)
            .ok_or_else(|| UnknownColumn(s.to_string()))
    }
}

//time-ordered, fixed-schema price table stored column by column
//
//rows are assumed to be sorted by timestamp already; nothing here re-sorts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    timestamps: Vec<DateTime<Utc>>,
    columns: [Vec<f64>; 6],
}

impl PriceTable {
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut table = PriceTable {
            timestamps: Vec::with_capacity(bars.len()),
            columns: Default::default(),
        };
        for column in table.columns.iter_mut() {
            column.reserve(bars.len());
        }

        for bar in bars {
            table.push(bar);
        }
        table
    }

    //builds a close-only table (open/high/low mirror the close)
    pub fn from_closes(timestamps: Vec<DateTime<Utc>>, closes: &[f64]) -> Self {
        let bars: Vec<Bar> = timestamps
            .into_iter()
            .zip(closes.iter())
            .map(|(timestamp, &close)| Bar::from_close(timestamp, close))
            .collect();
        Self::from_bars(&bars)
    }

    fn push(&mut self, bar: &Bar) {
        self.timestamps.push(bar.timestamp);
        self.columns[PriceColumn::Open.slot()].push(bar.open);
        self.columns[PriceColumn::High.slot()].push(bar.high);
        self.columns[PriceColumn::Low.slot()].push(bar.low);
        self.columns[PriceColumn::Close.slot()].push(bar.close);
        //optional columns are NaN where the source had no value
        self.columns[PriceColumn::Volume.slot()].push(bar.volume.unwrap_or(f64::NAN));
        self.columns[PriceColumn::AdjClose.slot()].push(bar.adj_close.unwrap_or(f64::NAN));
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    //the timestamp index
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn column(&self, column: PriceColumn) -> &[f64] {
        &self.columns[column.slot()]
    }

    pub fn value(&self, column: PriceColumn, index: usize) -> Option<f64> {
        self.column(column).get(index).copied()
    }
}
