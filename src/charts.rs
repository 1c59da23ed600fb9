//! Projection of a summary and its rows into what the charts and table draw
//!
//! Everything here is pure. An absent summary yields absent series, which is
//! not the same thing as a series with no points: callers show the empty
//! state for the former.

use serde_json::Value;
use std::fmt;

use crate::models::{Row, Summary};

/// Rows shown by the table view
pub const TABLE_ROW_LIMIT: usize = 100;

/// Columns of the table view, in display order
pub const TABLE_COLUMNS: [&str; 5] = [
    "Equipment Name",
    "Type",
    "Flowrate",
    "Pressure",
    "Temperature",
];

pub const COMPARATIVE_LABELS: [&str; 3] = ["Flowrate", "Pressure", "Temperature"];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Rgba { r, g, b, a }
    }

    pub const fn opaque(self) -> Self {
        Rgba { a: 1.0, ..self }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Fill colors for categories, cycled when there are more categories
pub const PALETTE: [Rgba; 5] = [
    Rgba::new(99, 179, 237, 0.8),
    Rgba::new(88, 166, 255, 0.8),
    Rgba::new(67, 147, 195, 0.8),
    Rgba::new(118, 200, 255, 0.8),
    Rgba::new(77, 171, 245, 0.8),
];

pub const BAR_COLOR: Rgba = Rgba::new(88, 166, 255, 0.7);

/// Equipment counts per type, for the pie chart
#[derive(Clone, Debug, PartialEq)]
pub struct CategoricalSeries {
    pub title: &'static str,
    pub labels: Vec<String>,
    pub values: Vec<u64>,
    pub fill: Vec<Rgba>,
    pub border: Vec<Rgba>,
}

/// The three averages side by side, for the bar chart
#[derive(Clone, Debug, PartialEq)]
pub struct ComparativeSeries {
    pub title: &'static str,
    pub labels: [&'static str; 3],
    pub values: [f64; 3],
    pub fill: Rgba,
    pub border: Rgba,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartSeries {
    /// Absent when the summary has no type distribution
    pub categorical: Option<CategoricalSeries>,
    /// Absent when any of the three averages is missing
    pub comparative: Option<ComparativeSeries>,
}

/// Project a summary into chart series; no summary, no series
pub fn project(summary: Option<&Summary>) -> Option<ChartSeries> {
    let summary = summary?;
    Some(ChartSeries {
        categorical: categorical(summary),
        comparative: comparative(summary),
    })
}

pub fn categorical(summary: &Summary) -> Option<CategoricalSeries> {
    let distribution = summary.type_distribution.as_ref()?;

    let labels: Vec<String> = distribution.keys().cloned().collect();
    let values: Vec<u64> = distribution.values().copied().collect();
    let fill: Vec<Rgba> = (0..labels.len())
        .map(|i| PALETTE[i % PALETTE.len()])
        .collect();
    let border = fill.iter().map(|c| c.opaque()).collect();

    Some(CategoricalSeries {
        title: "Equipment Type Distribution",
        labels,
        values,
        fill,
        border,
    })
}

pub fn comparative(summary: &Summary) -> Option<ComparativeSeries> {
    Some(ComparativeSeries {
        title: "Average Values",
        labels: COMPARATIVE_LABELS,
        values: [
            summary.avg_flowrate?,
            summary.avg_pressure?,
            summary.avg_temperature?,
        ],
        fill: BAR_COLOR,
        border: BAR_COLOR.opaque(),
    })
}

/// The rows the table view shows: the first hundred, in order
pub fn table_rows(rows: &[Row]) -> &[Row] {
    &rows[..rows.len().min(TABLE_ROW_LIMIT)]
}

/// Display text of each table column for one row
pub fn table_cells(row: &Row) -> [String; 5] {
    TABLE_COLUMNS.map(|column| row.get(column).map(cell_text).unwrap_or_default())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One headline figure above the charts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
}

/// Equipment count and the three averages, two decimals each
pub fn stat_cards(summary: &Summary) -> [StatCard; 4] {
    let average = |value: Option<f64>| {
        value
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "n/a".to_string())
    };

    [
        StatCard {
            title: "Equipment Count",
            value: summary.equipment_count.to_string(),
        },
        StatCard {
            title: "Avg Flowrate",
            value: average(summary.avg_flowrate),
        },
        StatCard {
            title: "Avg Pressure",
            value: average(summary.avg_pressure),
        },
        StatCard {
            title: "Avg Temperature",
            value: average(summary.avg_temperature),
        },
    ]
}
