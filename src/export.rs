//! JSON and CSV rendering of query results.

use crate::types::{Annotation, MetricFindValue, TimeSeries};
use serde::Serialize;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Exports any serializable result as pretty JSON
pub fn export_to_json<T: Serialize + ?Sized>(data: &T) -> Result<String, String> {
    serde_json::to_string_pretty(data).map_err(|e| format!("Failed to serialize JSON: {}", e))
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, String> {
    String::from_utf8(wtr.into_inner().map_err(|e| e.to_string())?)
        .map_err(|e| format!("Failed to create CSV string: {}", e))
}

/// Exports series as `target,timestamp,value` rows; missing values are empty
pub fn series_to_csv(series: &[TimeSeries]) -> Result<String, String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["target", "timestamp", "value"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for s in series {
        for point in &s.datapoints {
            wtr.write_record([
                s.target.clone(),
                point.timestamp().to_string(),
                point.value().map(|v| v.to_string()).unwrap_or_default(),
            ])
            .map_err(|e| format!("Failed to write CSV record: {}", e))?;
        }
    }

    finish(wtr)
}

pub fn annotations_to_csv(annotations: &[Annotation]) -> Result<String, String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["time", "title", "text"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for annotation in annotations {
        wtr.write_record([
            annotation.time.to_string(),
            annotation.title.clone(),
            annotation.text.clone(),
        ])
        .map_err(|e| format!("Failed to write CSV record: {}", e))?;
    }

    finish(wtr)
}

pub fn find_values_to_csv(values: &[MetricFindValue]) -> Result<String, String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["text", "value"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for value in values {
        wtr.write_record([&value.text, &value.value])
            .map_err(|e| format!("Failed to write CSV record: {}", e))?;
    }

    finish(wtr)
}
