//! Sensor message log entries as annotations.

use crate::prtg::api::PrtgApi;
use crate::prtg::error::Result;
use crate::prtg::normalize::Row;
use crate::prtg::query::ApiRequest;
use crate::prtg::series::serial_to_epoch_secs;
use crate::types::{Annotation, ObjectId, TimeRange};

/// Message row as an annotation, if its time lies strictly inside `range`
fn to_annotation(row: &Row, range: &TimeRange) -> Option<Annotation> {
    let secs = serial_to_epoch_secs(row.number("datetime_raw")?);
    if secs <= range.from || secs >= range.to {
        return None;
    }

    let field = |key: &str| row.text(key).unwrap_or_default();
    Some(Annotation {
        time: secs * 1000,
        title: field("status"),
        text: format!(
            "<p>{}({}) Message:<br>{}</p>",
            field("parent"),
            field("type"),
            field("message")
        ),
        annotation: None,
    })
}

impl PrtgApi {
    /// Log messages of a sensor within `range`, oldest first as PRTG lists them
    pub async fn get_messages(&self, range: &TimeRange, sensor_id: ObjectId) -> Result<Vec<Annotation>> {
        let rows = self.table(&ApiRequest::Messages { sensor_id }).await?;
        Ok(rows
            .iter()
            .filter_map(|row| to_annotation(row, range))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn message(serial: f64) -> Row {
        serde_json::from_value(json!({
            "objid": 1001,
            "datetime": "10/1/2017 8:00:00 AM",
            "datetime_raw": serial,
            "parent": "Ping",
            "type": "Sensor",
            "name": "Ping",
            "status": "Down",
            "message": "Destination host unreachable"
        }))
        .unwrap()
    }

    #[test]
    fn test_annotation_fields() {
        let range = TimeRange::new(0, 200_000);
        let annotation = to_annotation(&message(25570.0), &range).unwrap();
        assert_eq!(
            annotation,
            Annotation {
                time: 86_400_000,
                title: "Down".to_string(),
                text: "<p>Ping(Sensor) Message:<br>Destination host unreachable</p>".to_string(),
                annotation: None,
            }
        );
    }

    #[test]
    fn test_window_is_exclusive() {
        let range = TimeRange::new(86_400, 172_800);
        assert!(to_annotation(&message(25570.0), &range).is_none());
        assert!(to_annotation(&message(25571.0), &range).is_none());
        assert!(to_annotation(&message(25570.5), &range).is_some());
    }

    #[test]
    fn test_row_without_datetime_is_skipped() {
        let row: Row = serde_json::from_value(json!({"status": "Up"})).unwrap();
        assert!(to_annotation(&row, &TimeRange::new(0, i64::MAX)).is_none());
    }
}
