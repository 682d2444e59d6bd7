//! Historic data and live readings as `[value, timestamp_ms]` points.

use crate::prtg::api::PrtgApi;
use crate::prtg::constants::{LIVE_CHANNEL, SECONDS_PER_DAY, SERIAL_DATE_UNIX_OFFSET, SPEED_SUFFIX};
use crate::prtg::error::{PrtgError, Result};
use crate::prtg::normalize::{Payload, Row};
use crate::prtg::query::ApiRequest;
use crate::prtg::xml::as_list;
use crate::types::{DataPoint, ObjectId, TimeRange};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static AGE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s\[[\d\smsago\]]+").expect("Failed to compile age suffix regex"));

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(-?[\d,]*\.?\d+)").expect("Failed to compile leading number regex")
});

/// Serial date (days since 1899-12-30) to Unix seconds, rounded to the second.
pub fn serial_to_epoch_secs(serial: f64) -> i64 {
    ((serial - SERIAL_DATE_UNIX_OFFSET) * SECONDS_PER_DAY).round() as i64
}

/// Serial date to Unix milliseconds; sub-second precision is dropped.
pub fn serial_to_epoch_ms(serial: f64) -> i64 {
    serial_to_epoch_secs(serial) * 1000
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelValue {
    pub channel: String,
    pub value: Option<f64>,
}

/// One `histdata.item`
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricRecord {
    pub datetime_raw: f64,
    pub values: Vec<ChannelValue>,
}

impl HistoricRecord {
    pub fn timestamp_ms(&self) -> i64 {
        serial_to_epoch_ms(self.datetime_raw)
    }

    /// Value for `channel`, preferring its `(speed)` variant when that has a value.
    ///
    /// A record with a single channel is taken as-is whatever its name.
    pub fn select_value(&self, channel: &str) -> Option<f64> {
        if let [only] = self.values.as_slice() {
            return only.value;
        }

        let speed = format!("{}{}", channel, SPEED_SUFFIX);
        self.values
            .iter()
            .find(|v| v.channel == speed && v.value.is_some())
            .or_else(|| self.values.iter().find(|v| v.channel == channel))
            .and_then(|v| v.value)
    }
}

fn text_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(fields) => fields.get("text").and_then(Value::as_str),
        _ => None,
    }
}

fn channel_value(value: &Value) -> ChannelValue {
    let channel = value
        .get("channel")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let value = text_of(value).and_then(|text| text.trim().parse::<f64>().ok());
    ChannelValue { channel, value }
}

/// Records of a historicdata.xml document, in document order.
pub fn historic_records(document: &Value) -> Result<Vec<HistoricRecord>> {
    let histdata = document
        .get("histdata")
        .ok_or_else(|| PrtgError::decode("historic data response has no histdata element"))?;

    let items = histdata.get("item").map(as_list).unwrap_or_default();

    items
        .into_iter()
        .map(|item| {
            let raw = item
                .get("datetime_raw")
                .and_then(text_of)
                .ok_or_else(|| PrtgError::decode("historic record without datetime_raw"))?;
            let datetime_raw = raw
                .trim()
                .parse::<f64>()
                .map_err(|_| PrtgError::decode(format!("invalid datetime_raw {:?}", raw)))?;

            let values = item
                .get("value_raw")
                .map(as_list)
                .unwrap_or_default()
                .into_iter()
                .map(channel_value)
                .collect();

            Ok(HistoricRecord {
                datetime_raw,
                values,
            })
        })
        .collect()
}

/// One point per record for `channel`, in record order.
pub fn assemble(records: &[HistoricRecord], channel: &str) -> Vec<DataPoint> {
    records
        .iter()
        .map(|record| DataPoint::new(record.select_value(channel), record.timestamp_ms()))
        .collect()
}

/// Latest reading of a sensor from getsensordetails.json
#[derive(Debug, Clone, PartialEq)]
pub struct LatestReading {
    pub message: Option<String>,
    pub value: Option<f64>,
    pub timestamp_ms: i64,
}

impl LatestReading {
    pub fn from_sensor_data(data: &Row) -> Result<Self> {
        let lastcheck = data
            .text("lastcheck")
            .ok_or_else(|| PrtgError::decode("sensor details without lastcheck"))?;
        let serial = AGE_SUFFIX.replace_all(&lastcheck, "");
        let serial = serial
            .trim()
            .parse::<f64>()
            .map_err(|_| PrtgError::decode(format!("invalid lastcheck {:?}", lastcheck)))?;

        let value = data.text("lastvalue").and_then(|text| {
            LEADING_NUMBER
                .captures(&text)
                .and_then(|captures| captures[1].replace(',', "").parse::<f64>().ok())
        });

        Ok(Self {
            message: data.text("lastmessage"),
            value,
            timestamp_ms: serial_to_epoch_ms(serial),
        })
    }

    pub fn to_point(&self) -> DataPoint {
        DataPoint::new(self.value, self.timestamp_ms)
    }
}

impl PrtgApi {
    /// Points for one channel of a named device/sensor over `range`.
    ///
    /// The channel `!` returns the sensor's latest reading as a single point.
    pub async fn get_values(
        &self,
        device: &str,
        sensor: &str,
        channel: &str,
        range: &TimeRange,
    ) -> Result<Vec<DataPoint>> {
        let device_id = self.resolve_device_id(device).await?;
        let sensor_id = self.resolve_sensor_id(sensor, device_id).await?;

        if channel == LIVE_CHANNEL {
            let reading = self.latest_reading(sensor_id).await?;
            return Ok(vec![reading.to_point()]);
        }

        let request = ApiRequest::historic(sensor_id, range, self.time_zone())?;
        let document = match self.request(&request).await? {
            Payload::Document(document) => document,
            other => {
                return Err(PrtgError::decode(format!(
                    "expected historic data document, got {}",
                    other.kind()
                )))
            }
        };

        let records = historic_records(&document)?;
        debug!(
            "Sensor {} returned {} historic records for {:?}",
            sensor_id,
            records.len(),
            channel
        );
        Ok(assemble(&records, channel))
    }

    pub async fn latest_reading(&self, sensor_id: ObjectId) -> Result<LatestReading> {
        match self.request(&ApiRequest::SensorDetails { sensor_id }).await? {
            Payload::SensorData(data) => LatestReading::from_sensor_data(&data),
            other => Err(PrtgError::decode(format!(
                "expected sensor details, got {}",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prtg::xml::to_document;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TRAFFIC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<histdata totalcount="2">
  <prtg-version>17.3.33.2830</prtg-version>
  <item>
    <datetime>10/1/2017 8:00:00 AM</datetime>
    <datetime_raw>25570.0000000000</datetime_raw>
    <value_raw channel="Traffic In">1200.0000</value_raw>
    <value_raw channel="Traffic In (speed)">40.0000</value_raw>
    <value_raw channel="Traffic Out">800.0000</value_raw>
    <coverage_raw>10000</coverage_raw>
  </item>
  <item>
    <datetime_raw>25570.5000000000</datetime_raw>
    <value_raw channel="Traffic In">1500.0000</value_raw>
    <value_raw channel="Traffic In (speed)"></value_raw>
    <value_raw channel="Traffic Out">900.0000</value_raw>
  </item>
</histdata>"#;

    #[test]
    fn test_serial_dates() {
        assert_eq!(serial_to_epoch_ms(25569.0), 0);
        assert_eq!(serial_to_epoch_ms(25570.0), 86_400_000);
        assert_eq!(serial_to_epoch_secs(25569.5), 43_200);
    }

    #[test]
    fn test_speed_variant_preferred() {
        let records = historic_records(&to_document(TRAFFIC).unwrap()).unwrap();
        assert_eq!(records.len(), 2);

        let points = assemble(&records, "Traffic In");
        assert_eq!(
            points,
            vec![
                DataPoint::new(Some(40.0), 86_400_000),
                DataPoint::new(Some(1500.0), 86_400_000 + 43_200_000),
            ]
        );
    }

    #[test]
    fn test_empty_speed_entry_falls_back_to_exact_name() {
        let xml = r#"<histdata><item><datetime_raw>25570.0</datetime_raw><value_raw channel="Traffic In">1500</value_raw><value_raw channel="Traffic In (speed)"></value_raw></item></histdata>"#;
        let records = historic_records(&to_document(xml).unwrap()).unwrap();
        assert_eq!(
            assemble(&records, "Traffic In"),
            vec![DataPoint::new(Some(1500.0), 86_400_000)]
        );

        let both_empty = r#"<histdata><item><datetime_raw>25570.0</datetime_raw><value_raw channel="Traffic In"></value_raw><value_raw channel="Traffic In (speed)"></value_raw></item></histdata>"#;
        let records = historic_records(&to_document(both_empty).unwrap()).unwrap();
        assert_eq!(
            assemble(&records, "Traffic In"),
            vec![DataPoint::new(None, 86_400_000)]
        );
    }

    #[test]
    fn test_exact_match_without_speed() {
        let records = historic_records(&to_document(TRAFFIC).unwrap()).unwrap();
        let points = assemble(&records, "Traffic Out");
        assert_eq!(points[0].value(), Some(800.0));
        assert_eq!(points[1].value(), Some(900.0));
    }

    #[test]
    fn test_unknown_channel_is_null() {
        let records = historic_records(&to_document(TRAFFIC).unwrap()).unwrap();
        let points = assemble(&records, "Errors");
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.value().is_none()));
    }

    #[test]
    fn test_single_item_single_value() {
        let xml = r#"<histdata><item><datetime_raw>25569.0</datetime_raw><value_raw channel="Ping Time">12.5</value_raw></item></histdata>"#;
        let records = historic_records(&to_document(xml).unwrap()).unwrap();
        assert_eq!(assemble(&records, "Ping"), vec![DataPoint::new(Some(12.5), 0)]);
    }

    #[test]
    fn test_empty_histdata() {
        let xml = "<histdata><prtg-version>17.3</prtg-version></histdata>";
        assert!(historic_records(&to_document(xml).unwrap()).unwrap().is_empty());

        let err = historic_records(&json!({"prtg": {}})).unwrap_err();
        assert!(matches!(err, PrtgError::Decode { .. }));
    }

    #[test]
    fn test_latest_reading() {
        let data: Row = serde_json::from_value(json!({
            "name": "Ping",
            "lastcheck": "25570.0000 [12 s ago]",
            "lastvalue": "1,234.5 msec",
            "lastmessage": "OK"
        }))
        .unwrap();

        let reading = LatestReading::from_sensor_data(&data).unwrap();
        assert_eq!(reading.timestamp_ms, 86_400_000);
        assert_eq!(reading.value, Some(1234.5));
        assert_eq!(reading.message.as_deref(), Some("OK"));
    }

    #[test]
    fn test_latest_reading_without_number() {
        let data: Row = serde_json::from_value(json!({
            "lastcheck": "25569 [3 m ago]",
            "lastvalue": "No data"
        }))
        .unwrap();
        let reading = LatestReading::from_sensor_data(&data).unwrap();
        assert_eq!(reading.value, None);
        assert_eq!(reading.timestamp_ms, 0);
    }
}
