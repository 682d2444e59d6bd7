//! Host-facing data types.

use serde::{Deserialize, Serialize};

/// PRTG object ID (objid)
pub type ObjectId = i64;

/// One dashboard query: names are resolved to IDs at query time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub group: Option<String>,
    pub device: Option<String>,
    pub sensor: Option<String>,
    pub channel: Option<String>,
    pub alias: Option<String>,
    pub hide: bool,
}

/// Query window in Unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn span_seconds(&self) -> i64 {
        self.to - self.from
    }

    pub fn span_hours(&self) -> f64 {
        self.span_seconds() as f64 / 3600.0
    }
}

/// `[value, timestamp_ms]`; a missing reading is serialized as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint(pub Option<f64>, pub i64);

impl DataPoint {
    pub fn new(value: Option<f64>, timestamp_ms: i64) -> Self {
        Self(value, timestamp_ms)
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn timestamp(&self) -> i64 {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub target: String,
    pub datapoints: Vec<DataPoint>,
}

impl TimeSeries {
    pub fn new<T: Into<String>>(target: T, datapoints: Vec<DataPoint>) -> Self {
        Self {
            target: target.into(),
            datapoints,
        }
    }
}

/// Annotation request: messages of one sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub sensor_id: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Epoch milliseconds
    pub time: i64,
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFindValue {
    pub text: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: String,
    pub title: String,
    pub message: String,
}

impl ConnectionStatus {
    pub fn success<M: Into<String>>(message: M) -> Self {
        Self {
            status: "success".to_string(),
            title: "Success".to_string(),
            message: message.into(),
        }
    }

    pub fn error<T: Into<String>, M: Into<String>>(title: T, message: M) -> Self {
        Self {
            status: "error".to_string(),
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}
