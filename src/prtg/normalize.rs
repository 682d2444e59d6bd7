//! Classification of raw PRTG responses into a tagged payload.

use crate::prtg::constants::{ERRORS, NOT_ENOUGH_DATA};
use crate::prtg::error::{PrtgError, Result};
use crate::prtg::transport::HttpResponse;
use crate::prtg::xml;
use crate::types::ObjectId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static ERROR_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<error>(.*?)</error>").expect("Failed to compile error regex"));

/// One row of a table.json result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Map<String, Value>);

impl Row {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn objid(&self) -> Option<ObjectId> {
        match self.0.get("objid")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Field rendered as text; `null` and missing fields are `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    #[serde(rename = "Version")]
    pub version: String,
}

/// A classified response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Groups(Vec<Row>),
    Devices(Vec<Row>),
    Sensors(Vec<Row>),
    Channels(Vec<Row>),
    Values(Vec<Row>),
    SensorData(Row),
    Messages(Vec<Row>),
    Status(StatusInfo),
    /// XML transformed into a structured document
    Document(Value),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Groups(_) => "groups",
            Payload::Devices(_) => "devices",
            Payload::Sensors(_) => "sensors",
            Payload::Channels(_) => "channels",
            Payload::Values(_) => "values",
            Payload::SensorData(_) => "sensordata",
            Payload::Messages(_) => "messages",
            Payload::Status(_) => "status",
            Payload::Document(_) => "document",
        }
    }

    /// Table rows of any list-shaped payload.
    pub fn into_rows(self) -> Result<Vec<Row>> {
        match self {
            Payload::Groups(rows)
            | Payload::Devices(rows)
            | Payload::Sensors(rows)
            | Payload::Channels(rows)
            | Payload::Values(rows)
            | Payload::Messages(rows) => Ok(rows),
            other => Err(PrtgError::decode(format!(
                "expected table rows, got {}",
                other.kind()
            ))),
        }
    }
}

const TABLE_KEYS: [&str; 8] = [
    "groups",
    "devices",
    "sensors",
    "channels",
    "values",
    "sensordata",
    "messages",
    "Version",
];

/// Classifies a response.
///
/// `request` is the parameter string shown to the user when PRTG has no
/// history for it; `url` is the redacted request URL.
pub fn classify(response: &HttpResponse, request: &str, url: &str) -> Result<Payload> {
    if !response.is_success() {
        return Err(classify_failure(response));
    }

    let body = response.body.trim();
    if body.is_empty() {
        return Err(PrtgError::EmptyResponse {
            url: url.to_string(),
        });
    }

    if body == NOT_ENOUGH_DATA {
        return Err(PrtgError::InsufficientData {
            request: request.to_string(),
        });
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => classify_json(map, url),
        Ok(_) => Err(PrtgError::EmptyResponse {
            url: url.to_string(),
        }),
        Err(_) if body.starts_with('<') => xml::to_document(body).map(Payload::Document),
        Err(e) => Err(PrtgError::decode(format!("unrecognized response: {}", e))),
    }
}

fn classify_failure(response: &HttpResponse) -> PrtgError {
    if matches!(response.status, 401 | 403) {
        return PrtgError::Authentication;
    }

    let message = match ERROR_ELEMENT.captures(&response.body) {
        Some(captures) => captures[1].trim().to_string(),
        None => format!("{}: {}", ERRORS.unknown_error, response.body.trim()),
    };

    PrtgError::Upstream {
        message,
        status: response.status,
    }
}

fn classify_json(mut map: Map<String, Value>, url: &str) -> Result<Payload> {
    let key = TABLE_KEYS
        .iter()
        .find(|key| map.contains_key(**key))
        .ok_or_else(|| PrtgError::EmptyResponse {
            url: url.to_string(),
        })?;

    if *key == "Version" {
        let status: StatusInfo = serde_json::from_value(Value::Object(map))?;
        return Ok(Payload::Status(status));
    }

    let value = map.remove(*key).unwrap_or(Value::Null);
    let payload = match *key {
        "groups" => Payload::Groups(serde_json::from_value(value)?),
        "devices" => Payload::Devices(serde_json::from_value(value)?),
        "sensors" => Payload::Sensors(serde_json::from_value(value)?),
        "channels" => Payload::Channels(serde_json::from_value(value)?),
        "values" => Payload::Values(serde_json::from_value(value)?),
        "sensordata" => Payload::SensorData(serde_json::from_value(value)?),
        _ => Payload::Messages(serde_json::from_value(value)?),
    };
    Ok(payload)
}
