//! Logical PRTG requests and their endpoint/parameter encoding.

use crate::prtg::constants::{columns, endpoints};
use crate::prtg::error::{PrtgError, Result};
use crate::types::{ObjectId, TimeRange};
use chrono::{Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Zone used when rendering `sdate`/`edate` for historicdata.xml.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrtgTimeZone {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    Status,
    Login,
    Groups,
    Devices {
        group: Option<String>,
    },
    DeviceByName {
        name: String,
    },
    Sensors {
        device_id: ObjectId,
    },
    SensorByName {
        name: String,
        device_id: ObjectId,
    },
    Channels {
        sensor_id: ObjectId,
    },
    /// `name == "*"` lists every channel
    ChannelByName {
        name: String,
        sensor_id: ObjectId,
    },
    Historic {
        sensor_id: ObjectId,
        sdate: String,
        edate: String,
        avg: u32,
    },
    SensorDetails {
        sensor_id: ObjectId,
    },
    Messages {
        sensor_id: ObjectId,
    },
    /// Free-form table.json parameters (variable queries)
    Table {
        params: Vec<(String, String)>,
    },
}

fn param<V: Display>(key: &str, value: V) -> (String, String) {
    (key.to_string(), value.to_string())
}

impl ApiRequest {
    /// Historic request for `range`, with the averaging bucket chosen from its span.
    pub fn historic(sensor_id: ObjectId, range: &TimeRange, zone: PrtgTimeZone) -> Result<Self> {
        let sdate = format_prtg_date(range.from, zone)?;
        let edate = format_prtg_date(range.to, zone)?;
        Ok(ApiRequest::Historic {
            sensor_id,
            sdate,
            edate,
            avg: averaging_interval(range.span_hours()),
        })
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            ApiRequest::Status => endpoints::STATUS,
            ApiRequest::Login => endpoints::LOGIN,
            ApiRequest::Historic { .. } => endpoints::HISTORIC_DATA,
            ApiRequest::SensorDetails { .. } => endpoints::SENSOR_DETAILS,
            _ => endpoints::TABLE,
        }
    }

    /// Login is never served from cache.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, ApiRequest::Login)
    }

    /// Query parameters, credentials excluded.
    pub fn params(&self) -> Vec<(String, String)> {
        match self {
            ApiRequest::Status => Vec::new(),
            ApiRequest::Login => vec![param("id", 0)],
            ApiRequest::Groups => vec![
                param("content", "groups"),
                param("columns", columns::GROUPS),
            ],
            ApiRequest::Devices { group: None } => vec![
                param("content", "devices"),
                param("columns", columns::DEVICES),
            ],
            ApiRequest::Devices { group: Some(group) } => vec![
                param("content", "devices"),
                param("columns", columns::DEVICES_WITH_GROUP),
                param("filter_group", group),
            ],
            ApiRequest::DeviceByName { name } => vec![
                param("content", "devices"),
                param("columns", columns::DEVICES),
                param("filter_device", name),
            ],
            ApiRequest::Sensors { device_id } => vec![
                param("content", "sensors"),
                param("columns", columns::SENSORS),
                param("filter_device", device_id),
            ],
            ApiRequest::SensorByName { name, device_id } => vec![
                param("content", "sensors"),
                param("columns", columns::SENSOR_LOOKUP),
                param("id", device_id),
                param("filter_sensor", name),
            ],
            ApiRequest::Channels { sensor_id } => vec![
                param("content", "channels"),
                param("columns", columns::CHANNELS),
                param("id", sensor_id),
            ],
            ApiRequest::ChannelByName { name, sensor_id } => {
                let mut params = vec![
                    param("content", "channels"),
                    param("columns", columns::CHANNEL_LOOKUP),
                    param("id", sensor_id),
                ];
                if name != "*" {
                    params.push(param("filter_channel", name));
                }
                params
            }
            ApiRequest::Historic {
                sensor_id,
                sdate,
                edate,
                avg,
            } => vec![
                param("id", sensor_id),
                param("sdate", sdate),
                param("edate", edate),
                param("avg", avg),
                param("pctshow", false),
                param("pctmode", false),
            ],
            ApiRequest::SensorDetails { sensor_id } => vec![param("id", sensor_id)],
            ApiRequest::Messages { sensor_id } => vec![
                param("content", "messages"),
                param("columns", columns::MESSAGES),
                param("id", sensor_id),
            ],
            ApiRequest::Table { params } => params.clone(),
        }
    }

    /// `key=value&...` form of the parameters, for user-facing messages.
    pub fn describe(&self) -> String {
        self.params()
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Seconds per sample requested from historicdata.xml for a span of `hours`.
///
/// Buckets: (12, 36] -> 300, (36, 745] -> 3600, above 745 -> 86400, else raw.
pub fn averaging_interval(hours: f64) -> u32 {
    match hours {
        h if h > 745.0 => 86400,
        h if h > 36.0 => 3600,
        h if h > 12.0 => 300,
        _ => 0,
    }
}

/// Unix seconds as PRTG's `YYYY-MM-DD-HH-MM-SS`.
pub fn format_prtg_date(unix_secs: i64, zone: PrtgTimeZone) -> Result<String> {
    let utc = Utc
        .timestamp_opt(unix_secs, 0)
        .single()
        .ok_or_else(|| PrtgError::invalid_query("Invalid timestamp", vec![unix_secs.to_string()]))?;

    const FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
    Ok(match zone {
        PrtgTimeZone::Utc => utc.format(FORMAT).to_string(),
        PrtgTimeZone::Local => utc.with_timezone(&Local).format(FORMAT).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_averaging_boundaries() {
        assert_eq!(averaging_interval(1.0), 0);
        assert_eq!(averaging_interval(12.0), 0);
        assert_eq!(averaging_interval(12.01), 300);
        assert_eq!(averaging_interval(36.0), 300);
        assert_eq!(averaging_interval(36.01), 3600);
        assert_eq!(averaging_interval(745.0), 3600);
        assert_eq!(averaging_interval(745.01), 86400);
    }

    #[test]
    fn test_prtg_date_format() {
        // 2017-10-01T08:05:09Z
        assert_eq!(
            format_prtg_date(1506845109, PrtgTimeZone::Utc).unwrap(),
            "2017-10-01-08-05-09"
        );
        assert_eq!(format_prtg_date(0, PrtgTimeZone::Utc).unwrap(), "1970-01-01-00-00-00");
    }

    #[test]
    fn test_historic_params() {
        let range = TimeRange::new(0, 24 * 3600);
        let request = ApiRequest::historic(1001, &range, PrtgTimeZone::Utc).unwrap();
        assert_eq!(request.endpoint(), "historicdata.xml");
        assert_eq!(
            request.describe(),
            "id=1001&sdate=1970-01-01-00-00-00&edate=1970-01-02-00-00-00&avg=300&pctshow=false&pctmode=false"
        );
    }

    #[test]
    fn test_device_queries() {
        assert_eq!(
            ApiRequest::Devices { group: None }.describe(),
            "content=devices&columns=objid,device"
        );
        assert_eq!(
            ApiRequest::Devices {
                group: Some("Servers".into())
            }
            .describe(),
            "content=devices&columns=objid,device,group&filter_group=Servers"
        );
        assert_eq!(
            ApiRequest::DeviceByName {
                name: "core-sw".into()
            }
            .describe(),
            "content=devices&columns=objid,device&filter_device=core-sw"
        );
    }

    #[test]
    fn test_sensor_and_channel_queries() {
        assert_eq!(
            ApiRequest::Sensors { device_id: 2001 }.describe(),
            "content=sensors&columns=objid,sensor,device,group&filter_device=2001"
        );
        assert_eq!(
            ApiRequest::SensorByName {
                name: "Ping".into(),
                device_id: 2001
            }
            .describe(),
            "content=sensors&columns=objid,device,sensor&id=2001&filter_sensor=Ping"
        );
        assert_eq!(
            ApiRequest::ChannelByName {
                name: "*".into(),
                sensor_id: 1001
            }
            .describe(),
            "content=channels&columns=objid,channel,channelid&id=1001"
        );
        assert_eq!(
            ApiRequest::ChannelByName {
                name: "Traffic In".into(),
                sensor_id: 1001
            }
            .describe(),
            "content=channels&columns=objid,channel,channelid&id=1001&filter_channel=Traffic In"
        );
    }

    #[test]
    fn test_endpoints_and_cacheability() {
        assert_eq!(ApiRequest::Status.endpoint(), "status.json");
        assert_eq!(ApiRequest::Login.endpoint(), "getstatus.htm");
        assert_eq!(ApiRequest::Login.describe(), "id=0");
        assert!(!ApiRequest::Login.is_cacheable());
        assert!(ApiRequest::Groups.is_cacheable());
        assert_eq!(
            ApiRequest::SensorDetails { sensor_id: 7 }.endpoint(),
            "getsensordetails.json"
        );
        assert_eq!(
            ApiRequest::Messages { sensor_id: 7 }.describe(),
            "content=messages&columns=objid,datetime,parent,type,name,status,message&id=7"
        );
    }
}
