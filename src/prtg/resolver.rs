//! Name to object ID lookups and object listings.
//!
//! Lookups are sequential per target: a sensor is looked up under its resolved
//! device and a channel under its resolved sensor. The first matching row
//! wins; no match is a `Resolution` error.

use crate::prtg::api::PrtgApi;
use crate::prtg::error::{ObjectKind, PrtgError, Result};
use crate::prtg::normalize::Row;
use crate::prtg::query::ApiRequest;
use crate::types::ObjectId;
use tracing::debug;

fn first_objid(rows: &[Row], kind: ObjectKind, name: &str) -> Result<ObjectId> {
    rows.iter()
        .find_map(Row::objid)
        .ok_or_else(|| PrtgError::resolution(kind, name))
}

impl PrtgApi {
    pub async fn resolve_device_id(&self, device: &str) -> Result<ObjectId> {
        let rows = self
            .table(&ApiRequest::DeviceByName {
                name: device.to_string(),
            })
            .await?;
        let id = first_objid(&rows, ObjectKind::Device, device)?;
        debug!("Resolved device {:?} to {}", device, id);
        Ok(id)
    }

    pub async fn resolve_sensor_id(&self, sensor: &str, device_id: ObjectId) -> Result<ObjectId> {
        let rows = self
            .table(&ApiRequest::SensorByName {
                name: sensor.to_string(),
                device_id,
            })
            .await?;
        let id = first_objid(&rows, ObjectKind::Sensor, sensor)?;
        debug!("Resolved sensor {:?} on device {} to {}", sensor, device_id, id);
        Ok(id)
    }

    /// `*` matches any channel of the sensor.
    pub async fn resolve_channel_id(&self, channel: &str, sensor_id: ObjectId) -> Result<ObjectId> {
        let rows = self
            .table(&ApiRequest::ChannelByName {
                name: channel.to_string(),
                sensor_id,
            })
            .await?;
        let id = first_objid(&rows, ObjectKind::Channel, channel)?;
        debug!("Resolved channel {:?} on sensor {} to {}", channel, sensor_id, id);
        Ok(id)
    }

    pub async fn list_groups(&self) -> Result<Vec<Row>> {
        self.table(&ApiRequest::Groups).await
    }

    pub async fn list_devices(&self, group: Option<&str>) -> Result<Vec<Row>> {
        self.table(&ApiRequest::Devices {
            group: group.map(str::to_string),
        })
        .await
    }

    pub async fn list_sensors(&self, device_id: ObjectId) -> Result<Vec<Row>> {
        self.table(&ApiRequest::Sensors { device_id }).await
    }

    pub async fn list_channels(&self, sensor_id: ObjectId) -> Result<Vec<Row>> {
        self.table(&ApiRequest::Channels { sensor_id }).await
    }

    /// Channels of a sensor addressed by device and sensor name
    pub async fn list_channels_for(&self, device: &str, sensor: &str) -> Result<Vec<Row>> {
        let device_id = self.resolve_device_id(device).await?;
        let sensor_id = self.resolve_sensor_id(sensor, device_id).await?;
        self.list_channels(sensor_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: serde_json::Value) -> Vec<Row> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_first_row_wins() {
        let rows = rows(json!([
            {"objid": 2001, "device": "core-sw"},
            {"objid": 2002, "device": "core-sw"}
        ]));
        assert_eq!(first_objid(&rows, ObjectKind::Device, "core-sw").unwrap(), 2001);
    }

    #[test]
    fn test_empty_rows_is_resolution_error() {
        match first_objid(&[], ObjectKind::Sensor, "Ping").unwrap_err() {
            PrtgError::Resolution { kind, name } => {
                assert_eq!(kind, ObjectKind::Sensor);
                assert_eq!(name, "Ping");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
