//! Wire constants and built-in limits.

use once_cell::sync::Lazy;
use std::time::Duration;

pub static API_CONFIG: Lazy<APIConfig> = Lazy::new(|| APIConfig {
    timeouts: TimeoutConfig::default(),
    request_limits: RequestLimits::default(),
    cache_config: CacheConfig::default(),
});

/// Endpoint names relative to the PRTG base URL
pub mod endpoints {
    pub const STATUS: &str = "status.json";
    pub const LOGIN: &str = "getstatus.htm";
    pub const TABLE: &str = "table.json";
    pub const HISTORIC_DATA: &str = "historicdata.xml";
    pub const SENSOR_DETAILS: &str = "getsensordetails.json";
}

/// Column lists requested from table.json
pub mod columns {
    pub const GROUPS: &str = "objid,group";
    pub const DEVICES: &str = "objid,device";
    pub const DEVICES_WITH_GROUP: &str = "objid,device,group";
    pub const SENSORS: &str = "objid,sensor,device,group";
    pub const SENSOR_LOOKUP: &str = "objid,device,sensor";
    pub const CHANNELS: &str = "objid,channel,sensor,name";
    pub const CHANNEL_LOOKUP: &str = "objid,channel,channelid";
    pub const MESSAGES: &str = "objid,datetime,parent,type,name,status,message";
}

/// Days between the spreadsheet epoch (1899-12-30) and the Unix epoch
pub const SERIAL_DATE_UNIX_OFFSET: f64 = 25569.0;
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Literal body PRTG returns for a sensor without history in the window
pub const NOT_ENOUGH_DATA: &str = "Not enough monitoring data";

/// Suffix PRTG appends to the rate variant of bandwidth channels
pub const SPEED_SUFFIX: &str = " (speed)";

/// Channel name that selects the sensor's latest value instead of history
pub const LIVE_CHANNEL: &str = "!";

#[derive(Debug, Clone)]
pub struct APIConfig {
    pub timeouts: TimeoutConfig,
    pub request_limits: RequestLimits,
    pub cache_config: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub request: Duration,
    pub query: Duration,
    pub connection: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            query: Duration::from_secs(120),
            connection: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestLimits {
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

pub static ERRORS: Lazy<ErrorConstants> = Lazy::new(|| ErrorConstants {
    connection_failed: "Connection failed",
    invalid_credentials: "Invalid user name or password",
    metric_find_syntax: "Syntax Error: Expected pattern matching /(channel|sensor|device|group):(\\*)|(tags|sensor|device|group)=([$\\sa-zA-Z0-9-_]+)/i",
    unknown_error: "Unknown error",
});

#[derive(Debug, Clone)]
pub struct ErrorConstants {
    pub connection_failed: &'static str,
    pub invalid_credentials: &'static str,
    pub metric_find_syntax: &'static str,
    pub unknown_error: &'static str,
}
