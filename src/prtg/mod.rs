//! PRTG API client.

pub mod api;
pub mod cache;
pub mod constants;
pub mod error;
pub mod messages;
pub mod metrics;
pub mod normalize;
pub mod query;
pub mod resolver;
pub mod series;
pub mod template;
pub mod transport;
pub mod validation;
pub mod xml;

pub use api::PrtgApi;
pub use cache::ResponseCache;
pub use error::{ObjectKind, PrtgError, Result};
pub use metrics::{ApiMetrics, MetricsSnapshot};
pub use normalize::{Payload, Row};
pub use query::{ApiRequest, PrtgTimeZone};
pub use series::{HistoricRecord, LatestReading};
pub use template::{MetricFindQuery, TemplateVars};
pub use transport::{HttpResponse, HttpTransport, Transport};
