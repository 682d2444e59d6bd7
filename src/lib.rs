//! PRTG datasource. Resolves named targets to object IDs and turns PRTG
//! history into time series.

pub mod config;
pub mod constants;
pub mod datasource;
pub mod datemath;
pub mod export;
pub mod prtg;
pub mod types;

pub use config::{ResolutionPolicy, Settings};
pub use datasource::PrtgDataSource;
pub use prtg::{PrtgError, Result, TemplateVars};
pub use types::{
    Annotation, AnnotationSpec, ConnectionStatus, DataPoint, MetricFindValue, ObjectId, Target,
    TimeRange, TimeSeries,
};
