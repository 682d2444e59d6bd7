//! Host-facing operations: connection test, time-series query, annotations and
//! variable queries.

use crate::config::{ResolutionPolicy, Settings};
use crate::prtg::constants::{API_CONFIG, ERRORS};
use crate::prtg::validation::Validator;
use crate::prtg::{
    ApiMetrics, MetricFindQuery, PrtgApi, PrtgError, ResponseCache, Result, TemplateVars,
    Transport,
};
use crate::types::{
    Annotation, AnnotationSpec, ConnectionStatus, MetricFindValue, Target, TimeRange, TimeSeries,
};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A target with its names substituted, ready to run
#[derive(Debug, Clone)]
struct ResolvedTarget {
    label: String,
    device: String,
    sensor: String,
    channel: String,
}

impl ResolvedTarget {
    /// `None` for hidden or incomplete targets
    fn from_target(target: &Target, vars: &TemplateVars) -> Option<Self> {
        if target.hide {
            return None;
        }
        if let Err(e) = Validator::validate_target(target) {
            debug!("Skipping target: {}", e);
            return None;
        }

        let name = |value: &Option<String>| vars.replace(value.as_deref().unwrap_or_default());
        let channel = name(&target.channel);
        let label = target
            .alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .map(|alias| vars.replace(alias))
            .unwrap_or_else(|| channel.clone());

        Some(Self {
            label,
            device: name(&target.device),
            sensor: name(&target.sensor),
            channel,
        })
    }
}

pub struct PrtgDataSource {
    api: Arc<PrtgApi>,
    settings: Settings,
    sweeper: Option<JoinHandle<()>>,
}

impl PrtgDataSource {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let api = PrtgApi::new(&settings)?;
        Ok(Self::from_api(settings, api))
    }

    /// Datasource over a caller-supplied transport; settings are not validated.
    pub fn with_transport(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        let api = PrtgApi::with_transport(&settings, transport);
        Self::from_api(settings, api)
    }

    fn from_api(settings: Settings, api: PrtgApi) -> Self {
        // The sweeper needs a runtime; without one, expiry happens on read.
        let sweeper = match (api.cache(), tokio::runtime::Handle::try_current()) {
            (Some(cache), Ok(_)) => Some(ResponseCache::spawn_sweeper(
                cache,
                API_CONFIG.cache_config.sweep_interval,
            )),
            _ => None,
        };

        Self {
            api: Arc::new(api),
            settings,
            sweeper,
        }
    }

    pub fn api(&self) -> &PrtgApi {
        &self.api
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metrics(&self) -> Arc<ApiMetrics> {
        self.api.metrics()
    }

    pub async fn test_connection(&self) -> ConnectionStatus {
        let version = match self.api.get_version().await {
            Ok(version) => version,
            Err(PrtgError::Connection { .. } | PrtgError::Timeout { .. }) => {
                return ConnectionStatus::error(
                    ERRORS.connection_failed,
                    format!("Could not connect to {}", self.api.base_url()),
                );
            }
            Err(PrtgError::Authentication) => {
                return ConnectionStatus::error(
                    ERRORS.invalid_credentials,
                    format!("{} rejected the credentials", self.api.base_url()),
                );
            }
            Err(e) => return ConnectionStatus::error(ERRORS.connection_failed, e.to_string()),
        };

        let message = format!("PRTG API version: {}", version);
        match self.api.login().await {
            Ok(()) => {
                info!("Connected to PRTG {}", version);
                ConnectionStatus::success(message)
            }
            Err(PrtgError::Authentication) => {
                ConnectionStatus::error(ERRORS.invalid_credentials, message)
            }
            Err(e) => ConnectionStatus::error(ERRORS.connection_failed, e.to_string()),
        }
    }

    pub async fn query(
        &self,
        range: &TimeRange,
        targets: &[Target],
        vars: &TemplateVars,
    ) -> Result<Vec<TimeSeries>> {
        self.query_with_cancel(range, targets, vars, &CancellationToken::new())
            .await
    }

    /// One series per runnable target, in target order.
    ///
    /// Targets run concurrently; each resolves its device, then its sensor,
    /// then fetches values. The first non-resolution failure rejects the
    /// query, as do cancellation and the query deadline.
    pub async fn query_with_cancel(
        &self,
        range: &TimeRange,
        targets: &[Target],
        vars: &TemplateVars,
        cancel: &CancellationToken,
    ) -> Result<Vec<TimeSeries>> {
        Validator::validate_time_range(range)?;

        let jobs: Vec<ResolvedTarget> = targets
            .iter()
            .filter_map(|target| ResolvedTarget::from_target(target, vars))
            .collect();
        debug!("Running {} of {} targets", jobs.len(), targets.len());

        let fanout = try_join_all(jobs.into_iter().map(|job| self.run_target(job, range)));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PrtgError::Cancelled),
            result = tokio::time::timeout(self.settings.query_timeout, fanout) => match result {
                Ok(series) => series,
                Err(_) => Err(PrtgError::Timeout {
                    url: self.api.base_url().to_string(),
                }),
            },
        }
    }

    async fn run_target(&self, job: ResolvedTarget, range: &TimeRange) -> Result<TimeSeries> {
        match self
            .api
            .get_values(&job.device, &job.sensor, &job.channel, range)
            .await
        {
            Ok(points) => Ok(TimeSeries::new(job.label, points)),
            Err(PrtgError::Resolution { kind, name })
                if self.settings.resolution_policy == ResolutionPolicy::EmptySeries =>
            {
                warn!(
                    "No {} named {:?}; returning an empty series for {:?}",
                    kind, name, job.label
                );
                Ok(TimeSeries::new(job.label, Vec::new()))
            }
            Err(e) => Err(e),
        }
    }

    /// Messages of the annotated sensor inside `range`, tagged with the annotation name
    pub async fn annotation_query(
        &self,
        range: &TimeRange,
        spec: &AnnotationSpec,
    ) -> Result<Vec<Annotation>> {
        Validator::validate_time_range(range)?;

        let mut annotations = self.api.get_messages(range, spec.sensor_id).await?;
        for annotation in &mut annotations {
            annotation.annotation = spec.name.clone();
        }
        Ok(annotations)
    }

    pub async fn metric_find_query(
        &self,
        query: &str,
        vars: &TemplateVars,
    ) -> Result<Vec<MetricFindValue>> {
        let find = MetricFindQuery::parse(query, vars)?;
        let rows = self.api.table(&find.request).await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.text(&find.field))
            .map(|text| MetricFindValue {
                value: text.clone(),
                text,
            })
            .collect())
    }
}

impl Drop for PrtgDataSource {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}
