//! HTTP layer for the PRTG API.
//! Builds authenticated URLs, enforces concurrency/rate limits, retries
//! transient failures and serves repeated requests from the response cache.
//! Concurrent identical cacheable requests share one round trip.

use crate::config::Settings;
use crate::prtg::cache::ResponseCache;
use crate::prtg::constants::API_CONFIG;
use crate::prtg::error::{PrtgError, Result};
use crate::prtg::metrics::ApiMetrics;
use crate::prtg::normalize::{classify, Payload, Row};
use crate::prtg::query::{ApiRequest, PrtgTimeZone};
use crate::prtg::transport::{redact, HttpResponse, HttpTransport, Transport};
use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, Semaphore};
use tracing::{debug, error, warn};
use url::Url;

type InFlightMap = DashMap<String, Arc<AsyncMutex<()>>>;

/// Exclusive turn at fetching one URL.
///
/// Callers for the same URL queue behind the holder; the map entry goes
/// away with the last one.
struct InFlight<'a> {
    requests: &'a InFlightMap,
    url: &'a str,
    turn: Option<OwnedMutexGuard<()>>,
}

impl<'a> InFlight<'a> {
    async fn acquire(requests: &'a InFlightMap, url: &'a str) -> InFlight<'a> {
        let lock = requests.entry(url.to_string()).or_default().clone();
        let turn = lock.lock_owned().await;
        Self {
            requests,
            url,
            turn: Some(turn),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        drop(self.turn.take());
        self.requests
            .remove_if(self.url, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Client for one PRTG server and one set of credentials
pub struct PrtgApi {
    base_url: String,
    username: String,
    passhash: String,
    transport: Arc<dyn Transport>,
    cache: Option<Arc<ResponseCache>>,
    in_flight: InFlightMap,
    semaphore: Arc<Semaphore>,
    limiter: Option<DefaultDirectRateLimiter>,
    metrics: Arc<ApiMetrics>,
    max_retries: u32,
    retry_backoff: Duration,
    time_zone: PrtgTimeZone,
}

impl PrtgApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        let transport = HttpTransport::new(
            settings.request_timeout,
            API_CONFIG.timeouts.connection,
        )?;
        Ok(Self::with_transport(settings, Arc::new(transport)))
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport(settings: &Settings, transport: Arc<dyn Transport>) -> Self {
        let metrics = Arc::new(ApiMetrics::new());

        let cache = settings.use_cache.then(|| {
            Arc::new(ResponseCache::new(
                settings.cache_timeout,
                settings.cache_capacity,
                metrics.clone(),
            ))
        });

        let limiter = settings
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));

        Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            passhash: settings.passhash.clone(),
            transport,
            cache,
            in_flight: DashMap::new(),
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1))),
            limiter,
            metrics,
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff,
            time_zone: settings.timezone,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn time_zone(&self) -> PrtgTimeZone {
        self.time_zone
    }

    pub fn metrics(&self) -> Arc<ApiMetrics> {
        self.metrics.clone()
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Builds the request URL: credentials first, then the request parameters
    pub fn build_url(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, request.endpoint()))?;

        url.query_pairs_mut()
            .append_pair("username", &self.username)
            .append_pair("passhash", &self.passhash)
            .extend_pairs(request.params());
        Ok(url)
    }

    /// Performs a request and classifies the response.
    ///
    /// With caching on, a cacheable request waits for any identical request
    /// already on the wire and then reads its result from the cache. Failures
    /// are not cached, so a waiter behind a failed fetch sends its own.
    pub async fn request(&self, request: &ApiRequest) -> Result<Payload> {
        let url = self.build_url(request)?;
        let Some(cache) = self.cache.as_ref().filter(|_| request.is_cacheable()) else {
            return self.fetch(request, &url).await;
        };

        let _turn = InFlight::acquire(&self.in_flight, url.as_str()).await;
        if let Some(payload) = cache.get(url.as_str()) {
            debug!("Cache hit: {}", redact(&url));
            return Ok(payload);
        }

        let payload = self.fetch(request, &url).await?;
        Ok(cache.put(url.as_str(), payload))
    }

    async fn fetch(&self, request: &ApiRequest, url: &Url) -> Result<Payload> {
        let response = self.send_with_retry(url).await?;
        classify(&response, &request.describe(), &redact(url))
    }

    /// Rows of a table.json request
    pub async fn table(&self, request: &ApiRequest) -> Result<Vec<Row>> {
        self.request(request).await?.into_rows()
    }

    pub async fn get_version(&self) -> Result<String> {
        match self.request(&ApiRequest::Status).await? {
            Payload::Status(status) => Ok(status.version),
            other => Err(PrtgError::decode(format!(
                "expected status, got {}",
                other.kind()
            ))),
        }
    }

    /// Verifies the credentials against getstatus.htm.
    ///
    /// The body is not inspected; only the status code matters.
    pub async fn login(&self) -> Result<()> {
        let url = self.build_url(&ApiRequest::Login)?;
        let response = self.send_with_retry(&url).await?;

        match response.status {
            401 | 403 => Err(PrtgError::Authentication),
            _ if response.is_success() => Ok(()),
            status => Err(PrtgError::Upstream {
                message: format!("Login failed with HTTP {}", status),
                status,
            }),
        }
    }

    async fn send_with_retry(&self, url: &Url) -> Result<HttpResponse> {
        let mut attempt = 0;

        loop {
            let outcome = self.send_once(url).await;
            let retryable = match &outcome {
                Ok(response) => response.is_retryable_status(),
                Err(e) => e.is_retryable(),
            };

            if !retryable || attempt >= self.max_retries {
                if let Err(e) = &outcome {
                    error!("Request failed: {}", e);
                    self.metrics.record_error(Some(e.to_string()));
                }
                return outcome;
            }

            attempt += 1;
            let delay = PrtgError::backoff(self.retry_backoff, attempt);
            match &outcome {
                Ok(response) => warn!(
                    "HTTP {} from {}, retry {}/{} in {:?}",
                    response.status,
                    redact(url),
                    attempt,
                    self.max_retries,
                    delay
                ),
                Err(e) => warn!(
                    "{}, retry {}/{} in {:?}",
                    e, attempt, self.max_retries, delay
                ),
            }
            self.metrics.record_retry();
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(&self, url: &Url) -> Result<HttpResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| PrtgError::Config(format!("Request semaphore closed: {}", e)))?;

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        debug!("GET {}", redact(url));
        self.metrics.record_request();

        let start = Instant::now();
        let result = self.transport.get(url).await;
        self.metrics.record_latency(start.elapsed());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Replays canned responses in order and records the requested URLs
    struct Replay {
        responses: Mutex<VecDeque<Result<HttpResponse>>>,
        seen: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl Replay {
        fn new(responses: Vec<Result<HttpResponse>>) -> Arc<Self> {
            Self::slow(Duration::ZERO, responses)
        }

        fn slow(delay: Duration, responses: Vec<Result<HttpResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().len()
        }
    }

    #[async_trait]
    impl Transport for Replay {
        async fn get(&self, url: &Url) -> Result<HttpResponse> {
            self.seen.lock().push(url.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(500, "no more responses")))
        }
    }

    fn settings() -> Settings {
        Settings {
            url: "https://prtg.local/".to_string(),
            username: "api".to_string(),
            passhash: "123456".to_string(),
            retry_backoff: Duration::from_millis(10),
            ..Settings::default()
        }
    }

    #[test]
    fn test_build_url_credentials_first() {
        let api = PrtgApi::with_transport(&settings(), Replay::new(vec![]));
        let url = api
            .build_url(&ApiRequest::DeviceByName {
                name: "core sw".into(),
            })
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://prtg.local/table.json?username=api&passhash=123456&content=devices&columns=objid%2Cdevice&filter_device=core+sw"
        );
    }

    #[tokio::test]
    async fn test_version_is_cached() {
        let transport = Replay::new(vec![Ok(HttpResponse::ok(r#"{"Version":"17.3"}"#))]);
        let api = PrtgApi::with_transport(&settings(), transport.clone());

        assert_eq!(api.get_version().await.unwrap(), "17.3");
        assert_eq!(api.get_version().await.unwrap(), "17.3");
        assert_eq!(transport.calls(), 1);
        assert_eq!(api.metrics().get_cache_hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_requests_share_one_fetch() {
        let transport = Replay::slow(
            Duration::from_millis(50),
            vec![Ok(HttpResponse::ok(r#"{"Version":"17.3"}"#))],
        );
        let api = PrtgApi::with_transport(&settings(), transport.clone());

        let (a, b, c) = tokio::join!(api.get_version(), api.get_version(), api.get_version());
        assert_eq!(a.unwrap(), "17.3");
        assert_eq!(b.unwrap(), "17.3");
        assert_eq!(c.unwrap(), "17.3");
        assert_eq!(transport.calls(), 1);
        assert_eq!(api.metrics().get_cache_hits(), 2);
        assert!(api.in_flight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_refetches_after_shared_failure() {
        let transport = Replay::slow(
            Duration::from_millis(50),
            vec![
                Ok(HttpResponse::new(400, "<error>bad</error>")),
                Ok(HttpResponse::ok(r#"{"Version":"17.3"}"#)),
            ],
        );
        let api = PrtgApi::with_transport(&settings(), transport.clone());

        let (first, second) = tokio::join!(api.get_version(), api.get_version());
        assert!(matches!(first, Err(PrtgError::Upstream { status: 400, .. })));
        assert_eq!(second.unwrap(), "17.3");
        assert_eq!(transport.calls(), 2);
        assert!(api.in_flight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sharing_without_cache() {
        let transport = Replay::slow(
            Duration::from_millis(50),
            vec![
                Ok(HttpResponse::ok(r#"{"Version":"1"}"#)),
                Ok(HttpResponse::ok(r#"{"Version":"2"}"#)),
            ],
        );
        let settings = Settings {
            use_cache: false,
            ..settings()
        };
        let api = PrtgApi::with_transport(&settings, transport.clone());

        let (a, b) = tokio::join!(api.get_version(), api.get_version());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let transport = Replay::new(vec![
            Ok(HttpResponse::new(400, "<error>bad</error>")),
            Ok(HttpResponse::ok(r#"{"Version":"17.3"}"#)),
        ]);
        let api = PrtgApi::with_transport(&settings(), transport.clone());

        assert!(matches!(
            api.get_version().await,
            Err(PrtgError::Upstream { status: 400, .. })
        ));
        assert_eq!(api.get_version().await.unwrap(), "17.3");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_status() {
        let transport = Replay::new(vec![
            Ok(HttpResponse::new(503, "busy")),
            Err(PrtgError::connection("https://prtg.local", "reset")),
            Ok(HttpResponse::ok(r#"{"Version":"17.3"}"#)),
        ]);
        let api = PrtgApi::with_transport(&settings(), transport.clone());

        assert_eq!(api.get_version().await.unwrap(), "17.3");
        assert_eq!(transport.calls(), 3);
        assert_eq!(api.metrics().snapshot().retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let transport = Replay::new(vec![
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::ok(r#"{"Version":"17.3"}"#)),
        ]);
        let api = PrtgApi::with_transport(&settings(), transport.clone());

        assert!(matches!(
            api.get_version().await,
            Err(PrtgError::Upstream { status: 503, .. })
        ));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_login_is_never_cached() {
        let transport = Replay::new(vec![
            Ok(HttpResponse::ok("OK")),
            Ok(HttpResponse::new(401, "Unauthorized")),
        ]);
        let api = PrtgApi::with_transport(&settings(), transport.clone());

        assert!(api.login().await.is_ok());
        assert!(matches!(api.login().await, Err(PrtgError::Authentication)));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let transport = Replay::new(vec![
            Ok(HttpResponse::ok(r#"{"Version":"1"}"#)),
            Ok(HttpResponse::ok(r#"{"Version":"2"}"#)),
        ]);
        let settings = Settings {
            use_cache: false,
            ..settings()
        };
        let api = PrtgApi::with_transport(&settings, transport.clone());

        assert_eq!(api.get_version().await.unwrap(), "1");
        assert_eq!(api.get_version().await.unwrap(), "2");
        assert!(api.cache().is_none());
    }
}
