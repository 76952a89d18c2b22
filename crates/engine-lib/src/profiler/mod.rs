//! Site profiling
//!
//! Probes a source over HTTP and turns the responses into a `SiteProfile`:
//! whether JS rendering is needed, whether an anti-bot layer is present,
//! how fast and stable the source is, and how good and relevant its content
//! looks. Probe failures never escape; they yield a conservative fallback.

mod content;
mod history;
mod http_probe;
mod reliability;

pub use content::{looks_like_waf, ContentAnalysis};
pub use history::{FailureKind, FailureRecord, SourceHistory, SourceHistoryStore};
pub use http_probe::HttpProbe;
pub use reliability::{AvailabilityPrediction, ReliabilityCalculator, ReliabilityScore};

use crate::models::{
    CollectionMethod, CollectionWindow, LoadSpeed, PageStructure, SiteProfile, UpdateFrequency,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::selector::select_primary_method;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Quality score assigned when a source could not be probed
pub const FALLBACK_QUALITY: f64 = 40.0;
/// Relevance assigned when a source could not be probed
pub const FALLBACK_RELEVANCE: f64 = 50.0;

/// Header set presented by a probe request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    /// Browser-like user agent and accept headers
    Browser,
    /// Library defaults only
    Minimal,
}

#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub headers: HeaderProfile,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub elapsed_ms: u64,
}

/// Transport used by the profiler to reach a source
#[async_trait]
pub trait SiteProbe: Send + Sync {
    async fn fetch(&self, url: &str, request: &ProbeRequest) -> Result<ProbeResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    pub accessibility_timeout_ms: u64,
    pub sample_count: u32,
    pub sample_spacing_ms: u64,
    pub sample_timeout_ms: u64,
    /// Overall ceiling used by `generate_profile_within` callers that do not
    /// pass their own deadline
    pub profile_deadline_ms: u64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            accessibility_timeout_ms: 10_000,
            sample_count: 3,
            sample_spacing_ms: 1_000,
            sample_timeout_ms: 10_000,
            profile_deadline_ms: 45_000,
        }
    }
}

/// Conservative profile used whenever probing fails
pub fn fallback_profile(url: &str, config: &ProfilerConfig) -> SiteProfile {
    SiteProfile {
        url: url.to_string(),
        requires_js: true,
        has_anti_bot: true,
        load_speed: LoadSpeed::Slow,
        structure: PageStructure::Complex,
        update_frequency: UpdateFrequency::Low,
        content_quality: FALLBACK_QUALITY,
        relevance: FALLBACK_RELEVANCE,
        best_window: CollectionWindow::OffPeak,
        optimal_method: CollectionMethod::PlaywrightStealth,
        avg_response_ms: config.accessibility_timeout_ms as f64,
        stability: 0.0,
        generated_at: chrono::Utc::now().timestamp(),
        fallback: true,
    }
}

/// Profiles sources and keeps their access history
pub struct SiteProfiler {
    probe: Arc<dyn SiteProbe>,
    config: ProfilerConfig,
    history: SourceHistoryStore,
    logger: StructuredLogger,
    metrics: EngineMetrics,
}

impl SiteProfiler {
    pub fn new(probe: Arc<dyn SiteProbe>, config: ProfilerConfig) -> Self {
        Self {
            probe,
            config,
            history: SourceHistoryStore::new(),
            logger: StructuredLogger::new("profiler"),
            metrics: EngineMetrics::new(),
        }
    }

    pub fn with_history(mut self, mut history: SourceHistoryStore) -> Self {
        history.reindex();
        self.history = history;
        self
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn history(&self) -> &SourceHistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut SourceHistoryStore {
        &mut self.history
    }

    /// Profile a source. Never fails; probe errors yield `fallback_profile`.
    pub async fn generate_profile(&mut self, url: &str) -> SiteProfile {
        let start = Instant::now();
        let result = self.probe_site(url).await;
        self.metrics
            .observe_profile_latency(start.elapsed().as_secs_f64());

        match result {
            Ok(profile) => {
                self.logger.log_profile(
                    url,
                    profile.optimal_method.as_str(),
                    profile.requires_js,
                    profile.has_anti_bot,
                    profile.content_quality,
                    profile.relevance,
                    profile.avg_response_ms,
                );
                profile
            }
            Err(e) => {
                self.logger.log_profile_fallback(url, &format!("{e:#}"));
                self.metrics.inc_profile_fallbacks();
                fallback_profile(url, &self.config)
            }
        }
    }

    /// Profile a source under a wall-clock deadline. When the deadline
    /// elapses the in-flight probes are dropped and the fallback is returned.
    pub async fn generate_profile_within(&mut self, url: &str, deadline: Duration) -> SiteProfile {
        match tokio::time::timeout(deadline, self.generate_profile(url)).await {
            Ok(profile) => profile,
            Err(_) => {
                self.history.record_failure(
                    url,
                    FailureKind::Timeout,
                    None,
                    chrono::Utc::now().timestamp(),
                );
                self.logger.log_profile_fallback(url, "profile deadline elapsed");
                self.metrics.inc_profile_fallbacks();
                fallback_profile(url, &self.config)
            }
        }
    }

    async fn probe_site(&mut self, url: &str) -> Result<SiteProfile> {
        let request = ProbeRequest {
            headers: HeaderProfile::Browser,
            timeout: Duration::from_millis(self.config.accessibility_timeout_ms),
        };
        let now = chrono::Utc::now().timestamp();
        let access = match self.probe.fetch(url, &request).await {
            Ok(resp) => resp,
            Err(e) => {
                self.history
                    .record_failure(url, FailureKind::Unreachable, None, now);
                return Err(e.context("accessibility probe failed"));
            }
        };
        self.history
            .record_probe(url, access.status, access.elapsed_ms, now);

        if access.status >= 400 && access.status != 403 && access.status != 429 {
            bail!("source answered HTTP {}", access.status);
        }

        let analysis = ContentAnalysis::analyze(&access.body);
        let blocked_on_access =
            access.status == 429 || looks_like_waf(access.status, &access.headers, &access.body);
        let has_anti_bot = blocked_on_access || self.detect_anti_bot(url).await;
        let (avg_response_ms, stability) = self.measure_performance(url).await;

        let requires_js = analysis.requires_js();
        let structure = analysis.structure();
        let update_frequency = analysis.update_frequency();
        let best_window = if has_anti_bot {
            CollectionWindow::OffPeak
        } else if update_frequency == UpdateFrequency::High {
            CollectionWindow::MarketHours
        } else {
            CollectionWindow::Anytime
        };

        let mut profile = SiteProfile {
            url: url.to_string(),
            requires_js,
            has_anti_bot,
            load_speed: LoadSpeed::from_response_ms(avg_response_ms),
            structure,
            update_frequency,
            content_quality: analysis.quality_score(),
            relevance: analysis.relevance_score(url),
            best_window,
            optimal_method: CollectionMethod::SimpleHttp,
            avg_response_ms,
            stability,
            generated_at: now,
            fallback: false,
        };
        profile.optimal_method = select_primary_method(&profile);
        Ok(profile)
    }

    /// Second request with minimal headers; a failed request counts as
    /// anti-bot since it cannot be ruled out.
    async fn detect_anti_bot(&mut self, url: &str) -> bool {
        let request = ProbeRequest {
            headers: HeaderProfile::Minimal,
            timeout: Duration::from_millis(self.config.accessibility_timeout_ms),
        };
        match self.probe.fetch(url, &request).await {
            Ok(resp) => {
                self.history.record_probe(
                    url,
                    resp.status,
                    resp.elapsed_ms,
                    chrono::Utc::now().timestamp(),
                );
                looks_like_waf(resp.status, &resp.headers, &resp.body)
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Minimal-header probe failed, assuming anti-bot");
                true
            }
        }
    }

    /// Sequential samples spaced by `sample_spacing_ms`. Returns the mean
    /// response time of successful samples and the success fraction.
    async fn measure_performance(&mut self, url: &str) -> (f64, f64) {
        let samples = self.config.sample_count.max(1);
        let request = ProbeRequest {
            headers: HeaderProfile::Browser,
            timeout: Duration::from_millis(self.config.sample_timeout_ms),
        };
        let mut timings = Vec::with_capacity(samples as usize);

        for i in 0..samples {
            if i > 0 && self.config.sample_spacing_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.sample_spacing_ms)).await;
            }
            let now = chrono::Utc::now().timestamp();
            match self.probe.fetch(url, &request).await {
                Ok(resp) => {
                    self.history
                        .record_probe(url, resp.status, resp.elapsed_ms, now);
                    if resp.status < 400 {
                        timings.push(resp.elapsed_ms as f64);
                    }
                }
                Err(_) => {
                    self.history
                        .record_failure(url, FailureKind::Unreachable, None, now);
                }
            }
        }

        let stability = timings.len() as f64 / samples as f64;
        let avg = if timings.is_empty() {
            self.config.sample_timeout_ms as f64
        } else {
            timings.iter().sum::<f64>() / timings.len() as f64
        };
        (avg, stability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted probe: responses keyed by header profile, popped in order.
    #[derive(Default)]
    struct MockProbe {
        browser: Mutex<Vec<Result<ProbeResponse, String>>>,
        minimal: Mutex<Vec<Result<ProbeResponse, String>>>,
        calls: Mutex<HashMap<&'static str, usize>>,
        delay: Option<Duration>,
    }

    impl MockProbe {
        fn ok(status: u16, body: &str, elapsed_ms: u64) -> Result<ProbeResponse, String> {
            Ok(ProbeResponse {
                status,
                headers: Vec::new(),
                body: body.to_string(),
                elapsed_ms,
            })
        }
    }

    #[async_trait]
    impl SiteProbe for MockProbe {
        async fn fetch(&self, _url: &str, request: &ProbeRequest) -> Result<ProbeResponse> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let (queue, key) = match request.headers {
                HeaderProfile::Browser => (&self.browser, "browser"),
                HeaderProfile::Minimal => (&self.minimal, "minimal"),
            };
            *self.calls.lock().unwrap().entry(key).or_default() += 1;
            let mut queue = queue.lock().unwrap();
            if queue.is_empty() {
                bail!("no scripted response");
            }
            queue.remove(0).map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn fast_config() -> ProfilerConfig {
        ProfilerConfig {
            sample_spacing_ms: 0,
            ..Default::default()
        }
    }

    const ARTICLE: &str = r#"<html><body><article><h1>Forex outlook</h1>
        <p>Currency markets steady.</p><p>USD flat.</p></article></body></html>"#;

    #[tokio::test]
    async fn test_total_probe_failure_returns_fallback() {
        let probe = Arc::new(MockProbe::default());
        let mut profiler = SiteProfiler::new(probe, fast_config());

        let profile = profiler.generate_profile("https://down.example").await;

        assert!(profile.requires_js);
        assert!(profile.has_anti_bot);
        assert_eq!(profile.load_speed, LoadSpeed::Slow);
        assert_eq!(profile.structure, PageStructure::Complex);
        assert_eq!(profile.content_quality, FALLBACK_QUALITY);
        assert_eq!(profile.optimal_method, CollectionMethod::PlaywrightStealth);
        assert_eq!(profile.url, "https://down.example");
        assert!(profile.fallback);

        let history = profiler.history().get("https://down.example").unwrap();
        assert_eq!(history.attempts, 1);
        assert_eq!(history.successes, 0);
    }

    #[tokio::test]
    async fn test_restored_history_is_extended() {
        let stored = r#"{"records": [{"url": "https://down.example", "attempts": 2,
            "successes": 2, "failures": [], "avg_response_ms": 400.0,
            "last_accessed_at": 100, "quality_scores": [], "last_method": null}]}"#;
        let history: SourceHistoryStore = serde_json::from_str(stored).unwrap();
        let mut profiler =
            SiteProfiler::new(Arc::new(MockProbe::default()), fast_config()).with_history(history);

        profiler.generate_profile("https://down.example").await;

        assert_eq!(profiler.history().len(), 1);
        let record = profiler.history().get("https://down.example").unwrap();
        assert_eq!(record.attempts, 3);
        assert_eq!(record.successes, 2);
    }

    #[tokio::test]
    async fn test_failed_samples_are_not_a_fallback() {
        let probe = Arc::new(MockProbe {
            browser: Mutex::new(vec![
                MockProbe::ok(200, ARTICLE, 300),
                Err("reset".to_string()),
                Err("reset".to_string()),
                Err("reset".to_string()),
            ]),
            minimal: Mutex::new(vec![MockProbe::ok(200, ARTICLE, 250)]),
            ..Default::default()
        });
        let mut profiler = SiteProfiler::new(probe, fast_config());

        let profile = profiler.generate_profile("https://flaky.example").await;

        assert_eq!(profile.stability, 0.0);
        assert!(!profile.fallback);
        assert!(!profile.has_anti_bot);
        assert_eq!(profile.load_speed, LoadSpeed::Slow);
    }

    #[tokio::test]
    async fn test_server_error_returns_fallback() {
        let probe = Arc::new(MockProbe {
            browser: Mutex::new(vec![MockProbe::ok(503, "", 100)]),
            ..Default::default()
        });
        let mut profiler = SiteProfiler::new(probe, fast_config());
        let profile = profiler.generate_profile("https://busy.example").await;
        assert_eq!(profile.optimal_method, CollectionMethod::PlaywrightStealth);
        // Only the probe itself is recorded, not a second unreachable entry
        assert_eq!(profiler.history().get("https://busy.example").unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_fast_static_article_profile() {
        let probe = Arc::new(MockProbe {
            browser: Mutex::new(vec![
                MockProbe::ok(200, ARTICLE, 300),
                MockProbe::ok(200, ARTICLE, 200),
                MockProbe::ok(200, ARTICLE, 400),
                MockProbe::ok(200, ARTICLE, 600),
            ]),
            minimal: Mutex::new(vec![MockProbe::ok(200, ARTICLE, 250)]),
            ..Default::default()
        });
        let mut profiler = SiteProfiler::new(probe.clone(), fast_config());

        let profile = profiler.generate_profile("https://fx.example.com/outlook").await;

        assert!(!profile.requires_js);
        assert!(!profile.has_anti_bot);
        assert_eq!(profile.structure, PageStructure::Simple);
        assert_eq!(profile.load_speed, LoadSpeed::Fast);
        assert!((profile.avg_response_ms - 400.0).abs() < 1e-9);
        assert_eq!(profile.stability, 1.0);
        assert_eq!(profile.optimal_method, CollectionMethod::SimpleHttp);
        assert!(profile.relevance > 50.0);
        assert_eq!(probe.calls.lock().unwrap()["browser"], 4);
        assert_eq!(profiler.history().get("https://fx.example.com/outlook").unwrap().attempts, 5);
    }

    #[tokio::test]
    async fn test_waf_on_minimal_probe_flags_anti_bot() {
        let probe = Arc::new(MockProbe {
            browser: Mutex::new(vec![
                MockProbe::ok(200, ARTICLE, 300),
                MockProbe::ok(200, ARTICLE, 300),
                MockProbe::ok(500, "", 300),
                MockProbe::ok(200, ARTICLE, 300),
            ]),
            minimal: Mutex::new(vec![MockProbe::ok(403, "Access Denied", 50)]),
            ..Default::default()
        });
        let mut profiler = SiteProfiler::new(probe, fast_config());

        let profile = profiler.generate_profile("https://guarded.example").await;

        assert!(profile.has_anti_bot);
        assert_eq!(profile.optimal_method, CollectionMethod::PlaywrightStealth);
        assert_eq!(profile.best_window, CollectionWindow::OffPeak);
        assert!((profile.stability - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_deadline_elapsed_returns_fallback() {
        let probe = Arc::new(MockProbe {
            browser: Mutex::new(vec![MockProbe::ok(200, ARTICLE, 300)]),
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let mut profiler = SiteProfiler::new(probe, fast_config());

        let profile = profiler
            .generate_profile_within("https://slow.example", Duration::from_millis(20))
            .await;

        assert_eq!(profile.content_quality, FALLBACK_QUALITY);
        assert!(profile.has_anti_bot);
        let history = profiler.history().get("https://slow.example").unwrap();
        assert_eq!(history.failures[0].kind, FailureKind::Timeout);
    }
}
