//! Throttled video enrichment of a loaded curriculum.
//!
//! The pipeline walks every subtopic in declared order and issues exactly one
//! video search per subtopic, strictly one at a time. A per-subtopic failure
//! degrades to an empty result list and processing continues. Every commit is
//! gated on the [`Generation`] of the load that started the run; once a newer
//! load exists, the run stops without committing anything further.

use crate::curriculum::Curriculum;
use crate::token::Generation;
use crate::video::{VideoResult, VideoSearch};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, instrument, warn};

/// Default gap between the end of one search and the start of the next.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(300);
/// Default number of videos kept per subtopic.
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Videos fetched so far, keyed by subtopic.
///
/// A missing key means the subtopic has not been enriched yet. A present but
/// empty list means it was enriched and nothing usable came back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnrichmentState {
    videos: BTreeMap<String, Vec<VideoResult>>,
}

impl EnrichmentState {
    pub fn get(&self, subtopic: &str) -> Option<&[VideoResult]> {
        self.videos.get(subtopic).map(Vec::as_slice)
    }

    pub fn is_enriched(&self, subtopic: &str) -> bool {
        self.videos.contains_key(subtopic)
    }

    pub fn insert(&mut self, subtopic: impl Into<String>, videos: Vec<VideoResult>) {
        self.videos.insert(subtopic.into(), videos);
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn clear(&mut self) {
        self.videos.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSettings {
    pub delay: Duration,
    pub max_results: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            delay: DEFAULT_REQUEST_DELAY,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The run stopped early because a newer load replaced its curriculum.
    pub superseded: bool,
}

impl EnrichmentReport {
    /// Every request of a non-empty, completed run failed.
    pub fn provider_unreachable(&self) -> bool {
        !self.superseded && self.requested > 0 && self.failed == self.requested
    }
}

/// Where the pipeline publishes results.
///
/// Implementations compare `generation` with the currently active one and
/// refuse anything stale.
#[async_trait]
pub trait EnrichmentSink: Send + Sync {
    async fn is_current(&self, generation: Generation) -> bool;

    /// Stores `videos` for `subtopic`. Returns `false` if `generation` is stale
    /// and nothing was written.
    async fn commit(&self, generation: Generation, subtopic: &str, videos: Vec<VideoResult>)
    -> bool;
}

/// Enforces a minimum gap between the completion of one request and the
/// issuance of the next.
#[derive(Debug)]
pub struct Throttle {
    min_gap: Duration,
    last_completed: Option<Instant>,
}

impl Throttle {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_completed: None,
        }
    }

    /// Waits until the next request may be issued.
    pub async fn ready(&self) {
        if let Some(last) = self.last_completed {
            sleep_until(last + self.min_gap).await;
        }
    }

    /// Records that the in-flight request has resolved.
    pub fn completed(&mut self) {
        self.last_completed = Some(Instant::now());
    }
}

#[derive(Clone)]
pub struct EnrichmentPipeline {
    search: Arc<dyn VideoSearch>,
    settings: EnrichmentSettings,
}

impl EnrichmentPipeline {
    pub fn new(search: Arc<dyn VideoSearch>, settings: EnrichmentSettings) -> Self {
        Self { search, settings }
    }

    pub fn settings(&self) -> EnrichmentSettings {
        self.settings
    }

    /// Enriches every subtopic of `curriculum`, committing into `sink`.
    #[instrument(skip_all, fields(%topic, %generation))]
    pub async fn enrich(
        &self,
        topic: &str,
        curriculum: &Curriculum,
        generation: Generation,
        sink: &dyn EnrichmentSink,
    ) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();
        let mut throttle = Throttle::new(self.settings.delay);
        info!(subtopics = curriculum.total_subtopics(), "Starting video enrichment");

        for entry in curriculum.entries() {
            throttle.ready().await;
            if !sink.is_current(generation).await {
                report.superseded = true;
                break;
            }

            let query = format!("{topic} {}", entry.subtopic);
            report.requested += 1;
            let videos = match self.search.search(&query, self.settings.max_results).await {
                Ok(mut videos) => {
                    report.succeeded += 1;
                    videos.truncate(self.settings.max_results);
                    videos
                }
                Err(e) => {
                    warn!(subtopic = %entry.subtopic, error = %e, "Video search failed; continuing with no videos");
                    report.failed += 1;
                    Vec::new()
                }
            };
            throttle.completed();

            debug!(subtopic = %entry.subtopic, count = videos.len(), "Committing videos");
            if !sink.commit(generation, &entry.subtopic, videos).await {
                report.superseded = true;
                break;
            }
        }

        if report.superseded {
            info!(requested = report.requested, "Enrichment superseded by a newer load");
        } else {
            info!(
                requested = report.requested,
                failed = report.failed,
                "Video enrichment finished"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::{Phase, SubtopicEntry};
    use crate::error::{FetchError, ParseError};
    use mockall::mock;
    use std::sync::Mutex;

    mock! {
        Searcher {}
        #[async_trait]
        impl VideoSearch for Searcher {
            async fn search(&self, query: &str, max_results: usize) -> Result<Vec<VideoResult>, FetchError>;
        }
    }

    /// Sink whose active generation can be bumped from inside a search.
    #[derive(Default)]
    struct TestSink {
        active: Mutex<Generation>,
        state: Mutex<EnrichmentState>,
        commits: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EnrichmentSink for TestSink {
        async fn is_current(&self, generation: Generation) -> bool {
            *self.active.lock().unwrap() == generation
        }

        async fn commit(
            &self,
            generation: Generation,
            subtopic: &str,
            videos: Vec<VideoResult>,
        ) -> bool {
            if *self.active.lock().unwrap() != generation {
                return false;
            }
            self.commits.lock().unwrap().push(subtopic.to_string());
            self.state.lock().unwrap().insert(subtopic, videos);
            true
        }
    }

    fn entry(name: &str) -> SubtopicEntry {
        SubtopicEntry {
            subtopic: name.to_string(),
            description: "d".to_string(),
            resources: vec![],
        }
    }

    fn video(title: &str) -> VideoResult {
        VideoResult {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            thumbnail: String::new(),
        }
    }

    fn two_phase_curriculum() -> Curriculum {
        Curriculum::new(vec![
            Phase {
                key: "Phase 1".into(),
                entries: vec![entry("A"), entry("B")],
            },
            Phase {
                key: "Phase 2".into(),
                entries: vec![entry("C")],
            },
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn issues_one_search_with_topic_and_subtopic() {
        let mut search = MockSearcher::new();
        search
            .expect_search()
            .withf(|query: &str, max_results: &usize| {
                query == "History Ancient Rome" && *max_results == 3
            })
            .times(1)
            .returning(|_, _| Ok(vec![video("Rome 101")]));

        let curriculum = Curriculum::new(vec![Phase {
            key: "Phase 1".into(),
            entries: vec![entry("Ancient Rome")],
        }]);
        let sink = TestSink::default();
        let pipeline = EnrichmentPipeline::new(Arc::new(search), EnrichmentSettings::default());

        let report = pipeline
            .enrich("History", &curriculum, Generation::default(), &sink)
            .await;

        assert_eq!(report.requested, 1);
        assert_eq!(
            sink.state.lock().unwrap().get("Ancient Rome"),
            Some(&[video("Rome 101")][..])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_degrades_to_empty_and_continues() {
        let mut search = MockSearcher::new();
        search.expect_search().returning(|query, _| {
            if query.ends_with(" B") {
                Err(ParseError::MissingField("results").into())
            } else {
                Ok(vec![video(query)])
            }
        });

        let sink = TestSink::default();
        let pipeline = EnrichmentPipeline::new(Arc::new(search), EnrichmentSettings::default());
        let report = pipeline
            .enrich("T", &two_phase_curriculum(), Generation::default(), &sink)
            .await;

        assert_eq!(report.requested, 3);
        assert_eq!(report.failed, 1);
        assert!(!report.provider_unreachable());
        let state = sink.state.lock().unwrap();
        assert_eq!(state.get("B"), Some(&[][..]));
        assert_eq!(state.get("C"), Some(&[video("T C")][..]));
        assert_eq!(*sink.commits.lock().unwrap(), ["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn truncates_to_max_results() {
        let mut search = MockSearcher::new();
        search
            .expect_search()
            .returning(|_, _| Ok((0..5).map(|n| video(&n.to_string())).collect()));

        let sink = TestSink::default();
        let settings = EnrichmentSettings {
            max_results: 2,
            ..Default::default()
        };
        let pipeline = EnrichmentPipeline::new(Arc::new(search), settings);
        pipeline
            .enrich("T", &two_phase_curriculum(), Generation::default(), &sink)
            .await;

        assert_eq!(sink.state.lock().unwrap().get("A").map(<[_]>::len), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_flag_provider_unreachable() {
        let mut search = MockSearcher::new();
        search
            .expect_search()
            .returning(|_, _| Err(ParseError::invalid("down").into()));

        let sink = TestSink::default();
        let pipeline = EnrichmentPipeline::new(Arc::new(search), EnrichmentSettings::default());
        let report = pipeline
            .enrich("T", &two_phase_curriculum(), Generation::default(), &sink)
            .await;

        assert!(report.provider_unreachable());
        assert_eq!(sink.state.lock().unwrap().len(), 3);
    }

    /// Records when each search started and finished.
    struct TimedSearch {
        latency: Duration,
        calls: Mutex<Vec<(Instant, Instant)>>,
    }

    #[async_trait]
    impl VideoSearch for TimedSearch {
        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<VideoResult>, FetchError> {
            let start = Instant::now();
            tokio::time::sleep(self.latency).await;
            self.calls.lock().unwrap().push((start, Instant::now()));
            Ok(vec![])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn requests_are_sequential_and_spaced_by_the_delay() {
        let search = Arc::new(TimedSearch {
            latency: Duration::from_millis(120),
            calls: Mutex::new(Vec::new()),
        });
        let sink = TestSink::default();
        let pipeline = EnrichmentPipeline::new(search.clone(), EnrichmentSettings::default());
        pipeline
            .enrich("T", &two_phase_curriculum(), Generation::default(), &sink)
            .await;

        let calls = search.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            let (_, prev_end) = pair[0];
            let (next_start, _) = pair[1];
            assert!(next_start >= prev_end + DEFAULT_REQUEST_DELAY);
        }
    }

    /// Bumps the sink's generation during the first search.
    struct SupersedingSearch {
        sink: Arc<TestSink>,
    }

    #[async_trait]
    impl VideoSearch for SupersedingSearch {
        async fn search(&self, query: &str, _max: usize) -> Result<Vec<VideoResult>, FetchError> {
            let mut active = self.sink.active.lock().unwrap();
            *active = active.next();
            Ok(vec![video(query)])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_run_commits_nothing() {
        let sink = Arc::new(TestSink::default());
        let search = Arc::new(SupersedingSearch { sink: sink.clone() });
        let pipeline = EnrichmentPipeline::new(search, EnrichmentSettings::default());

        let report = pipeline
            .enrich("T", &two_phase_curriculum(), Generation::default(), sink.as_ref())
            .await;

        assert!(report.superseded);
        assert_eq!(report.requested, 1);
        assert!(sink.state.lock().unwrap().is_empty());
    }
}
