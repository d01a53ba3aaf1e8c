//! In-memory session state and its read-only snapshots.
//!
//! [`LearningState`] holds everything one learner sees. It is only mutated
//! through [`SharedState::mutate`], which publishes a fresh [`Snapshot`] to
//! subscribers after each change. The lock is never held across an `.await`.

use crate::chat::{ChatSession, ChatView};
use crate::curriculum::Curriculum;
use crate::enrichment::{EnrichmentReport, EnrichmentSink, EnrichmentState};
use crate::error::{FetchError, ValidationError};
use crate::progress::{Progress, ProgressTracker};
use crate::quiz::{QuizSession, QuizView};
use crate::token::Generation;
use crate::video::VideoResult;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct LearningState {
    topic: String,
    generation: Generation,
    curriculum: Option<Arc<Curriculum>>,
    loading: bool,
    enriching: bool,
    enrichment_unreachable: bool,
    last_error: Option<String>,
    enrichment: EnrichmentState,
    progress: ProgressTracker,
    pub(crate) quiz: QuizSession,
    pub(crate) chat: ChatSession,
}

/// Result of applying a curriculum response.
#[derive(Debug)]
pub(crate) enum LoadCommit {
    Loaded(Arc<Curriculum>),
    Failed(FetchError),
    Stale,
}

impl LearningState {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn curriculum(&self) -> Option<&Curriculum> {
        self.curriculum.as_deref()
    }

    pub fn enrichment(&self) -> &EnrichmentState {
        &self.enrichment
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Starts a new load: bumps the generation and drops everything derived
    /// from the previous curriculum in one step.
    pub(crate) fn begin_load(&mut self, topic: &str) -> Result<Generation, ValidationError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        self.generation = self.generation.next();
        self.topic = topic.to_string();
        self.curriculum = None;
        self.enrichment.clear();
        self.progress.clear();
        self.loading = true;
        self.enriching = false;
        self.enrichment_unreachable = false;
        self.last_error = None;
        self.quiz.close();
        self.chat.reset();
        Ok(self.generation)
    }

    pub(crate) fn finish_load(
        &mut self,
        generation: Generation,
        result: Result<Curriculum, FetchError>,
    ) -> LoadCommit {
        if generation != self.generation {
            return LoadCommit::Stale;
        }
        self.loading = false;
        match result {
            Ok(curriculum) => {
                let curriculum = Arc::new(curriculum);
                self.curriculum = Some(curriculum.clone());
                self.enriching = true;
                LoadCommit::Loaded(curriculum)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                LoadCommit::Failed(e)
            }
        }
    }

    pub(crate) fn commit_videos(
        &mut self,
        generation: Generation,
        subtopic: &str,
        videos: Vec<VideoResult>,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        self.enrichment.insert(subtopic, videos);
        true
    }

    pub(crate) fn finish_enrichment(&mut self, generation: Generation, report: &EnrichmentReport) {
        if generation != self.generation {
            return;
        }
        self.enriching = false;
        self.enrichment_unreachable = report.provider_unreachable();
        if self.enrichment_unreachable {
            warn!(topic = %self.topic, "Video provider unreachable for the whole learning path");
        }
    }

    pub(crate) fn toggle_completion(&mut self, subtopic: &str) -> Result<bool, ValidationError> {
        let known = self
            .curriculum
            .as_deref()
            .is_some_and(|c| c.contains_subtopic(subtopic));
        if !known {
            return Err(ValidationError::UnknownSubtopic(subtopic.to_string()));
        }
        Ok(self.progress.toggle(subtopic))
    }

    pub fn snapshot(&self) -> Snapshot {
        let phases = self
            .curriculum
            .as_deref()
            .map(|curriculum| {
                curriculum
                    .phases
                    .iter()
                    .map(|phase| PhaseView {
                        key: phase.key.clone(),
                        title: phase.title().to_string(),
                        entries: phase
                            .entries
                            .iter()
                            .map(|entry| SubtopicView {
                                subtopic: entry.subtopic.clone(),
                                description: entry.description.clone(),
                                resources: entry.resources.clone(),
                                videos: self.enrichment.get(&entry.subtopic).map(<[_]>::to_vec),
                                completed: self.progress.is_complete(&entry.subtopic),
                            })
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Snapshot {
            topic: self.topic.clone(),
            generation: self.generation,
            loading: self.loading,
            enriching: self.enriching,
            enrichment_unreachable: self.enrichment_unreachable,
            last_error: self.last_error.clone(),
            has_curriculum: self.curriculum.is_some(),
            phases,
            progress: self.progress.progress(self.curriculum.as_deref()),
            quiz: self.quiz.view(),
            chat: self.chat.view(),
        }
    }
}

/// Immutable view of the whole session, suitable for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub topic: String,
    pub generation: Generation,
    pub loading: bool,
    pub enriching: bool,
    /// Every video search of the last completed pass failed.
    pub enrichment_unreachable: bool,
    pub last_error: Option<String>,
    pub has_curriculum: bool,
    pub phases: Vec<PhaseView>,
    pub progress: Progress,
    pub quiz: QuizView,
    pub chat: ChatView,
}

impl Snapshot {
    pub fn subtopic(&self, name: &str) -> Option<&SubtopicView> {
        self.phases
            .iter()
            .flat_map(|phase| phase.entries.iter())
            .find(|entry| entry.subtopic == name)
    }

    /// `None` until the subtopic has been enriched.
    pub fn videos(&self, subtopic: &str) -> Option<&[VideoResult]> {
        self.subtopic(subtopic)?.videos.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseView {
    pub key: String,
    pub title: String,
    pub entries: Vec<SubtopicView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtopicView {
    pub subtopic: String,
    pub description: String,
    pub resources: Vec<String>,
    pub videos: Option<Vec<VideoResult>>,
    pub completed: bool,
}

/// Shared handle to one learner's state.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<LearningState>>,
    updates: Arc<watch::Sender<Snapshot>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        let state = LearningState::default();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Mutex::new(state)),
            updates: Arc::new(updates),
        }
    }

    /// Applies `f` atomically and publishes the resulting snapshot if it changed.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut LearningState) -> R) -> R {
        let mut state = self.inner.lock().await;
        let result = f(&mut state);
        let snapshot = state.snapshot();
        self.updates.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        result
    }

    /// Reads from the state without publishing anything.
    pub async fn read<R>(&self, f: impl FnOnce(&LearningState) -> R) -> R {
        let state = self.inner.lock().await;
        f(&state)
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.updates.subscribe()
    }
}

#[async_trait]
impl EnrichmentSink for SharedState {
    async fn is_current(&self, generation: Generation) -> bool {
        self.read(|state| state.generation == generation).await
    }

    async fn commit(
        &self,
        generation: Generation,
        subtopic: &str,
        videos: Vec<VideoResult>,
    ) -> bool {
        let committed = self
            .mutate(|state| state.commit_videos(generation, subtopic, videos))
            .await;
        if !committed {
            info!(%generation, %subtopic, "Dropping videos from a superseded load");
        }
        committed
    }
}
