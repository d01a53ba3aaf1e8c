//! Composition root for one learner's session.
//!
//! The [`Controller`] exposes the presentation operations and owns the only
//! mutable state. Every operation follows the same shape: mutate under the
//! lock to obtain a token, release it, await the collaborator, then commit
//! under the lock only if the token is still current.

use crate::chat::{ChatService, MockChatService};
use crate::curriculum::{CurriculumService, MockCurriculumService};
use crate::enrichment::{EnrichmentPipeline, EnrichmentSettings};
use crate::error::{LoadError, ValidationError};
use crate::loader::{LoadOutcome, PathLoader};
use crate::quiz::{DEFAULT_QUIZ_QUESTIONS, MockQuizService, QuizService};
use crate::state::{SharedState, Snapshot};
use crate::video::{MockVideoSearch, VideoSearch};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument};

/// The four external collaborators.
#[derive(Clone)]
pub struct Services {
    pub curriculum: Arc<dyn CurriculumService>,
    pub videos: Arc<dyn VideoSearch>,
    pub quiz: Arc<dyn QuizService>,
    pub chat: Arc<dyn ChatService>,
}

impl Services {
    /// Offline services with deterministic output.
    pub fn mock() -> Self {
        Self {
            curriculum: Arc::new(MockCurriculumService),
            videos: Arc::new(MockVideoSearch),
            quiz: Arc::new(MockQuizService),
            chat: Arc::new(MockChatService),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub enrichment: EnrichmentSettings,
    pub quiz_questions: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            enrichment: EnrichmentSettings::default(),
            quiz_questions: DEFAULT_QUIZ_QUESTIONS,
        }
    }
}

#[derive(Clone)]
pub struct Controller {
    loader: PathLoader,
    quiz: Arc<dyn QuizService>,
    chat: Arc<dyn ChatService>,
    quiz_questions: usize,
    state: SharedState,
}

impl Controller {
    pub fn new(services: Services, settings: ControllerSettings) -> Self {
        let pipeline = EnrichmentPipeline::new(services.videos, settings.enrichment);
        Self {
            loader: PathLoader::new(services.curriculum, pipeline),
            quiz: services.quiz,
            chat: services.chat,
            quiz_questions: settings.quiz_questions,
            state: SharedState::new(),
        }
    }

    /// Receives a new snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.read(|s| s.snapshot()).await
    }

    /// Loads a learning path for `topic`, replacing the current one.
    ///
    /// # Errors
    ///
    /// `LoadError::Validation` for a blank topic (nothing changes) and
    /// `LoadError::Fetch` when the generator fails (no curriculum is shown).
    pub async fn load_path(&self, topic: &str) -> Result<LoadOutcome, LoadError> {
        self.loader.load(&self.state, topic).await
    }

    /// Marks `subtopic` done, or not done if it already was.
    pub async fn toggle_completion(&self, subtopic: &str) -> Result<bool, ValidationError> {
        self.state.mutate(|s| s.toggle_completion(subtopic)).await
    }

    /// Opens the quiz for `subtopic`, superseding any quiz still loading.
    #[instrument(skip(self))]
    pub async fn open_quiz(&self, subtopic: &str) {
        let token = self.state.mutate(|s| s.quiz.open(subtopic)).await;
        let result = self.quiz.generate(subtopic, self.quiz_questions).await;
        let committed = self.state.mutate(|s| s.quiz.resolve(token, result)).await;
        debug!(%token, committed, "Quiz request resolved");
    }

    pub async fn close_quiz(&self) {
        self.state.mutate(|s| s.quiz.close()).await;
    }

    pub async fn select_answer(
        &self,
        question_index: usize,
        option: &str,
    ) -> Result<(), ValidationError> {
        self.state
            .mutate(|s| s.quiz.select(question_index, option))
            .await
    }

    /// Asks a free-form question about the current topic.
    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> Result<(), ValidationError> {
        let (token, topic) = self
            .state
            .mutate(|s| {
                if question.trim().is_empty() {
                    return Err(ValidationError::EmptyQuestion);
                }
                let topic = s.topic().to_string();
                if topic.is_empty() {
                    return Err(ValidationError::NoTopic);
                }
                s.chat.ask(&topic, question).map(|token| (token, topic))
            })
            .await?;

        let result = self.chat.answer(&topic, question.trim()).await;
        let committed = self.state.mutate(|s| s.chat.resolve(token, result)).await;
        debug!(%token, committed, "Chat request resolved");
        Ok(())
    }
}
