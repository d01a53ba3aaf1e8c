use crate::curriculum::CurriculumService;
use crate::enrichment::{EnrichmentPipeline, EnrichmentReport};
use crate::error::LoadError;
use crate::state::{LoadCommit, SharedState};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};

/// What became of a `load` call that passed validation.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The curriculum was stored; enrichment is running on the returned task.
    Loaded(JoinHandle<EnrichmentReport>),
    /// A newer load started before this one resolved; its result was dropped.
    Superseded,
}

/// Fetches a curriculum for a topic and kicks off its enrichment.
#[derive(Clone)]
pub struct PathLoader {
    curriculum: Arc<dyn CurriculumService>,
    pipeline: EnrichmentPipeline,
}

impl PathLoader {
    pub fn new(curriculum: Arc<dyn CurriculumService>, pipeline: EnrichmentPipeline) -> Self {
        Self {
            curriculum,
            pipeline,
        }
    }

    pub async fn load(&self, state: &SharedState, topic: &str) -> Result<LoadOutcome, LoadError> {
        let topic = topic.trim().to_string();
        let generation = state.mutate(|s| s.begin_load(&topic)).await?;
        info!(%topic, %generation, "Loading learning path");

        let result = self.curriculum.generate(&topic).await;
        let curriculum = match state.mutate(|s| s.finish_load(generation, result)).await {
            LoadCommit::Loaded(curriculum) => curriculum,
            LoadCommit::Failed(e) => {
                warn!(%topic, error = %e, "Learning path request failed");
                return Err(LoadError::Fetch(e));
            }
            LoadCommit::Stale => {
                info!(%topic, %generation, "Learning path superseded before it arrived");
                return Ok(LoadOutcome::Superseded);
            }
        };

        let pipeline = self.pipeline.clone();
        let sink = state.clone();
        let span = info_span!("enrichment", %topic, %generation);
        let handle = tokio::spawn(
            async move {
                let report = pipeline
                    .enrich(&topic, &curriculum, generation, &sink)
                    .await;
                sink.mutate(|s| s.finish_enrichment(generation, &report))
                    .await;
                report
            }
            .instrument(span),
        );
        Ok(LoadOutcome::Loaded(handle))
    }
}
