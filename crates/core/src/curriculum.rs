//! Curriculum Generation Service
//!
//! This module defines the phase-structured learning path returned for a topic
//! and the services that generate it. Phase order and subtopic order are
//! significant: the enrichment pipeline walks them exactly as declared.

use crate::error::{FetchError, ParseError};
use crate::llm_client::{LLMClient, render_prompt, strip_code_fences};
use async_trait::async_trait;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// One learnable item inside a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtopicEntry {
    /// Unique across the whole curriculum; used as a lookup key.
    pub subtopic: String,
    pub description: String,
    #[serde(default)]
    pub resources: Vec<String>,
}

/// A named group of subtopics, e.g. `"Phase 1"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub key: String,
    pub entries: Vec<SubtopicEntry>,
}

impl Phase {
    /// Human-facing title for this phase.
    pub fn title(&self) -> &str {
        phase_display_name(&self.key)
    }
}

/// Maps the generator's canonical phase keys to difficulty labels.
pub fn phase_display_name(key: &str) -> &str {
    match key {
        "Phase 1" => "Beginner",
        "Phase 2" => "Intermediate",
        "Phase 3" => "Advanced",
        other => other,
    }
}

/// An ordered mapping of phase key to ordered subtopic entries.
///
/// On the wire this is a JSON object; key order is preserved in both
/// directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Curriculum {
    pub phases: Vec<Phase>,
}

impl Curriculum {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    /// All entries in declared phase order, then declared entry order.
    pub fn entries(&self) -> impl Iterator<Item = &SubtopicEntry> {
        self.phases.iter().flat_map(|phase| phase.entries.iter())
    }

    pub fn total_subtopics(&self) -> usize {
        self.phases.iter().map(|phase| phase.entries.len()).sum()
    }

    pub fn contains_subtopic(&self, name: &str) -> bool {
        self.entries().any(|entry| entry.subtopic == name)
    }

    /// Checks the invariants the rest of the core relies on.
    pub fn validate(self) -> Result<Self, ParseError> {
        let mut seen = HashSet::new();
        for entry in self.entries() {
            if entry.subtopic.trim().is_empty() {
                return Err(ParseError::invalid("subtopic name is empty"));
            }
            if !seen.insert(entry.subtopic.as_str()) {
                return Err(ParseError::invalid(format!(
                    "duplicate subtopic '{}'",
                    entry.subtopic
                )));
            }
        }
        Ok(self)
    }

    /// Parses a raw generator answer (optionally fenced) into a validated curriculum.
    pub fn from_llm_output(raw: &str) -> Result<Self, ParseError> {
        let curriculum: Curriculum = serde_json::from_str(strip_code_fences(raw))?;
        curriculum.validate()
    }
}

impl Serialize for Curriculum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.phases.len()))?;
        for phase in &self.phases {
            map.serialize_entry(&phase.key, &phase.entries)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Curriculum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CurriculumVisitor;

        impl<'de> Visitor<'de> for CurriculumVisitor {
            type Value = Curriculum;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of phase names to lists of subtopics")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Curriculum, A::Error> {
                let mut phases = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, entries)) = access.next_entry::<String, Vec<SubtopicEntry>>()? {
                    phases.push(Phase { key, entries });
                }
                Ok(Curriculum { phases })
            }
        }

        deserializer.deserialize_map(CurriculumVisitor)
    }
}

/// Defines the contract for any service that can generate a curriculum.
///
/// This abstraction allows the system to swap between different curriculum
/// generation approaches (e.g., LLM-backed, static mock) while keeping the
/// orchestration layer unchanged.
#[async_trait]
pub trait CurriculumService: Send + Sync {
    /// Generates a phase-structured learning path for `topic`.
    async fn generate(&self, topic: &str) -> Result<Curriculum, FetchError>;
}

/// An implementation of `CurriculumService` backed by an LLM.
pub struct LLMCurriculumService {
    llm: Arc<dyn LLMClient>,
    prompt_template: String,
}

impl LLMCurriculumService {
    /// Creates a new LLM-based curriculum service.
    ///
    /// # Arguments
    ///
    /// * `llm` - The completion client to use.
    /// * `prompt_template` - Template with a `{topic}` placeholder.
    pub fn new(llm: Arc<dyn LLMClient>, prompt_template: String) -> Self {
        Self {
            llm,
            prompt_template,
        }
    }
}

#[async_trait]
impl CurriculumService for LLMCurriculumService {
    async fn generate(&self, topic: &str) -> Result<Curriculum, FetchError> {
        let prompt = render_prompt(&self.prompt_template, &[("topic", topic)]);
        let answer = self
            .llm
            .complete(
                "You are a helpful assistant that generates curriculum. Return only valid JSON.",
                prompt,
            )
            .await?;
        let curriculum = Curriculum::from_llm_output(&answer)?;
        info!(%topic, phases = curriculum.phases.len(), subtopics = curriculum.total_subtopics(), "Curriculum generated");
        Ok(curriculum)
    }
}

/// A mock `CurriculumService` for development and integration testing.
///
/// This implementation provides predictable, deterministic output, which is
/// useful for running the service without external dependencies or API costs.
pub struct MockCurriculumService;

#[async_trait]
impl CurriculumService for MockCurriculumService {
    /// Generates a standard three-phase curriculum for any given topic.
    async fn generate(&self, topic: &str) -> Result<Curriculum, FetchError> {
        let entry = |name: String| SubtopicEntry {
            description: format!("An overview of {name}."),
            subtopic: name,
            resources: Vec::new(),
        };
        let phase = |key: &str, names: [String; 3]| Phase {
            key: key.to_string(),
            entries: names.into_iter().map(entry).collect(),
        };
        Ok(Curriculum::new(vec![
            phase(
                "Phase 1",
                [
                    format!("Introduction to {topic}"),
                    "Core Concepts".to_string(),
                    "Key Terminology".to_string(),
                ],
            ),
            phase(
                "Phase 2",
                [
                    "Practical Applications".to_string(),
                    "Common Patterns".to_string(),
                    "Tooling".to_string(),
                ],
            ),
            phase(
                "Phase 3",
                [
                    "Advanced Topics".to_string(),
                    "Performance".to_string(),
                    "Case Studies".to_string(),
                ],
            ),
        ]))
    }
}
