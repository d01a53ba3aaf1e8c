//! Orchestration core for JEDI learning paths.
//!
//! A topic is turned into a phase-structured curriculum, every subtopic is
//! enriched with videos on a throttled schedule, completion is tracked, and
//! each subtopic/topic offers an on-demand quiz and Q&A. Generation itself is
//! delegated to the collaborator traits in [`curriculum`], [`video`], [`quiz`]
//! and [`chat`].

pub mod chat;
pub mod controller;
pub mod curriculum;
pub mod enrichment;
pub mod error;
pub mod llm_client;
pub mod loader;
pub mod progress;
pub mod quiz;
pub mod state;
pub mod token;
pub mod video;

pub use controller::{Controller, ControllerSettings, Services};
pub use error::{FetchError, LoadError, ParseError, ValidationError};
pub use loader::LoadOutcome;
pub use state::Snapshot;
