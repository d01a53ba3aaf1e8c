use crate::curriculum::Curriculum;
use serde::Serialize;
use std::collections::BTreeSet;

/// Names of the subtopics the learner has marked done.
pub type CompletionSet = BTreeSet<String>;

/// Derived progress over the current curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Owns the completion set for the current curriculum.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    completed: CompletionSet,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership of `subtopic`. Returns whether it is now complete.
    pub fn toggle(&mut self, subtopic: &str) -> bool {
        if self.completed.remove(subtopic) {
            false
        } else {
            self.completed.insert(subtopic.to_string());
            true
        }
    }

    pub fn is_complete(&self, subtopic: &str) -> bool {
        self.completed.contains(subtopic)
    }

    pub fn completed(&self) -> &CompletionSet {
        &self.completed
    }

    pub fn clear(&mut self) {
        self.completed.clear();
    }

    pub fn progress(&self, curriculum: Option<&Curriculum>) -> Progress {
        let total = curriculum.map_or(0, Curriculum::total_subtopics);
        let completed = curriculum.map_or(0, |c| {
            c.entries()
                .filter(|entry| self.completed.contains(&entry.subtopic))
                .count()
        });
        Progress {
            completed,
            total,
            percentage: curriculum.map_or(0.0, |c| recompute(c, &self.completed)),
        }
    }
}

/// Percentage of `curriculum` covered by `completed`, in `[0, 100]`.
///
/// An empty curriculum is 0% complete.
pub fn recompute(curriculum: &Curriculum, completed: &CompletionSet) -> f64 {
    let total = curriculum.total_subtopics();
    if total == 0 {
        return 0.0;
    }
    let done = curriculum
        .entries()
        .filter(|entry| completed.contains(&entry.subtopic))
        .count();
    (100.0 * done as f64 / total as f64).clamp(0.0, 100.0)
}
