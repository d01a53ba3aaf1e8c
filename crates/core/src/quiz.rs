//! Multiple-choice quizzes per subtopic.
//!
//! [`QuizSession`] is a latest-wins state machine: opening a quiz supersedes
//! whatever request was outstanding, and only the response carrying the
//! current token is ever committed.

use crate::error::{FetchError, ParseError, ValidationError};
use crate::llm_client::{LLMClient, render_prompt, strip_code_fences};
use crate::token::RequestToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of options every generated question carries.
pub const QUIZ_OPTION_COUNT: usize = 4;
/// Default quiz length.
pub const DEFAULT_QUIZ_QUESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Always equal to one of `options`.
    pub answer: String,
}

impl QuizQuestion {
    pub fn validate(&self, arity: usize) -> Result<(), ParseError> {
        if self.question.trim().is_empty() {
            return Err(ParseError::invalid("quiz question text is empty"));
        }
        if self.options.len() != arity {
            return Err(ParseError::invalid(format!(
                "expected {arity} options, got {} for '{}'",
                self.options.len(),
                self.question
            )));
        }
        if !self.options.contains(&self.answer) {
            return Err(ParseError::invalid(format!(
                "answer '{}' is not one of the options for '{}'",
                self.answer, self.question
            )));
        }
        Ok(())
    }

    pub fn is_correct(&self, option: &str) -> bool {
        self.answer == option
    }
}

/// Parses a raw generator answer (optionally fenced) into validated questions.
pub fn parse_quiz(raw: &str, max_questions: usize) -> Result<Vec<QuizQuestion>, ParseError> {
    let mut questions: Vec<QuizQuestion> = serde_json::from_str(strip_code_fences(raw))?;
    questions.truncate(max_questions);
    for question in &questions {
        question.validate(QUIZ_OPTION_COUNT)?;
    }
    Ok(questions)
}

/// Generates multiple-choice questions about a subtopic.
#[async_trait]
pub trait QuizService: Send + Sync {
    async fn generate(
        &self,
        subtopic: &str,
        num_questions: usize,
    ) -> Result<Vec<QuizQuestion>, FetchError>;
}

/// An implementation of `QuizService` backed by an LLM.
pub struct LLMQuizService {
    llm: Arc<dyn LLMClient>,
    prompt_template: String,
}

impl LLMQuizService {
    /// `prompt_template` may use `{subtopic}` and `{num_questions}`.
    pub fn new(llm: Arc<dyn LLMClient>, prompt_template: String) -> Self {
        Self {
            llm,
            prompt_template,
        }
    }
}

#[async_trait]
impl QuizService for LLMQuizService {
    async fn generate(
        &self,
        subtopic: &str,
        num_questions: usize,
    ) -> Result<Vec<QuizQuestion>, FetchError> {
        let count = num_questions.to_string();
        let prompt = render_prompt(
            &self.prompt_template,
            &[("subtopic", subtopic), ("num_questions", &count)],
        );
        let answer = self
            .llm
            .complete(
                "You write multiple-choice quizzes. Return only a valid JSON array.",
                prompt,
            )
            .await?;
        let questions = parse_quiz(&answer, num_questions)?;
        info!(%subtopic, count = questions.len(), "Quiz generated");
        Ok(questions)
    }
}

/// A mock `QuizService` producing deterministic questions.
pub struct MockQuizService;

#[async_trait]
impl QuizService for MockQuizService {
    async fn generate(
        &self,
        subtopic: &str,
        num_questions: usize,
    ) -> Result<Vec<QuizQuestion>, FetchError> {
        Ok((1..=num_questions)
            .map(|n| {
                let options: Vec<String> = ["A", "B", "C", "D"]
                    .iter()
                    .map(|letter| format!("{subtopic} option {letter}"))
                    .collect();
                QuizQuestion {
                    question: format!("Question {n} about {subtopic}?"),
                    answer: options[(n - 1) % options.len()].clone(),
                    options,
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    Closed,
    Loading,
    Ready,
}

/// State of the quiz panel.
#[derive(Debug, Clone)]
pub struct QuizSession {
    subtopic: Option<String>,
    status: QuizStatus,
    questions: Vec<QuizQuestion>,
    selections: BTreeMap<usize, String>,
    last_token: RequestToken,
    outstanding: Option<RequestToken>,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            subtopic: None,
            status: QuizStatus::Closed,
            questions: Vec::new(),
            selections: BTreeMap::new(),
            last_token: RequestToken::default(),
            outstanding: None,
        }
    }

    pub fn status(&self) -> QuizStatus {
        self.status
    }

    pub fn subtopic(&self) -> Option<&str> {
        self.subtopic.as_deref()
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn selection(&self, question_index: usize) -> Option<&str> {
        self.selections.get(&question_index).map(String::as_str)
    }

    /// Starts loading a quiz for `subtopic`, superseding any outstanding request.
    pub fn open(&mut self, subtopic: &str) -> RequestToken {
        self.last_token = self.last_token.next();
        self.outstanding = Some(self.last_token);
        self.subtopic = Some(subtopic.to_string());
        self.status = QuizStatus::Loading;
        self.questions.clear();
        self.selections.clear();
        debug!(%subtopic, token = %self.last_token, "Quiz opened");
        self.last_token
    }

    /// Applies the outcome of the request tagged `token`.
    ///
    /// Returns `false` and changes nothing if the request was superseded or the
    /// quiz was closed in the meantime. A failure yields a ready, empty quiz.
    pub fn resolve(
        &mut self,
        token: RequestToken,
        result: Result<Vec<QuizQuestion>, FetchError>,
    ) -> bool {
        if self.outstanding != Some(token) {
            debug!(%token, "Discarding stale quiz response");
            return false;
        }
        self.outstanding = None;
        self.questions = result.unwrap_or_else(|e| {
            warn!(subtopic = ?self.subtopic, error = %e, "Quiz generation failed");
            Vec::new()
        });
        self.selections.clear();
        self.status = QuizStatus::Ready;
        true
    }

    /// Closes the quiz. An in-flight response will be discarded on arrival.
    pub fn close(&mut self) {
        self.outstanding = None;
        self.subtopic = None;
        self.status = QuizStatus::Closed;
        self.questions.clear();
        self.selections.clear();
    }

    /// Records `option` as the learner's answer to question `question_index`.
    pub fn select(&mut self, question_index: usize, option: &str) -> Result<(), ValidationError> {
        if self.status != QuizStatus::Ready {
            return Err(ValidationError::QuizNotReady);
        }
        let question = self
            .questions
            .get(question_index)
            .ok_or(ValidationError::QuestionOutOfRange(question_index))?;
        if !question.options.iter().any(|o| o == option) {
            return Err(ValidationError::UnknownOption(option.to_string()));
        }
        self.selections.insert(question_index, option.to_string());
        Ok(())
    }

    /// `Some(correct)` once the learner has answered question `question_index`.
    pub fn is_correct(&self, question_index: usize) -> Option<bool> {
        let selected = self.selections.get(&question_index)?;
        let question = self.questions.get(question_index)?;
        Some(question.is_correct(selected))
    }

    pub fn score(&self) -> usize {
        (0..self.questions.len())
            .filter(|&i| self.is_correct(i) == Some(true))
            .count()
    }

    pub fn view(&self) -> QuizView {
        QuizView {
            subtopic: self.subtopic.clone(),
            status: self.status,
            questions: self
                .questions
                .iter()
                .enumerate()
                .map(|(i, q)| QuizQuestionView {
                    question: q.question.clone(),
                    options: q.options.clone(),
                    selected: self.selections.get(&i).cloned(),
                    correct: self.is_correct(i),
                })
                .collect(),
            score: self.score(),
        }
    }
}

/// Read-only quiz state for presentation. Answers are only revealed through
/// `correct` once a selection exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizView {
    pub subtopic: Option<String>,
    pub status: QuizStatus,
    pub questions: Vec<QuizQuestionView>,
    pub score: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizQuestionView {
    pub question: String,
    pub options: Vec<String>,
    pub selected: Option<String>,
    pub correct: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str) -> QuizQuestion {
        QuizQuestion {
            question: text.to_string(),
            options: vec!["w".into(), "x".into(), "y".into(), "z".into()],
            answer: "x".into(),
        }
    }

    #[test]
    fn later_open_wins_regardless_of_arrival_order() {
        let mut quiz = QuizSession::new();
        let a = quiz.open("A");
        let b = quiz.open("B");

        assert!(quiz.resolve(b, Ok(vec![question("about B")])));
        assert!(!quiz.resolve(a, Ok(vec![question("about A")])));

        assert_eq!(quiz.subtopic(), Some("B"));
        assert_eq!(quiz.questions()[0].question, "about B");
        assert_eq!(quiz.status(), QuizStatus::Ready);
    }

    #[test]
    fn stale_response_before_current_is_ignored() {
        let mut quiz = QuizSession::new();
        let a = quiz.open("A");
        let b = quiz.open("B");

        assert!(!quiz.resolve(a, Ok(vec![question("about A")])));
        assert_eq!(quiz.status(), QuizStatus::Loading);
        assert!(quiz.questions().is_empty());

        assert!(quiz.resolve(b, Ok(vec![question("about B")])));
        assert_eq!(quiz.questions().len(), 1);
    }

    #[test]
    fn failure_degrades_to_ready_and_empty() {
        let mut quiz = QuizSession::new();
        let t = quiz.open("A");
        assert!(quiz.resolve(t, Err(ParseError::invalid("bad").into())));
        assert_eq!(quiz.status(), QuizStatus::Ready);
        assert!(quiz.questions().is_empty());
    }

    #[test]
    fn close_discards_in_flight_response() {
        let mut quiz = QuizSession::new();
        let t = quiz.open("A");
        quiz.close();
        assert!(!quiz.resolve(t, Ok(vec![question("late")])));
        assert_eq!(quiz.status(), QuizStatus::Closed);
        assert_eq!(quiz.subtopic(), None);
        assert!(quiz.questions().is_empty());
    }

    #[test]
    fn select_records_and_derives_correctness() {
        let mut quiz = QuizSession::new();
        let t = quiz.open("A");
        quiz.resolve(t, Ok(vec![question("q1"), question("q2")]));

        quiz.select(0, "x").unwrap();
        quiz.select(1, "w").unwrap();
        assert_eq!(quiz.status(), QuizStatus::Ready);
        assert_eq!(quiz.is_correct(0), Some(true));
        assert_eq!(quiz.is_correct(1), Some(false));
        assert_eq!(quiz.score(), 1);

        quiz.select(1, "x").unwrap();
        assert_eq!(quiz.selection(1), Some("x"));
        assert_eq!(quiz.score(), 2);
    }

    #[test]
    fn select_is_validated() {
        let mut quiz = QuizSession::new();
        assert_eq!(quiz.select(0, "x"), Err(ValidationError::QuizNotReady));

        let t = quiz.open("A");
        assert_eq!(quiz.select(0, "x"), Err(ValidationError::QuizNotReady));

        quiz.resolve(t, Ok(vec![question("q1")]));
        assert_eq!(
            quiz.select(3, "x"),
            Err(ValidationError::QuestionOutOfRange(3))
        );
        assert_eq!(
            quiz.select(0, "nope"),
            Err(ValidationError::UnknownOption("nope".into()))
        );
    }

    #[test]
    fn reopening_clears_selections() {
        let mut quiz = QuizSession::new();
        let t = quiz.open("A");
        quiz.resolve(t, Ok(vec![question("q1")]));
        quiz.select(0, "x").unwrap();

        let t = quiz.open("A");
        assert_eq!(quiz.selection(0), None);
        quiz.resolve(t, Ok(vec![question("q1")]));
        assert_eq!(quiz.selection(0), None);
        assert_eq!(quiz.view().score, 0);
    }

    #[test]
    fn parse_quiz_validates_answers_and_arity() {
        let good = r#"```json
        [{"question": "2+2?", "options": ["3", "4", "5", "6"], "answer": "4"}]
        ```"#;
        assert_eq!(parse_quiz(good, 3).unwrap().len(), 1);

        let bad_answer = r#"[{"question": "2+2?", "options": ["3", "4", "5", "6"], "answer": "B"}]"#;
        assert!(parse_quiz(bad_answer, 3).is_err());

        let bad_arity = r#"[{"question": "2+2?", "options": ["4", "5"], "answer": "4"}]"#;
        assert!(parse_quiz(bad_arity, 3).is_err());
    }

    #[test]
    fn parse_quiz_truncates_extra_questions() {
        let q = r#"{"question": "q", "options": ["a", "b", "c", "d"], "answer": "a"}"#;
        let raw = format!("[{q}, {q}, {q}, {q}]");
        assert_eq!(parse_quiz(&raw, 3).unwrap().len(), 3);
    }

    #[test]
    fn malformed_questions_past_the_limit_are_ignored() {
        let good = r#"{"question": "q", "options": ["a", "b", "c", "d"], "answer": "a"}"#;
        let bad = r#"{"question": "q", "options": ["a", "b"], "answer": "z"}"#;
        let raw = format!("```json [{good}, {good}, {bad}]```");
        assert_eq!(parse_quiz(&raw, 2).unwrap().len(), 2);
        assert!(parse_quiz(&raw, 3).is_err());
    }

    #[tokio::test]
    async fn mock_quiz_is_valid() {
        let questions = MockQuizService.generate("Loops", 3).await.unwrap();
        assert_eq!(questions.len(), 3);
        for q in &questions {
            q.validate(QUIZ_OPTION_COUNT).unwrap();
        }
    }
}
