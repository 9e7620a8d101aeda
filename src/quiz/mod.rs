//! Quiz data model, the text-file validator and the poll dispatcher.

pub mod dispatcher;
pub mod parser;

use serde::Serialize;
use std::fmt;

/// Telegram limits for quiz polls, enforced by the validator.
pub const MAX_QUESTION_LEN: usize = 300;
pub const MAX_OPTION_LEN: usize = 100;
pub const MAX_EXPLANATION_LEN: usize = 200;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;
pub const MAX_QUESTIONS: usize = 100;

/// A validated quiz question, ready to be sent as a poll.
///
/// Only the parser constructs these, so every instance satisfies the poll limits above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    prompt: String,
    options: Vec<String>,
    correct_index: usize,
    explanation: Option<String>,
}

impl Question {
    pub(crate) fn new(
        prompt: String,
        options: Vec<String>,
        correct_index: usize,
        explanation: Option<String>,
    ) -> Self {
        debug_assert!(correct_index < options.len());
        Self {
            prompt,
            options,
            correct_index,
            explanation,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }
}

/// Inclusive, 1-based range of source lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn contains(&self, line: usize) -> bool {
        (self.start..=self.end).contains(&line)
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "line {}", self.start)
        } else {
            write!(f, "lines {}-{}", self.start, self.end)
        }
    }
}

/// An uploaded quiz after successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizFile {
    questions: Vec<Question>,
    line_ranges: Vec<LineRange>,
}

impl QuizFile {
    pub(crate) fn new(entries: Vec<(Question, LineRange)>) -> Self {
        let (questions, line_ranges) = entries.into_iter().unzip();
        Self {
            questions,
            line_ranges,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn line_range(&self, index: usize) -> Option<LineRange> {
        self.line_ranges.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Why a line or block of a quiz file was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    MissingQuestion,
    TooFewOptions,
    TooManyOptions,
    NoCorrectMarker,
    MultipleCorrectMarkers,
    EmptyOption,
    MisplacedMarker,
    MisplacedExplanation,
    QuestionTooLong,
    OptionTooLong,
    ExplanationTooLong,
    ControlCharacter,
    InvalidUtf8,
    EmptyFile,
    TooManyQuestions,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingQuestion => "missing-question",
            ReasonCode::TooFewOptions => "too-few-options",
            ReasonCode::TooManyOptions => "too-many-options",
            ReasonCode::NoCorrectMarker => "no-correct-marker",
            ReasonCode::MultipleCorrectMarkers => "multiple-correct-markers",
            ReasonCode::EmptyOption => "empty-option",
            ReasonCode::MisplacedMarker => "misplaced-marker",
            ReasonCode::MisplacedExplanation => "misplaced-explanation",
            ReasonCode::QuestionTooLong => "question-too-long",
            ReasonCode::OptionTooLong => "option-too-long",
            ReasonCode::ExplanationTooLong => "explanation-too-long",
            ReasonCode::ControlCharacter => "control-character",
            ReasonCode::InvalidUtf8 => "invalid-utf8",
            ReasonCode::EmptyFile => "empty-file",
            ReasonCode::TooManyQuestions => "too-many-questions",
        }
    }

    /// Human readable hint shown to the uploader.
    pub fn describe(&self) -> String {
        match self {
            ReasonCode::MissingQuestion => {
                "block starts with an answer line instead of the question".to_string()
            }
            ReasonCode::TooFewOptions => format!("a question needs at least {MIN_OPTIONS} options"),
            ReasonCode::TooManyOptions => format!("a question can have at most {MAX_OPTIONS} options"),
            ReasonCode::NoCorrectMarker => "no option is marked correct with '*'".to_string(),
            ReasonCode::MultipleCorrectMarkers => "more than one option is marked with '*'".to_string(),
            ReasonCode::EmptyOption => "option has no text after the '*' marker".to_string(),
            ReasonCode::MisplacedMarker => {
                "the '*' marker must be the first character of the option".to_string()
            }
            ReasonCode::MisplacedExplanation => {
                "only one '>' explanation is allowed and it must be the last line of the block"
                    .to_string()
            }
            ReasonCode::QuestionTooLong => format!("question exceeds {MAX_QUESTION_LEN} characters"),
            ReasonCode::OptionTooLong => format!("option exceeds {MAX_OPTION_LEN} characters"),
            ReasonCode::ExplanationTooLong => {
                format!("explanation exceeds {MAX_EXPLANATION_LEN} characters")
            }
            ReasonCode::ControlCharacter => "line contains control characters".to_string(),
            ReasonCode::InvalidUtf8 => "line is not valid UTF-8 text".to_string(),
            ReasonCode::EmptyFile => "file contains no questions".to_string(),
            ReasonCode::TooManyQuestions => {
                format!("a file can contain at most {MAX_QUESTIONS} questions")
            }
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single problem found while validating a quiz file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// 1-based line the error points at.
    pub line: usize,
    /// Offending line, as written in the file.
    pub content: String,
    pub reason: ReasonCode,
    /// Owning block, set for errors that concern a whole question.
    pub block: Option<LineRange>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block {
            Some(block) => write!(f, "{} ({}): {}", block, self.reason, self.reason.describe()),
            None => write!(f, "line {} ({}): {}", self.line, self.reason, self.reason.describe()),
        }
    }
}
