//! Line-oriented quiz file format.
//!
//! ```text
//! What color is the sky?
//! * Blue
//! Green
//! Red
//! > Rayleigh scattering favours short wavelengths.
//!
//! Next question...
//! ```
//!
//! Blocks are separated by blank lines. The first line of a block is the
//! question, the following lines are answer options. The correct option starts
//! with `*`, and an optional last line starting with `>` is the explanation shown
//! after answering.

use super::{
    LineRange, Question, QuizFile, ReasonCode, ValidationError, MAX_EXPLANATION_LEN,
    MAX_OPTIONS, MAX_OPTION_LEN, MAX_QUESTIONS, MAX_QUESTION_LEN, MIN_OPTIONS,
};
use crate::error::FormatError;

const CORRECT_MARKER: char = '*';
const EXPLANATION_MARKER: char = '>';

/// Validates raw uploaded bytes. Invalid UTF-8 is reported per line instead of
/// rejecting the whole file, so the uploader sees every problem at once.
pub fn parse_bytes(raw: &[u8]) -> Result<QuizFile, FormatError> {
    match std::str::from_utf8(raw) {
        Ok(text) => Validator::new(false).run(text),
        Err(_) => Validator::new(true).run(&String::from_utf8_lossy(raw)),
    }
}

/// Validates quiz text.
pub fn parse(text: &str) -> Result<QuizFile, FormatError> {
    Validator::new(false).run(text)
}

struct SourceLine<'a> {
    number: usize,
    text: &'a str,
}

struct Validator {
    lossy: bool,
    errors: Vec<ValidationError>,
}

impl Validator {
    fn new(lossy: bool) -> Self {
        Self {
            lossy,
            errors: Vec::new(),
        }
    }

    fn run(mut self, text: &str) -> Result<QuizFile, FormatError> {
        // Notepad and friends prepend a byte order mark.
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut blocks: Vec<Vec<SourceLine<'_>>> = Vec::new();
        let mut current: Vec<SourceLine<'_>> = Vec::new();

        for (idx, raw) in text.split('\n').enumerate() {
            let line = SourceLine {
                number: idx + 1,
                text: raw.strip_suffix('\r').unwrap_or(raw),
            };

            if line.text.trim().is_empty() {
                if !current.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
                continue;
            }

            self.check_characters(&line);
            current.push(line);
        }
        if !current.is_empty() {
            blocks.push(current);
        }

        if blocks.is_empty() {
            self.errors.push(ValidationError {
                line: 1,
                content: String::new(),
                reason: ReasonCode::EmptyFile,
                block: None,
            });
        }

        if let Some(extra) = blocks.get(MAX_QUESTIONS) {
            let first = &extra[0];
            self.line_error(first, ReasonCode::TooManyQuestions);
        }

        let mut entries = Vec::with_capacity(blocks.len());
        for block in &blocks {
            if let Some(entry) = self.parse_block(block) {
                entries.push(entry);
            }
        }

        if self.errors.is_empty() {
            Ok(QuizFile::new(entries))
        } else {
            self.errors.sort_by_key(|error| error.line);
            Err(FormatError {
                errors: self.errors,
            })
        }
    }

    fn check_characters(&mut self, line: &SourceLine<'_>) {
        if self.lossy && line.text.contains(char::REPLACEMENT_CHARACTER) {
            self.line_error(line, ReasonCode::InvalidUtf8);
        }
        if line.text.chars().any(|c| c.is_control() && c != '\t') {
            self.line_error(line, ReasonCode::ControlCharacter);
        }
    }

    fn parse_block(&mut self, block: &[SourceLine<'_>]) -> Option<(Question, LineRange)> {
        let errors_before = self.errors.len();
        let first = &block[0];
        let range = LineRange {
            start: first.number,
            end: block[block.len() - 1].number,
        };

        let head = first.text.trim();
        let (prompt, answer_lines) = if head.starts_with(CORRECT_MARKER)
            || head.starts_with(EXPLANATION_MARKER)
        {
            self.block_error(first, range, ReasonCode::MissingQuestion);
            (None, block)
        } else {
            if head.chars().count() > MAX_QUESTION_LEN {
                self.line_error(first, ReasonCode::QuestionTooLong);
            }
            (Some(head), &block[1..])
        };

        let mut options = Vec::new();
        let mut correct = Vec::new();
        let mut explanation = None;

        for (position, line) in answer_lines.iter().enumerate() {
            let text = line.text.trim();

            if let Some(rest) = text.strip_prefix(EXPLANATION_MARKER) {
                let is_last = position + 1 == answer_lines.len();
                if explanation.is_some() || !is_last {
                    self.line_error(line, ReasonCode::MisplacedExplanation);
                }
                let rest = rest.trim();
                if rest.chars().count() > MAX_EXPLANATION_LEN {
                    self.line_error(line, ReasonCode::ExplanationTooLong);
                }
                if !rest.is_empty() {
                    explanation = Some(rest.to_string());
                }
                continue;
            }

            let (marked, option) = match text.strip_prefix(CORRECT_MARKER) {
                Some(rest) => (true, rest.trim()),
                None => (false, text),
            };

            if option.is_empty() {
                self.line_error(line, ReasonCode::EmptyOption);
            } else if option.starts_with(CORRECT_MARKER) || option.ends_with(CORRECT_MARKER) {
                self.line_error(line, ReasonCode::MisplacedMarker);
            } else if option.chars().count() > MAX_OPTION_LEN {
                self.line_error(line, ReasonCode::OptionTooLong);
            }

            if marked {
                correct.push(options.len());
            }
            options.push(option.to_string());
        }

        if options.len() < MIN_OPTIONS {
            self.block_error(first, range, ReasonCode::TooFewOptions);
        } else if options.len() > MAX_OPTIONS {
            self.block_error(first, range, ReasonCode::TooManyOptions);
        }

        match correct.len() {
            0 => self.block_error(first, range, ReasonCode::NoCorrectMarker),
            1 => {}
            _ => self.block_error(first, range, ReasonCode::MultipleCorrectMarkers),
        }

        if self.errors.len() != errors_before {
            return None;
        }

        let prompt = prompt?.to_string();
        Some((Question::new(prompt, options, correct[0], explanation), range))
    }

    fn line_error(&mut self, line: &SourceLine<'_>, reason: ReasonCode) {
        self.errors.push(ValidationError {
            line: line.number,
            content: line.text.trim().to_string(),
            reason,
            block: None,
        });
    }

    fn block_error(&mut self, first: &SourceLine<'_>, range: LineRange, reason: ReasonCode) {
        self.errors.push(ValidationError {
            line: first.number,
            content: first.text.trim().to_string(),
            reason,
            block: Some(range),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasons(text: &str) -> Vec<ReasonCode> {
        parse(text)
            .unwrap_err()
            .errors
            .into_iter()
            .map(|e| e.reason)
            .collect()
    }

    #[test]
    fn test_parse_single_question() {
        let quiz = parse("What color is the sky?\n* Blue\nGreen\nRed\n\n").unwrap();
        assert_eq!(quiz.len(), 1);
        let question = &quiz.questions()[0];
        assert_eq!(question.prompt(), "What color is the sky?");
        assert_eq!(question.options(), ["Blue", "Green", "Red"]);
        assert_eq!(question.correct_index(), 0);
        assert_eq!(question.explanation(), None);
        assert_eq!(quiz.line_range(0), Some(LineRange { start: 1, end: 4 }));
    }

    #[test]
    fn test_marker_tolerates_surrounding_whitespace() {
        let quiz = parse("  2 + 2?  \n  3\n   *   4  \n5").unwrap();
        let question = &quiz.questions()[0];
        assert_eq!(question.prompt(), "2 + 2?");
        assert_eq!(question.options(), ["3", "4", "5"]);
        assert_eq!(question.correct_index(), 1);
    }

    #[test]
    fn test_explanation_line() {
        let quiz = parse("Largest planet?\n*Jupiter\nMars\n> It is a gas giant.").unwrap();
        assert_eq!(quiz.questions()[0].explanation(), Some("It is a gas giant."));
        assert_eq!(quiz.questions()[0].options().len(), 2);
    }

    #[test]
    fn test_crlf_line_endings() {
        let quiz = parse("Q1\r\n*A\r\nB\r\n\r\nQ2\r\nA\r\n*B\r\n").unwrap();
        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz.questions()[1].correct_index(), 1);
        assert_eq!(quiz.line_range(1), Some(LineRange { start: 5, end: 7 }));
    }

    #[test]
    fn test_leading_byte_order_mark_is_ignored() {
        let quiz = parse_bytes("\u{feff}Sky?\n*Blue\nGreen\n".as_bytes()).unwrap();
        assert_eq!(quiz.questions()[0].prompt(), "Sky?");
    }

    #[test]
    fn test_too_few_options() {
        assert_eq!(reasons("Only one?\n* Yes\n"), vec![ReasonCode::TooFewOptions]);
    }

    #[test]
    fn test_trailing_marker_is_misplaced() {
        assert_eq!(
            reasons("Sky?\nBlue *\nGreen\n*Red"),
            vec![ReasonCode::MisplacedMarker]
        );
    }

    #[test]
    fn test_explanation_must_be_last() {
        assert_eq!(
            reasons("Sky?\n*Blue\n> because\nGreen"),
            vec![ReasonCode::MisplacedExplanation]
        );
    }

    #[test]
    fn test_marked_option_without_text() {
        assert_eq!(
            reasons("Sky?\n*\nBlue\nGreen"),
            vec![ReasonCode::EmptyOption]
        );
    }

    #[test]
    fn test_empty_file() {
        assert_eq!(reasons(" \n\n\t\n"), vec![ReasonCode::EmptyFile]);
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(
            reasons("Sky\u{0007}?\n*Blue\nGreen"),
            vec![ReasonCode::ControlCharacter]
        );
    }

    #[test]
    fn test_invalid_utf8_is_reported_per_line() {
        let mut raw = b"Sky?\n*Blue\n".to_vec();
        raw.extend_from_slice(&[0x47, 0xff, 0x65]);
        raw.extend_from_slice(b"\n\nOther?\n*A\nB\n");
        let error = parse_bytes(&raw).unwrap_err();
        assert_eq!(error.errors.len(), 1);
        assert_eq!(error.errors[0].reason, ReasonCode::InvalidUtf8);
        assert_eq!(error.errors[0].line, 3);
    }
}
