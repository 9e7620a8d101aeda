use quiz_poll_bot::quiz::parser::{parse, parse_bytes};
use quiz_poll_bot::quiz::{LineRange, ReasonCode, MAX_QUESTIONS};

#[cfg(test)]
mod parser_tests {
    use super::*;

    const SKY: &str = "What colour is the sky?\nGreen\n*Blue\nRed\n";

    #[test]
    fn test_sky_scenario() {
        let quiz = parse(SKY).unwrap();
        assert_eq!(quiz.len(), 1);

        let question = &quiz.questions()[0];
        assert_eq!(question.prompt(), "What colour is the sky?");
        assert_eq!(question.options(), ["Green", "Blue", "Red"]);
        assert_eq!(question.correct_index(), 1);
        assert_eq!(question.explanation(), None);
        assert_eq!(quiz.line_range(0), Some(LineRange { start: 1, end: 4 }));
    }

    #[test]
    fn test_one_question_per_block() {
        let text = "Q1\n*A\nB\n\n\n\nQ2\nA\n*B\nC\n> because\n\nQ3\n*yes\nno";
        let quiz = parse(text).unwrap();

        assert_eq!(quiz.len(), 3);
        let prompts: Vec<&str> = quiz.questions().iter().map(|q| q.prompt()).collect();
        assert_eq!(prompts, ["Q1", "Q2", "Q3"]);
        assert_eq!(quiz.questions()[1].explanation(), Some("because"));
        assert_eq!(quiz.line_range(1), Some(LineRange { start: 7, end: 11 }));
        assert_eq!(quiz.line_range(2), Some(LineRange { start: 13, end: 15 }));
    }

    #[test]
    fn test_missing_marker_reports_one_block_error() {
        let text = "Q1\n*A\nB\n\nQ2\nA\nB\nC\n";
        let error = parse(text).unwrap_err();

        assert_eq!(error.errors.len(), 1);
        let e = &error.errors[0];
        assert_eq!(e.reason, ReasonCode::NoCorrectMarker);
        assert_eq!(e.line, 5);
        assert_eq!(e.content, "Q2");
        assert_eq!(e.block, Some(LineRange { start: 5, end: 8 }));
        assert!(e.block.is_some_and(|range| range.contains(8) && !range.contains(9)));
    }

    #[test]
    fn test_single_option_is_too_few() {
        let error = parse("Lonely question\n*Only answer\n").unwrap_err();

        assert_eq!(error.errors.len(), 1);
        assert_eq!(error.errors[0].reason, ReasonCode::TooFewOptions);
        assert_eq!(error.errors[0].line, 1);
    }

    #[test]
    fn test_all_errors_are_collected_in_line_order() {
        let text = "Q1\nA\nB\n\nQ2\n*A\n*B\n\n* not a question\nB\n";
        let error = parse(text).unwrap_err();

        let found: Vec<(usize, ReasonCode)> = error.errors.iter().map(|e| (e.line, e.reason)).collect();
        assert_eq!(
            found,
            vec![
                (1, ReasonCode::NoCorrectMarker),
                (5, ReasonCode::MultipleCorrectMarkers),
                (9, ReasonCode::MissingQuestion),
            ]
        );
    }

    #[test]
    fn test_too_many_options() {
        let mut text = String::from("Pick one\n*0\n");
        for i in 1..=10 {
            text.push_str(&format!("{i}\n"));
        }
        let error = parse(&text).unwrap_err();
        assert_eq!(error.errors.len(), 1);
        assert_eq!(error.errors[0].reason, ReasonCode::TooManyOptions);
    }

    #[test]
    fn test_length_limits() {
        let long_question = "q".repeat(301);
        let long_option = "o".repeat(101);
        let long_explanation = "e".repeat(201);
        let text = format!("{long_question}\n*{long_option}\nB\n> {long_explanation}\n");

        let error = parse(&text).unwrap_err();
        let reasons: Vec<ReasonCode> = error.errors.iter().map(|e| e.reason).collect();
        assert_eq!(
            reasons,
            vec![
                ReasonCode::QuestionTooLong,
                ReasonCode::OptionTooLong,
                ReasonCode::ExplanationTooLong,
            ]
        );
    }

    #[test]
    fn test_limits_count_characters_not_bytes() {
        let text = format!("{}\n*Ä\nÖ\n", "é".repeat(300));
        assert!(parse(&text).is_ok());
    }

    #[test]
    fn test_too_many_questions() {
        let text = (0..=MAX_QUESTIONS)
            .map(|i| format!("Q{i}\n*A\nB"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let error = parse(&text).unwrap_err();

        assert_eq!(error.errors.len(), 1);
        assert_eq!(error.errors[0].reason, ReasonCode::TooManyQuestions);
        assert_eq!(error.errors[0].content, format!("Q{MAX_QUESTIONS}"));
    }

    #[test]
    fn test_whitespace_only_file_is_empty() {
        let error = parse(" \n\t\n").unwrap_err();
        assert_eq!(error.errors[0].reason, ReasonCode::EmptyFile);
    }

    #[test]
    fn test_parse_bytes_accepts_valid_utf8() {
        let quiz = parse_bytes(SKY.as_bytes()).unwrap();
        assert_eq!(quiz.questions()[0].correct_index(), 1);
    }

    #[test]
    fn test_reason_codes_are_kebab_case() {
        assert_eq!(ReasonCode::NoCorrectMarker.as_str(), "no-correct-marker");
        assert_eq!(ReasonCode::TooFewOptions.to_string(), "too-few-options");
        assert_eq!(ReasonCode::MisplacedExplanation.as_str(), "misplaced-explanation");
    }
}
