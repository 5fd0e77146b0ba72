//! Bounds caller-supplied text to exactly one leading expression.
//!
//! Whatever follows the first complete expression is discarded unseen, so a
//! submission like `1+1; doEvilThing()` can never run the second statement.
//! Extraction parses only; nothing is evaluated here.

use serde::{Deserialize, Serialize};

use crate::ast::Span;
use crate::error_code::LiveEditError;
use crate::parser::{ParseError, ParseErrorCode, ParserLimits, parse_expression_at};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedExpression {
    /// Exact source of the expression, without leading trivia or trailing noise.
    pub text: String,
    pub span: Span,
}

pub fn extract(text: &str, limits: ParserLimits) -> Result<ExtractedExpression, LiveEditError> {
    let (_, span) = parse_expression_at(text, 0, limits)?;
    let expression = span.slice(text).ok_or_else(|| {
        ParseError::at(
            ParseErrorCode::UnexpectedToken,
            "expression span is out of bounds",
            text,
            span.start,
        )
    })?;
    Ok(ExtractedExpression {
        text: expression.to_string(),
        span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(text: &str) -> String {
        extract(text, ParserLimits::default())
            .expect("extract")
            .text
    }

    fn parse_code(text: &str) -> ParseErrorCode {
        match extract(text, ParserLimits::default()) {
            Err(LiveEditError::ParseError(err)) => err.code,
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn trailing_statements_are_discarded() {
        assert_eq!(extracted("1+1; doEvilThing()"), "1+1");
        assert_eq!(extracted("'a'\nfoo()"), "'a'");
    }

    #[test]
    fn bitwise_and_shift_expressions_extract_whole() {
        assert_eq!(extracted("1 | 2"), "1 | 2");
        assert_eq!(extracted("a >> 1"), "a >> 1");
        assert_eq!(extracted("a >>> 1; b"), "a >>> 1");
        assert_eq!(extracted("~mask & 0xff"), "~mask & 0xff");
        assert_eq!(extracted("flags ^ 4 // toggle"), "flags ^ 4");
    }

    #[test]
    fn unknown_character_after_expression_is_a_parse_error() {
        assert_eq!(parse_code("2 @ 3"), ParseErrorCode::UnexpectedCharacter);
        assert_eq!(parse_code("1 # 4"), ParseErrorCode::UnexpectedCharacter);
    }

    #[test]
    fn leading_trivia_is_skipped_and_span_reported() {
        let result = extract("  /* note */ 42 // tail", ParserLimits::default()).expect("extract");
        assert_eq!(result.text, "42");
        assert_eq!(result.span, Span::new(13, 15));
    }

    #[test]
    fn object_literal_extracts_whole() {
        assert_eq!(extracted("{a: 1, b: {c: 2}} extra"), "{a: 1, b: {c: 2}}");
    }

    #[test]
    fn escaped_strings_survive_extraction() {
        assert_eq!(extracted(r"'it\'s fine'"), r"'it\'s fine'");
    }

    #[test]
    fn extraction_is_idempotent() {
        for text in ["1+1; x", "function (a) { return a; } ()", "[1, [2]]", "a.b[c](d)"] {
            let once = extracted(text);
            assert_eq!(extracted(&once), once);
        }
    }

    #[test]
    fn empty_and_malformed_text_fail() {
        assert_eq!(parse_code(""), ParseErrorCode::EmptySource);
        assert_eq!(parse_code("   \n\t "), ParseErrorCode::EmptySource);
        assert_eq!(parse_code("{"), ParseErrorCode::UnexpectedToken);
        assert_eq!(parse_code(")"), ParseErrorCode::UnexpectedToken);
        assert_eq!(parse_code("'open"), ParseErrorCode::UnterminatedString);
    }

    #[test]
    fn diagnostics_carry_position() {
        let err = extract("{", ParserLimits::default()).expect_err("must fail");
        assert_eq!(err.to_string(), "SyntaxError: Unexpected end of input (1:1)");
    }
}
