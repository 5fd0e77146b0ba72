use serde::{Deserialize, Serialize};

use crate::identity_registry::EditHandle;
use crate::interpreter::EvalFailure;
use crate::parser::ParseError;

pub const LIVE_EDIT_ERROR_CODE_COMPATIBILITY_POLICY: &str =
    "append-only: assigned codes are permanent, never reused, and may only be marked deprecated";

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiveEditErrorCode {
    InvalidTarget = 1,
    HandleNotFound = 2,
    ParseError = 3,
    EvalError = 4,
    CommitRejected = 5,
}

pub const ALL_LIVE_EDIT_ERROR_CODES: &[LiveEditErrorCode] = &[
    LiveEditErrorCode::InvalidTarget,
    LiveEditErrorCode::HandleNotFound,
    LiveEditErrorCode::ParseError,
    LiveEditErrorCode::EvalError,
    LiveEditErrorCode::CommitRejected,
];

impl LiveEditErrorCode {
    pub const fn numeric(self) -> u16 {
        self as u16
    }

    pub fn stable_code(self) -> String {
        format!("FE-LIVEEDIT-{:04}", self.numeric())
    }

    /// Bad-target errors are caller-input errors, reported as a distinct
    /// class rather than as an edit status.
    pub const fn is_bad_target(self) -> bool {
        matches!(self, Self::InvalidTarget | Self::HandleNotFound)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidTarget => "Only objects and callables can be registered for editing.",
            Self::HandleNotFound => "The edit handle was never issued by this registry.",
            Self::ParseError => "Submitted text does not begin with a well-formed expression.",
            Self::EvalError => "Evaluating the extracted expression raised an error.",
            Self::CommitRejected => {
                "The target refused the write because the property or object is frozen."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiveEditError {
    #[error("cannot register a {type_name} value for editing")]
    InvalidTarget { type_name: &'static str },
    #[error("edit handle {handle} not found")]
    HandleNotFound { handle: EditHandle },
    #[error("SyntaxError: {0}")]
    ParseError(ParseError),
    #[error("{0}")]
    EvalError(EvalFailure),
    #[error("TypeError: {diagnostic}")]
    CommitRejected { diagnostic: String },
}

impl LiveEditError {
    pub const fn code(&self) -> LiveEditErrorCode {
        match self {
            Self::InvalidTarget { .. } => LiveEditErrorCode::InvalidTarget,
            Self::HandleNotFound { .. } => LiveEditErrorCode::HandleNotFound,
            Self::ParseError(_) => LiveEditErrorCode::ParseError,
            Self::EvalError(_) => LiveEditErrorCode::EvalError,
            Self::CommitRejected { .. } => LiveEditErrorCode::CommitRejected,
        }
    }

    pub fn stable_code(&self) -> String {
        self.code().stable_code()
    }

    pub const fn is_bad_target(&self) -> bool {
        self.code().is_bad_target()
    }
}

impl From<ParseError> for LiveEditError {
    fn from(error: ParseError) -> Self {
        Self::ParseError(error)
    }
}

impl From<EvalFailure> for LiveEditError {
    fn from(failure: EvalFailure) -> Self {
        Self::EvalError(failure)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::interpreter::EvalFailureKind;
    use crate::parser::ParseErrorCode;

    #[test]
    fn stable_codes_are_unique_and_formatted() {
        let codes: BTreeSet<String> = ALL_LIVE_EDIT_ERROR_CODES
            .iter()
            .map(|code| code.stable_code())
            .collect();
        assert_eq!(codes.len(), ALL_LIVE_EDIT_ERROR_CODES.len());
        assert_eq!(
            LiveEditErrorCode::InvalidTarget.stable_code(),
            "FE-LIVEEDIT-0001"
        );
        assert_eq!(
            LiveEditErrorCode::CommitRejected.stable_code(),
            "FE-LIVEEDIT-0005"
        );
    }

    #[test]
    fn target_errors_are_the_bad_target_class() {
        let bad: Vec<LiveEditErrorCode> = ALL_LIVE_EDIT_ERROR_CODES
            .iter()
            .copied()
            .filter(|code| code.is_bad_target())
            .collect();
        assert_eq!(
            bad,
            vec![
                LiveEditErrorCode::InvalidTarget,
                LiveEditErrorCode::HandleNotFound
            ]
        );
    }

    #[test]
    fn display_matches_host_error_style() {
        let parse = LiveEditError::from(ParseError::source_too_large(10, 4));
        assert_eq!(parse.code(), LiveEditErrorCode::ParseError);
        assert!(parse.to_string().starts_with("SyntaxError: source is 10 bytes"));

        let eval = LiveEditError::from(EvalFailure::new(
            EvalFailureKind::Reference,
            "x is not defined",
        ));
        assert_eq!(eval.to_string(), "ReferenceError: x is not defined");

        let rejected = LiveEditError::CommitRejected {
            diagnostic: "Cannot assign to read only property 'k'".into(),
        };
        assert_eq!(
            rejected.to_string(),
            "TypeError: Cannot assign to read only property 'k'"
        );
        assert_eq!(rejected.stable_code(), "FE-LIVEEDIT-0005");
    }

    #[test]
    fn handle_not_found_reports_the_handle() {
        let err = LiveEditError::HandleNotFound {
            handle: EditHandle(7),
        };
        assert_eq!(err.to_string(), "edit handle 7 not found");
        assert!(err.is_bad_target());
        let parse = LiveEditError::ParseError(ParseError::at(
            ParseErrorCode::EmptySource,
            "Unexpected end of input",
            "",
            0,
        ));
        assert!(!parse.is_bad_target());
    }
}
