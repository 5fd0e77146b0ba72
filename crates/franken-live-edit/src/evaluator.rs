//! Turns extracted expression text into a live value.
//!
//! [`Evaluator`] is the single seam through which submitted text gains the
//! ability to run. The controller only ever hands it the output of the
//! expression extractor.

use crate::error_code::LiveEditError;
use crate::interpreter::Realm;
use crate::object_model::JsValue;
use crate::parser::ParserLimits;

pub trait Evaluator {
    fn evaluate(&mut self, realm: &mut Realm, text: &str) -> Result<JsValue, LiveEditError>;
}

impl<F> Evaluator for F
where
    F: FnMut(&mut Realm, &str) -> Result<JsValue, LiveEditError>,
{
    fn evaluate(&mut self, realm: &mut Realm, text: &str) -> Result<JsValue, LiveEditError> {
        self(realm, text)
    }
}

/// Evaluates text as a parenthesized expression in the realm's global
/// scope, so a leading `{` is an object literal rather than a block.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalEvaluator {
    parser_limits: ParserLimits,
}

impl GlobalEvaluator {
    pub fn new(parser_limits: ParserLimits) -> Self {
        Self { parser_limits }
    }
}

impl Evaluator for GlobalEvaluator {
    fn evaluate(&mut self, realm: &mut Realm, text: &str) -> Result<JsValue, LiveEditError> {
        // The newline keeps a trailing line comment from swallowing the paren.
        let wrapped = format!("({text}\n)");
        realm
            .run_script(&wrapped, self.parser_limits)
            .map_err(LiveEditError::EvalError)
    }
}
