#![forbid(unsafe_code)]

//! Live value editing for a small ES5-subset runtime.
//!
//! A property of a registered object is rendered as source text, edited by
//! a caller, and re-evaluated. Only the first complete expression of the
//! submission ever runs, and own state the old value carried but the new
//! one does not define is transplanted across before the commit.

pub mod ast;
pub mod config;
pub mod edit_controller;
pub mod edit_link;
pub mod error_code;
pub mod evaluator;
pub mod expression_extractor;
pub mod identity_registry;
pub mod interpreter;
pub mod lexer;
pub mod object_model;
pub mod parser;
pub mod session;
pub mod transplant;
pub mod value_loader;

pub use config::LiveEditConfig;
pub use edit_controller::{
    EditConfig, EditController, EditEvent, EditRequest, EditResponse, EditStatus,
    SharedEditController,
};
pub use error_code::{LiveEditError, LiveEditErrorCode};
pub use evaluator::{Evaluator, GlobalEvaluator};
pub use identity_registry::{EditHandle, IdentityRegistry};
pub use interpreter::{EvalFailure, InterpreterLimits, Realm};
pub use object_model::JsValue;
pub use parser::ParserLimits;
