//! Edit round trip controller.
//!
//! Orchestrates one request at a time: resolve the handle, then either
//! render the current value (load) or extract, evaluate, transplant and
//! commit caller-edited text (save). Each step appends a structured
//! [`EditEvent`] to the controller's log.
//!
//! Only bad-target errors escape [`EditController::handle_request`] as
//! `Err`. Every save-path failure is recovered into an `error: ...` status,
//! and the target object is left untouched.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::edit_link::build_edit_link;
use crate::error_code::LiveEditError;
use crate::evaluator::{Evaluator, GlobalEvaluator};
use crate::expression_extractor::extract;
use crate::identity_registry::{EditHandle, IdentityRegistry};
use crate::interpreter::{EvalFailure, Realm};
use crate::object_model::{JsValue, ObjectError, ObjectHandle, PropertyKey};
use crate::parser::{ParseError, ParserLimits};
use crate::transplant::transplant;
use crate::value_loader;

pub const LIVE_EDIT_COMPONENT: &str = "live_edit_controller";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Path prefix for generated edit links.
    pub link_base_path: String,
    /// Larger submissions are rejected before parsing.
    pub max_source_bytes: usize,
    /// Prefix of generated trace ids.
    pub trace_prefix: String,
    pub parser_limits: ParserLimits,
    /// Events kept before the oldest are dropped. Hosts that need every
    /// event drain the log at least this often.
    pub max_events: usize,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            link_base_path: "/edit".to_string(),
            max_source_bytes: 1024 * 1024,
            trace_prefix: "live-edit".to_string(),
            parser_limits: ParserLimits::default(),
            max_events: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One edit round trip. Absent `text` loads; present `text` saves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub handle: EditHandle,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl EditRequest {
    pub fn load(handle: EditHandle, key: impl Into<String>) -> Self {
        Self {
            handle,
            key: key.into(),
            name: None,
            text: None,
        }
    }

    pub fn save(handle: EditHandle, key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::load(handle, key)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Serialized as `unmodified`, `saved` or `error: <message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditStatus {
    Unmodified,
    Saved,
    Error(String),
}

impl EditStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for EditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmodified => f.write_str("unmodified"),
            Self::Saved => f.write_str("saved"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

impl Serialize for EditStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EditStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "unmodified" => Ok(Self::Unmodified),
            "saved" => Ok(Self::Saved),
            other => other
                .strip_prefix("error: ")
                .map(|message| Self::Error(message.to_string()))
                .ok_or_else(|| serde::de::Error::custom(format!("unknown edit status {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    pub source_text: String,
    pub status: EditStatus,
    pub handle: EditHandle,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditEvent {
    pub seq: u64,
    pub trace_id: String,
    pub component: String,
    pub event: String,
    pub outcome: String,
    pub error_code: Option<String>,
    pub handle: Option<EditHandle>,
    pub key: Option<String>,
    pub detail: Option<String>,
}

#[derive(Clone, Copy)]
struct Target<'a> {
    handle: Option<EditHandle>,
    key: Option<&'a str>,
}

impl<'a> Target<'a> {
    fn none() -> Self {
        Self {
            handle: None,
            key: None,
        }
    }

    fn object(handle: EditHandle) -> Self {
        Self {
            handle: Some(handle),
            key: None,
        }
    }

    fn property(handle: EditHandle, key: &'a str) -> Self {
        Self {
            handle: Some(handle),
            key: Some(key),
        }
    }
}

enum Outcome<'a> {
    Pass(Option<String>),
    Skip(&'static str),
    Fail(&'a LiveEditError),
}

fn object_failure(error: ObjectError) -> LiveEditError {
    LiveEditError::EvalError(EvalFailure::from(error))
}

fn source_fingerprint(text: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(text.as_bytes())))
}

fn join_keys(keys: &[PropertyKey]) -> String {
    keys.iter()
        .map(PropertyKey::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// EditController
// ---------------------------------------------------------------------------

pub struct EditController<E = GlobalEvaluator> {
    realm: Realm,
    registry: IdentityRegistry,
    evaluator: E,
    config: EditConfig,
    events: Vec<EditEvent>,
    dropped_events: u64,
    next_seq: u64,
    next_trace: u64,
}

impl<E> fmt::Debug for EditController<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditController")
            .field("realm", &self.realm)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("events", &self.events.len())
            .field("dropped_events", &self.dropped_events)
            .finish_non_exhaustive()
    }
}

impl EditController<GlobalEvaluator> {
    /// Controller with a fresh registry and the global-scope evaluator.
    pub fn with_config(realm: Realm, config: EditConfig) -> Self {
        let evaluator = GlobalEvaluator::new(config.parser_limits);
        Self::new(realm, IdentityRegistry::new(), evaluator, config)
    }
}

impl<E: Evaluator> EditController<E> {
    pub fn new(realm: Realm, registry: IdentityRegistry, evaluator: E, config: EditConfig) -> Self {
        Self {
            realm,
            registry,
            evaluator,
            config,
            events: Vec::new(),
            dropped_events: 0,
            next_seq: 0,
            next_trace: 0,
        }
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn realm_mut(&mut self) -> &mut Realm {
        &mut self.realm
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn events(&self) -> &[EditEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<EditEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events pushed out of a full log since the controller was created.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    pub fn register(&mut self, value: &JsValue) -> Result<EditHandle, LiveEditError> {
        let trace_id = self.next_trace_id();
        match self.registry.register_or_lookup(value) {
            Ok(handle) => {
                self.record(&trace_id, "register", Target::object(handle), Outcome::Pass(None));
                Ok(handle)
            }
            Err(error) => Err(self.fail(&trace_id, "register", Target::none(), error)),
        }
    }

    /// Register the value bound to the global `name`.
    pub fn register_global(&mut self, name: &str) -> Result<EditHandle, LiveEditError> {
        let value = self.realm.get_global(name).map_err(object_failure)?;
        self.register(&value)
    }

    /// Link addressing `key` of `value`, registering `value` if it is new.
    pub fn edit_link(
        &mut self,
        value: &JsValue,
        name: Option<&str>,
        key: Option<&str>,
    ) -> Result<String, LiveEditError> {
        let handle = self.register(value)?;
        Ok(build_edit_link(&self.config.link_base_path, handle, name, key))
    }

    pub fn handle_request(&mut self, request: EditRequest) -> Result<EditResponse, LiveEditError> {
        let trace_id = self.next_trace_id();
        self.handle_request_traced(request, &trace_id)
    }

    pub fn handle_request_traced(
        &mut self,
        request: EditRequest,
        trace_id: &str,
    ) -> Result<EditResponse, LiveEditError> {
        let EditRequest {
            handle,
            key,
            name,
            text,
        } = request;
        let Some(object) = self.registry.resolve(handle) else {
            let error = LiveEditError::HandleNotFound { handle };
            return Err(self.fail(trace_id, "resolve", Target::property(handle, &key), error));
        };
        self.record(
            trace_id,
            "resolve",
            Target::property(handle, &key),
            Outcome::Pass(None),
        );

        let (source_text, status) = match text {
            None => self.load(trace_id, handle, object, &key),
            Some(mut submitted) => match self.save(trace_id, handle, object, &key, &mut submitted) {
                Ok(()) => (submitted, EditStatus::Saved),
                Err(error) => (submitted, EditStatus::Error(error.to_string())),
            },
        };
        Ok(EditResponse {
            source_text,
            status,
            handle,
            key,
            name,
        })
    }

    fn load(
        &mut self,
        trace_id: &str,
        handle: EditHandle,
        object: ObjectHandle,
        key: &str,
    ) -> (String, EditStatus) {
        let target = Target::property(handle, key);
        match value_loader::load(&self.realm, object, key) {
            Ok(text) => {
                self.record(trace_id, "load", target, Outcome::Pass(None));
                (text, EditStatus::Unmodified)
            }
            Err(error) => {
                let error = self.fail(trace_id, "load", target, LiveEditError::EvalError(error));
                (String::new(), EditStatus::Error(error.to_string()))
            }
        }
    }

    /// Runs the save pipeline. Once extraction succeeds `submitted` holds
    /// the extracted text, which is what the caller sees from then on.
    fn save(
        &mut self,
        trace_id: &str,
        handle: EditHandle,
        object: ObjectHandle,
        key: &str,
        submitted: &mut String,
    ) -> Result<(), LiveEditError> {
        let target = Target::property(handle, key);
        let max = self.config.max_source_bytes;
        let extracted = if submitted.len() > max {
            Err(LiveEditError::from(ParseError::source_too_large(
                submitted.len(),
                max,
            )))
        } else {
            extract(submitted, self.config.parser_limits)
        };
        let extracted = extracted.map_err(|error| self.fail(trace_id, "extract", target, error))?;
        self.record(
            trace_id,
            "extract",
            target,
            Outcome::Pass(Some(format!(
                "span={}..{}",
                extracted.span.start, extracted.span.end
            ))),
        );
        submitted.clone_from(&extracted.text);

        let property = PropertyKey::from(key);
        let old = self
            .realm
            .heap()
            .get_own_property(object, &property)
            .map_err(|error| self.fail(trace_id, "load", target, object_failure(error)))?
            .map_or(JsValue::Undefined, |desc| desc.value);

        let new = self
            .evaluator
            .evaluate(&mut self.realm, &extracted.text)
            .map_err(|error| self.fail(trace_id, "evaluate", target, error))?;
        let detail = format!("type={}", self.realm.heap().type_of(&new));
        self.record(trace_id, "evaluate", target, Outcome::Pass(Some(detail)));

        let report = transplant(self.realm.heap_mut(), &old, &new)
            .map_err(|error| self.fail(trace_id, "transplant", target, object_failure(error)))?;
        let outcome = match report {
            Some(report) => Outcome::Pass(Some(format!(
                "copied=[{}] rejected=[{}]",
                join_keys(&report.copied),
                join_keys(&report.rejected)
            ))),
            None => Outcome::Skip("not composite"),
        };
        self.record(trace_id, "transplant", target, outcome);

        let committed = self
            .realm
            .heap_mut()
            .set_property(object, property.clone(), new)
            .map_err(|error| self.fail(trace_id, "commit", target, object_failure(error)))?;
        if !committed {
            let diagnostic = self.rejection_diagnostic(object, &property);
            let error = LiveEditError::CommitRejected { diagnostic };
            return Err(self.fail(trace_id, "commit", target, error));
        }
        let fingerprint = source_fingerprint(&extracted.text);
        self.record(trace_id, "commit", target, Outcome::Pass(Some(fingerprint)));
        Ok(())
    }

    fn rejection_diagnostic(&self, object: ObjectHandle, key: &PropertyKey) -> String {
        match self.realm.heap().get_own_property(object, key) {
            Ok(Some(_)) => format!("Cannot assign to read only property '{key}' of object"),
            _ => format!("Cannot add property {key}, object is not extensible"),
        }
    }

    fn next_trace_id(&mut self) -> String {
        let trace_id = format!("{}-{:06}", self.config.trace_prefix, self.next_trace);
        self.next_trace += 1;
        trace_id
    }

    fn fail(
        &mut self,
        trace_id: &str,
        event: &str,
        target: Target<'_>,
        error: LiveEditError,
    ) -> LiveEditError {
        self.record(trace_id, event, target, Outcome::Fail(&error));
        error
    }

    fn record(&mut self, trace_id: &str, event: &str, target: Target<'_>, outcome: Outcome<'_>) {
        let (outcome, error_code, detail) = match outcome {
            Outcome::Pass(detail) => ("pass", None, detail),
            Outcome::Skip(reason) => ("skip", None, Some(reason.to_string())),
            Outcome::Fail(error) => ("fail", Some(error.stable_code()), Some(error.to_string())),
        };
        self.events.push(EditEvent {
            seq: self.next_seq,
            trace_id: trace_id.to_string(),
            component: LIVE_EDIT_COMPONENT.to_string(),
            event: event.to_string(),
            outcome: outcome.to_string(),
            error_code,
            handle: target.handle,
            key: target.key.map(str::to_string),
            detail,
        });
        self.next_seq += 1;
        if self.events.len() > self.config.max_events {
            let excess = self.events.len() - self.config.max_events;
            self.events.drain(..excess);
            self.dropped_events += excess as u64;
        }
    }
}

// ---------------------------------------------------------------------------
// SharedEditController
// ---------------------------------------------------------------------------

/// Controller behind one mutex, so registry growth and property commits
/// are serialized for multi-threaded hosts.
pub struct SharedEditController<E = GlobalEvaluator> {
    inner: Arc<Mutex<EditController<E>>>,
}

impl<E> Clone for SharedEditController<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Evaluator> SharedEditController<E> {
    pub fn new(controller: EditController<E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn handle_request(&self, request: EditRequest) -> Result<EditResponse, LiveEditError> {
        self.inner.lock().handle_request(request)
    }

    pub fn register(&self, value: &JsValue) -> Result<EditHandle, LiveEditError> {
        self.inner.lock().register(value)
    }

    pub fn register_global(&self, name: &str) -> Result<EditHandle, LiveEditError> {
        self.inner.lock().register_global(name)
    }

    pub fn edit_link(
        &self,
        value: &JsValue,
        name: Option<&str>,
        key: Option<&str>,
    ) -> Result<String, LiveEditError> {
        self.inner.lock().edit_link(value, name, key)
    }

    /// Run `f` with exclusive access to the controller.
    pub fn with<R>(&self, f: impl FnOnce(&mut EditController<E>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn drain_events(&self) -> Vec<EditEvent> {
        self.inner.lock().drain_events()
    }
}
