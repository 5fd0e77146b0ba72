//! Batch edit sessions for the `live_edit_session` binary.
//!
//! A session runs a seed script to build globals, then feeds JSON-lines
//! requests through one [`EditController`]. A request names its target
//! either by `handle` or by a global `target` name, which is registered
//! on the spot.

use serde::{Deserialize, Serialize};

use crate::config::LiveEditConfig;
use crate::edit_controller::{EditController, EditEvent, EditRequest, EditResponse};
use crate::error_code::LiveEditError;
use crate::identity_registry::EditHandle;
use crate::interpreter::{EvalFailure, Realm};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<EditHandle>,
    /// Global name to register; takes precedence over `handle`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A request that produced no response, reported by 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFailure {
    pub line: usize,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionOutput {
    Response(EditResponse),
    Failure(SessionFailure),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("seed script failed: {0}")]
    Seed(EvalFailure),
}

#[derive(Debug)]
pub struct LiveEditSession {
    controller: EditController,
}

impl LiveEditSession {
    pub fn start(seed: &str, config: LiveEditConfig) -> Result<Self, SessionError> {
        let mut realm = Realm::with_limits(config.interpreter);
        realm
            .run_script(seed, config.edit.parser_limits)
            .map_err(SessionError::Seed)?;
        Ok(Self {
            controller: EditController::with_config(realm, config.edit),
        })
    }

    pub fn controller(&self) -> &EditController {
        &self.controller
    }

    pub fn drain_events(&mut self) -> Vec<EditEvent> {
        self.controller.drain_events()
    }

    /// One output per non-blank line, in input order.
    pub fn run_requests(&mut self, jsonl: &str) -> Vec<SessionOutput> {
        jsonl
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| self.handle_line(index + 1, line))
            .collect()
    }

    pub fn handle_line(&mut self, line: usize, raw: &str) -> SessionOutput {
        let request: SessionRequest = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(error) => {
                return SessionOutput::Failure(SessionFailure {
                    line,
                    error: format!("invalid request: {error}"),
                    error_code: None,
                });
            }
        };
        match self.handle_request(request) {
            Ok(Some(response)) => SessionOutput::Response(response),
            Ok(None) => SessionOutput::Failure(SessionFailure {
                line,
                error: "request needs a handle or a target".to_string(),
                error_code: None,
            }),
            Err(error) => SessionOutput::Failure(SessionFailure {
                line,
                error: error.to_string(),
                error_code: Some(error.stable_code()),
            }),
        }
    }

    fn handle_request(
        &mut self,
        request: SessionRequest,
    ) -> Result<Option<EditResponse>, LiveEditError> {
        let SessionRequest {
            handle,
            target,
            key,
            name,
            text,
        } = request;
        let handle = match (target, handle) {
            (Some(target), _) => self.controller.register_global(&target)?,
            (None, Some(handle)) => handle,
            (None, None) => return Ok(None),
        };
        let response = self.controller.handle_request(EditRequest {
            handle,
            key,
            name,
            text,
        })?;
        Ok(Some(response))
    }
}
