//! Scripted adapter
//!
//! Offline [`ClassifierAdapter`] that answers from canned responses.
//! Useful for tests and for running the pipeline without network access
//! while still exercising the adapter-backed paths.

use super::{ClassifierAdapter, JudgmentKind, JudgmentRequest};
use crate::error::AdapterError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Canned answer for one judgment kind
#[derive(Debug, Clone)]
enum Script {
    Respond(String),
    Fail(AdapterError),
}

/// Adapter that replays scripted responses per judgment kind.
///
/// Kinds without a script fail with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    scripts: HashMap<JudgmentKind, Script>,
    delay: Option<Duration>,
    calls: Mutex<Vec<JudgmentKind>>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `kind` with a raw response body
    pub fn respond(mut self, kind: JudgmentKind, body: impl Into<String>) -> Self {
        self.scripts.insert(kind, Script::Respond(body.into()));
        self
    }

    /// Fail every `kind` call with `error`
    pub fn fail(mut self, kind: JudgmentKind, error: AdapterError) -> Self {
        self.scripts.insert(kind, Script::Fail(error));
        self
    }

    /// Sleep before answering (for timeout tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Kinds requested so far, in call order
    pub fn calls(&self) -> Vec<JudgmentKind> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ClassifierAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn judge(&self, request: &JudgmentRequest) -> Result<String, AdapterError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.kind);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.scripts.get(&request.kind) {
            Some(Script::Respond(body)) => Ok(body.clone()),
            Some(Script::Fail(error)) => Err(error.clone()),
            None => Err(AdapterError::Transport(format!(
                "no scripted response for {}",
                request.kind
            ))),
        }
    }
}
