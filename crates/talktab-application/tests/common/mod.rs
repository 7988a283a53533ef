#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use talktab_core::conversation::{ConversationMessage, ConversationState, StateUpdate};
use talktab_core::reasoning::{
    ReasoningEngine, ReasoningError, ReasoningRequest, ReasoningResponse,
};
use talktab_core::tool::ToolInvocation;
use talktab_core::validation::{SchemaValidator, ValidationIssue, ValidationOutcome};
use tokio_util::sync::CancellationToken;

type Respond = Box<dyn Fn(&str, &str) -> ValidationOutcome + Send + Sync>;
type Delay = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// Validator whose answer is computed from the request.
pub struct MockValidator {
    respond: Respond,
    delay: Delay,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockValidator {
    pub fn new(respond: impl Fn(&str, &str) -> ValidationOutcome + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            delay: Box::new(|_| Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Accepts everything; the parsed representation echoes the candidate.
    pub fn accepting() -> Self {
        Self::new(|old, new| ValidationOutcome::Success {
            parsed: json!({"source": new}),
            diff: json!({"from": old}),
        })
    }

    pub fn rejecting(error_type: &str, message: &str) -> Self {
        let issue = ValidationIssue::new(error_type, message);
        Self::new(move |_, _| ValidationOutcome::DomainFailure {
            errors: vec![issue.clone()],
        })
    }

    pub fn with_delay(mut self, delay: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    /// `(old, new)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchemaValidator for MockValidator {
    async fn validate(
        &self,
        old_schema: &str,
        new_schema: &str,
        cancel: &CancellationToken,
    ) -> ValidationOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((old_schema.to_string(), new_schema.to_string()));

        let delay = (self.delay)(new_schema);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => ValidationOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => (self.respond)(old_schema, new_schema),
        }
    }
}

/// What the engine was shown on one call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ConversationMessage>,
    pub accepted_schema: String,
    pub tool_names: Vec<String>,
}

/// Engine that replays a script, then answers "done".
#[derive(Default)]
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Result<ReasoningResponse, ReasoningError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Duration,
}

impl ScriptedEngine {
    pub fn new(script: Vec<ReasoningResponse>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    pub fn failing(error: ReasoningError) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(error)])),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn respond(
        &self,
        request: ReasoningRequest<'_>,
    ) -> Result<ReasoningResponse, ReasoningError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: request.messages.to_vec(),
            accepted_schema: request.accepted_schema.to_string(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ReasoningResponse::text("done")))
    }
}

/// Engine that never stops asking for the accepted schema.
#[derive(Default)]
pub struct LoopingEngine {
    calls: AtomicUsize,
}

impl LoopingEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningEngine for LoopingEngine {
    async fn respond(
        &self,
        _request: ReasoningRequest<'_>,
    ) -> Result<ReasoningResponse, ReasoningError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ReasoningResponse::tool_calls(vec![read_accepted(&format!(
            "loop_{n}"
        ))]))
    }
}

pub fn read_accepted(id: &str) -> ToolInvocation {
    ToolInvocation::new(id, "read_accepted_schema", json!({}))
}

pub fn read_pending(id: &str) -> ToolInvocation {
    ToolInvocation::new(id, "read_pending_schema", json!({}))
}

pub fn validate(id: &str, candidate: &str) -> ToolInvocation {
    ToolInvocation::new(
        id,
        "validate_and_apply",
        json!({ "candidate_schema": candidate }),
    )
}

/// A fresh conversation whose accepted schema is already `schema`.
pub fn state_with_accepted(session_id: &str, schema: &str) -> ConversationState {
    let mut state = ConversationState::new(session_id);
    if !schema.is_empty() {
        state.apply(StateUpdate::accepted(schema, json!({"seed": true}), Value::Null));
    }
    state
}
