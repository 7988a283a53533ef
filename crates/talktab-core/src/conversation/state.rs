//! Per-session conversation state and the schema update record.

use super::message::{ConversationMessage, MessageRole};
use crate::error::{Result, TalktabError};
use crate::tool::ToolInvocation;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// The mutable record of one conversation.
///
/// Messages are append-only. The schema fields change only through
/// [`ConversationState::apply`], and `accepted_schema` only through an update
/// built with [`StateUpdate::accepted`].
///
/// An empty `accepted_schema` means nothing has been accepted yet; an empty
/// `pending_schema` means nothing is pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    session_id: String,
    messages: Vec<ConversationMessage>,
    accepted_schema: String,
    pending_schema: String,
    #[serde(default)]
    parsed_representation: Option<Value>,
    #[serde(default)]
    diff_representation: Option<Value>,
    created_at: String,
    updated_at: String,
}

impl ConversationState {
    /// Creates an empty conversation for the given session key.
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            accepted_schema: String::new(),
            pending_schema: String::new(),
            parsed_representation: None,
            diff_representation: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn accepted_schema(&self) -> &str {
        &self.accepted_schema
    }

    pub fn pending_schema(&self) -> &str {
        &self.pending_schema
    }

    pub fn parsed_representation(&self) -> Option<&Value> {
        self.parsed_representation.as_ref()
    }

    pub fn diff_representation(&self) -> Option<&Value> {
        self.diff_representation.as_ref()
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }

    /// Returns true if the conversation already used this invocation id.
    pub fn has_invocation_id(&self, id: &str) -> bool {
        self.messages
            .iter()
            .flat_map(|m| m.tool_invocations())
            .any(|inv| inv.id == id)
    }

    /// Invocations requested by the latest assistant message that have not
    /// been answered yet, in request order.
    pub fn pending_invocations(&self) -> Vec<&ToolInvocation> {
        let Some(pos) = self
            .messages
            .iter()
            .rposition(|m| m.role() == MessageRole::Assistant)
        else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.messages[pos + 1..]
            .iter()
            .filter_map(|m| m.tool_result())
            .map(|r| r.invocation_id.as_str())
            .collect();

        self.messages[pos]
            .tool_invocations()
            .iter()
            .filter(|inv| !answered.contains(inv.id.as_str()))
            .collect()
    }

    /// Appends a message, enforcing the turn-taking invariants.
    ///
    /// # Errors
    ///
    /// - [`TalktabError::InvalidInput`] if an assistant message reuses an
    ///   invocation id (within itself or from earlier in the conversation).
    /// - [`TalktabError::Internal`] if a tool result answers no outstanding
    ///   invocation, or a user/assistant message arrives while invocations
    ///   are still unanswered.
    pub fn push_message(&mut self, message: ConversationMessage) -> Result<()> {
        match &message {
            ConversationMessage::Tool { result, .. } => {
                let outstanding = self
                    .pending_invocations()
                    .iter()
                    .any(|inv| inv.id == result.invocation_id);
                if !outstanding {
                    return Err(TalktabError::internal(format!(
                        "tool result for '{}' answers no outstanding invocation",
                        result.invocation_id
                    )));
                }
            }
            ConversationMessage::User { .. } | ConversationMessage::Assistant { .. } => {
                if let Some(inv) = self.pending_invocations().first() {
                    return Err(TalktabError::internal(format!(
                        "invocation '{}' is still unanswered",
                        inv.id
                    )));
                }
                let mut seen = HashSet::new();
                for inv in message.tool_invocations() {
                    if !seen.insert(inv.id.as_str()) || self.has_invocation_id(&inv.id) {
                        return Err(TalktabError::invalid_input(format!(
                            "duplicate tool invocation id '{}'",
                            inv.id
                        )));
                    }
                }
            }
        }

        self.messages.push(message);
        self.touch();
        Ok(())
    }

    /// Applies a schema update. Fields absent from the update are left untouched.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(accepted) = update.accepted_schema {
            self.accepted_schema = accepted;
        }
        if let Some(pending) = update.pending_schema {
            self.pending_schema = pending;
        }
        if let Some(parsed) = update.parsed_representation {
            self.parsed_representation = Some(parsed);
        }
        if let Some(diff) = update.diff_representation {
            self.diff_representation = Some(diff);
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}

/// An explicit set of schema-field changes.
///
/// Built from JSON, unknown field names are rejected at construction. The
/// `accepted_schema` field is not deserializable at all: the only way to set
/// it is [`StateUpdate::accepted`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateUpdate {
    #[serde(skip)]
    accepted_schema: Option<String>,
    #[serde(default)]
    pending_schema: Option<String>,
    #[serde(default)]
    parsed_representation: Option<Value>,
    #[serde(default)]
    diff_representation: Option<Value>,
}

impl StateUpdate {
    /// The update for a successful validation: the candidate becomes the
    /// accepted schema, representations are replaced, nothing stays pending.
    pub fn accepted(candidate: impl Into<String>, parsed: Value, diff: Value) -> Self {
        Self {
            accepted_schema: Some(candidate.into()),
            pending_schema: Some(String::new()),
            parsed_representation: Some(parsed),
            diff_representation: Some(diff),
        }
    }

    /// The update for a rejected candidate: it becomes the pending schema.
    pub fn rejected(candidate: impl Into<String>) -> Self {
        Self {
            pending_schema: Some(candidate.into()),
            ..Self::default()
        }
    }

    /// Parses an update from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`TalktabError::InvalidInput`] for unknown fields (including
    /// `accepted_schema`) or mistyped values.
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| TalktabError::invalid_input(format!("invalid state update: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolResult, ToolStatus};
    use serde_json::json;

    fn invocation(id: &str) -> ToolInvocation {
        ToolInvocation::new(id, "read_accepted_schema", json!({}))
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = ConversationState::new("s1");
        assert_eq!(state.session_id(), "s1");
        assert!(state.messages().is_empty());
        assert_eq!(state.accepted_schema(), "");
        assert_eq!(state.pending_schema(), "");
        assert!(state.parsed_representation().is_none());
    }

    #[test]
    fn test_accepted_update_sets_all_four_fields() {
        let mut state = ConversationState::new("s1");
        state.apply(StateUpdate::rejected("Table broken {"));
        assert_eq!(state.pending_schema(), "Table broken {");

        state.apply(StateUpdate::accepted(
            "Table users { id int }",
            json!({"tables": ["users"]}),
            json!({"added": ["users"]}),
        ));
        assert_eq!(state.accepted_schema(), "Table users { id int }");
        assert_eq!(state.pending_schema(), "");
        assert_eq!(
            state.parsed_representation(),
            Some(&json!({"tables": ["users"]}))
        );
        assert_eq!(state.diff_representation(), Some(&json!({"added": ["users"]})));
    }

    #[test]
    fn test_rejected_update_leaves_accepted_and_representations() {
        let mut state = ConversationState::new("s1");
        state.apply(StateUpdate::accepted("S0", json!({"p": 0}), json!({})));
        state.apply(StateUpdate::rejected("S1"));
        assert_eq!(state.accepted_schema(), "S0");
        assert_eq!(state.pending_schema(), "S1");
        assert_eq!(state.parsed_representation(), Some(&json!({"p": 0})));
    }

    #[test]
    fn test_update_from_json_rejects_unknown_fields() {
        let err = StateUpdate::from_json(json!({"accepted_schema": "Table x {}"})).unwrap_err();
        assert!(err.is_invalid_input());

        let err = StateUpdate::from_json(json!({"pendng_schema": "typo"})).unwrap_err();
        assert!(err.is_invalid_input());

        let mut state = ConversationState::new("s1");
        state.apply(StateUpdate::accepted("S1", json!({}), json!({})));
        state.apply(StateUpdate::from_json(json!({"pending_schema": "S2"})).unwrap());
        assert_eq!(state.accepted_schema(), "S1");
        assert_eq!(state.pending_schema(), "S2");

        state.apply(StateUpdate::from_json(json!({})).unwrap());
        assert_eq!(state.pending_schema(), "S2");
    }

    #[test]
    fn test_tool_results_must_answer_outstanding_invocations() {
        let mut state = ConversationState::new("s1");
        state.push_message(ConversationMessage::user("hi")).unwrap();
        state
            .push_message(ConversationMessage::assistant(
                "",
                vec![invocation("a"), invocation("b")],
            ))
            .unwrap();
        assert_eq!(state.pending_invocations().len(), 2);

        let stray = ToolResult::new(&invocation("zzz"), ToolStatus::Success, "");
        assert!(matches!(
            state.push_message(ConversationMessage::tool(stray)),
            Err(TalktabError::Internal(_))
        ));

        // A new user message cannot interrupt unanswered invocations.
        assert!(state.push_message(ConversationMessage::user("again")).is_err());

        let a = ToolResult::new(&invocation("a"), ToolStatus::Success, "");
        state.push_message(ConversationMessage::tool(a.clone())).unwrap();
        // Answering twice is rejected.
        assert!(state.push_message(ConversationMessage::tool(a)).is_err());

        let b = ToolResult::new(&invocation("b"), ToolStatus::Success, "");
        state.push_message(ConversationMessage::tool(b)).unwrap();
        assert!(state.pending_invocations().is_empty());
        assert_eq!(state.messages().len(), 4);
    }

    #[test]
    fn test_duplicate_invocation_ids_are_rejected() {
        let mut state = ConversationState::new("s1");
        let err = state
            .push_message(ConversationMessage::assistant(
                "",
                vec![invocation("a"), invocation("a")],
            ))
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(state.messages().is_empty());

        state
            .push_message(ConversationMessage::assistant("", vec![invocation("a")]))
            .unwrap();
        let a = ToolResult::new(&invocation("a"), ToolStatus::Success, "");
        state.push_message(ConversationMessage::tool(a)).unwrap();

        let err = state
            .push_message(ConversationMessage::assistant("", vec![invocation("a")]))
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(state.has_invocation_id("a"));
    }

    #[test]
    fn test_state_serializes_for_persistence() {
        let mut state = ConversationState::new("s1");
        state.push_message(ConversationMessage::user("hi")).unwrap();
        state.apply(StateUpdate::accepted("S0", json!({}), json!({})));

        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
