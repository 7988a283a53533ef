//! Tool-call protocol types.
//!
//! The reasoning engine requests tools by name with JSON arguments
//! ([`ToolInvocation`]). Before dispatch, a raw invocation is parsed into the
//! closed [`ToolCall`] enum so that every handler receives typed arguments and
//! an unknown name is rejected up front instead of failing deep inside a
//! string-keyed lookup.

use crate::error::{Result, TalktabError};
use crate::validation::ValidationIssue;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// The kinds of tools available to the reasoning engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    /// Returns the last schema that passed validation.
    ReadAcceptedSchema,
    /// Returns the last proposed edit that has not been accepted.
    ReadPendingSchema,
    /// Validates a candidate schema and, on success, makes it the accepted schema.
    ValidateAndApply,
}

impl ToolKind {
    /// Human-readable description handed to the reasoning engine.
    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::ReadAcceptedSchema => {
                "Read the current accepted DBML schema. Call this before proposing any change so \
                 the edit builds on the existing structure."
            }
            ToolKind::ReadPendingSchema => {
                "Read the last proposed DBML schema that failed validation, to compare against \
                 the error that was reported."
            }
            ToolKind::ValidateAndApply => {
                "Validate a complete updated DBML schema with the parser service. On success it \
                 becomes the accepted schema; on failure the validation errors are returned."
            }
        }
    }

    /// JSON Schema describing the tool's arguments.
    pub fn parameters(&self) -> Value {
        match self {
            ToolKind::ReadAcceptedSchema | ToolKind::ReadPendingSchema => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
            ToolKind::ValidateAndApply => json!({
                "type": "object",
                "properties": {
                    "candidate_schema": {
                        "type": "string",
                        "description": "The complete updated DBML schema to validate and apply"
                    }
                },
                "required": ["candidate_schema"],
                "additionalProperties": false
            }),
        }
    }

    /// Whether executing this tool can mutate conversation state.
    pub fn is_mutating(&self) -> bool {
        matches!(self, ToolKind::ValidateAndApply)
    }

    /// Builds the catalogue entry for this tool.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    /// Catalogue entries for every tool, in declaration order.
    pub fn catalogue() -> Vec<ToolDefinition> {
        ToolKind::iter().map(|kind| kind.definition()).collect()
    }
}

/// A tool advertised to the reasoning engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: Value,
}

/// Arguments of the `validate_and_apply` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidateAndApplyArgs {
    /// The complete candidate schema.
    #[serde(alias = "updated_dbml")]
    pub candidate_schema: String,
}

/// A typed tool call, produced by parsing a raw [`ToolInvocation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ReadAcceptedSchema,
    ReadPendingSchema,
    ValidateAndApply(ValidateAndApplyArgs),
}

impl ToolCall {
    /// Returns the kind of this call.
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolCall::ReadAcceptedSchema => ToolKind::ReadAcceptedSchema,
            ToolCall::ReadPendingSchema => ToolKind::ReadPendingSchema,
            ToolCall::ValidateAndApply(_) => ToolKind::ValidateAndApply,
        }
    }

    /// Parses a tool name and its JSON arguments into a typed call.
    ///
    /// # Errors
    ///
    /// Returns [`TalktabError::InvalidInput`] when the name is not a known tool
    /// or the arguments do not match the tool's parameter shape.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self> {
        let kind = ToolKind::from_str(name)
            .map_err(|_| TalktabError::invalid_input(format!("unknown tool '{name}'")))?;

        match kind {
            ToolKind::ReadAcceptedSchema | ToolKind::ReadPendingSchema => {
                ensure_no_arguments(kind, arguments)?;
                Ok(if kind == ToolKind::ReadAcceptedSchema {
                    ToolCall::ReadAcceptedSchema
                } else {
                    ToolCall::ReadPendingSchema
                })
            }
            ToolKind::ValidateAndApply => serde_json::from_value(arguments.clone())
                .map(ToolCall::ValidateAndApply)
                .map_err(|e| {
                    TalktabError::invalid_input(format!("invalid arguments for {kind}: {e}"))
                }),
        }
    }
}

fn ensure_no_arguments(kind: ToolKind, arguments: &Value) -> Result<()> {
    match arguments {
        Value::Null => Ok(()),
        Value::Object(map) if map.is_empty() => Ok(()),
        Value::Object(map) => {
            let names: Vec<&str> = map.keys().map(String::as_str).collect();
            Err(TalktabError::invalid_input(format!(
                "{kind} takes no arguments, got: {}",
                names.join(", ")
            )))
        }
        other => Err(TalktabError::invalid_input(format!(
            "{kind} expects an arguments object, got: {other}"
        ))),
    }
}

/// A tool-invocation request issued by the reasoning engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Identifier correlating this request with its result; unique within a conversation.
    pub id: String,
    /// Requested tool name (not yet validated).
    pub name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// How a tool invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolStatus {
    /// The tool did what was asked.
    Success,
    /// The validator understood the candidate schema and found it invalid.
    Rejected,
    /// The validator could not be reached after every retry.
    Unreachable,
    /// The validator answered with a success status but an unreadable body.
    ProtocolError,
    /// The invocation itself was malformed; nothing was attempted.
    InvalidInput,
    /// The exchange was aborted while the tool was running.
    Cancelled,
}

impl ToolStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolStatus::Success)
    }
}

/// The result of executing one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The invocation this result answers.
    pub invocation_id: String,
    /// Tool name as requested.
    pub tool_name: String,
    pub status: ToolStatus,
    /// Human-readable result text returned to the reasoning engine.
    pub content: String,
    /// Structured validator errors, populated for [`ToolStatus::Rejected`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationIssue>,
}

impl ToolResult {
    pub fn new(
        invocation: &ToolInvocation,
        status: ToolStatus,
        content: impl Into<String>,
    ) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            status,
            content: content.into(),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<ValidationIssue>) -> Self {
        self.errors = errors;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_round_trip_through_strum() {
        assert_eq!(ToolKind::ReadAcceptedSchema.to_string(), "read_accepted_schema");
        assert_eq!(ToolKind::ValidateAndApply.as_ref(), "validate_and_apply");
        assert_eq!(
            ToolKind::from_str("read_pending_schema").unwrap(),
            ToolKind::ReadPendingSchema
        );
    }

    #[test]
    fn test_catalogue_lists_every_tool() {
        let names: Vec<String> = ToolKind::catalogue().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "read_accepted_schema",
                "read_pending_schema",
                "validate_and_apply"
            ]
        );
    }

    #[test]
    fn test_only_validate_and_apply_mutates() {
        assert!(ToolKind::ValidateAndApply.is_mutating());
        assert!(!ToolKind::ReadAcceptedSchema.is_mutating());
        assert!(!ToolKind::ReadPendingSchema.is_mutating());
    }

    #[test]
    fn test_parse_read_tools_accept_empty_arguments() {
        assert_eq!(
            ToolCall::parse("read_accepted_schema", &json!({})).unwrap(),
            ToolCall::ReadAcceptedSchema
        );
        assert_eq!(
            ToolCall::parse("read_pending_schema", &Value::Null).unwrap(),
            ToolCall::ReadPendingSchema
        );
    }

    #[test]
    fn test_parse_read_tool_rejects_arguments() {
        let err = ToolCall::parse("read_accepted_schema", &json!({"path": "x"})).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_parse_validate_and_apply() {
        let call = ToolCall::parse(
            "validate_and_apply",
            &json!({"candidate_schema": "Table users { id int }"}),
        )
        .unwrap();
        assert_eq!(call.kind(), ToolKind::ValidateAndApply);
        assert_eq!(
            call,
            ToolCall::ValidateAndApply(ValidateAndApplyArgs {
                candidate_schema: "Table users { id int }".into()
            })
        );
    }

    #[test]
    fn test_parse_validate_and_apply_accepts_legacy_argument_name() {
        let call =
            ToolCall::parse("validate_and_apply", &json!({"updated_dbml": "Table a {}"})).unwrap();
        assert_eq!(
            call,
            ToolCall::ValidateAndApply(ValidateAndApplyArgs {
                candidate_schema: "Table a {}".into()
            })
        );
    }

    #[test]
    fn test_parse_rejects_unknown_tool_and_bad_arguments() {
        assert!(ToolCall::parse("drop_database", &json!({})).unwrap_err().is_invalid_input());
        assert!(
            ToolCall::parse("validate_and_apply", &json!({}))
                .unwrap_err()
                .is_invalid_input()
        );
        assert!(
            ToolCall::parse(
                "validate_and_apply",
                &json!({"candidate_schema": "x", "force": true})
            )
            .unwrap_err()
            .is_invalid_input()
        );
    }
}
