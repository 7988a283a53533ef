mod common;

use common::{MockValidator, read_accepted, read_pending, state_with_accepted, validate};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use talktab_application::tools::handlers::{NO_ACCEPTED_SCHEMA, NO_PENDING_SCHEMA};
use talktab_application::{StateCell, ToolCatalogue};
use talktab_core::tool::{ToolInvocation, ToolStatus};
use talktab_core::validation::{ValidationIssue, ValidationOutcome};
use tokio_util::sync::CancellationToken;

fn catalogue(validator: Arc<MockValidator>) -> ToolCatalogue {
    ToolCatalogue::new(validator)
}

#[tokio::test]
async fn test_validate_and_apply_accepts_first_schema() {
    let validator = Arc::new(MockValidator::new(|_, _| ValidationOutcome::Success {
        parsed: json!({"tables": [{"name": "users"}]}),
        diff: json!({}),
    }));
    let catalogue = catalogue(validator.clone());
    let cell = StateCell::new(state_with_accepted("s1", ""));

    let result = catalogue
        .execute(
            &validate("call_1", "Table users { id int }"),
            &cell,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.status, ToolStatus::Success);
    assert_eq!(result.invocation_id, "call_1");
    assert!(result.content.contains("successful"));

    let state = cell.into_inner();
    assert_eq!(state.accepted_schema(), "Table users { id int }");
    assert_eq!(state.pending_schema(), "");
    assert_eq!(
        state.parsed_representation(),
        Some(&json!({"tables": [{"name": "users"}]}))
    );
    assert_eq!(state.diff_representation(), Some(&json!({})));
    // Starting fresh is signalled with an empty old schema.
    assert_eq!(
        validator.calls(),
        vec![(String::new(), "Table users { id int }".to_string())]
    );
}

#[tokio::test]
async fn test_rejection_preserves_accepted_schema() {
    let validator = Arc::new(MockValidator::rejecting("SyntaxError", "unexpected token"));
    let catalogue = catalogue(validator);
    let accepted = "Table users { id int }";
    let cell = StateCell::new(state_with_accepted("s1", accepted));

    let result = catalogue
        .execute(
            &validate("call_1", "Table users { bad syntax"),
            &cell,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.status, ToolStatus::Rejected);
    assert!(result.content.contains("SyntaxError: unexpected token"));
    assert_eq!(
        result.errors,
        vec![ValidationIssue::new("SyntaxError", "unexpected token")]
    );

    let state = cell.into_inner();
    assert_eq!(state.accepted_schema(), accepted);
    assert_eq!(state.pending_schema(), "Table users { bad syntax");
    assert_eq!(state.parsed_representation(), Some(&json!({"seed": true})));
}

#[tokio::test]
async fn test_transport_and_protocol_failures_change_nothing() {
    for (outcome, status) in [
        (
            ValidationOutcome::TransportFailure {
                cause: "connection failed (http://localhost:5001)".into(),
                attempts: 3,
            },
            ToolStatus::Unreachable,
        ),
        (
            ValidationOutcome::ProtocolFailure {
                detail: "unreadable response body".into(),
            },
            ToolStatus::ProtocolError,
        ),
    ] {
        let validator = Arc::new(MockValidator::new(move |_, _| outcome.clone()));
        let catalogue = catalogue(validator);
        let before = state_with_accepted("s1", "Table a {}");
        let cell = StateCell::new(before.clone());

        let result = catalogue
            .execute(&validate("c", "Table b {}"), &cell, &CancellationToken::new())
            .await;

        assert_eq!(result.status, status);
        let after = cell.into_inner();
        assert_eq!(after.accepted_schema(), before.accepted_schema());
        assert_eq!(after.pending_schema(), before.pending_schema());
        assert_eq!(after.parsed_representation(), before.parsed_representation());
    }
}

#[tokio::test]
async fn test_unreachable_wording_is_distinct_from_rejection() {
    let validator = Arc::new(MockValidator::new(|_, _| {
        ValidationOutcome::TransportFailure {
            cause: "timed out".into(),
            attempts: 3,
        }
    }));
    let result = catalogue(validator)
        .execute(
            &validate("c", "Table b {}"),
            &StateCell::new(state_with_accepted("s1", "")),
            &CancellationToken::new(),
        )
        .await;
    assert!(result.content.contains("unreachable"));
    assert!(!result.content.contains("rejected"));
}

#[tokio::test]
async fn test_empty_candidate_is_rejected_without_network_call() {
    let validator = Arc::new(MockValidator::accepting());
    let catalogue = catalogue(validator.clone());
    let cell = StateCell::new(state_with_accepted("s1", "Table a {}"));

    for candidate in ["", "   \n\t"] {
        let result = catalogue
            .execute(&validate("c", candidate), &cell, &CancellationToken::new())
            .await;
        assert_eq!(result.status, ToolStatus::InvalidInput);
    }

    assert!(validator.calls().is_empty());
    assert_eq!(cell.into_inner().accepted_schema(), "Table a {}");
}

#[tokio::test]
async fn test_malformed_invocations_yield_invalid_input() {
    let validator = Arc::new(MockValidator::accepting());
    let catalogue = catalogue(validator.clone());
    let cell = StateCell::new(state_with_accepted("s1", ""));
    let cancel = CancellationToken::new();

    let unknown = ToolInvocation::new("c1", "drop_table", json!({}));
    let missing_arg = ToolInvocation::new("c2", "validate_and_apply", json!({}));
    let not_json = ToolInvocation::new("c3", "validate_and_apply", json!("{oops"));

    for invocation in [unknown, missing_arg, not_json] {
        let result = catalogue.execute(&invocation, &cell, &cancel).await;
        assert_eq!(result.status, ToolStatus::InvalidInput);
        assert_eq!(result.invocation_id, invocation.id);
    }
    assert!(validator.calls().is_empty());
}

#[tokio::test]
async fn test_reads_return_sentinels_when_empty() {
    let catalogue = catalogue(Arc::new(MockValidator::accepting()));
    let cell = StateCell::new(state_with_accepted("s1", ""));
    let cancel = CancellationToken::new();

    let accepted = catalogue.execute(&read_accepted("a"), &cell, &cancel).await;
    assert_eq!(accepted.status, ToolStatus::Success);
    assert_eq!(accepted.content, NO_ACCEPTED_SCHEMA);
    assert!(accepted.content.contains("empty, starting fresh"));

    let pending = catalogue.execute(&read_pending("p"), &cell, &cancel).await;
    assert_eq!(pending.status, ToolStatus::Success);
    assert_eq!(pending.content, NO_PENDING_SCHEMA);
}

#[tokio::test]
async fn test_reads_are_idempotent() {
    let catalogue = catalogue(Arc::new(MockValidator::accepting()));
    let cell = StateCell::new(state_with_accepted("s1", "Table a {}"));
    let cancel = CancellationToken::new();
    let before = cell.snapshot().await;

    let first = catalogue.execute(&read_accepted("a1"), &cell, &cancel).await;
    let second = catalogue.execute(&read_accepted("a2"), &cell, &cancel).await;
    catalogue.execute(&read_pending("p1"), &cell, &cancel).await;

    assert_eq!(first.content, "Table a {}");
    assert_eq!(first.content, second.content);
    assert_eq!(cell.into_inner(), before);
}

#[tokio::test(start_paused = true)]
async fn test_execute_all_returns_results_in_request_order() {
    // The first request is the slowest, so completion order is reversed.
    let validator = Arc::new(MockValidator::accepting().with_delay(|candidate| {
        if candidate.contains("slow") {
            Duration::from_secs(5)
        } else {
            Duration::from_millis(10)
        }
    }));
    let catalogue = catalogue(validator);
    let cell = StateCell::new(state_with_accepted("s1", ""));

    let invocations = vec![
        validate("first", "Table slow {}"),
        read_accepted("second"),
        validate("third", "Table fast {}"),
    ];
    let results = catalogue
        .execute_all(&invocations, &cell, &CancellationToken::new())
        .await;

    let ids: Vec<&str> = results.iter().map(|r| r.invocation_id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
    assert!(results.iter().all(|r| r.status == ToolStatus::Success));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_mutations_are_serialized() {
    let validator = Arc::new(
        MockValidator::accepting().with_delay(|_| Duration::from_millis(100)),
    );
    let catalogue = catalogue(validator.clone());
    let cell = StateCell::new(state_with_accepted("s1", "S0"));

    let invocations = vec![validate("a", "S1"), validate("b", "S2")];
    catalogue
        .execute_all(&invocations, &cell, &CancellationToken::new())
        .await;

    // The second validation ran against the schema the first one accepted.
    assert_eq!(
        validator.calls(),
        vec![
            ("S0".to_string(), "S1".to_string()),
            ("S1".to_string(), "S2".to_string())
        ]
    );
    assert_eq!(cell.into_inner().accepted_schema(), "S2");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_validation_changes_nothing() {
    let validator =
        Arc::new(MockValidator::accepting().with_delay(|_| Duration::from_secs(30)));
    let catalogue = catalogue(validator);
    let cell = StateCell::new(state_with_accepted("s1", "S0"));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = catalogue.execute(&validate("c", "S1"), &cell, &cancel).await;
    assert_eq!(result.status, ToolStatus::Cancelled);
    let state = cell.into_inner();
    assert_eq!(state.accepted_schema(), "S0");
    assert_eq!(state.pending_schema(), "");
}
