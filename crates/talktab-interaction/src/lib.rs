//! Outbound adapters: the schema validation client and the reasoning engine.

pub mod backoff;
pub mod openai_reasoning_engine;
pub mod prompts;
pub mod validation_client;

pub use backoff::RetryPolicy;
pub use openai_reasoning_engine::OpenAiReasoningEngine;
pub use validation_client::{
    AttemptOutcome, HttpValidationTransport, ValidationClient, ValidationTransport,
};
