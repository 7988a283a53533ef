//! Tracing layer that streams exchange activity to a channel.
//!
//! The CLI uses it to show tool activity while an exchange runs; any other
//! front end can subscribe the same way.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

const TARGET_PREFIX: &str = "talktab";

/// Event data sent to the subscriber
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExchangeEvent {
    /// Event target (e.g., "talktab_application::tools")
    pub target: String,
    /// Log level (INFO, DEBUG, WARN, ERROR)
    pub level: String,
    /// Human-readable message
    pub message: String,
    /// Structured fields from the event
    pub fields: HashMap<String, Value>,
    /// Fields of the enclosing spans (e.g., session_id)
    pub span: HashMap<String, Value>,
    /// Timestamp
    pub timestamp: String,
}

impl ExchangeEvent {
    /// Session the event belongs to, when emitted inside an exchange span.
    pub fn session_id(&self) -> Option<&str> {
        self.span.get("session_id").and_then(Value::as_str)
    }

    /// A string field of the event.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Span fields stored in span extensions.
struct SpanFields(HashMap<String, Value>);

/// A tracing layer that sends events from talktab crates to a channel
pub struct ExchangeEventLayer {
    sender: mpsc::UnboundedSender<ExchangeEvent>,
    max_level: Level,
}

impl ExchangeEventLayer {
    /// Create a new layer forwarding INFO and more severe events
    pub fn new(sender: mpsc::UnboundedSender<ExchangeEvent>) -> Self {
        Self {
            sender,
            max_level: Level::INFO,
        }
    }

    /// Creates the layer together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExchangeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    /// Forwards events up to and including `level` in verbosity.
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }
}

impl<S> Layer<S> for ExchangeEventLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if !attrs.metadata().target().starts_with(TARGET_PREFIX) {
            return;
        }
        let mut fields = HashMap::new();
        attrs.record(&mut FieldVisitor(&mut fields));
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with(TARGET_PREFIX) || *metadata.level() > self.max_level {
            return;
        }

        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));

        // Outer spans first so inner spans win on conflicts
        let mut span_fields = HashMap::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(stored) = span.extensions().get::<SpanFields>() {
                    span_fields.extend(stored.0.clone());
                }
            }
        }

        let message = fields
            .remove("message")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let exchange_event = ExchangeEvent {
            target: metadata.target().to_string(),
            level: metadata.level().to_string(),
            message,
            fields,
            span: span_fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // Receiver may be gone; events are advisory
        let _ = self.sender.send(exchange_event);
    }
}

/// Field visitor that extracts tracing fields into a HashMap
struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(
            field.name().to_string(),
            serde_json::json!(format!("{:?}", value)),
        );
    }
}
