//! Infrastructure layer: configuration loading, paths and conversation storage.

pub mod config_service;
pub mod in_memory_conversation_repository;
pub mod json_conversation_repository;
pub mod paths;

pub use config_service::{ConfigError, ConfigService, ConfigSource};
pub use in_memory_conversation_repository::InMemoryConversationRepository;
pub use json_conversation_repository::JsonConversationRepository;
pub use paths::{PathError, TalktabPaths};
