pub mod chat;
pub mod health;
pub mod utils;
pub mod validate;
