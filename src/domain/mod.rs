pub mod chat;
pub mod error;
pub mod llm_config;
pub mod scenario;
pub mod session;
pub mod team;
pub mod user;
