//! Process configuration from environment variables

use crate::llm::LlmConfig;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;
const MEMORY_DB: &str = ":memory:";

/// Where chats are persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// Throwaway database that lives as long as the process
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db: DbLocation,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let port = var("CODER_CHAT_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let db = match var("CODER_CHAT_DB_PATH").filter(|p| !p.trim().is_empty()) {
            Some(p) if p == MEMORY_DB => DbLocation::Memory,
            Some(p) => DbLocation::File(PathBuf::from(p)),
            None => {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                DbLocation::File(PathBuf::from(home).join(".coder-chat").join("chats.db"))
            }
        };

        Self {
            port,
            db,
            llm: LlmConfig::from_vars(var),
        }
    }
}
