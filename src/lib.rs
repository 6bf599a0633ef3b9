//! coder-chat: a conversational coding assistant backend
//!
//! Chats live in an in-memory conversation store; each user message streams
//! an assistant reply from a model gateway, and fenced code blocks are pulled
//! out of the finished reply. Finalized exchanges are written through to
//! `SQLite` on a best-effort basis.

pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod extract;
pub mod llm;
pub mod runtime;
pub mod state_machine;
pub mod store;
