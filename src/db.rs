//! Database module for coder-chat
//!
//! Durable copy of chats and their finalized messages.

mod schema;

use schema::{format_datetime, parse_datetime, SCHEMA};

use crate::chat::{Chat, Message, MessageContent, Role};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Chat Operations ====================

    /// Insert a chat together with any messages it already carries
    pub fn create_chat(&self, chat: &Chat) -> DbResult<Chat> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO chats (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                chat.id,
                chat.title,
                format_datetime(chat.created_at),
                format_datetime(chat.updated_at)
            ],
        )?;
        for (seq, message) in chat.messages.iter().enumerate() {
            insert_message(&tx, &chat.id, i64::try_from(seq).unwrap_or(i64::MAX), message)?;
        }
        tx.commit()?;
        Ok(chat.clone())
    }

    /// Get a chat by ID with its messages in order
    pub fn get_chat(&self, id: &str) -> DbResult<Chat> {
        let conn = self.conn();
        load_chat(&conn, id)?.ok_or_else(|| DbError::ChatNotFound(id.to_string()))
    }

    /// All chats, most recently updated first
    pub fn list_chats(&self) -> DbResult<Vec<Chat>> {
        let conn = self.conn();
        let ids: Vec<String> = {
            let mut stmt = conn.prepare("SELECT id FROM chats ORDER BY updated_at DESC, id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let mut chats = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chat) = load_chat(&conn, &id)? {
                chats.push(chat);
            }
        }
        Ok(chats)
    }

    pub fn rename_chat(&self, id: &str, title: &str) -> DbResult<Chat> {
        let conn = self.conn();
        let now = format_datetime(Utc::now());
        let updated = conn.execute(
            "UPDATE chats SET title = ?1, updated_at = MAX(updated_at, ?2) WHERE id = ?3",
            params![title, now, id],
        )?;
        if updated == 0 {
            return Err(DbError::ChatNotFound(id.to_string()));
        }
        load_chat(&conn, id)?.ok_or_else(|| DbError::ChatNotFound(id.to_string()))
    }

    /// Delete a chat and its messages; returns whether it existed
    pub fn delete_chat(&self, id: &str) -> DbResult<bool> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM chats WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // ==================== Message Operations ====================

    /// Append a message to the end of a chat
    pub fn append_message(&self, chat_id: &str, message: &Message) -> DbResult<Message> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM chats WHERE id = ?1", params![chat_id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(DbError::ChatNotFound(chat_id.to_string()));
        }

        let sequence_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence_id), -1) + 1 FROM messages WHERE chat_id = ?1",
            params![chat_id],
            |row| row.get(0),
        )?;
        insert_message(&tx, chat_id, sequence_id, message)?;
        tx.execute(
            "UPDATE chats SET updated_at = MAX(updated_at, ?1) WHERE id = ?2",
            params![format_datetime(message.created_at), chat_id],
        )?;
        tx.commit()?;
        Ok(message.clone())
    }

    #[cfg(test)]
    pub(crate) fn message_count(&self, chat_id: &str) -> DbResult<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn insert_message(
    conn: &Connection,
    chat_id: &str,
    sequence_id: i64,
    message: &Message,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO messages (id, chat_id, sequence_id, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            message.id,
            chat_id,
            sequence_id,
            message.role.as_str(),
            message.content.text,
            format_datetime(message.created_at)
        ],
    )?;
    Ok(())
}

fn load_chat(conn: &Connection, id: &str) -> DbResult<Option<Chat>> {
    let header = conn
        .query_row(
            "SELECT id, title, created_at, updated_at FROM chats WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((id, title, created_at, updated_at)) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, role, content, created_at FROM messages
         WHERE chat_id = ?1 ORDER BY sequence_id",
    )?;
    let messages = stmt
        .query_map(params![id], |row| {
            let role: String = row.get(1)?;
            Ok(Message {
                id: row.get(0)?,
                // Unknown roles come from a newer schema; show them as replies
                role: Role::parse(&role).unwrap_or(Role::Assistant),
                content: MessageContent::finalized(row.get::<_, String>(2)?),
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let created_at: DateTime<Utc> = parse_datetime(&created_at);
    Ok(Some(Chat {
        id,
        title,
        messages,
        created_at,
        updated_at: parse_datetime(&updated_at).max(created_at),
    }))
}
