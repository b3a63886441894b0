use crate::openai::{real::create_openai_client, OpenAIClientTrait};
use anyhow::Result;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use tracing::instrument;

pub mod cli;
pub mod dispatcher;
pub mod export;
pub mod openai;
pub mod pipeline;
pub mod projector;
pub mod prompts;
pub mod segmenter;
pub mod store;

/// Role of a single message within a tutoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of a session document, as stored in the sessions table.
///
/// Field names follow the document schema used by the tutoring app
/// (camelCase keys in the stored JSON). Optional fields degrade to empty
/// when absent; deserialization never fails on a missing field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,
    // Only meaningful on user messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_output_preference: Option<String>,
}

impl Message {
    /// Code and prose content of the message as a single string.
    ///
    /// When both are present the code comes first, joined with a newline.
    pub fn combined_text(&self) -> String {
        let code = self.code_content.as_deref().unwrap_or("");
        if code.is_empty() {
            self.content.clone()
        } else if self.content.is_empty() {
            code.to_string()
        } else {
            format!("{}\n{}", code, self.content)
        }
    }

    /// Category label with surrounding whitespace removed, empty if absent.
    pub fn category(&self) -> &str {
        self.question_type.as_deref().unwrap_or("").trim()
    }
}

/// A full tutoring session document. Read-only to the pipeline; the
/// message order encodes conversational turn order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    // Opaque timestamps, passed through to export rows unmodified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

// Shared state for the collector and export binaries
pub struct AppState {
    pub sessions_db: Pool<SqliteConnectionManager>,
    pub openai_client: Option<Arc<dyn OpenAIClientTrait>>,
    pub generation_model: String,
    pub session_limit: Option<usize>,
    pub refusal_marker: String,
    #[allow(dead_code)]
    temp_sessions_path: Option<tempfile::NamedTempFile>,
}

impl AppState {
    pub fn new_for_testing() -> Self {
        Self::new_for_testing_with_openai_client(None)
    }

    // Create a new AppState for testing with a tempfile-backed database
    pub fn new_for_testing_with_openai_client(
        openai_client: Option<Arc<dyn OpenAIClientTrait>>,
    ) -> Self {
        let temp_sessions_file = tempfile::NamedTempFile::new()
            .expect("Failed to create temporary sessions database file");

        let sessions_path = temp_sessions_file
            .path()
            .to_str()
            .expect("Failed to get sessions temp file path")
            .to_string();

        let sessions_manager = SqliteConnectionManager::file(&sessions_path);
        let sessions_pool = Pool::new(sessions_manager)
            .expect("Failed to create sessions pool");

        let mut conn = sessions_pool.get().expect("Failed to get connection");
        init_tutorbench_db(&mut conn)
            .expect("Failed to initialize sessions db");

        Self {
            sessions_db: sessions_pool,
            openai_client,
            generation_model: "gpt-4o".to_string(),
            session_limit: None,
            refusal_marker: dispatcher::DEFAULT_REFUSAL_MARKER.to_string(),
            temp_sessions_path: Some(temp_sessions_file),
        }
    }
}

// Config struct holding everything needed to build an AppState
pub struct AppConfig {
    pub sessions_pool: Pool<SqliteConnectionManager>,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub generation_model: String,
    pub session_limit: Option<usize>,
    pub refusal_marker: String,
}

// Function to create AppState from parameters
pub fn create_app_state(config: AppConfig) -> Arc<AppState> {
    // Export-only runs carry no credential; a client is built only when
    // one is configured.
    let openai_client = config
        .openai_api_key
        .map(|key| create_openai_client(key, config.openai_api_base));

    Arc::new(AppState {
        sessions_db: config.sessions_pool,
        openai_client,
        generation_model: config.generation_model,
        session_limit: config.session_limit,
        refusal_marker: config.refusal_marker,
        temp_sessions_path: None,
    })
}

fn tutorbench_migration_steps() -> Vec<M<'static>> {
    vec![
        M::up(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                created_at TEXT,
                updated_at TEXT,
                messages TEXT NOT NULL      -- JSON array of message documents
            );

            CREATE TABLE IF NOT EXISTS system_b_responses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                message_index INTEGER NOT NULL,
                user_message TEXT NOT NULL,
                assistant_response TEXT NOT NULL,
                question_type TEXT NOT NULL,
                code_content TEXT,
                code_language TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(session_id, message_index)
            );
            "#,
        ),
        M::up(
            r#"
            CREATE INDEX IF NOT EXISTS idx_system_b_responses_session
                ON system_b_responses(session_id);
            "#,
        ),
    ]
}

fn apply_tutorbench_migrations(conn: &mut Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    let migrations = Migrations::new(tutorbench_migration_steps());
    migrations.to_latest(conn)?;

    Ok(())
}

// Database initialization
#[instrument]
pub fn init_tutorbench_db(conn: &mut Connection) -> Result<()> {
    info!("Initializing tutorbench database");
    apply_tutorbench_migrations(conn)?;
    Ok(())
}

#[cfg(test)]
mod app_state_tests {
    use super::*;

    fn config(api_key: Option<&str>) -> AppConfig {
        let pool = Pool::new(SqliteConnectionManager::memory())
            .expect("Failed to create pool");
        AppConfig {
            sessions_pool: pool,
            openai_api_key: api_key.map(String::from),
            openai_api_base: None,
            generation_model: "gpt-4o".to_string(),
            session_limit: None,
            refusal_marker: dispatcher::DEFAULT_REFUSAL_MARKER.to_string(),
        }
    }

    #[test]
    fn client_is_only_built_when_a_key_is_configured() {
        assert!(create_app_state(config(None)).openai_client.is_none());
        assert!(create_app_state(config(Some("sk-test")))
            .openai_client
            .is_some());
    }
}

#[cfg(test)]
mod migration_tests {
    use super::{init_tutorbench_db, tutorbench_migration_steps};
    use anyhow::Result;
    use rusqlite::{Connection, OptionalExtension};
    use rusqlite_migration::Migrations;

    fn has_table(conn: &Connection, name: &str) -> Result<bool> {
        Ok(conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    fn has_index(conn: &Connection, name: &str) -> Result<bool> {
        Ok(conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    #[test]
    fn migrations_apply_on_fresh_database() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;

        init_tutorbench_db(&mut conn)?;

        assert!(has_table(&conn, "sessions")?);
        assert!(has_table(&conn, "system_b_responses")?);
        assert!(has_index(&conn, "idx_system_b_responses_session")?);

        Ok(())
    }

    #[test]
    fn migrations_upgrade_existing_schema() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;

        // Apply only the first migration to simulate an older database.
        let mut partial_steps = tutorbench_migration_steps();
        let first_step = vec![partial_steps.remove(0)];
        Migrations::new(first_step).to_latest(&mut conn)?;

        assert!(!has_index(&conn, "idx_system_b_responses_session")?);

        init_tutorbench_db(&mut conn)?;

        assert!(has_index(&conn, "idx_system_b_responses_session")?);
        assert!(has_table(&conn, "sessions")?);
        assert!(has_table(&conn, "system_b_responses")?);

        Ok(())
    }
}

#[cfg(test)]
mod message_tests {
    use super::{Message, Role};

    fn message(content: &str, code: Option<&str>) -> Message {
        Message {
            role: Role::User,
            content: content.to_string(),
            code_content: code.map(String::from),
            code_language: None,
            question_type: None,
            code_output_preference: None,
        }
    }

    #[test]
    fn combined_text_joins_code_before_content() {
        let msg = message("what does this do?", Some("int x = 1;"));
        assert_eq!(msg.combined_text(), "int x = 1;\nwhat does this do?");
    }

    #[test]
    fn combined_text_handles_missing_parts() {
        assert_eq!(message("just prose", None).combined_text(), "just prose");
        assert_eq!(message("", Some("int x;")).combined_text(), "int x;");
        assert_eq!(message("", None).combined_text(), "");
    }

    #[test]
    fn category_trims_and_defaults_to_empty() {
        let mut msg = message("hi", None);
        assert_eq!(msg.category(), "");

        msg.question_type = Some("  HelpWriteCode  ".to_string());
        assert_eq!(msg.category(), "HelpWriteCode");

        msg.question_type = Some("   ".to_string());
        assert_eq!(msg.category(), "");
    }

    #[test]
    fn message_deserializes_with_camel_case_and_defaults() {
        let msg: Message = serde_json::from_str(
            r#"{"role": "user", "codeContent": "int x;", "questionType": "HelpFixCode"}"#,
        )
        .unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "");
        assert_eq!(msg.code_content.as_deref(), Some("int x;"));
        assert_eq!(msg.category(), "HelpFixCode");
    }
}
