use crate::{AppState, Session};
use anyhow::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// A generated System B response as persisted in the document store.
/// `(session_id, message_index)` is the only durable identity; re-running
/// the pipeline overwrites rather than duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub session_id: String,
    pub message_index: i64,
    pub user_message: String,
    pub assistant_response: String,
    pub question_type: String,
    pub code_content: Option<String>,
    pub code_language: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fetches session documents in stable `session_id` order, applying the
/// optional batch cap. Rows whose message payload fails to parse are
/// skipped with a warning rather than aborting the fetch.
#[instrument(skip(state), err)]
pub async fn fetch_sessions(
    state: &AppState,
    limit: Option<usize>,
) -> Result<Vec<Session>> {
    let conn = state.sessions_db.get()?;

    let mut query = String::from(
        "SELECT session_id, created_at, updated_at, messages
         FROM sessions
         ORDER BY session_id ASC",
    );
    if limit.is_some() {
        query.push_str(" LIMIT ?");
    }

    let mut stmt = conn.prepare(&query)?;

    let map_row = |row: &rusqlite::Row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    };

    let rows: Vec<(String, Option<String>, Option<String>, String)> =
        match limit {
            Some(limit) => stmt
                .query_map(params![limit], map_row)?
                .collect::<Result<_, _>>()?,
            None => stmt
                .query_map([], map_row)?
                .collect::<Result<_, _>>()?,
        };

    let mut sessions = Vec::with_capacity(rows.len());
    for (session_id, created_at, updated_at, messages_json) in rows {
        match serde_json::from_str(&messages_json) {
            Ok(messages) => sessions.push(Session {
                session_id,
                messages,
                created_at,
                updated_at,
            }),
            Err(e) => {
                warn!(
                    "Skipping session {} with unparseable messages: {}",
                    session_id, e
                );
            }
        }
    }

    info!("Fetched {} sessions from store", sessions.len());
    Ok(sessions)
}

/// Stores a full session document, replacing any prior document with the
/// same session id. Used by ingest tooling and tests.
#[instrument(skip(state, session), err)]
pub async fn save_session(state: &AppState, session: &Session) -> Result<()> {
    let conn = state.sessions_db.get()?;

    conn.execute(
        "INSERT OR REPLACE INTO sessions (
            session_id, created_at, updated_at, messages
        ) VALUES (?, ?, ?, ?)",
        params![
            session.session_id,
            session.created_at,
            session.updated_at,
            serde_json::to_string(&session.messages)?,
        ],
    )?;

    Ok(())
}

/// Upserts a response record on the compound key. Last write wins for the
/// payload; `created_at` of the first insert is preserved.
#[instrument(skip(state, record), err)]
pub async fn upsert_response(
    state: &AppState,
    record: &ResponseRecord,
) -> Result<()> {
    let conn = state.sessions_db.get()?;

    conn.execute(
        "INSERT INTO system_b_responses (
            session_id, message_index, user_message, assistant_response,
            question_type, code_content, code_language, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id, message_index)
        DO UPDATE SET
            user_message = excluded.user_message,
            assistant_response = excluded.assistant_response,
            question_type = excluded.question_type,
            code_content = excluded.code_content,
            code_language = excluded.code_language,
            updated_at = excluded.updated_at",
        params![
            record.session_id,
            record.message_index,
            record.user_message,
            record.assistant_response,
            record.question_type,
            record.code_content,
            record.code_language,
            record.created_at,
            record.updated_at,
        ],
    )?;

    Ok(())
}

/// Looks up a persisted response by its compound key.
#[instrument(skip(state), err)]
pub async fn get_response(
    state: &AppState,
    session_id: &str,
    message_index: i64,
) -> Result<Option<ResponseRecord>> {
    let conn = state.sessions_db.get()?;

    let result = conn.query_row(
        "SELECT session_id, message_index, user_message, assistant_response,
                question_type, code_content, code_language, created_at, updated_at
         FROM system_b_responses
         WHERE session_id = ? AND message_index = ?",
        params![session_id, message_index],
        |row| {
            Ok(ResponseRecord {
                session_id: row.get(0)?,
                message_index: row.get(1)?,
                user_message: row.get(2)?,
                assistant_response: row.get(3)?,
                question_type: row.get(4)?,
                code_content: row.get(5)?,
                code_language: row.get(6)?,
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
            })
        },
    );

    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(anyhow::anyhow!("Database error: {}", e)),
    }
}

/// Total number of persisted response records.
pub async fn count_responses(state: &AppState) -> Result<i64> {
    let conn = state.sessions_db.get()?;
    let count = conn.query_row(
        "SELECT COUNT(*) FROM system_b_responses",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
