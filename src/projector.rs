use crate::segmenter::ExchangeUnit;
use crate::{Role, Session};
use clap::ValueEnum;
use serde::Serialize;

/// Literal token used to join same-role messages in aggregate rows. The
/// downstream evaluation sheet splits on this exact string.
pub const SEPARATOR: &str = "---SEPARATOR-@@@---";

/// How session transcripts are flattened into export rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProjectionPolicy {
    /// One row per positional user/assistant turn pair, ignoring categories.
    Pairwise,
    /// One row per category, all same-role messages joined with a separator.
    AggregateByCategory,
    /// One row per category, first user and first assistant message only.
    FirstOfCategory,
}

/// One user/assistant turn pair from a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairRow {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "questionType")]
    pub question_type: String,
    pub user_content: String,
    pub assistant_content: String,
    #[serde(rename = "assistant_codeContent")]
    pub assistant_code_content: String,
}

/// One category of a session with all messages aggregated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub session_id: String,
    pub total_messages: usize,
    pub user_message_cnt: usize,
    pub assistant_msg_cnt: usize,
    pub question_type: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    pub user_messages: String,
    pub assistant_messages: String,
}

/// One category of a session reduced to its opening exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirstRow {
    pub session_id: String,
    pub question_type: String,
    pub user_messages: String,
    pub assistant_messages: String,
}

/// Scans the raw message list left to right, consuming a user message and
/// an immediately following assistant message as one pair. A lone user
/// message at the end and a lone leading assistant message each produce
/// their own row with the other side empty. Category labels play no part
/// in the pairing.
pub fn pairwise(session: &Session) -> Vec<PairRow> {
    let messages = &session.messages;
    let mut rows = Vec::new();
    let mut i = 0;

    while i < messages.len() {
        let mut user_msg = None;
        let mut assistant_msg = None;

        if messages[i].role == Role::User {
            user_msg = Some(&messages[i]);
            i += 1;
        }

        if i < messages.len() && messages[i].role == Role::Assistant {
            assistant_msg = Some(&messages[i]);
            i += 1;
        }

        if user_msg.is_none() && assistant_msg.is_none() {
            // Neither side matched; this position cannot form a pair.
            i += 1;
            continue;
        }

        rows.push(PairRow {
            session_id: session.session_id.clone(),
            question_type: user_msg
                .map(|m| m.category().to_string())
                .unwrap_or_default(),
            user_content: user_msg
                .map(|m| m.combined_text())
                .unwrap_or_default(),
            assistant_content: assistant_msg
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            assistant_code_content: assistant_msg
                .and_then(|m| m.code_content.clone())
                .unwrap_or_default(),
        });
    }

    rows
}

/// One row per unit with all same-role texts joined by [`SEPARATOR`].
/// Units carry at least one message by construction, so every unit emits
/// a row.
pub fn aggregate_by_category(
    session: &Session,
    units: &[ExchangeUnit],
) -> Vec<CategoryRow> {
    units
        .iter()
        .filter(|unit| unit.total_messages > 0)
        .map(|unit| {
            let join = |messages: &[crate::Message]| {
                messages
                    .iter()
                    .map(|m| m.combined_text())
                    .collect::<Vec<_>>()
                    .join(SEPARATOR)
            };

            CategoryRow {
                session_id: unit.session_id.clone(),
                total_messages: unit.total_messages,
                user_message_cnt: unit.user_messages.len(),
                assistant_msg_cnt: unit.assistant_messages.len(),
                question_type: unit.question_type.clone(),
                created_at: session.created_at.clone().unwrap_or_default(),
                updated_at: session.updated_at.clone().unwrap_or_default(),
                user_messages: join(&unit.user_messages),
                assistant_messages: join(&unit.assistant_messages),
            }
        })
        .collect()
}

/// One row per unit keeping only the opening user and assistant texts.
/// Units where both openings are empty are dropped entirely.
pub fn first_of_category(units: &[ExchangeUnit]) -> Vec<FirstRow> {
    units
        .iter()
        .filter_map(|unit| {
            let user = unit
                .first_user()
                .map(|m| m.combined_text())
                .unwrap_or_default();
            let assistant = unit
                .first_assistant()
                .map(|m| m.combined_text())
                .unwrap_or_default();

            if user.is_empty() && assistant.is_empty() {
                return None;
            }

            Some(FirstRow {
                session_id: unit.session_id.clone(),
                question_type: unit.question_type.clone(),
                user_messages: user,
                assistant_messages: assistant,
            })
        })
        .collect()
}
