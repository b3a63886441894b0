use crate::dispatcher::{self, DispatchMode};
use crate::export;
use crate::prompts::COT_SUFFIX;
use crate::segmenter::{segment, ExchangeUnit};
use crate::store::{self, ResponseRecord};
use crate::AppState;
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, instrument, warn};

/// Counts reported at the end of a collection run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub persisted_ok: usize,
    pub persisted_failed: usize,
    pub skipped_invalid: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed: {}, persisted: {}, persist failures: {}, skipped invalid: {}",
            self.processed,
            self.persisted_ok,
            self.persisted_failed,
            self.skipped_invalid
        )
    }
}

/// One exported System B response, for side-by-side review against the
/// original (System A) assistant answer.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRow {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "questionType")]
    pub question_type: String,
    #[serde(rename = "messageIndex")]
    pub message_index: i64,
    #[serde(rename = "userMessage")]
    pub user_message: String,
    #[serde(rename = "userCodeContent")]
    pub user_code_content: String,
    #[serde(rename = "codeLanguage")]
    pub code_language: String,
    #[serde(rename = "fullUserInput")]
    pub full_user_input: String,
    #[serde(rename = "systemAResponse")]
    pub system_a_response: String,
    #[serde(rename = "systemBResponse")]
    pub system_b_response: String,
}

/// Runs the full collection pass: fetch sessions, segment into exchange
/// units, dispatch one generation call per promptable unit, upsert every
/// valid response under its `(session_id, message_index)` key, and export
/// the collected rows for review.
///
/// Per-unit failures never abort the run; only a missing client, a fetch
/// failure, or an unrecoverable export failure are fatal.
#[instrument(skip(state), err)]
pub async fn run_collection(
    state: &AppState,
    mode: DispatchMode,
    output: &str,
) -> Result<RunSummary> {
    let client = state
        .openai_client
        .clone()
        .ok_or_else(|| anyhow::anyhow!("OpenAI client not configured"))?;

    let sessions = store::fetch_sessions(state, state.session_limit).await?;
    if sessions.is_empty() {
        info!("No sessions in store, nothing to do");
        return Ok(RunSummary::default());
    }

    // Assistant-only units have nothing to prompt with; they stay out of
    // the dispatch batch but remain available to the projection exports.
    let units: Vec<ExchangeUnit> = sessions
        .iter()
        .flat_map(segment)
        .filter(|unit| unit.first_user_index.is_some())
        .collect();

    let mut distribution: HashMap<&str, usize> = HashMap::new();
    for unit in &units {
        *distribution.entry(unit.question_type.as_str()).or_default() += 1;
    }
    info!(
        "Dispatching {} units from {} sessions; category distribution: {:?}",
        units.len(),
        sessions.len(),
        distribution
    );

    let responses = dispatcher::dispatch(
        &units,
        client,
        &state.generation_model,
        mode,
        &state.refusal_marker,
    )
    .await;

    let mut summary = RunSummary::default();
    let mut rows: Vec<ResponseRow> = Vec::new();

    for response in &responses {
        summary.processed += 1;
        let unit = &units[response.unit_index];

        if !response.valid {
            info!(
                "Skipping invalid response for session {} ({})",
                unit.session_id, unit.question_type
            );
            summary.skipped_invalid += 1;
            continue;
        }

        let (Some(first_user), Some(message_index)) =
            (unit.first_user(), unit.first_user_index)
        else {
            // A valid response implies a promptable unit.
            summary.skipped_invalid += 1;
            continue;
        };

        let answer = response
            .outcome
            .answer_text()
            .unwrap_or_default()
            .to_string();
        let full_input =
            dispatcher::generation_input(unit).unwrap_or_default();
        let user_message = full_input
            .strip_suffix(COT_SUFFIX)
            .unwrap_or(&full_input)
            .to_string();
        let now = chrono::Utc::now().timestamp();

        let record = ResponseRecord {
            session_id: unit.session_id.clone(),
            message_index: message_index as i64,
            user_message: user_message.clone(),
            assistant_response: answer.clone(),
            question_type: unit.question_type.clone(),
            code_content: first_user.code_content.clone(),
            code_language: first_user.code_language.clone(),
            created_at: now,
            updated_at: now,
        };

        match store::upsert_response(state, &record).await {
            Ok(()) => summary.persisted_ok += 1,
            Err(e) => {
                warn!(
                    "Failed to persist response for session {} index {}: {}",
                    unit.session_id, message_index, e
                );
                summary.persisted_failed += 1;
            }
        }

        // The review export keeps every valid response, persisted or not.
        rows.push(ResponseRow {
            session_id: unit.session_id.clone(),
            question_type: unit.question_type.clone(),
            message_index: message_index as i64,
            user_message: first_user.content.clone(),
            user_code_content: first_user
                .code_content
                .clone()
                .unwrap_or_default(),
            code_language: first_user
                .code_language
                .clone()
                .unwrap_or_default(),
            full_user_input: full_input,
            system_a_response: unit
                .first_assistant()
                .map(|m| m.combined_text())
                .unwrap_or_default(),
            system_b_response: answer,
        });
    }

    let written = export::write_rows(&rows, output)?;
    info!(
        "Run complete: {}; exported {} rows to {}",
        summary,
        rows.len(),
        written.display()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchMode;
    use crate::AppState;

    #[tokio::test]
    async fn missing_client_is_a_fatal_startup_error() {
        let state = AppState::new_for_testing();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.csv");

        let result = run_collection(
            &state,
            DispatchMode::Sequential,
            output.to_str().unwrap(),
        )
        .await;

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("OpenAI client not configured"));
    }

    #[tokio::test]
    async fn empty_store_yields_empty_summary() {
        use crate::openai::fake::FakeOpenAIClient;
        use std::sync::Arc;

        let state = AppState::new_for_testing_with_openai_client(Some(
            Arc::new(FakeOpenAIClient::new()),
        ));
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.csv");

        let summary = run_collection(
            &state,
            DispatchMode::Sequential,
            output.to_str().unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(summary, RunSummary::default());
    }
}
