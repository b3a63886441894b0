use crate::openai::{response_content, OpenAIClientTrait};
use crate::prompts::{self, COT_SUFFIX};
use crate::segmenter::ExchangeUnit;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs,
};
use clap::ValueEnum;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Responses shorter than this many characters are dropped as invalid.
pub const MIN_RESPONSE_CHARS: usize = 20;

/// Case-insensitive substring marking an out-of-domain refusal. Matches the
/// refusal wording the instruction closing block mandates.
pub const DEFAULT_REFUSAL_MARKER: &str = "irrelevant question";

/// How generation calls for a batch are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DispatchMode {
    /// One call in flight at a time, in unit order.
    Sequential,
    /// All calls submitted at once; results reassembled into unit order.
    Concurrent,
}

/// Result of one generation call. A failed call is data, not an error:
/// the batch always continues and the failure can never be mistaken for
/// a real answer by the validity filter.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Answer(String),
    Failed { message: String },
}

impl GenerationOutcome {
    pub fn answer_text(&self) -> Option<&str> {
        match self {
            Self::Answer(text) => Some(text),
            Self::Failed { .. } => None,
        }
    }
}

/// Outcome of dispatching one exchange unit, tagged with the unit's
/// position in the submitted batch.
#[derive(Debug, Clone)]
pub struct GeneratedResponse {
    pub unit_index: usize,
    pub outcome: GenerationOutcome,
    pub valid: bool,
}

/// The model input for a unit: the first user message's content, an
/// appended code block when separate code content exists, and the
/// chain-of-thought suffix. `None` when the unit has nothing to prompt
/// with (no user message, or an entirely empty one).
pub fn generation_input(unit: &ExchangeUnit) -> Option<String> {
    let first_user = unit.first_user()?;
    let code = first_user.code_content.as_deref().unwrap_or("");
    if first_user.content.is_empty() && code.is_empty() {
        return None;
    }

    let mut input = first_user.content.clone();
    if !code.is_empty() {
        input.push_str("\n\n[Code]:\n");
        input.push_str(code);
    }
    input.push_str(COT_SUFFIX);
    Some(input)
}

/// Applies the response-validity filter: failed calls are always invalid;
/// answers are invalid when empty, shorter than [`MIN_RESPONSE_CHARS`], or
/// containing the refusal marker in any letter case.
pub fn is_valid_response(
    outcome: &GenerationOutcome,
    refusal_marker: &str,
) -> bool {
    let text = match outcome {
        GenerationOutcome::Failed { .. } => return false,
        GenerationOutcome::Answer(text) => text,
    };

    if text.trim().is_empty() || text.chars().count() < MIN_RESPONSE_CHARS {
        return false;
    }

    if !refusal_marker.is_empty()
        && text
            .to_lowercase()
            .contains(&refusal_marker.to_lowercase())
    {
        return false;
    }

    true
}

async fn generate(
    client: &dyn OpenAIClientTrait,
    model: &str,
    instruction: &str,
    input: &str,
) -> GenerationOutcome {
    let result = async {
        let system_message = ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(instruction)
                .build()?,
        );
        let user_message = ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(input)
                .build()?,
        );
        client
            .chat_completion(model.to_string(), vec![system_message, user_message])
            .await
    }
    .await;

    match result {
        Ok(response) => GenerationOutcome::Answer(response_content(&response)),
        Err(e) => {
            warn!("Generation call failed: {}", e);
            GenerationOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

/// Invokes the generation collaborator once per unit and returns one
/// [`GeneratedResponse`] per unit, in unit-submission order for both
/// dispatch modes. No call is retried at this layer; per-call failures
/// are contained at the unit boundary.
pub async fn dispatch(
    units: &[ExchangeUnit],
    client: Arc<dyn OpenAIClientTrait>,
    model: &str,
    mode: DispatchMode,
    refusal_marker: &str,
) -> Vec<GeneratedResponse> {
    // Prompt material is precomputed so concurrent tasks own their data.
    let calls: Vec<(usize, Option<(String, String)>)> = units
        .iter()
        .enumerate()
        .map(|(index, unit)| {
            let preference = unit
                .first_user()
                .and_then(|m| m.code_output_preference.as_deref())
                .unwrap_or("");
            let instruction =
                prompts::compose_for_labels(&unit.question_type, preference);
            let call = generation_input(unit)
                .map(|input| (instruction, input));
            (index, call)
        })
        .collect();

    let mut outcomes: Vec<Option<GenerationOutcome>> =
        (0..units.len()).map(|_| None).collect();

    match mode {
        DispatchMode::Sequential => {
            for (index, call) in calls {
                debug!("Dispatching unit {} sequentially", index);
                outcomes[index] = Some(run_call(&*client, model, call).await);
            }
        }
        DispatchMode::Concurrent => {
            let mut tasks = JoinSet::new();
            for (index, call) in calls {
                let client = client.clone();
                let model = model.to_string();
                tasks.spawn(async move {
                    (index, run_call(&*client, &model, call).await)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, outcome)) => outcomes[index] = Some(outcome),
                    Err(e) => warn!("Generation task failed to join: {}", e),
                }
            }
        }
    }

    outcomes
        .into_iter()
        .enumerate()
        .map(|(unit_index, outcome)| {
            let outcome = outcome.unwrap_or(GenerationOutcome::Failed {
                message: "generation task aborted".to_string(),
            });
            let valid = is_valid_response(&outcome, refusal_marker);
            GeneratedResponse {
                unit_index,
                outcome,
                valid,
            }
        })
        .collect()
}

async fn run_call(
    client: &dyn OpenAIClientTrait,
    model: &str,
    call: Option<(String, String)>,
) -> GenerationOutcome {
    match call {
        Some((instruction, input)) => {
            generate(client, model, &instruction, &input).await
        }
        None => GenerationOutcome::Failed {
            message: "no user input provided".to_string(),
        },
    }
}
