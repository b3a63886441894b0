use crate::{Message, Role, Session};

/// Messages of one session sharing a category label, split by role.
///
/// Units preserve the original relative order of messages within each role
/// subsequence. A unit may be one-sided; whether a one-sided unit produces
/// output is the projector's decision, not the segmenter's.
#[derive(Debug, Clone)]
pub struct ExchangeUnit {
    pub session_id: String,
    pub question_type: String,
    pub user_messages: Vec<Message>,
    pub assistant_messages: Vec<Message>,
    pub total_messages: usize,
    /// Position of the unit's first user message within the full session
    /// message list. This is the message index under which a generated
    /// response for this unit is persisted.
    pub first_user_index: Option<usize>,
}

impl ExchangeUnit {
    pub fn first_user(&self) -> Option<&Message> {
        self.user_messages.first()
    }

    pub fn first_assistant(&self) -> Option<&Message> {
        self.assistant_messages.first()
    }
}

/// Groups a session's messages into one [`ExchangeUnit`] per distinct
/// non-blank category label, in first-seen category order.
///
/// Messages with a blank or absent category are excluded from grouping
/// entirely. A session with no messages yields no units. Never fails.
pub fn segment(session: &Session) -> Vec<ExchangeUnit> {
    // Category labels in first-seen order, each with its messages and
    // their positions in the original list.
    let mut categories: Vec<(String, Vec<(usize, &Message)>)> = Vec::new();

    for (index, message) in session.messages.iter().enumerate() {
        let category = message.category();
        if category.is_empty() {
            continue;
        }

        match categories
            .iter_mut()
            .find(|(label, _)| label.as_str() == category)
        {
            Some((_, group)) => group.push((index, message)),
            None => {
                categories.push((category.to_string(), vec![(index, message)]))
            }
        }
    }

    categories
        .into_iter()
        .map(|(question_type, group)| {
            let total_messages = group.len();
            let mut user_messages = Vec::new();
            let mut assistant_messages = Vec::new();
            let mut first_user_index = None;

            for (index, message) in group {
                match message.role {
                    Role::User => {
                        if first_user_index.is_none() {
                            first_user_index = Some(index);
                        }
                        user_messages.push(message.clone());
                    }
                    Role::Assistant => assistant_messages.push(message.clone()),
                }
            }

            ExchangeUnit {
                session_id: session.session_id.clone(),
                question_type,
                user_messages,
                assistant_messages,
                total_messages,
                first_user_index,
            }
        })
        .collect()
}
