//! Inbound SMS handling.
//!
//! Farmers text `AI <question>` (or `ASK <question>`) to the short code and
//! get the answer back by SMS. Anything else is only logged together with
//! the usage hint; replying to arbitrary texts would cost money.

use crate::handlers::FlowHandler;
use crate::providers::SmsSender;
use mkulima_common::util::{mask_phone, strip_prefix_ignore_case};
use std::sync::Arc;

/// Keywords that mark a message as a question.
pub const COMMAND_PREFIXES: [&str; 2] = ["AI ", "ASK "];

/// Usage hint for messages that are not questions.
pub const HELP_TEXT: &str = "To ask a farming question, send: AI <your question>";

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsOutcome {
    /// Answer was accepted by the SMS provider.
    Replied { message_id: String, reply: String },
    /// Answer was produced but there was no way to send it.
    NotSent { reply: String },
    /// The SMS provider rejected the answer.
    SendFailed { reply: String },
    /// Not a question; nothing was sent.
    Help,
}

/// Extract the question from a command message.
pub fn parse_command(text: &str) -> Option<&str> {
    let text = text.trim_start();
    COMMAND_PREFIXES
        .iter()
        .find_map(|prefix| strip_prefix_ignore_case(text, prefix))
        .map(str::trim)
}

pub struct SmsResponder {
    ai: Arc<dyn FlowHandler>,
    sender: Option<Arc<dyn SmsSender>>,
}

impl SmsResponder {
    pub fn new(ai: Arc<dyn FlowHandler>) -> Self {
        Self { ai, sender: None }
    }

    pub fn with_sender(mut self, sender: Arc<dyn SmsSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn can_reply(&self) -> bool {
        self.sender.is_some()
    }

    /// Process one inbound message from `from`.
    pub async fn handle_inbound(&self, from: &str, text: &str) -> SmsOutcome {
        let from = from.trim();
        let Some(question) = parse_command(text) else {
            tracing::info!(from = %mask_phone(from), help = HELP_TEXT, "Inbound SMS is not a question");
            return SmsOutcome::Help;
        };

        let reply = self.ai.resolve(question).await;

        let sender = match &self.sender {
            Some(sender) if !from.is_empty() => sender,
            _ => {
                tracing::info!(
                    from = %mask_phone(from),
                    reply = %reply,
                    "SMS reply not sent: no sender or recipient"
                );
                return SmsOutcome::NotSent { reply };
            }
        };

        match sender.send(from, &reply).await {
            Ok(message_id) => SmsOutcome::Replied { message_id, reply },
            Err(e) => {
                tracing::warn!(
                    error_kind = e.kind(),
                    to = %mask_phone(from),
                    error = %e,
                    "Failed to send SMS reply"
                );
                SmsOutcome::SendFailed { reply }
            }
        }
    }
}
