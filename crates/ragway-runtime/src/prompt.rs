//! Turn an agent context and a question into chat messages.

use ragway_core::ChatMessage;
use serde::{Deserialize, Serialize};

/// Number of trailing history messages carried into the prompt.
pub const MAX_HISTORY_MESSAGES: usize = 4;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's question clearly and concisely.";

/// A grounding passage resolved by the retrieval pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Everything the caller knows about the agent answering the question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub passages: Vec<Passage>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// System prompt with numbered passages, recent history, then the question.
pub fn build_messages(context: &AgentContext, question: &str) -> Vec<ChatMessage> {
    let base = context
        .system_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let system_prompt = if context.passages.is_empty() {
        base.to_string()
    } else {
        let context_str = context
            .passages
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let source_info = p
                    .source
                    .as_ref()
                    .map(|s| format!(" (source: {})", s))
                    .unwrap_or_default();
                format!("[{}]{}: {}", i + 1, source_info, p.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "{}\n\nUse the following context to answer the user's question. \
             If the context doesn't contain relevant information, say so.\n\n\
             Context:\n{}",
            base, context_str
        )
    };

    let skip = context.history.len().saturating_sub(MAX_HISTORY_MESSAGES);

    let mut messages = Vec::with_capacity(2 + MAX_HISTORY_MESSAGES);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(context.history.iter().skip(skip).cloned());
    messages.push(ChatMessage::user(question));
    messages
}
