//! Deterministic prompt assembly.
//!
//! The prompt is a fixed layout: system preamble, recall block, page
//! context, conversation, then the literal `ASSISTANT:` trailer. The same
//! inputs always produce the same bytes.

use astrea_domain::model::{Role, Turn};

const SYSTEM_PREAMBLE: &str = "You are Astrea, a careful personal assistant. \
Answer from the conversation and the memory snippets provided. \
Be concise; say so when you do not know.";

/// Select the newest turns whose combined content, together with
/// `reserved_chars` (recall + page context), stays within `max_total`.
///
/// Walks newest→oldest and returns the kept suffix in chronological order.
pub fn trim_turns(turns: &[Turn], reserved_chars: usize, max_total: usize) -> &[Turn] {
    let budget = max_total.saturating_sub(reserved_chars);
    let mut used = 0usize;
    let mut start = turns.len();

    for (i, turn) in turns.iter().enumerate().rev() {
        let chars = turn.content.chars().count();
        if used + chars > budget {
            break;
        }
        used += chars;
        start = i;
    }

    &turns[start..]
}

pub fn recall_chars(snippets: &[String]) -> usize {
    snippets.iter().map(|s| s.chars().count()).sum()
}

pub fn build_prompt(snippets: &[String], page_context: Option<&str>, turns: &[Turn]) -> String {
    let mut prompt = String::new();
    prompt.push_str("SYSTEM: ");
    prompt.push_str(SYSTEM_PREAMBLE);
    prompt.push_str("\n\n");

    if !snippets.is_empty() {
        prompt.push_str("MEMORY:\n");
        for snippet in snippets {
            prompt.push_str("- ");
            prompt.push_str(snippet);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    if let Some(ctx) = page_context {
        if !ctx.is_empty() {
            prompt.push_str("PAGE CONTEXT:\n");
            prompt.push_str(ctx);
            prompt.push_str("\n\n");
        }
    }

    prompt.push_str("CONVERSATION:\n");
    for turn in turns {
        let label = match turn.role {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }

    prompt.push_str("\nASSISTANT:");
    prompt
}
