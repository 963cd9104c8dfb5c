// ABOUTME: Session compaction — collapses older turns once the byte budget nears full
// ABOUTME: Preserves the leading system message, recent turns, and matched tool replies
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use tracing::debug;

use crate::openai::{ChatMessage, Role};

/// Fraction of the context budget that triggers compaction (percent)
const TRIGGER_PERCENT: usize = 80;

/// Recent messages kept verbatim
const KEEP_RECENT: usize = 8;

/// Longest excerpt of a collapsed message carried into the summary
const EXCERPT_LEN: usize = 120;

/// Total byte size of the accumulated messages
#[must_use]
pub fn conversation_bytes(messages: &[ChatMessage]) -> usize {
    messages.iter().map(ChatMessage::byte_size).sum()
}

/// Compact the conversation in place when it nears the byte budget
///
/// Older turns collapse into a single summarization system message.
/// Kept verbatim: the leading system message, the most recent turns,
/// and — so no tool message ever dangles — the assistant message that
/// issued any kept tool reply. Compaction is best-effort; when there is
/// nothing safe to collapse the conversation is left untouched.
///
/// Returns whether a compaction happened.
pub fn maybe_compact(messages: &mut Vec<ChatMessage>, budget_bytes: usize) -> bool {
    let total = conversation_bytes(messages);
    if total * 100 < budget_bytes * TRIGGER_PERCENT {
        return false;
    }

    let head = usize::from(matches!(
        messages.first(),
        Some(msg) if msg.role == Role::System
    ));

    let mut cut = messages.len().saturating_sub(KEEP_RECENT).max(head);

    // Never split a tool reply from the assistant message that issued it:
    // widen the kept window until its first message is not a tool reply.
    while cut > head && matches!(messages.get(cut), Some(msg) if msg.role == Role::Tool) {
        cut -= 1;
    }

    if cut <= head {
        return false;
    }

    let collapsed: Vec<ChatMessage> = messages.drain(head..cut).collect();
    let summary = summarize(&collapsed);
    messages.insert(head, ChatMessage::system(summary));

    debug!(
        collapsed = collapsed.len(),
        bytes_before = total,
        bytes_after = conversation_bytes(messages),
        "Compacted conversation"
    );
    true
}

/// Build the summarization system message for the collapsed turns
fn summarize(collapsed: &[ChatMessage]) -> String {
    let mut lines = Vec::with_capacity(collapsed.len() + 1);
    lines.push(format!(
        "Summary of {} earlier message(s), compacted to fit the context budget:",
        collapsed.len()
    ));
    for msg in collapsed {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        let text = msg.content.as_deref().map_or_else(
            || {
                msg.tool_calls.as_ref().map_or(String::new(), |calls| {
                    let names: Vec<&str> =
                        calls.iter().map(|c| c.function.name.as_str()).collect();
                    format!("called tool(s): {}", names.join(", "))
                })
            },
            |content| excerpt(content),
        );
        lines.push(format!("- {role}: {text}"));
    }
    lines.join("\n")
}

fn excerpt(text: &str) -> String {
    let flattened = text.replace('\n', " ");
    if flattened.chars().count() <= EXCERPT_LEN {
        return flattened;
    }
    let cut: String = flattened.chars().take(EXCERPT_LEN).collect();
    format!("{cut}…")
}
