//! Bounded conversation history.
//!
//! The history is one leading system message (directive plus the freshest
//! context summary, replaced every iteration) followed by assistant and
//! tool-result turns. Once the total message count exceeds the cap, the
//! history is compacted: the leading message and the most recent
//! `keep_recent` turns survive, everything older is discarded for good.
//!
//! ## Orphaned tool results
//!
//! A tool-result turn is only valid directly after the assistant turn that
//! requested it. When compaction cuts between the two, the orphaned tool
//! results at the head of the retained tail are dropped as well.

use tracing::info;

use super::ChatMessage;

/// Default message cap before compaction
pub const DEFAULT_MAX_MESSAGES: usize = 20;
/// Default number of recent turns kept by compaction
pub const DEFAULT_KEEP_RECENT: usize = 15;

/// What a compaction discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionSummary {
    pub messages_before: usize,
    pub messages_after: usize,
    pub orphans_dropped: usize,
}

impl CompactionSummary {
    pub fn messages_discarded(&self) -> usize {
        self.messages_before - self.messages_after
    }
}

#[derive(Debug, Clone)]
pub struct ConversationHistory {
    leading: Option<ChatMessage>,
    turns: Vec<ChatMessage>,
    max_messages: usize,
    keep_recent: usize,
    compaction_count: u32,
}

impl ConversationHistory {
    pub fn new(max_messages: usize, keep_recent: usize) -> Self {
        Self {
            leading: None,
            turns: Vec::new(),
            max_messages: max_messages.max(2),
            keep_recent: keep_recent.min(max_messages.saturating_sub(1)).max(1),
            compaction_count: 0,
        }
    }

    /// Replace the leading system/context message
    pub fn set_leading(&mut self, message: ChatMessage) {
        self.leading = Some(message);
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.turns.push(message);
    }

    /// Drop every turn, keeping the leading message
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    /// Total messages, leading message included
    pub fn len(&self) -> usize {
        self.turns.len() + usize::from(self.leading.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn compaction_count(&self) -> u32 {
        self.compaction_count
    }

    /// Messages in send order
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.leading
            .iter()
            .chain(self.turns.iter())
            .cloned()
            .collect()
    }

    /// Compact if over the cap. Returns what was discarded, if anything.
    pub fn compact_if_needed(&mut self) -> Option<CompactionSummary> {
        if self.len() <= self.max_messages {
            return None;
        }

        let messages_before = self.len();
        let cut = self.turns.len().saturating_sub(self.keep_recent);
        self.turns.drain(..cut);

        let orphans = self
            .turns
            .iter()
            .take_while(|m| m.is_tool_result())
            .count();
        self.turns.drain(..orphans);

        self.compaction_count += 1;
        let summary = CompactionSummary {
            messages_before,
            messages_after: self.len(),
            orphans_dropped: orphans,
        };

        info!(
            compaction = self.compaction_count,
            messages_before,
            messages_after = summary.messages_after,
            orphans_dropped = orphans,
            "conversation history compacted"
        );

        Some(summary)
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES, DEFAULT_KEEP_RECENT)
    }
}
