//! 播放历史
//!
//! 记录 `PhraseChanged` 事件，最近播放的在最前，重复播放的短语移到最前并累计次数。

use std::collections::VecDeque;

use lingo_playlist::PhraseRecord;
use serde::Serialize;

pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub primary_text: String,
    pub target_text: String,
    pub plays: u32,
}

#[derive(Debug, Clone)]
pub struct PhraseHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl PhraseHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, phrase: &PhraseRecord) {
        let plays = match self.entries.iter().position(|e| e.id == phrase.id) {
            Some(pos) => self.entries.remove(pos).map(|e| e.plays).unwrap_or(0),
            None => 0,
        };

        self.entries.push_front(HistoryEntry {
            id: phrase.id.clone(),
            primary_text: phrase.primary_text.clone(),
            target_text: phrase.target_text.clone(),
            plays: plays + 1,
        });
        self.entries.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

impl Default for PhraseHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
